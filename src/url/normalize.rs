use url::Url;

/// Hosts whose page identity lives in the query string. Normalization keeps
/// the query for these origins instead of stripping it.
const QUERY_SIGNIFICANT_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "play.google.com",
    "apps.apple.com",
];

/// Normalizes a URL into its canonical string form
///
/// # Normalization Steps
///
/// 1. Drop the fragment, always
/// 2. Drop the query string, unless the host is query-significant
///    (video-watch and app-store pages, where the query *is* the page)
/// 3. Drop trailing slashes, including the root slash
///
/// The result is the stable key for the visited set and the `pages` table.
/// Normalization is idempotent: re-parsing and re-normalizing the output
/// yields the same string.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use novacrawler::url::normalize_url;
///
/// let url = Url::parse("https://example.com/a/?x=1#frag").unwrap();
/// assert_eq!(normalize_url(&url), "https://example.com/a");
///
/// let url = Url::parse("https://youtube.com/watch?v=abc#t=5").unwrap();
/// assert_eq!(normalize_url(&url), "https://youtube.com/watch?v=abc");
/// ```
pub fn normalize_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();

    let mut normalized = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        normalized.push_str(&format!(":{}", port));
    }

    if is_query_significant(&host) {
        normalized.push_str(url.path());
        if let Some(query) = url.query() {
            normalized.push('?');
            normalized.push_str(query);
        }
        normalized
    } else {
        normalized.push_str(url.path());
        normalized.trim_end_matches('/').to_string()
    }
}

/// Returns true if the URL points at a site's home page (empty or `/` path)
pub fn is_home_page(url: &Url) -> bool {
    matches!(url.path(), "" | "/")
}

fn is_query_significant(host: &str) -> bool {
    QUERY_SIGNIFICANT_HOSTS.contains(&host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> String {
        normalize_url(&Url::parse(s).unwrap())
    }

    #[test]
    fn test_strips_fragment() {
        assert_eq!(norm("https://example.com/page#section"), "https://example.com/page");
    }

    #[test]
    fn test_strips_query() {
        assert_eq!(norm("https://example.com/a/?x=1#frag"), "https://example.com/a");
    }

    #[test]
    fn test_strips_trailing_slash() {
        assert_eq!(norm("https://example.com/page/"), "https://example.com/page");
    }

    #[test]
    fn test_strips_root_slash() {
        assert_eq!(norm("https://example.com/"), "https://example.com");
        assert_eq!(norm("https://example.com"), "https://example.com");
    }

    #[test]
    fn test_query_significant_host_keeps_query() {
        assert_eq!(
            norm("https://youtube.com/watch?v=abc#t=5"),
            "https://youtube.com/watch?v=abc"
        );
        assert_eq!(
            norm("https://play.google.com/store/apps/details?id=com.example"),
            "https://play.google.com/store/apps/details?id=com.example"
        );
    }

    #[test]
    fn test_query_significant_host_still_strips_fragment() {
        assert_eq!(
            norm("https://www.youtube.com/watch?v=abc#comments"),
            "https://www.youtube.com/watch?v=abc"
        );
    }

    #[test]
    fn test_lowercases_host() {
        assert_eq!(norm("https://EXAMPLE.COM/Page"), "https://example.com/Page");
    }

    #[test]
    fn test_preserves_port() {
        assert_eq!(norm("http://127.0.0.1:8080/page/"), "http://127.0.0.1:8080/page");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "https://example.com/a/?x=1#frag",
            "https://youtube.com/watch?v=abc#t=5",
            "https://example.com/",
            "http://127.0.0.1:9999/deep/path/",
            "https://EXAMPLE.com/Mixed/Case?q=1",
        ];
        for input in inputs {
            let once = norm(input);
            let twice = normalize_url(&Url::parse(&once).unwrap());
            assert_eq!(once, twice, "normalization not idempotent for {}", input);
        }
    }

    #[test]
    fn test_is_home_page() {
        assert!(is_home_page(&Url::parse("https://example.com").unwrap()));
        assert!(is_home_page(&Url::parse("https://example.com/").unwrap()));
        assert!(!is_home_page(&Url::parse("https://example.com/about").unwrap()));
    }
}
