use url::Url;

/// Extracts the domain from a URL
///
/// Retrieves the host portion of a URL and converts it to lowercase.
/// Returns None if the URL has no host (which shouldn't happen for valid
/// HTTP(S) URLs).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use novacrawler::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
