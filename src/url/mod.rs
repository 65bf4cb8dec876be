//! URL handling module for NovaCrawler
//!
//! Provides URL canonicalization (the stable keys used by the visited set
//! and the page store), home-page detection, and domain extraction.

mod domain;
mod normalize;

pub use domain::extract_domain;
pub use normalize::{is_home_page, normalize_url};
