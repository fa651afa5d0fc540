//! Utility functions shared by the store, parser and API layers.
//!
//! - **URL validation**: scheme/host checks that keep the fetcher off
//!   private networks
//! - **Text processing**: slug generation and feed text cleanup
//!
//! # Examples
//!
//! ```
//! use tunefeed::util::{feed_id_from_url, slugify};
//!
//! assert_eq!(slugify("My Album"), "my-album");
//! assert_eq!(
//!     feed_id_from_url("https://example.com/feed.xml").unwrap(),
//!     "example-com-feed-xml"
//! );
//! ```

mod text;
mod url_validator;

pub use text::{clean_text, slugify};
pub use url_validator::{validate_url, HostPolicy, UrlValidationError};

/// Derives the stable feed id from a feed URL.
///
/// The id is the slug of the URL's host followed by its path, so scheme,
/// port, query string and fragment never influence it. Two URLs sharing
/// host and path therefore map to the same id.
pub fn feed_id_from_url(url_str: &str) -> Result<String, UrlValidationError> {
    let url = url::Url::parse(url_str.trim())?;
    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    let id = slugify(&format!("{}{}", host, url.path()));
    if id.is_empty() {
        return Err(UrlValidationError::MissingHost);
    }
    Ok(id)
}
