//! Target URL validation and tracking-parameter stripping.

use url::Url;

/// Query parameters removed from targets before they are stored.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
];

#[derive(Debug, thiserror::Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    Parse(#[from] url::ParseError),

    #[error("Only HTTP and HTTPS protocols are allowed")]
    UnsupportedScheme,

    #[error("URL has no host")]
    MissingHost,
}

/// Parses `raw` as an absolute http(s) URL and drops tracking parameters.
pub fn sanitize_target(raw: &str) -> Result<String, UrlValidationError> {
    let mut url = Url::parse(raw.trim())?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlValidationError::UnsupportedScheme);
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url.to_string())
}
