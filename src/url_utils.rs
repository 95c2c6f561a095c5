//! URL helper functions used throughout the checker

use url::Url;

/// Extract the host portion of a URL
pub fn extract_host(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_string()
}

/// Parse a URL and strip its fragment
pub fn parse_normalized(input: &str) -> Result<Url, url::ParseError> {
    let mut parsed = Url::parse(input)?;
    parsed.set_fragment(None);
    Ok(parsed)
}

/// Whether the scheme is one the probe client can reach
pub fn is_checkable_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Check if a content type represents HTML.
///
/// This is a substring match: servers commonly append charset parameters,
/// and some prepend whitespace.
pub fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml+xml")
}

/// Recursion gate: a child is crawled only when it sits under the root
/// URL as a string prefix AND shares its host.
///
/// The prefix comparison is deliberately done on the serialized URLs, so
/// `http://h/docs` does not cover `http://h/docs-archive/` but a root of
/// `http://h/docs/` does cover `http://h/docs/a.html`.
pub fn is_under_root(candidate: &Url, root: &Url) -> bool {
    candidate.as_str().starts_with(root.as_str()) && candidate.host_str() == root.host_str()
}

/// Normalize CLI input by adding http:// when no scheme is provided
pub fn normalize_url_for_cli(input: &str) -> String {
    let trimmed = input.trim();

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }

    format!("http://{}", trimmed)
}
