//! Multi-strategy download-URL extraction from heterogeneous server responses.
//!
//! The GenerateDownloadUrl endpoint nominally answers `{"url": "..."}`, but
//! observed bodies also include inline script assignments, server-rendered HTML
//! fragments, and JSON that arrives double-escaped. Strategies run in a fixed
//! order of decreasing confidence; the first hit wins. `None` means "no URL
//! found" and is not an error by itself.

use regex::Regex;
use scraper::{Html, Selector};

/// Extract a candidate download URL from a raw response body.
///
/// Pure and panic-free: malformed input of any shape degrades to the next
/// strategy. Calling twice on the same input yields the same result.
pub fn extract(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    if let Some(url) = json_url_field(raw) {
        return Some(url);
    }
    if let Some(url) = scan_text(raw) {
        return Some(url);
    }

    // Some backends hand the body back as an escaped JSON string literal.
    // Unescape once and rescan before giving up.
    if looks_escaped(raw) {
        let unescaped = unescape_json_sequences(raw);
        if unescaped != raw {
            if let Some(url) = scan_text(&unescaped) {
                return Some(url);
            }
        }
    }

    None
}

/// Text-mining strategies, shared between the raw and unescaped passes.
fn scan_text(text: &str) -> Option<String> {
    script_assignment(text)
        .or_else(|| keyed_value(text))
        .or_else(|| html_lookup(text))
        .or_else(|| attribute_scan(text))
        .or_else(|| loose_download_link(text))
        .or_else(|| nxm_link(text))
}

/// The body parses as JSON with a non-empty string field `url`.
fn json_url_field(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value
        .as_object()?
        .get("url")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// An inline script assignment: `downloadUrl = '<literal>'`.
fn script_assignment(text: &str) -> Option<String> {
    if let Ok(re) = Regex::new(r#"downloadUrl\s*=\s*(?:"([^"]+)"|'([^']+)')"#) {
        if let Some(caps) = re.captures(text) {
            let lit = caps.get(1).or_else(|| caps.get(2))?.as_str();
            return Some(unescape_entities(lit));
        }
    }
    None
}

/// A generic `downloadUrl` key/value pairing with `:` or `=`.
fn keyed_value(text: &str) -> Option<String> {
    if let Ok(re) = Regex::new(r#"["']?downloadUrl["']?\s*[:=]\s*(?:"([^"]+)"|'([^']+)')"#) {
        if let Some(caps) = re.captures(text) {
            let lit = caps.get(1).or_else(|| caps.get(2))?.as_str();
            return Some(unescape_entities(lit));
        }
    }
    None
}

/// Parse as an HTML document and look for the slow-download button or any
/// element carrying `data-download-url`, falling back to its link target.
fn html_lookup(text: &str) -> Option<String> {
    let document = Html::parse_document(text);
    let selector = Selector::parse("#slowDownloadButton, [data-download-url]").ok()?;
    for element in document.select(&selector) {
        if let Some(url) = element.value().attr("data-download-url") {
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
        if let Some(href) = element.value().attr("href") {
            if !href.is_empty() {
                return Some(href.to_string());
            }
        }
    }
    None
}

/// Attribute-style scan over raw text, for fragments that are not valid HTML
/// or where full parsing is undesirable.
fn attribute_scan(text: &str) -> Option<String> {
    if let Ok(re) = Regex::new(r#"data-download-url\s*=\s*(?:"([^"]+)"|'([^']+)')"#) {
        if let Some(caps) = re.captures(text) {
            let lit = caps.get(1).or_else(|| caps.get(2))?.as_str();
            return Some(unescape_entities(lit));
        }
    }
    None
}

/// Any http(s) URL with a `/download/` path segment. Only the path counts;
/// a `/download/` buried in the query or fragment is not a download link.
fn loose_download_link(text: &str) -> Option<String> {
    if let Ok(re) = Regex::new(r#"\bhttps?://[^\s"'<>]+"#) {
        for m in re.find_iter(text) {
            let candidate = m.as_str();
            let path = candidate
                .split(|c| c == '?' || c == '#')
                .next()
                .unwrap_or(candidate);
            if path.contains("/download/") {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

/// An `nxm://` scheme URL, returned unchanged.
fn nxm_link(text: &str) -> Option<String> {
    if let Ok(re) = Regex::new(r#"nxm://[^\s"'<>]+"#) {
        if let Some(m) = re.find(text) {
            return Some(m.as_str().to_string());
        }
    }
    None
}

fn unescape_entities(s: &str) -> String {
    s.replace("&amp;", "&")
}

fn looks_escaped(raw: &str) -> bool {
    raw.contains(r"\/") || raw.contains(r#"\""#) || raw.contains(r"\n") || raw.contains(r"\u")
}

/// Best-effort unescape of JSON string-escape sequences. Unknown sequences are
/// left alone rather than dropped.
fn unescape_json_sequences(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('/') => {
                out.push('/');
                chars.next();
            }
            Some('"') => {
                out.push('"');
                chars.next();
            }
            Some('\'') => {
                out.push('\'');
                chars.next();
            }
            Some('n') => {
                out.push('\n');
                chars.next();
            }
            Some('r') => {
                out.push('\r');
                chars.next();
            }
            Some('t') => {
                out.push('\t');
                chars.next();
            }
            Some('\\') => {
                out.push('\\');
                chars.next();
            }
            Some('u') => {
                chars.next();
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            _ => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_url_field_wins() {
        let raw = r#"{"url":"https://cdn.example/file.bin?a=1&b=2"}"#;
        assert_eq!(
            extract(raw).as_deref(),
            Some("https://cdn.example/file.bin?a=1&b=2")
        );
    }

    #[test]
    fn json_with_empty_url_falls_through() {
        assert_eq!(extract(r#"{"url":""}"#), None);
    }

    #[test]
    fn script_assignment_unescapes_entities() {
        let raw =
            r#"<script>const downloadUrl = 'https://files.example/get?id=9&amp;key=x';</script>"#;
        assert_eq!(
            extract(raw).as_deref(),
            Some("https://files.example/get?id=9&key=x")
        );
    }

    #[test]
    fn keyed_value_with_colon() {
        let raw = r#"window.state = { "downloadUrl": "https://files.example/a" };"#;
        assert_eq!(extract(raw).as_deref(), Some("https://files.example/a"));
    }

    #[test]
    fn html_attribute_beats_href() {
        let raw = r#"<html><body><a id="slowDownloadButton" href="/wait" data-download-url="nxm://game/mods/1/files/2"></a></body></html>"#;
        assert_eq!(extract(raw).as_deref(), Some("nxm://game/mods/1/files/2"));
    }

    #[test]
    fn html_falls_back_to_href() {
        let raw = r#"<div><a id="slowDownloadButton" href="https://cdn.example/x.zip">go</a></div>"#;
        assert_eq!(extract(raw).as_deref(), Some("https://cdn.example/x.zip"));
    }

    #[test]
    fn loose_scan_requires_download_segment() {
        let raw = "see https://example.com/about and https://cdn.example/download/42/file.7z now";
        assert_eq!(
            extract(raw).as_deref(),
            Some("https://cdn.example/download/42/file.7z")
        );
    }

    #[test]
    fn loose_scan_ignores_query_only_matches() {
        let raw = "redirect via https://tracker.example/jump?from=/download/42 now";
        assert_eq!(extract(raw), None);
        // a query string does not disqualify a real download path
        let ok = "https://cdn.example/download/42/file.7z?key=abc";
        assert_eq!(extract(ok).as_deref(), Some(ok));
    }

    #[test]
    fn bare_nxm_token_returned_unchanged() {
        let raw = "nxm://skyrim/mods/1/files/2?key=abc";
        assert_eq!(extract(raw).as_deref(), Some(raw));
    }

    #[test]
    fn unmatched_body_yields_none() {
        assert_eq!(extract(""), None);
        assert_eq!(extract("nothing to see here"), None);
        assert_eq!(extract("https://example.com/plain"), None);
    }

    #[test]
    fn escaped_json_gets_second_pass() {
        let raw = r#"\"downloadUrl\" : \"https:\/\/files.example\/download\/7\/a.zip\""#;
        assert_eq!(
            extract(raw).as_deref(),
            Some("https://files.example/download/7/a.zip")
        );
    }

    #[test]
    fn extraction_is_idempotent() {
        let raw = r#"{"url":"https://cdn.example/f.bin"}"#;
        assert_eq!(extract(raw), extract(raw));
    }
}
