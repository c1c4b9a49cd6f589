//! Content normalization: turns raw scraped text into a clean, line-preserving
//! text plus a lowercase search surface.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::models::{RawContent, SourceType};

static ZERO_WIDTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{200b}\u{200c}\u{200d}\u{feff}]").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>\n]+>").unwrap());
static MD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]\n]+)\]\([^)\n]*\)").unwrap());
static HSPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());

static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^[^\w\s]{3,}$",
        r"^(click|tap|press|select)\b",
        r"^(loading|please wait)",
        r"cookie.*consent",
        r"javascript.*required",
        r"^\d+$",
        r"^(n/a|none|null|tbd|unknown|-)$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// A page ready for signal and field extraction.
#[derive(Debug, Clone)]
pub struct NormalizedContent {
    /// Cleaned text, original case, one logical line per source line.
    pub text: String,
    /// Lowercase copy of `text`, used for keyword matching.
    pub search: String,
    pub source_url: String,
    /// Lowercase host of `source_url`, when it parses.
    pub host: Option<String>,
    pub source_type: Option<SourceType>,
}

impl NormalizedContent {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

pub fn normalize(raw: &RawContent) -> NormalizedContent {
    let text = clean_text(&raw.text);
    let search = text.to_lowercase();
    let source_url = raw.source_url.trim().to_string();
    NormalizedContent {
        text,
        search,
        host: url_host(&source_url),
        source_url,
        source_type: raw.source_type,
    }
}

/// Host of a URL, tolerating a missing scheme (`example.com/page`).
pub fn url_host(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    let parsed = Url::parse(url)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| Url::parse(&format!("https://{}", url)).ok())?;
    parsed
        .host_str()
        .map(|h| h.trim_end_matches('.').to_lowercase())
        .filter(|h| !h.is_empty())
}

/// Clean scraped text while keeping its line structure.
///
/// Strips zero-width characters, HTML tags and markdown link targets,
/// normalizes curly quotes, collapses horizontal whitespace and runs of
/// blank lines.
pub fn clean_text(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = ZERO_WIDTH_RE.replace_all(&text, "");
    let text = HTML_TAG_RE.replace_all(&text, " ");
    let text = MD_LINK_RE.replace_all(&text, "$1");
    let text = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = true;
    for line in text.lines() {
        let line = HSPACE_RE.replace_all(line, " ").trim().to_string();
        if line.is_empty() {
            if !previous_blank {
                lines.push(String::new());
            }
            previous_blank = true;
        } else {
            lines.push(line);
            previous_blank = false;
        }
    }

    lines.join("\n").trim().to_string()
}

/// Collapse a matched value onto a single line.
pub fn clean_value(value: &str) -> String {
    let cleaned = clean_text(value);
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '*' || c == '_' || c == '`' || c.is_whitespace())
        .to_string()
}

/// Whether a value is UI chrome or filler rather than documentation.
pub fn is_noise(value: &str) -> bool {
    let clean = value.trim().to_lowercase();
    if clean.is_empty() {
        return true;
    }

    if NOISE_PATTERNS.iter().any(|re| re.is_match(&clean)) {
        return true;
    }

    let chars = clean.chars().count();
    let special = clean
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    special * 2 > chars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_keeps_lines() {
        let raw = "  Model   card \r\n\r\n\r\n\tLicense:\u{200b} Apache 2.0  \n";
        assert_eq!(clean_text(raw), "Model card\n\nLicense: Apache 2.0");
    }

    #[test]
    fn test_clean_text_strips_markup() {
        let raw = "<p>See the [usage policy](https://example.com/aup) for \u{201c}details\u{201d}</p>";
        assert_eq!(clean_text(raw), "See the usage policy for \"details\"");
    }

    #[test]
    fn test_normalize_empty_content() {
        let raw = RawContent {
            source_url: " https://example.com ".into(),
            source_type: None,
            text: "   \n\n ".into(),
        };
        let n = normalize(&raw);
        assert!(n.is_empty());
        assert!(n.search.is_empty());
        assert_eq!(n.source_url, "https://example.com");
        assert_eq!(n.host.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_url_host() {
        assert_eq!(url_host("https://Docs.Mistral.AI/models").as_deref(), Some("docs.mistral.ai"));
        assert_eq!(url_host("huggingface.co/meta-llama").as_deref(), Some("huggingface.co"));
        assert_eq!(url_host(""), None);
    }

    #[test]
    fn test_search_surface_is_lowercase() {
        let raw = RawContent {
            source_url: "https://example.com".into(),
            source_type: Some(SourceType::OfficialDocs),
            text: "Headquartered in PARIS".into(),
        };
        assert_eq!(normalize(&raw).search, "headquartered in paris");
    }

    #[test]
    fn test_is_noise() {
        assert!(is_noise(""));
        assert!(is_noise("Click here to continue"));
        assert!(is_noise("Loading..."));
        assert!(is_noise("N/A"));
        assert!(is_noise("12345"));
        assert!(is_noise("----"));
        assert!(is_noise("We use cookies, see consent settings"));
        assert!(!is_noise("MIT"));
        assert!(!is_noise("Apache-2.0"));
        assert!(!is_noise("Text and images in, text out."));
    }

    #[test]
    fn test_clean_value_single_line() {
        assert_eq!(clean_value("**Apache 2.0**"), "Apache 2.0");
        assert_eq!(clean_value("  text,\n image "), "text, image");
    }
}
