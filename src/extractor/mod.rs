//! Preview-image extraction from fetched page markup.
//!
//! This is deliberately a text-pattern scanner, not an HTML parser: pages are
//! inspected once for a single representative image, so documented regexes
//! over the raw markup are enough and keep the failure mode simple (a miss,
//! never a parse error).
//!
//! Two passes, first success wins:
//!
//! 1. **Meta pass** — scan `<meta>` tags for Open Graph / Twitter image
//!    properties and take the first acceptable `content` URL in document
//!    order.
//! 2. **Fallback pass** — score every `<img>` tag by src keywords and
//!    declared dimensions and take the best candidate above a threshold.
//!
//! Attribute matching is case-insensitive and tolerates single or double
//! quotes, whitespace around `=`, and tags whose attributes span lines.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

static META_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<meta\b([^>]*)>").unwrap());

static OG_PROPERTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:property|name)\s*=\s*["']og:image(?::secure_url|:url)?["']"#).unwrap()
});

static TWITTER_PROPERTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:property|name)\s*=\s*["']twitter:image(?::src)?["']"#).unwrap()
});

static CONTENT_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bcontent\s*=\s*["']([^"']+)["']"#).unwrap());

static IMAGE_EXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpe?g|png|gif|webp|avif|svg)(\?|$)").unwrap());

static MARKUP_EXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(js|css|html?)(\?|$)").unwrap());

static IMG_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img\b([^>]*)>").unwrap());

static SRC_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']+)["']"#).unwrap());

static SVG_EXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.svg(\?|$)").unwrap());

static HERO_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)hero|banner|cover|feature|article|post|thumb|social|preview|splash|header")
        .unwrap()
});

static DECORATIVE_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)icon|logo|avatar|sprite|pixel|1x1|spacer|button|badge|flag|emoji").unwrap()
});

static WIDTH_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bwidth\s*=\s*["']?(\d+)"#).unwrap());

static HEIGHT_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bheight\s*=\s*["']?(\d+)"#).unwrap());

/// Weights for the fallback `<img>` scoring pass.
///
/// The values are empirical; they are kept configurable rather than derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Bonus for src paths matching hero/banner keywords (default: 15)
    pub hero_bonus: f64,

    /// Penalty for src paths matching icon/logo keywords (default: 25)
    pub decorative_penalty: f64,

    /// Declared width contributes width / divisor, capped (defaults: 50, 12)
    pub width_divisor: f64,
    pub width_cap: f64,

    /// Declared height contributes height / divisor, capped (defaults: 80, 8)
    pub height_divisor: f64,
    pub height_cap: f64,

    /// Widths below this are penalized as icon-sized (defaults: 80, 20)
    pub min_width_px: u32,
    pub small_width_penalty: f64,

    /// Minimum score for the best candidate to be accepted (default: 5)
    pub accept_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hero_bonus: 15.0,
            decorative_penalty: 25.0,
            width_divisor: 50.0,
            width_cap: 12.0,
            height_divisor: 80.0,
            height_cap: 8.0,
            min_width_px: 80,
            small_width_penalty: 20.0,
            accept_threshold: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageExtractor {
    scoring: ScoringConfig,
}

impl ImageExtractor {
    pub fn new(scoring: ScoringConfig) -> Self {
        Self { scoring }
    }

    /// Extract the best candidate image URL from `markup`, resolved against
    /// `base`. Returns `None` when neither pass yields an acceptable image.
    pub fn extract(&self, markup: &str, base: &Url) -> Option<Url> {
        self.extract_meta(markup, base)
            .or_else(|| self.extract_fallback(markup, base))
    }

    /// Meta pass: first `og:image` / `twitter:image` tag in document order
    /// whose resolved content URL is acceptable. No scoring.
    pub fn extract_meta(&self, markup: &str, base: &Url) -> Option<Url> {
        for tag in META_TAG_RE.captures_iter(markup) {
            let attrs = tag.get(1).map(|m| m.as_str()).unwrap_or("");
            if !OG_PROPERTY_RE.is_match(attrs) && !TWITTER_PROPERTY_RE.is_match(attrs) {
                continue;
            }

            let Some(content) = CONTENT_ATTR_RE.captures(attrs) else {
                continue;
            };
            let value = html_escape::decode_html_entities(&content[1]).into_owned();
            if value.is_empty() || value.starts_with("data:") {
                continue;
            }

            let Ok(resolved) = base.join(&value) else {
                continue;
            };
            if meta_url_acceptable(resolved.as_str()) {
                return Some(resolved);
            }
        }
        None
    }

    /// Fallback pass: score every `<img>` src and return the best candidate
    /// at or above the acceptance threshold, resolved against `base`.
    pub fn extract_fallback(&self, markup: &str, base: &Url) -> Option<Url> {
        let cfg = &self.scoring;
        let mut best: Option<String> = None;
        let mut best_score = f64::NEG_INFINITY;

        for tag in IMG_TAG_RE.captures_iter(markup) {
            let attrs = tag.get(1).map(|m| m.as_str()).unwrap_or("");
            let Some(src) = SRC_ATTR_RE.captures(attrs) else {
                continue;
            };
            let src = html_escape::decode_html_entities(&src[1]).into_owned();
            if src.is_empty() || src.starts_with("data:") || SVG_EXT_RE.is_match(&src) {
                continue;
            }

            let mut score = 0.0;
            if HERO_KEYWORD_RE.is_match(&src) {
                score += cfg.hero_bonus;
            }
            if DECORATIVE_KEYWORD_RE.is_match(&src) {
                score -= cfg.decorative_penalty;
            }

            let width = parse_dimension(&WIDTH_ATTR_RE, attrs);
            let height = parse_dimension(&HEIGHT_ATTR_RE, attrs);
            if let Some(w) = width {
                score += (f64::from(w) / cfg.width_divisor).min(cfg.width_cap);
            }
            if let Some(h) = height {
                score += (f64::from(h) / cfg.height_divisor).min(cfg.height_cap);
            }
            if width.is_some_and(|w| w < cfg.min_width_px) {
                score -= cfg.small_width_penalty;
            }

            if score > best_score {
                best_score = score;
                best = Some(src);
            }
        }

        let best = best?;
        if best_score < cfg.accept_threshold {
            return None;
        }
        base.join(&best).ok()
    }
}

/// Acceptance rule for resolved meta-tag URLs: a known image extension, or
/// "image" anywhere in the URL, or at minimum not a script/stylesheet/markup
/// extension. Permissive default-accept, narrow default-reject.
fn meta_url_acceptable(url: &str) -> bool {
    IMAGE_EXT_RE.is_match(url)
        || url.to_ascii_lowercase().contains("image")
        || !MARKUP_EXT_RE.is_match(url)
}

fn parse_dimension(re: &Regex, attrs: &str) -> Option<u32> {
    re.captures(attrs).and_then(|c| c[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ImageExtractor {
        ImageExtractor::default()
    }

    fn base() -> Url {
        Url::parse("https://example.com/articles/1").unwrap()
    }

    #[test]
    fn test_og_image_extracted() {
        let html = r#"<html><head><meta property="og:image" content="https://cdn.example.com/a.jpg"></head></html>"#;
        let url = extractor().extract_meta(html, &base()).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/a.jpg");
    }

    #[test]
    fn test_meta_pass_takes_precedence_over_imgs() {
        let html = r#"
            <meta property="og:image" content="/og.png">
            <img src="/hero-banner.jpg" width="1200" height="600">
        "#;
        let url = extractor().extract(html, &base()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/og.png");
    }

    #[test]
    fn test_meta_tag_spanning_lines() {
        let html = "<meta\n  property=\"og:image\"\n  content=\"/img/cover.webp\"\n>";
        let url = extractor().extract_meta(html, &base()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/img/cover.webp");
    }

    #[test]
    fn test_single_quotes_and_spacing_tolerated() {
        let html = "<meta name = 'twitter:image' content = '/t.png'>";
        let url = extractor().extract_meta(html, &base()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/t.png");
    }

    #[test]
    fn test_secure_url_and_src_variants_match() {
        let html = r#"<meta property="og:image:secure_url" content="https://cdn.example.com/s.png">"#;
        assert!(extractor().extract_meta(html, &base()).is_some());

        let html = r#"<meta name="twitter:image:src" content="https://cdn.example.com/t.png">"#;
        assert!(extractor().extract_meta(html, &base()).is_some());
    }

    #[test]
    fn test_unrelated_meta_tags_ignored() {
        let html = r#"<meta property="og:title" content="Hello"><meta charset="utf-8">"#;
        assert!(extractor().extract_meta(html, &base()).is_none());
    }

    #[test]
    fn test_data_uri_content_rejected() {
        let html = r#"<meta property="og:image" content="data:image/png;base64,AAAA">"#;
        assert!(extractor().extract_meta(html, &base()).is_none());
    }

    #[test]
    fn test_first_qualifying_meta_wins() {
        let html = r#"
            <meta property="og:image" content="/first.jpg">
            <meta property="og:image" content="/second.jpg">
        "#;
        let url = extractor().extract_meta(html, &base()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/first.jpg");
    }

    #[test]
    fn test_image_substring_accepted_without_extension() {
        let html = r#"<meta property="og:image" content="https://example.com/imageserver?id=9">"#;
        assert!(extractor().extract_meta(html, &base()).is_some());
    }

    #[test]
    fn test_markup_extension_rejected() {
        let html = r#"<meta property="og:image" content="/share/card.html">"#;
        assert!(extractor().extract_meta(html, &base()).is_none());
    }

    #[test]
    fn test_extensionless_url_default_accepted() {
        // No image extension, no "image" substring, but not a markup
        // extension either: permissive default-accept.
        let html = r#"<meta property="og:image" content="https://cdn.example.com/media/12345">"#;
        assert!(extractor().extract_meta(html, &base()).is_some());
    }

    #[test]
    fn test_entity_escaped_content_resolves() {
        let html = r#"<meta property="og:image" content="/resize?src=a.jpg&amp;w=1200">"#;
        let url = extractor().extract_meta(html, &base()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/resize?src=a.jpg&w=1200");
    }

    #[test]
    fn test_fallback_hero_image_accepted() {
        let html = r#"<img src="/hero-banner.jpg" width="800" height="450">"#;
        let url = extractor().extract_fallback(html, &base()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/hero-banner.jpg");
    }

    #[test]
    fn test_fallback_small_icon_below_threshold() {
        let html = r#"<img src="/icon.png" width="16" height="16">"#;
        assert!(extractor().extract_fallback(html, &base()).is_none());
    }

    #[test]
    fn test_fallback_prefers_highest_score() {
        let html = r#"
            <img src="/logo.png" width="200">
            <img src="/article-cover.jpg" width="1000" height="500">
            <img src="/footer.png" width="300">
        "#;
        let url = extractor().extract_fallback(html, &base()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/article-cover.jpg");
    }

    #[test]
    fn test_fallback_skips_svg_and_data_uris() {
        let html = r#"
            <img src="/diagram.svg" width="900" height="600">
            <img src="data:image/png;base64,AAAA" width="900">
        "#;
        assert!(extractor().extract_fallback(html, &base()).is_none());
    }

    #[test]
    fn test_fallback_dimensionless_img_below_threshold() {
        // No keywords, no dimensions: scores 0, under the threshold of 5.
        let html = r#"<img src="/photo.jpg">"#;
        assert!(extractor().extract_fallback(html, &base()).is_none());
    }

    #[test]
    fn test_fallback_width_alone_clears_threshold() {
        // 600/50 capped at 12 => 12 >= 5.
        let html = r#"<img src="/photo.jpg" width="600">"#;
        assert!(extractor().extract_fallback(html, &base()).is_some());
    }

    #[test]
    fn test_fallback_img_without_src_skipped() {
        let html = r#"<img alt="spacer"><img src="/big-article-photo.jpg" width="700">"#;
        let url = extractor().extract_fallback(html, &base()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/big-article-photo.jpg");
    }

    #[test]
    fn test_no_candidates_yields_none() {
        assert!(extractor().extract("<p>plain text, no images</p>", &base()).is_none());
    }
}
