//! Self-contained document composition for the sandboxed reader pane.
//!
//! The reader renders fetched pages by direct markup injection into an
//! isolated surface, never by navigation. The sandbox's content policy blocks
//! cross-origin stylesheet loads, so every `<link rel="stylesheet">` is
//! fetched here and replaced with an inline `<style>` block; relative
//! `url(...)` references inside a sheet are rewritten absolute against that
//! sheet's own URL. A `<base>` tag keeps the page's remaining relative asset
//! references working, and a final containment rule stops the document from
//! forcing horizontal scroll.
//!
//! Composition never fails: a page that cannot be fetched yields a minimal
//! placeholder document carrying a direct external link, and a stylesheet
//! that cannot be fetched is simply left un-inlined.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::fetcher::Fetcher;

static STYLESHEET_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<link\b[^>]*\brel\s*=\s*["']stylesheet["'][^>]*>"#).unwrap());

static HREF_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).unwrap());

static HEAD_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<head\b[^>]*>").unwrap());

static HEAD_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</head>").unwrap());

static CSS_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)url\(\s*["']?([^"')]+)["']?\s*\)"#).unwrap());

/// Only the root elements are constrained; nothing else is overridden.
const CONTAINMENT_STYLE: &str =
    "<style>html,body{max-width:100%!important;overflow-x:hidden!important}</style>";

/// A document ready for injection into the sandboxed reader surface.
/// Built fresh per reader-open and discarded with the view; never cached.
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub markup: String,
    pub base_url: Url,
}

pub struct DocumentComposer {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
}

impl DocumentComposer {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self { fetcher }
    }

    /// Fetch `page_url` and compose it. A failed page fetch yields the
    /// placeholder document instead of an error.
    pub async fn compose(&self, page_url: &Url) -> ComposedDocument {
        match self.fetcher.fetch(page_url.as_str()).await {
            Ok(page) => {
                let base = Url::parse(&page.final_url).unwrap_or_else(|_| page_url.clone());
                self.compose_markup(&page.body, &base).await
            }
            Err(e) => {
                debug!("page fetch for reader failed ({}): {}", page_url, e);
                placeholder_document(page_url)
            }
        }
    }

    /// Compose already-fetched markup against its base URL.
    pub async fn compose_markup(&self, markup: &str, base: &Url) -> ComposedDocument {
        let mut html = insert_base_tag(markup, base);

        let sheets: Vec<(String, Url)> = STYLESHEET_LINK_RE
            .find_iter(&html)
            .filter_map(|m| {
                let tag = m.as_str();
                let href = HREF_ATTR_RE.captures(tag)?;
                let href = html_escape::decode_html_entities(&href[1]).into_owned();
                let css_url = base.join(href.trim()).ok()?;
                Some((tag.to_string(), css_url))
            })
            .collect();

        // All sheet fetches run concurrently; composition finishes only once
        // every one has settled. Each failure degrades that one sheet.
        let fetches = sheets.into_iter().map(|(tag, css_url)| {
            let fetcher = self.fetcher.clone();
            async move {
                match fetcher.fetch(css_url.as_str()).await {
                    Ok(sheet) if (200..400).contains(&sheet.status) && !sheet.body.is_empty() => {
                        let css = rewrite_css_urls(&sheet.body, &css_url);
                        Some((tag, format!("<style>\n{}\n</style>", css)))
                    }
                    Ok(sheet) => {
                        debug!("stylesheet {} returned status {}", css_url, sheet.status);
                        None
                    }
                    Err(e) => {
                        debug!("stylesheet fetch {} failed: {}", css_url, e);
                        None
                    }
                }
            }
        });

        for (tag, style_block) in futures::future::join_all(fetches).await.into_iter().flatten() {
            html = html.replacen(&tag, &style_block, 1);
        }

        let html = append_containment(html);

        ComposedDocument {
            markup: html,
            base_url: base.clone(),
        }
    }
}

/// Insert `<base href target=_blank>` right after the opening head tag so
/// relative asset references resolve; synthesize a prefix position when the
/// document has no head.
fn insert_base_tag(markup: &str, base: &Url) -> String {
    let base_tag = format!(r#"<base href="{}" target="_blank">"#, base);

    match HEAD_OPEN_RE.find(markup) {
        Some(head) => {
            let mut out = String::with_capacity(markup.len() + base_tag.len() + 1);
            out.push_str(&markup[..head.end()]);
            out.push('\n');
            out.push_str(&base_tag);
            out.push_str(&markup[head.end()..]);
            out
        }
        None => format!("{}{}", base_tag, markup),
    }
}

/// Rewrite relative `url(...)` references in CSS text to absolute URLs
/// resolved against the stylesheet's own location. Absolute,
/// protocol-relative and data: references pass through unchanged.
fn rewrite_css_urls(css: &str, sheet_url: &Url) -> String {
    CSS_URL_RE
        .replace_all(css, |caps: &regex::Captures| {
            let reference = caps[1].trim();
            if reference.starts_with("data:")
                || reference.starts_with("http://")
                || reference.starts_with("https://")
                || reference.starts_with("//")
            {
                return caps[0].to_string();
            }
            match sheet_url.join(reference) {
                Ok(absolute) => format!("url(\"{}\")", absolute),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn append_containment(html: String) -> String {
    match HEAD_CLOSE_RE.find(&html) {
        Some(close) => {
            let at = close.start();
            let mut out = String::with_capacity(html.len() + CONTAINMENT_STYLE.len());
            out.push_str(&html[..at]);
            out.push_str(CONTAINMENT_STYLE);
            out.push_str(&html[at..]);
            out
        }
        None => html + CONTAINMENT_STYLE,
    }
}

fn placeholder_document(url: &Url) -> ComposedDocument {
    let markup = format!(
        r#"<!DOCTYPE html><html><body style="font-family:sans-serif;padding:40px;color:#555;text-align:center">
  <p style="font-size:14px;margin-bottom:16px">Couldn't load this page inline.</p>
  <a href="{url}" target="_blank" rel="noopener" style="font-size:13px;font-weight:bold">Open in new tab &#8599;</a>
</body></html>"#
    );
    ComposedDocument {
        markup,
        base_url: url.clone(),
    }
}
