//! Attribute extraction from HTML documents.
//!
//! The cover-image fetcher only needs "the `content` attribute of the first
//! element matching a selector", so that is the whole capability. Keeping it
//! behind [`AttributeExtractor`] lets tests substitute a canned extractor.

use scraper::{Html, Selector};

use enricher_shared::{EnricherError, Result};

/// Selector for the social-preview image tag.
pub const OG_IMAGE_SELECTOR: &str = r#"meta[property="og:image"]"#;

/// Extract an attribute value by tag selector.
pub trait AttributeExtractor: Send + Sync {
    /// Value of `attribute` on the first element matching `selector`.
    ///
    /// `Ok(None)` when nothing matches or the attribute is missing; `Err` only
    /// for an invalid selector.
    fn extract(&self, html: &str, selector: &str, attribute: &str) -> Result<Option<String>>;
}

/// [`AttributeExtractor`] backed by the `scraper` HTML parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScraperExtractor;

impl AttributeExtractor for ScraperExtractor {
    fn extract(&self, html: &str, selector: &str, attribute: &str) -> Result<Option<String>> {
        let sel = Selector::parse(selector)
            .map_err(|e| EnricherError::parse(format!("invalid selector '{selector}': {e}")))?;
        let doc = Html::parse_document(html);

        Ok(doc
            .select(&sel)
            .find_map(|el| el.value().attr(attribute))
            .map(|v| v.trim().to_string()))
    }
}
