//! DOM-like element abstraction
//!
//! The feature extractor reads elements through [`ElementView`] so the same
//! heuristics run against a live `web_sys::Element` in the extension and
//! against a serialized [`ElementSnapshot`] in tests and the CLI.
//!
//! Every fallible read returns a `Result` or `Option`; the extractor maps
//! failures to documented defaults and never aborts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// Bounding box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// A clickable descendant that might be a close control.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlInfo {
    pub tag_name: String,
    pub text: String,
    pub aria_label: String,
    pub title: String,
    pub class_name: String,
    pub id: String,
    pub rect: Option<Rect>,
}

/// Descendant categories the extractor asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescendantKind {
    Image,
    Link,
    Button,
    Form,
    Media,
}

impl DescendantKind {
    /// CSS selector matching this category.
    pub fn selector(&self) -> &'static str {
        match self {
            Self::Image => "img, picture, svg",
            Self::Link => "a[href]",
            Self::Button => "button, [role=\"button\"], input[type=\"button\"], input[type=\"submit\"]",
            Self::Form => "form, input, select, textarea",
            Self::Media => "video, audio, iframe, embed, object",
        }
    }
}

/// Read-only view of one element.
pub trait ElementView {
    fn tag_name(&self) -> Result<String, ExtractionError>;
    fn id(&self) -> String;
    fn class_name(&self) -> String;

    /// Computed style property value, e.g. `style("z-index")`.
    fn style(&self, property: &str) -> Result<String, ExtractionError>;

    fn bounding_rect(&self) -> Result<Rect, ExtractionError>;

    fn text_content(&self) -> Option<String>;

    fn attribute(&self, name: &str) -> Option<String>;

    fn children_count(&self) -> usize;

    /// Number of element siblings, excluding the element itself.
    fn sibling_count(&self) -> usize;

    fn parent_tag_name(&self) -> Option<String>;

    /// Number of descendants of the given kind.
    fn count_descendants(&self, kind: DescendantKind) -> Result<usize, ExtractionError>;

    /// Raw `href` values of descendant links.
    fn link_hrefs(&self) -> Vec<String>;

    /// Clickable descendants worth testing as close controls.
    fn controls(&self) -> Vec<ControlInfo>;

    /// Host of the page the element lives on.
    fn document_host(&self) -> Option<String>;

    /// Epoch ms when the element was inserted, if an observer saw it happen.
    fn inserted_at(&self) -> Option<u64> {
        None
    }
}

// =============================================================================
// Element Snapshot
// =============================================================================

/// Serializable capture of an element, as produced by the extension's
/// snapshot tool or written by hand in fixtures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub tag_name: String,
    pub id: String,
    pub class_name: String,
    /// Computed style, keyed by CSS property name
    pub style: HashMap<String, String>,
    pub rect: Option<Rect>,
    pub text: Option<String>,
    pub attributes: HashMap<String, String>,
    pub children_count: usize,
    pub sibling_count: usize,
    pub parent_tag_name: Option<String>,
    pub image_count: usize,
    pub button_count: usize,
    pub form_count: usize,
    pub media_count: usize,
    pub links: Vec<String>,
    pub controls: Vec<ControlInfo>,
    pub page_url: Option<String>,
    pub inserted_at: Option<u64>,
    /// Marks a snapshot taken after the node left the document
    pub detached: bool,
}

impl ElementSnapshot {
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, property: &str, value: &str) -> Self {
        self.style.insert(property.to_string(), value.to_string());
        self
    }

    pub fn with_rect(mut self, left: f64, top: f64, width: f64, height: f64) -> Self {
        self.rect = Some(Rect::new(left, top, width, height));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_control(mut self, control: ControlInfo) -> Self {
        self.controls.push(control);
        self
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }
}

impl ElementView for ElementSnapshot {
    fn tag_name(&self) -> Result<String, ExtractionError> {
        if self.tag_name.is_empty() {
            return Err(ExtractionError::Malformed("missing tag name".to_string()));
        }
        Ok(self.tag_name.clone())
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn class_name(&self) -> String {
        self.class_name.clone()
    }

    fn style(&self, property: &str) -> Result<String, ExtractionError> {
        if self.detached {
            return Err(ExtractionError::Detached);
        }
        self.style
            .get(property)
            .cloned()
            .ok_or_else(|| ExtractionError::StyleUnavailable(property.to_string()))
    }

    fn bounding_rect(&self) -> Result<Rect, ExtractionError> {
        if self.detached {
            return Err(ExtractionError::Detached);
        }
        self.rect.ok_or(ExtractionError::GeometryUnavailable)
    }

    fn text_content(&self) -> Option<String> {
        self.text.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn children_count(&self) -> usize {
        self.children_count
    }

    fn sibling_count(&self) -> usize {
        self.sibling_count
    }

    fn parent_tag_name(&self) -> Option<String> {
        if self.detached {
            return None;
        }
        self.parent_tag_name.clone()
    }

    fn count_descendants(&self, kind: DescendantKind) -> Result<usize, ExtractionError> {
        Ok(match kind {
            DescendantKind::Image => self.image_count,
            DescendantKind::Link => self.links.len(),
            DescendantKind::Button => self.button_count.max(self.controls.len()),
            DescendantKind::Form => self.form_count,
            DescendantKind::Media => self.media_count,
        })
    }

    fn link_hrefs(&self) -> Vec<String> {
        self.links.clone()
    }

    fn controls(&self) -> Vec<ControlInfo> {
        self.controls.clone()
    }

    fn document_host(&self) -> Option<String> {
        self.page_url
            .as_deref()
            .and_then(crate::url::extract_host)
            .map(|h| h.to_ascii_lowercase())
    }

    fn inserted_at(&self) -> Option<u64> {
        self.inserted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_missing_style_is_error() {
        let el = ElementSnapshot::new("div");
        assert_eq!(
            el.style("z-index"),
            Err(ExtractionError::StyleUnavailable("z-index".to_string()))
        );
    }

    #[test]
    fn test_detached_snapshot_fails_geometry() {
        let mut el = ElementSnapshot::new("div").with_rect(0.0, 0.0, 10.0, 10.0);
        el.detached = true;
        assert_eq!(el.bounding_rect(), Err(ExtractionError::Detached));
        assert_eq!(el.style("position"), Err(ExtractionError::Detached));
    }

    #[test]
    fn test_snapshot_document_host() {
        let mut el = ElementSnapshot::new("div");
        el.page_url = Some("https://News.Example.com/article".to_string());
        assert_eq!(el.document_host().as_deref(), Some("news.example.com"));
    }

    #[test]
    fn test_snapshot_from_json_uses_defaults() {
        let el: ElementSnapshot =
            serde_json::from_str(r#"{"tagName":"DIV","style":{"position":"fixed"}}"#).unwrap();
        assert_eq!(el.tag_name().unwrap(), "DIV");
        assert_eq!(el.style("position").unwrap(), "fixed");
        assert!(el.rect.is_none());
        assert!(el.controls.is_empty());
    }

    #[test]
    fn test_rect_center() {
        let r = Rect::new(100.0, 50.0, 200.0, 100.0);
        assert_eq!(r.center(), (200.0, 100.0));
    }
}
