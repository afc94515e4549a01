//! Core type definitions for PopGuard
//!
//! These types flow through the classification pipeline and, for patterns
//! and popup records, are persisted as JSON by the engine and the extension.

use serde::{Deserialize, Serialize};

// =============================================================================
// Layout Enums
// =============================================================================

/// CSS `position` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionKind {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

impl PositionKind {
    /// Parse a computed `position` value. Unknown values map to `Static`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "relative" => Self::Relative,
            "absolute" => Self::Absolute,
            "fixed" => Self::Fixed,
            "sticky" | "-webkit-sticky" => Self::Sticky,
            _ => Self::Static,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Relative => "relative",
            Self::Absolute => "absolute",
            Self::Fixed => "fixed",
            Self::Sticky => "sticky",
        }
    }
}

/// CSS `display` value, reduced to the cases the analyzer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayKind {
    None,
    #[default]
    Block,
    Inline,
    InlineBlock,
    Flex,
    Grid,
    Other,
}

impl DisplayKind {
    /// Parse a computed `display` value. Empty input maps to `Block`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "" | "block" => Self::Block,
            "inline" => Self::Inline,
            "inline-block" => Self::InlineBlock,
            "flex" | "inline-flex" => Self::Flex,
            "grid" | "inline-grid" => Self::Grid,
            _ => Self::Other,
        }
    }
}

/// CSS `visibility` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityKind {
    #[default]
    Visible,
    Hidden,
    Collapse,
}

impl VisibilityKind {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "hidden" => Self::Hidden,
            "collapse" => Self::Collapse,
            _ => Self::Visible,
        }
    }
}

/// Size of the browser viewport in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1920.0, 1080.0)
    }
}

// =============================================================================
// Close Button Hints
// =============================================================================

bitflags::bitflags! {
    /// Signals that identified a control as a close button.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CloseButtonKinds: u8 {
        /// Glyph text such as "×" or "✕"
        const GLYPH = 1 << 0;
        /// Label text such as "close" or "閉じる"
        const TEXT = 1 << 1;
        /// aria-label or title mentioning close
        const ARIA_LABEL = 1 << 2;
        /// class or id containing "close" / "dismiss"
        const CLASS_NAME = 1 << 3;
    }
}

impl Default for CloseButtonKinds {
    fn default() -> Self {
        Self::empty()
    }
}

/// Where a control sits inside its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopRight,
    TopLeft,
    BottomRight,
    BottomLeft,
    Center,
}

/// One close-like control found inside an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseButtonHint {
    pub kinds: CloseButtonKinds,
    pub corner: Option<Corner>,
}

// =============================================================================
// Feature Record
// =============================================================================

/// Flat feature record for one element in one detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    pub position: PositionKind,
    /// Absent or `auto` z-index is recorded as 0
    pub z_index: i64,
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
    pub background_color: String,
    pub opacity: f64,
    pub display: DisplayKind,
    pub visibility: VisibilityKind,
    pub tag_name: String,
    pub class_name: String,
    pub id: String,
    pub children_count: usize,
    /// Whitespace-collapsed text, truncated
    pub text_content_sample: String,
    /// Character count of the full text before truncation
    pub text_length: usize,
    pub has_images: bool,
    pub has_links: bool,
    pub has_buttons: bool,
    pub has_forms: bool,
    pub has_media: bool,
    pub external_link_count: usize,
    pub close_buttons: Vec<CloseButtonHint>,
    pub box_shadow: String,
    pub border_width: f64,
    pub backdrop_filter: String,
    pub has_click_handler: bool,
    pub has_keyboard_handler: bool,
    /// Epoch milliseconds
    pub timestamp: u64,
    pub parent_tag_name: Option<String>,
    pub sibling_count: usize,
    pub was_recently_added: bool,
    pub has_animation: bool,
    pub is_interactive: bool,
}

// =============================================================================
// Characteristics
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionTraits {
    pub is_fixed: bool,
    pub is_absolute: bool,
    pub is_sticky: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZIndexTraits {
    pub value: i64,
    pub is_high: bool,
    pub is_very_high: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionTraits {
    pub width: f64,
    pub height: f64,
    pub area: f64,
    pub aspect_ratio: f64,
    pub covers_large_area: bool,
    pub is_full_screen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalOverlayTraits {
    pub has_overlay_background: bool,
    pub blocks_interaction: bool,
    pub has_backdrop: bool,
    pub center_positioned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseButtonTraits {
    pub has_close_button: bool,
    pub types: CloseButtonKinds,
    pub position: Option<Corner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTraits {
    pub contains_ads: bool,
    pub has_external_links: bool,
    pub has_form_elements: bool,
    pub has_media_content: bool,
    pub text_length: usize,
    pub has_call_to_action: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualTraits {
    pub background_color: String,
    pub has_box_shadow: bool,
    pub has_border: bool,
    pub opacity: f64,
    pub is_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionTraits {
    pub has_click_handlers: bool,
    pub has_keyboard_handlers: bool,
    pub prevents_bubbling: bool,
}

/// Semantic axes derived from a [`FeatureRecord`] and the viewport.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Characteristics {
    /// Lowercase tag name, carried for pattern fingerprinting
    pub tag_name: String,
    pub position: PositionTraits,
    pub z_index: ZIndexTraits,
    pub dimensions: DimensionTraits,
    pub modal_overlay: ModalOverlayTraits,
    pub close_button: CloseButtonTraits,
    pub content: ContentTraits,
    pub visual: VisualTraits,
    pub interaction: InteractionTraits,
}

impl Characteristics {
    /// Coarse position category used by fingerprints.
    pub fn position_kind(&self) -> PositionKind {
        if self.position.is_fixed {
            PositionKind::Fixed
        } else if self.position.is_absolute {
            PositionKind::Absolute
        } else if self.position.is_sticky {
            PositionKind::Sticky
        } else {
            PositionKind::Static
        }
    }

    /// Modal-like: either dims the page or traps interaction.
    #[inline]
    pub fn is_modal(&self) -> bool {
        self.modal_overlay.has_overlay_background || self.modal_overlay.blocks_interaction
    }
}

// =============================================================================
// Decisions and Records
// =============================================================================

/// A learnable user decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserDecision {
    /// The pop-up was closed (it is unwanted)
    Close,
    /// The pop-up was kept (it is legitimate)
    Keep,
}

/// How a detected pop-up was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Close,
    Keep,
    /// Prompt expired without an answer
    Timeout,
    /// Prompt dismissed without choosing
    Dismiss,
}

impl Resolution {
    /// The decision to learn from, if any. Timeout and dismiss never teach.
    pub fn learnable(self) -> Option<UserDecision> {
        match self {
            Self::Close => Some(UserDecision::Close),
            Self::Keep => Some(UserDecision::Keep),
            Self::Timeout | Self::Dismiss => None,
        }
    }
}

impl From<UserDecision> for Resolution {
    fn from(decision: UserDecision) -> Self {
        match decision {
            UserDecision::Close => Self::Close,
            UserDecision::Keep => Self::Keep,
        }
    }
}

/// One detected and resolved pop-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupRecord {
    pub id: String,
    pub url: String,
    pub domain: String,
    /// Epoch milliseconds
    pub timestamp: u64,
    pub characteristics: Characteristics,
    pub user_decision: Resolution,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_parse() {
        assert_eq!(PositionKind::parse("fixed"), PositionKind::Fixed);
        assert_eq!(PositionKind::parse(" ABSOLUTE "), PositionKind::Absolute);
        assert_eq!(PositionKind::parse("-webkit-sticky"), PositionKind::Sticky);
        assert_eq!(PositionKind::parse("bogus"), PositionKind::Static);
        assert_eq!(PositionKind::parse(""), PositionKind::Static);
    }

    #[test]
    fn test_display_and_visibility_parse() {
        assert_eq!(DisplayKind::parse("none"), DisplayKind::None);
        assert_eq!(DisplayKind::parse("inline-flex"), DisplayKind::Flex);
        assert_eq!(DisplayKind::parse("table"), DisplayKind::Other);
        assert_eq!(VisibilityKind::parse("hidden"), VisibilityKind::Hidden);
        assert_eq!(VisibilityKind::parse(""), VisibilityKind::Visible);
    }

    #[test]
    fn test_resolution_learnable() {
        assert_eq!(Resolution::Close.learnable(), Some(UserDecision::Close));
        assert_eq!(Resolution::Keep.learnable(), Some(UserDecision::Keep));
        assert_eq!(Resolution::Timeout.learnable(), None);
        assert_eq!(Resolution::Dismiss.learnable(), None);
    }

    #[test]
    fn test_position_kind_priority() {
        let mut c = Characteristics::default();
        assert_eq!(c.position_kind(), PositionKind::Static);
        c.position.is_absolute = true;
        assert_eq!(c.position_kind(), PositionKind::Absolute);
        c.position.is_fixed = true;
        assert_eq!(c.position_kind(), PositionKind::Fixed);
    }

    #[test]
    fn test_resolution_serde_lowercase() {
        let json = serde_json::to_string(&Resolution::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
        let back: UserDecision = serde_json::from_str("\"keep\"").unwrap();
        assert_eq!(back, UserDecision::Keep);
    }
}
