//! Characteristic analysis
//!
//! Groups a [`FeatureRecord`] into the semantic axes the scorer and the
//! pattern matcher work with. Every predicate is a pure function of the
//! record and the viewport.

use crate::types::{
    CloseButtonKinds, CloseButtonTraits, Characteristics, ContentTraits, DimensionTraits,
    DisplayKind, FeatureRecord, InteractionTraits, ModalOverlayTraits, PositionKind,
    PositionTraits, VisibilityKind, VisualTraits, Viewport, ZIndexTraits,
};

/// `is_high`: z-index strictly above this.
pub const HIGH_Z_INDEX: i64 = 1000;
/// `is_very_high`: z-index at or above this.
pub const VERY_HIGH_Z_INDEX: i64 = 9999;
/// `covers_large_area`: element area strictly above this share of the viewport.
pub const LARGE_AREA_RATIO: f64 = 0.25;
/// `is_full_screen`: both extents at or above this share of the viewport.
pub const FULL_SCREEN_RATIO: f64 = 0.9;
/// `blocks_interaction`: both extents at or above this share of the viewport.
pub const BLOCKING_RATIO: f64 = 0.8;
/// `center_positioned`: centre offset at most this share of each extent.
pub const CENTER_TOLERANCE: f64 = 0.25;

const AD_WORDS: &[&str] = &[
    "ad",
    "ads",
    "advert",
    "advertisement",
    "advertising",
    "sponsor",
    "sponsored",
    "promo",
    "promotion",
    "promoted",
    "pr",
];
const AD_PHRASES: &[&str] = &["広告", "スポンサー", "プロモーション", "宣伝"];

const CTA_WORDS: &[&str] = &["click", "now", "free"];
const CTA_PHRASES: &[&str] = &["クリック", "今すぐ", "無料"];

const BACKDROP_HINTS: &[&str] = &["backdrop", "overlay"];

/// Derive characteristics from a feature record.
pub fn analyze(feature: &FeatureRecord, viewport: &Viewport) -> Characteristics {
    let position = PositionTraits {
        is_fixed: feature.position == PositionKind::Fixed,
        is_absolute: feature.position == PositionKind::Absolute,
        is_sticky: feature.position == PositionKind::Sticky,
    };

    let z_index = ZIndexTraits {
        value: feature.z_index,
        is_high: feature.z_index > HIGH_Z_INDEX,
        is_very_high: feature.z_index >= VERY_HIGH_Z_INDEX,
    };

    let dimensions = analyze_dimensions(feature, viewport);

    let has_overlay_background = is_overlay_color(&feature.background_color);
    let modal_overlay = ModalOverlayTraits {
        has_overlay_background,
        blocks_interaction: position.is_fixed
            && covers_ratio(feature.width, viewport.width, BLOCKING_RATIO)
            && covers_ratio(feature.height, viewport.height, BLOCKING_RATIO),
        has_backdrop: has_backdrop(feature),
        center_positioned: is_center_positioned(feature, viewport),
    };

    let close_button = analyze_close_buttons(feature);

    let text = &feature.text_content_sample;
    let content = ContentTraits {
        contains_ads: contains_keyword(text, AD_WORDS, AD_PHRASES),
        has_external_links: feature.external_link_count > 0,
        has_form_elements: feature.has_forms,
        has_media_content: feature.has_media || feature.has_images,
        text_length: feature.text_length,
        has_call_to_action: contains_keyword(text, CTA_WORDS, CTA_PHRASES),
    };

    let visual = VisualTraits {
        background_color: feature.background_color.clone(),
        has_box_shadow: !is_none(&feature.box_shadow),
        has_border: feature.border_width > 0.0,
        opacity: feature.opacity,
        is_visible: feature.display != DisplayKind::None
            && feature.visibility == VisibilityKind::Visible
            && feature.opacity > 0.0,
    };

    let interaction = InteractionTraits {
        has_click_handlers: feature.has_click_handler,
        has_keyboard_handlers: feature.has_keyboard_handler,
        prevents_bubbling: position.is_fixed && z_index.is_high && has_overlay_background,
    };

    Characteristics {
        tag_name: feature.tag_name.to_ascii_lowercase(),
        position,
        z_index,
        dimensions,
        modal_overlay,
        close_button,
        content,
        visual,
        interaction,
    }
}

fn analyze_dimensions(feature: &FeatureRecord, viewport: &Viewport) -> DimensionTraits {
    let width = feature.width.max(0.0);
    let height = feature.height.max(0.0);
    let area = width * height;
    let viewport_area = viewport.area();

    DimensionTraits {
        width,
        height,
        area,
        aspect_ratio: if height > 0.0 { width / height } else { 0.0 },
        covers_large_area: viewport_area > 0.0 && area > viewport_area * LARGE_AREA_RATIO,
        is_full_screen: covers_ratio(width, viewport.width, FULL_SCREEN_RATIO)
            && covers_ratio(height, viewport.height, FULL_SCREEN_RATIO),
    }
}

#[inline]
fn covers_ratio(extent: f64, viewport_extent: f64, ratio: f64) -> bool {
    viewport_extent > 0.0 && extent >= viewport_extent * ratio
}

fn is_center_positioned(feature: &FeatureRecord, viewport: &Viewport) -> bool {
    if viewport.width <= 0.0 || viewport.height <= 0.0 {
        return false;
    }
    let cx = feature.left + feature.width / 2.0;
    let cy = feature.top + feature.height / 2.0;
    (cx - viewport.width / 2.0).abs() <= viewport.width * CENTER_TOLERANCE
        && (cy - viewport.height / 2.0).abs() <= viewport.height * CENTER_TOLERANCE
}

fn has_backdrop(feature: &FeatureRecord) -> bool {
    if !is_none(&feature.backdrop_filter) {
        return true;
    }
    let ident = format!("{} {}", feature.class_name, feature.id).to_ascii_lowercase();
    BACKDROP_HINTS.iter().any(|h| ident.contains(h))
}

fn analyze_close_buttons(feature: &FeatureRecord) -> CloseButtonTraits {
    let types = feature
        .close_buttons
        .iter()
        .fold(CloseButtonKinds::empty(), |acc, hint| acc | hint.kinds);
    CloseButtonTraits {
        has_close_button: !feature.close_buttons.is_empty(),
        types,
        position: feature.close_buttons.iter().find_map(|hint| hint.corner),
    }
}

fn is_none(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case("none")
}

// =============================================================================
// Colors
// =============================================================================

/// Parsed `rgb()` / `rgba()` color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

/// Parse `rgb(...)`/`rgba(...)` in comma or space/slash syntax.
pub fn parse_rgba(color: &str) -> Option<Rgba> {
    let color = color.trim().to_ascii_lowercase();
    let inner = color
        .strip_prefix("rgba(")
        .or_else(|| color.strip_prefix("rgb("))?
        .strip_suffix(')')?;

    let parts: Vec<&str> = inner
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let channel = |s: &str| -> Option<f64> {
        match s.strip_suffix('%') {
            Some(pct) => pct.parse::<f64>().ok().map(|v| v * 255.0 / 100.0),
            None => s.parse::<f64>().ok(),
        }
    };
    let alpha = |s: &str| -> Option<f64> {
        match s.strip_suffix('%') {
            Some(pct) => pct.parse::<f64>().ok().map(|v| v / 100.0),
            None => s.parse::<f64>().ok(),
        }
    };

    Some(Rgba {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a: match parts.get(3) {
            Some(a) => alpha(a)?,
            None => 1.0,
        },
    })
}

/// Semi-transparent black: `rgba(0,0,0,a)` with `0 < a < 1`.
pub fn is_overlay_color(color: &str) -> bool {
    match parse_rgba(color) {
        Some(c) => c.r == 0.0 && c.g == 0.0 && c.b == 0.0 && c.a > 0.0 && c.a < 1.0,
        None => false,
    }
}

// =============================================================================
// Keywords
// =============================================================================

/// Lowercase ASCII word tokens.
fn word_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
}

/// Whole-word match for ASCII keywords, substring match for CJK phrases.
fn contains_keyword(text: &str, words: &[&str], phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p)) || word_tokens(text).any(|w| words.contains(&w.as_str()))
}
