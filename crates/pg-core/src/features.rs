//! Feature extraction
//!
//! Reads one element through [`ElementView`] and produces a flat
//! [`FeatureRecord`]. Extraction never fails: every read that errors falls
//! back to a default and is logged at `trace`.
//!
//! | read                | default         |
//! |---------------------|-----------------|
//! | tag name            | `""`            |
//! | `position`          | `static`        |
//! | `z-index`           | `0` (also for `auto`) |
//! | `opacity`           | `1.0`           |
//! | `background-color`  | `transparent`   |
//! | bounding rect       | all zeros       |
//! | descendant counts   | `0`             |

use log::trace;

use crate::element::{ControlInfo, DescendantKind, ElementView, Rect};
use crate::types::{
    CloseButtonHint, CloseButtonKinds, Corner, DisplayKind, FeatureRecord, PositionKind,
    VisibilityKind, Viewport,
};
use crate::url::is_external_link;

/// Maximum characters kept in `text_content_sample`.
pub const TEXT_SAMPLE_LIMIT: usize = 500;

/// An element inserted this recently (ms) counts as recently added.
pub const RECENT_INSERT_WINDOW_MS: u64 = 3_000;

const CLOSE_GLYPHS: &[&str] = &["×", "✕", "✖", "✗", "╳", "x"];
const CLOSE_WORDS: &[&str] = &["close", "dismiss", "no thanks", "閉じる", "とじる", "关闭"];
const CLOSE_CLASS_HINTS: &[&str] = &["close", "dismiss"];

const CLICK_HANDLER_ATTRS: &[&str] = &["onclick", "onmousedown", "onpointerdown"];
const KEY_HANDLER_ATTRS: &[&str] = &["onkeydown", "onkeyup", "onkeypress"];
const INTERACTIVE_TAGS: &[&str] = &["a", "button", "input", "select", "textarea", "dialog"];

/// Extract the feature record for one element.
///
/// `now_ms` stamps the record and anchors the recently-added check.
pub fn extract_features<E: ElementView + ?Sized>(
    element: &E,
    viewport: &Viewport,
    now_ms: u64,
) -> FeatureRecord {
    let tag_name = element
        .tag_name()
        .map(|t| t.to_ascii_lowercase())
        .unwrap_or_else(|e| {
            trace!("tag name unavailable: {}", e);
            String::new()
        });

    let position = read_style(element, "position")
        .map(|s| PositionKind::parse(&s))
        .unwrap_or_default();
    let z_index = read_style(element, "z-index")
        .map(|s| parse_z_index(&s))
        .unwrap_or(0);
    let opacity = read_style(element, "opacity")
        .map(|s| parse_opacity(&s))
        .unwrap_or(1.0);
    let background_color =
        read_style(element, "background-color").unwrap_or_else(|| "transparent".to_string());
    let display = read_style(element, "display")
        .map(|s| DisplayKind::parse(&s))
        .unwrap_or_default();
    let visibility = read_style(element, "visibility")
        .map(|s| VisibilityKind::parse(&s))
        .unwrap_or_default();
    let box_shadow = read_style(element, "box-shadow").unwrap_or_else(|| "none".to_string());
    let border_width = read_style(element, "border-width")
        .or_else(|| read_style(element, "border-top-width"))
        .map(|s| parse_border_width(&s))
        .unwrap_or(0.0);
    let backdrop_filter =
        read_style(element, "backdrop-filter").unwrap_or_else(|| "none".to_string());
    let has_animation = read_style(element, "animation-name")
        .is_some_and(|s| !is_none_value(&s))
        || read_style(element, "transition-duration").is_some_and(|s| !is_zero_duration(&s));

    let rect = element.bounding_rect().unwrap_or_else(|e| {
        trace!("bounding rect unavailable: {}", e);
        Rect::default()
    });
    let rect = sanitize_rect(rect, viewport);

    let full_text = element.text_content().map(|t| collapse_whitespace(&t)).unwrap_or_default();
    let text_length = full_text.chars().count();
    let text_content_sample: String = full_text.chars().take(TEXT_SAMPLE_LIMIT).collect();

    let image_count = count(element, DescendantKind::Image);
    let button_count = count(element, DescendantKind::Button);
    let form_count = count(element, DescendantKind::Form);
    let media_count = count(element, DescendantKind::Media);
    let link_count = count(element, DescendantKind::Link);

    let hrefs = element.link_hrefs();
    let page_host = element.document_host().unwrap_or_default();
    let external_link_count = hrefs
        .iter()
        .filter(|href| is_external_link(href, &page_host))
        .count();

    let close_buttons: Vec<CloseButtonHint> = element
        .controls()
        .iter()
        .filter_map(|control| classify_close_control(control, &rect))
        .collect();

    let has_click_handler = CLICK_HANDLER_ATTRS
        .iter()
        .any(|attr| element.attribute(attr).is_some());
    let has_keyboard_handler = KEY_HANDLER_ATTRS
        .iter()
        .any(|attr| element.attribute(attr).is_some())
        || element.attribute("tabindex").is_some();
    let is_interactive = has_click_handler
        || INTERACTIVE_TAGS.contains(&tag_name.as_str())
        || element
            .attribute("role")
            .is_some_and(|r| matches!(r.as_str(), "button" | "dialog" | "alertdialog"))
        || button_count > 0;

    let was_recently_added = element
        .inserted_at()
        .is_some_and(|t| now_ms >= t && now_ms - t <= RECENT_INSERT_WINDOW_MS);

    FeatureRecord {
        position,
        z_index,
        width: rect.width,
        height: rect.height,
        left: rect.left,
        top: rect.top,
        background_color,
        opacity,
        display,
        visibility,
        tag_name,
        class_name: element.class_name(),
        id: element.id(),
        children_count: element.children_count(),
        text_content_sample,
        text_length,
        has_images: image_count > 0,
        has_links: link_count > 0,
        has_buttons: button_count > 0,
        has_forms: form_count > 0,
        has_media: media_count > 0,
        external_link_count,
        close_buttons,
        box_shadow,
        border_width,
        backdrop_filter,
        has_click_handler,
        has_keyboard_handler,
        timestamp: now_ms,
        parent_tag_name: element.parent_tag_name().map(|t| t.to_ascii_lowercase()),
        sibling_count: element.sibling_count(),
        was_recently_added,
        has_animation,
        is_interactive,
    }
}

fn read_style<E: ElementView + ?Sized>(element: &E, property: &str) -> Option<String> {
    match element.style(property) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            trace!("style read failed: {}", e);
            None
        }
    }
}

fn count<E: ElementView + ?Sized>(element: &E, kind: DescendantKind) -> usize {
    element.count_descendants(kind).unwrap_or_else(|e| {
        trace!("descendant query {:?} failed: {}", kind, e);
        0
    })
}

// =============================================================================
// Value Parsing
// =============================================================================

/// Parse a computed z-index. `auto` and garbage map to 0.
pub fn parse_z_index(s: &str) -> i64 {
    let s = s.trim();
    if let Ok(v) = s.parse::<i64>() {
        return v;
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => v.trunc() as i64,
        _ => 0,
    }
}

/// Parse a computed opacity into `[0, 1]`. Unparseable maps to 1.
pub fn parse_opacity(s: &str) -> f64 {
    let s = s.trim();
    let parsed = match s.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().map(|v| v / 100.0),
        None => s.parse::<f64>(),
    };
    match parsed {
        Ok(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 1.0,
    }
}

/// Largest pixel width in a (possibly multi-valued) border-width.
fn parse_border_width(s: &str) -> f64 {
    s.split_whitespace()
        .filter_map(|part| part.trim_end_matches("px").parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max)
}

fn is_none_value(s: &str) -> bool {
    s.split(',').all(|part| {
        let p = part.trim();
        p.is_empty() || p.eq_ignore_ascii_case("none")
    })
}

fn is_zero_duration(s: &str) -> bool {
    s.split(',').all(|part| {
        let p = part.trim();
        let num = p.trim_end_matches("ms").trim_end_matches('s');
        num.parse::<f64>().map(|v| v == 0.0).unwrap_or(true)
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Non-negative geometry, with extents clipped to the viewport.
/// Keep the on-screen part: an edge past the top-left corner moves to 0 and
/// the extent shrinks by the same amount.
fn sanitize_rect(rect: Rect, viewport: &Viewport) -> Rect {
    let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
    let clip = |v: f64, limit: f64| if limit > 0.0 { v.min(limit) } else { v };
    let visible = |start: f64, extent: f64| (finite(extent) + finite(start).min(0.0)).max(0.0);
    Rect::new(
        finite(rect.left).max(0.0),
        finite(rect.top).max(0.0),
        clip(visible(rect.left, rect.width), viewport.width),
        clip(visible(rect.top, rect.height), viewport.height),
    )
}

// =============================================================================
// Close Controls
// =============================================================================

/// Decide whether a control looks like a close button, and where it sits.
pub fn classify_close_control(control: &ControlInfo, container: &Rect) -> Option<CloseButtonHint> {
    let mut kinds = CloseButtonKinds::empty();

    let text = control.text.trim();
    if CLOSE_GLYPHS.iter().any(|g| text.eq_ignore_ascii_case(g)) {
        kinds |= CloseButtonKinds::GLYPH;
    }
    let text_lower = text.to_lowercase();
    if text.chars().count() <= 24 && CLOSE_WORDS.iter().any(|w| text_lower.contains(w)) {
        kinds |= CloseButtonKinds::TEXT;
    }

    let label = format!("{} {}", control.aria_label, control.title).to_lowercase();
    if CLOSE_WORDS.iter().any(|w| label.contains(w))
        || CLOSE_GLYPHS.iter().any(|g| label.trim() == *g)
    {
        kinds |= CloseButtonKinds::ARIA_LABEL;
    }

    let ident = format!("{} {}", control.class_name, control.id).to_lowercase();
    if CLOSE_CLASS_HINTS.iter().any(|h| ident.contains(h)) {
        kinds |= CloseButtonKinds::CLASS_NAME;
    }

    if kinds.is_empty() {
        return None;
    }

    Some(CloseButtonHint {
        kinds,
        corner: control.rect.and_then(|r| corner_within(&r, container)),
    })
}

fn corner_within(control: &Rect, container: &Rect) -> Option<Corner> {
    if container.width <= 0.0 || container.height <= 0.0 {
        return None;
    }
    let (cx, cy) = control.center();
    let rx = (cx - container.left) / container.width;
    let ry = (cy - container.top) / container.height;
    if !rx.is_finite() || !ry.is_finite() {
        return None;
    }

    if (rx - 0.5).abs() < 1.0 / 6.0 && (ry - 0.5).abs() < 1.0 / 6.0 {
        return Some(Corner::Center);
    }
    Some(match (rx >= 0.5, ry < 0.5) {
        (true, true) => Corner::TopRight,
        (false, true) => Corner::TopLeft,
        (true, false) => Corner::BottomRight,
        (false, false) => Corner::BottomLeft,
    })
}
