//! Confidence scoring
//!
//! Additive point rubric over [`Characteristics`]. Each axis draws from a
//! capped pool; the total is normalized by the sum of pool maxima and
//! clamped to `[0, 1]`.
//!
//! | axis         | points                                              | pool |
//! |--------------|-----------------------------------------------------|------|
//! | position     | fixed 0.15, absolute 0.10                           | 0.25 |
//! | z-index      | very high 0.20 / high 0.15 / > 100 0.10             | 0.20 |
//! | dimensions   | full screen 0.20 / large 0.15 / > 50000 px² 0.10    | 0.20 |
//! | modal        | overlay 0.05, blocking 0.05, backdrop 0.03, centre 0.02 | 0.15 |
//! | content      | ads 0.05, call to action 0.03, external links 0.02  | 0.10 |
//! | close button | present 0.03, top-right 0.02                        | 0.05 |
//! | visual       | shadow 0.02, border 0.01, opacity in (0.8, 1) 0.02  | 0.05 |

use serde::{Deserialize, Serialize};

use crate::types::{Characteristics, Corner};

pub const POSITION_POOL: f64 = 0.25;
pub const Z_INDEX_POOL: f64 = 0.20;
pub const DIMENSIONS_POOL: f64 = 0.20;
pub const MODAL_POOL: f64 = 0.15;
pub const CONTENT_POOL: f64 = 0.10;
pub const CLOSE_BUTTON_POOL: f64 = 0.05;
pub const VISUAL_POOL: f64 = 0.05;

/// Sum of all pool maxima.
pub const MAX_SCORE: f64 = POSITION_POOL
    + Z_INDEX_POOL
    + DIMENSIONS_POOL
    + MODAL_POOL
    + CONTENT_POOL
    + CLOSE_BUTTON_POOL
    + VISUAL_POOL;

/// z-index above this earns the lowest z-index tier.
pub const ELEVATED_Z_INDEX: i64 = 100;
/// Area in px² above this earns the lowest dimension tier.
pub const NOTABLE_AREA_PX: f64 = 50_000.0;

/// Points earned per axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub position: f64,
    pub z_index: f64,
    pub dimensions: f64,
    pub modal: f64,
    pub content: f64,
    pub close_button: f64,
    pub visual: f64,
}

impl ScoreBreakdown {
    /// Raw points before normalization.
    pub fn points(&self) -> f64 {
        self.position
            + self.z_index
            + self.dimensions
            + self.modal
            + self.content
            + self.close_button
            + self.visual
    }

    /// Normalized confidence in `[0, 1]`.
    pub fn confidence(&self) -> f64 {
        let score = self.points() / MAX_SCORE;
        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Per-axis points for the given characteristics.
pub fn score_breakdown(c: &Characteristics) -> ScoreBreakdown {
    let mut position = 0.0;
    if c.position.is_fixed {
        position += 0.15;
    }
    if c.position.is_absolute {
        position += 0.10;
    }

    let z_index = if c.z_index.is_very_high {
        0.20
    } else if c.z_index.is_high {
        0.15
    } else if c.z_index.value > ELEVATED_Z_INDEX {
        0.10
    } else {
        0.0
    };

    let dimensions = if c.dimensions.is_full_screen {
        0.20
    } else if c.dimensions.covers_large_area {
        0.15
    } else if c.dimensions.area > NOTABLE_AREA_PX {
        0.10
    } else {
        0.0
    };

    let mut modal = 0.0;
    if c.modal_overlay.has_overlay_background {
        modal += 0.05;
    }
    if c.modal_overlay.blocks_interaction {
        modal += 0.05;
    }
    if c.modal_overlay.has_backdrop {
        modal += 0.03;
    }
    if c.modal_overlay.center_positioned {
        modal += 0.02;
    }

    let mut content = 0.0;
    if c.content.contains_ads {
        content += 0.05;
    }
    if c.content.has_call_to_action {
        content += 0.03;
    }
    if c.content.has_external_links {
        content += 0.02;
    }

    let mut close_button = 0.0;
    if c.close_button.has_close_button {
        close_button += 0.03;
        if c.close_button.position == Some(Corner::TopRight) {
            close_button += 0.02;
        }
    }

    let mut visual = 0.0;
    if c.visual.has_box_shadow {
        visual += 0.02;
    }
    if c.visual.has_border {
        visual += 0.01;
    }
    if c.visual.opacity > 0.8 && c.visual.opacity < 1.0 {
        visual += 0.02;
    }

    ScoreBreakdown {
        position: f64::min(position, POSITION_POOL),
        z_index: f64::min(z_index, Z_INDEX_POOL),
        dimensions: f64::min(dimensions, DIMENSIONS_POOL),
        modal: f64::min(modal, MODAL_POOL),
        content: f64::min(content, CONTENT_POOL),
        close_button: f64::min(close_button, CLOSE_BUTTON_POOL),
        visual: f64::min(visual, VISUAL_POOL),
    }
}

/// Confidence in `[0, 1]` that the element is an unwanted pop-up.
pub fn score(c: &Characteristics) -> f64 {
    score_breakdown(c).confidence()
}
