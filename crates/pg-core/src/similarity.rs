//! Weighted similarity between a stored pattern and a new sample
//!
//! Not symmetric in general: the dimension term is relative to the larger of
//! the two extents, but callers always pass `(stored, sample)`.

use crate::patterns::PatternTraits;

pub const CLOSE_BUTTON_WEIGHT: f64 = 0.15;
pub const ADS_WEIGHT: f64 = 0.25;
pub const EXTERNAL_LINKS_WEIGHT: f64 = 0.20;
pub const MODAL_WEIGHT: f64 = 0.15;
pub const Z_INDEX_WEIGHT: f64 = 0.10;
/// Split evenly between width and height.
pub const DIMENSIONS_WEIGHT: f64 = 0.15;

/// z-index difference at which the z-index term reaches zero.
pub const Z_INDEX_WINDOW: f64 = 1000.0;

/// Similarity in `[0, 1]`. A sample compared with itself scores exactly 1.
pub fn similarity(stored: &PatternTraits, sample: &PatternTraits) -> f64 {
    let mut matched = 0.0;
    let mut total = 0.0;

    let mut term = |weight: f64, agreement: f64| {
        total += weight;
        matched += weight * agreement;
    };

    term(CLOSE_BUTTON_WEIGHT, flag(stored.has_close_button, sample.has_close_button));
    term(ADS_WEIGHT, flag(stored.contains_ads, sample.contains_ads));
    term(EXTERNAL_LINKS_WEIGHT, flag(stored.has_external_links, sample.has_external_links));
    term(MODAL_WEIGHT, flag(stored.is_modal, sample.is_modal));
    term(Z_INDEX_WEIGHT, z_index_proximity(stored.z_index, sample.z_index));
    term(DIMENSIONS_WEIGHT / 2.0, extent_proximity(stored.width, sample.width));
    term(DIMENSIONS_WEIGHT / 2.0, extent_proximity(stored.height, sample.height));

    if total <= 0.0 {
        return 0.0;
    }
    (matched / total).clamp(0.0, 1.0)
}

#[inline]
fn flag(a: bool, b: bool) -> f64 {
    if a == b {
        1.0
    } else {
        0.0
    }
}

/// Linear decay over [`Z_INDEX_WINDOW`].
pub fn z_index_proximity(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs();
    if !diff.is_finite() {
        return 0.0;
    }
    (1.0 - diff / Z_INDEX_WINDOW).max(0.0)
}

/// Linear decay relative to the larger extent.
pub fn extent_proximity(a: f64, b: f64) -> f64 {
    let larger = a.max(b);
    if larger <= 0.0 {
        return 1.0;
    }
    let proximity = 1.0 - (a - b).abs() / larger;
    if proximity.is_finite() {
        proximity.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PositionKind;

    fn traits(width: f64, height: f64, z: f64) -> PatternTraits {
        PatternTraits {
            tag_name: "div".to_string(),
            position: PositionKind::Fixed,
            has_close_button: true,
            contains_ads: true,
            has_external_links: false,
            is_modal: true,
            z_index: z,
            width,
            height,
        }
    }

    #[test]
    fn test_self_similarity_is_one() {
        let t = traits(500.0, 300.0, 9999.0);
        assert_eq!(similarity(&t, &t), 1.0);
        let zero = traits(0.0, 0.0, 0.0);
        assert_eq!(similarity(&zero, &zero), 1.0);
    }

    #[test]
    fn test_width_difference_of_fifty_pixels() {
        let a = traits(500.0, 300.0, 9999.0);
        let b = traits(550.0, 300.0, 9999.0);
        let s = similarity(&a, &b);
        assert!(s >= 0.9, "similarity {s}");
        assert!(s < 1.0);
        assert!(extent_proximity(500.0, 550.0) >= 0.9);
    }

    #[test]
    fn test_z_index_window() {
        assert_eq!(z_index_proximity(0.0, 1000.0), 0.0);
        assert_eq!(z_index_proximity(0.0, 5000.0), 0.0);
        assert_eq!(z_index_proximity(100.0, 600.0), 0.5);
    }

    #[test]
    fn test_boolean_disagreement_costs_weight() {
        let a = traits(500.0, 300.0, 10.0);
        let mut b = a.clone();
        b.contains_ads = false;
        assert!((similarity(&a, &b) - (1.0 - ADS_WEIGHT)).abs() < 1e-9);
    }

    #[test]
    fn test_completely_different() {
        let a = traits(1000.0, 800.0, 0.0);
        let b = PatternTraits {
            tag_name: "aside".to_string(),
            position: PositionKind::Static,
            has_close_button: false,
            contains_ads: false,
            has_external_links: true,
            is_modal: false,
            z_index: 5000.0,
            width: 0.0,
            height: 0.0,
        };
        assert_eq!(similarity(&a, &b), 0.0);
    }
}
