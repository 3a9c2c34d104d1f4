//! ============================================================================
//! Style Normalizer - Legal ranges for sticker transforms
//! ============================================================================
//! Every style that enters the design passes through `normalize_style`.
//! Out-of-range values are clamped, never rejected.
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::types::StickerStyle;

pub const SCALE_MIN: f64 = 0.6;
pub const SCALE_MAX: f64 = 1.6;
pub const ROTATE_MIN: f64 = -180.0;
pub const ROTATE_MAX: f64 = 180.0;
pub const DEPTH_MIN: f64 = 0.0;
pub const DEPTH_MAX: f64 = 3.0;

/// Partial style; missing fields take the current or default value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<f64>,
}

impl StylePatch {
    /// Overlay this patch on a complete style
    pub fn apply_to(&self, base: &StickerStyle) -> StylePatch {
        StylePatch {
            scale: self.scale.or(Some(base.scale)),
            rotate: self.rotate.or(Some(base.rotate)),
            depth: self.depth.or(Some(base.depth)),
            z_index: self.z_index.or(Some(base.z_index as f64)),
        }
    }
}

/// Style given to a freshly placed trinket
pub fn default_style() -> StickerStyle {
    StickerStyle {
        scale: 1.0,
        rotate: 0.0,
        depth: 1.2,
        z_index: 0,
    }
}

/// Clamp a partial style into the legal ranges.
///
/// Rotation clamps at +/-180 rather than wrapping, so stepping past the
/// boundary sticks at the limit.
pub fn normalize_style(partial: &StylePatch) -> StickerStyle {
    let d = default_style();
    let scale = clamp(finite_or(partial.scale, d.scale), SCALE_MIN, SCALE_MAX);
    let rotate = clamp(finite_or(partial.rotate, d.rotate), ROTATE_MIN, ROTATE_MAX);
    let depth = clamp(finite_or(partial.depth, d.depth), DEPTH_MIN, DEPTH_MAX);
    let z_index = match partial.z_index {
        Some(z) if z.is_finite() => z.round() as i64,
        _ => d.z_index,
    };
    StickerStyle {
        scale,
        rotate,
        depth,
        z_index,
    }
}

fn finite_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(default)
}

fn clamp(n: f64, min: f64, max: f64) -> f64 {
    n.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_range(style: &StickerStyle) -> bool {
        (SCALE_MIN..=SCALE_MAX).contains(&style.scale)
            && (ROTATE_MIN..=ROTATE_MAX).contains(&style.rotate)
            && (DEPTH_MIN..=DEPTH_MAX).contains(&style.depth)
    }

    #[test]
    fn test_empty_patch_yields_default() {
        assert_eq!(normalize_style(&StylePatch::default()), default_style());
    }

    #[test]
    fn test_values_are_clamped() {
        let style = normalize_style(&StylePatch {
            scale: Some(4.0),
            rotate: Some(-725.0),
            depth: Some(-1.0),
            z_index: Some(7.0),
        });
        assert_eq!(style.scale, SCALE_MAX);
        assert_eq!(style.rotate, ROTATE_MIN);
        assert_eq!(style.depth, DEPTH_MIN);
        assert_eq!(style.z_index, 7);
    }

    #[test]
    fn test_rotate_sticks_at_boundary() {
        let mut style = default_style();
        for _ in 0..20 {
            let patch = StylePatch {
                rotate: Some(style.rotate + 15.0),
                ..StylePatch::default()
            };
            style = normalize_style(&patch.apply_to(&style));
        }
        assert_eq!(style.rotate, 180.0);
    }

    #[test]
    fn test_non_finite_inputs_fall_back() {
        let style = normalize_style(&StylePatch {
            scale: Some(f64::NAN),
            rotate: Some(f64::INFINITY),
            depth: Some(f64::NAN),
            z_index: Some(f64::NEG_INFINITY),
        });
        assert_eq!(style, default_style());
    }

    #[test]
    fn test_output_always_in_range() {
        let samples = [-1e9, -181.0, -3.0, -0.5, 0.0, 0.59, 1.0, 1.61, 2.9, 3.1, 179.0, 1e9];
        for &a in &samples {
            for &b in &samples {
                let style = normalize_style(&StylePatch {
                    scale: Some(a),
                    rotate: Some(b),
                    depth: Some(a - b),
                    z_index: Some(b),
                });
                assert!(in_range(&style), "out of range for {} / {}: {:?}", a, b, style);
            }
        }
    }

    #[test]
    fn test_patch_overlays_base() {
        let base = StickerStyle {
            scale: 1.4,
            rotate: 30.0,
            depth: 2.0,
            z_index: 3,
        };
        let patch = StylePatch {
            depth: Some(0.5),
            ..StylePatch::default()
        };
        let merged = normalize_style(&patch.apply_to(&base));
        assert_eq!(merged.scale, 1.4);
        assert_eq!(merged.rotate, 30.0);
        assert_eq!(merged.depth, 0.5);
        assert_eq!(merged.z_index, 3);
    }
}
