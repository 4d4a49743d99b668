//! Moire-pattern indicator.
//!
//! Re-photographing a screen beats the display's pixel grid against the
//! camera's sensor grid, leaving periodic interference that shows up as
//! sharp off-center peaks in the 2-D magnitude spectrum. A live face has a
//! smooth spectrum there.

use ndarray::{s, Array2};
use serde_json::json;

use super::IndicatorResult;
use crate::config::PipelineConfig;
use crate::ops;

const REGION_HALF_NEAR: usize = 30;
const REGION_HALF_FAR: usize = 50;

pub(super) fn analyze(gray: &Array2<f64>, config: &PipelineConfig) -> IndicatorResult {
    let (h, w) = gray.dim();
    let (cy, cx) = (h / 2, w / 2);
    if cy < REGION_HALF_FAR || cx < REGION_HALF_FAR || cy + REGION_HALF_FAR > h || cx + REGION_HALF_FAR > w {
        return IndicatorResult {
            name: "moire",
            triggered: false,
            score: 0.0,
            detail: json!({ "skipped": "frame_too_small" }),
        };
    }

    let spectrum = ops::fft2d_magnitude_shifted(gray);
    // Two diagonal mid-frequency patches, symmetric about DC. Screen-grid
    // interference lands here; DC and the lowest frequencies are excluded
    // because every natural image is strong there.
    let upper = spectrum
        .slice(s![
            cy - REGION_HALF_FAR..cy - REGION_HALF_NEAR,
            cx - REGION_HALF_FAR..cx - REGION_HALF_NEAR
        ])
        .to_owned();
    let lower = spectrum
        .slice(s![
            cy + REGION_HALF_NEAR..cy + REGION_HALF_FAR,
            cx + REGION_HALF_NEAR..cx + REGION_HALF_FAR
        ])
        .to_owned();
    let periodicity = (ops::std_dev(&upper) + ops::std_dev(&lower)) / 2.0;
    let score = (periodicity / config.moire_normalizer).min(1.0);

    IndicatorResult {
        name: "moire",
        triggered: score > config.moire_threshold,
        score,
        detail: json!({ "periodicity": periodicity, "score": score }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_frame_is_skipped() {
        let config = PipelineConfig::default();
        let gray = Array2::from_elem((64, 64), 100.0);
        let result = analyze(&gray, &config);
        assert!(!result.triggered);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.detail["skipped"], "frame_too_small");
    }

    #[test]
    fn test_flat_plane_has_no_periodicity() {
        let config = PipelineConfig::default();
        let gray = Array2::from_elem((128, 128), 100.0);
        let result = analyze(&gray, &config);
        assert!(!result.triggered);
        assert!(result.score < 1e-6);
    }

    #[test]
    fn test_strong_diagonal_interference_triggers() {
        let config = PipelineConfig::default();
        let n = 128;
        // 40-cycle diagonal tone: spectral peaks at center ± (40, 40), inside
        // the sampled patches
        let gray = Array2::from_shape_fn((n, n), |(y, x)| {
            128.0 + 100.0 * (2.0 * std::f64::consts::PI * 40.0 * (x + y) as f64 / n as f64).sin()
        });
        let result = analyze(&gray, &config);
        assert!(result.triggered);
        assert!(result.score > config.moire_threshold);
    }
}
