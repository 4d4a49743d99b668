//! Edge-character indicator.
//!
//! Recaptured imagery fails at the extremes: a high-resolution screen held
//! close produces unnaturally crisp pixel edges (Laplacian variance far
//! above a live face), while a flat print or diffuse screen produces almost
//! no gradient variation at all.

use ndarray::Array2;
use serde_json::json;

use super::IndicatorResult;
use crate::config::PipelineConfig;
use crate::ops;

const EDGE_SCORE: f64 = 0.6;
const EDGE_MAP_THRESHOLD: f64 = 50.0;

pub(super) fn analyze(gray: &Array2<f64>, config: &PipelineConfig) -> IndicatorResult {
    let sharpness = ops::laplacian_variance(gray);
    let (_, gradient_std) = ops::gradient_stats(gray);
    let density = ops::edge_density(gray, EDGE_MAP_THRESHOLD);

    let triggered =
        sharpness > config.edge_sharpness_max || gradient_std < config.edge_gradient_std_min;

    IndicatorResult {
        name: "edges",
        triggered,
        score: if triggered { EDGE_SCORE } else { 0.0 },
        detail: json!({
            "sharpness": sharpness,
            "gradient_std": gradient_std,
            "edge_density": density,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_plane_triggers_on_missing_gradients() {
        let config = PipelineConfig::default();
        let result = analyze(&Array2::from_elem((32, 32), 120.0), &config);
        assert!(result.triggered);
    }

    #[test]
    fn test_checkerboard_triggers_on_oversharp_edges() {
        let config = PipelineConfig::default();
        let board =
            Array2::from_shape_fn((32, 32), |(y, x)| if (x + y) % 2 == 0 { 255.0 } else { 0.0 });
        let result = analyze(&board, &config);
        assert!(result.triggered);
        assert!(result.detail["sharpness"].as_f64().unwrap() > config.edge_sharpness_max);
    }

    #[test]
    fn test_smooth_natural_gradients_pass() {
        let config = PipelineConfig::default();
        // Gentle sinusoid: low curvature (small Laplacian) but varied
        // gradient magnitudes
        let wave = Array2::from_shape_fn((32, 32), |(_, x)| {
            128.0 + 10.0 * (2.0 * std::f64::consts::PI * x as f64 / 16.0).sin()
        });
        let result = analyze(&wave, &config);
        assert!(!result.triggered);
    }
}
