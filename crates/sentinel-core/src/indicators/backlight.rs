//! Backlight indicator.
//!
//! An emissive display lights the scene itself, which shows two ways: the
//! luminance histogram collapses (everything similarly bright), and the
//! darkest pixels are lifted above true black by panel glow.

use ndarray::Array2;
use serde_json::json;

use super::IndicatorResult;
use crate::config::PipelineConfig;
use crate::ops;

const BACKLIGHT_SCORE: f64 = 0.6;

pub(super) fn analyze(gray: &Array2<f64>, config: &PipelineConfig) -> IndicatorResult {
    let mean = ops::mean(gray);
    let std = ops::std_dev(gray);
    let uniformity = std / (mean + 1e-9);

    let dark: Vec<f64> = gray
        .iter()
        .copied()
        .filter(|&v| v < config.backlight_dark_threshold)
        .collect();
    let dark_mean = if dark.is_empty() {
        None
    } else {
        Some(dark.iter().sum::<f64>() / dark.len() as f64)
    };

    let too_uniform = uniformity < config.backlight_uniformity_min;
    let lifted_blacks = dark_mean.is_some_and(|m| m > config.backlight_dark_mean_max);
    let triggered = too_uniform || lifted_blacks;

    IndicatorResult {
        name: "backlight",
        triggered,
        score: if triggered { BACKLIGHT_SCORE } else { 0.0 },
        detail: json!({
            "uniformity": uniformity,
            "dark_mean": dark_mean,
            "too_uniform": too_uniform,
            "lifted_blacks": lifted_blacks,
        }),
    }
}
