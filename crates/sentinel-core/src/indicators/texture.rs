//! Skin-texture indicator.
//!
//! Live skin sits in a middle band of micro-texture: pores and fine detail
//! give it measurable structure, but never the razor detail of a screen's
//! pixel grid. The combined texture score must land inside the live band;
//! either extreme trips the indicator. The raw score also feeds the fusion
//! confidence formulas, so it travels in `detail`.

use ndarray::Array2;
use serde_json::json;

use super::IndicatorResult;
use crate::config::PipelineConfig;
use crate::ops;

const TEXTURE_SCORE: f64 = 0.5;

pub(super) fn analyze(gray: &Array2<f64>, config: &PipelineConfig) -> IndicatorResult {
    let sharpness = ops::laplacian_variance(gray);
    let (gradient_mean, _) = ops::gradient_stats(gray);
    let texture_score = sharpness / 10.0 + gradient_mean / 5.0;

    let triggered = texture_score <= config.texture_min || texture_score >= config.texture_max;

    IndicatorResult {
        name: "texture",
        triggered,
        score: if triggered { TEXTURE_SCORE } else { 0.0 },
        detail: json!({
            "texture_score": texture_score,
            "sharpness": sharpness,
            "gradient_mean": gradient_mean,
        }),
    }
}
