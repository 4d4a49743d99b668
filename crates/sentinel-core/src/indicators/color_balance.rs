//! Color-balance indicator.
//!
//! Skin, clothing and room lighting vary differently per channel, so the
//! three channel variances of a natural scene spread apart. A display's
//! color pipeline compresses that spread; a grayscale print eliminates it.

use serde_json::json;

use super::IndicatorResult;
use crate::config::PipelineConfig;
use crate::frame::Frame;
use crate::ops;

const COLOR_SCORE: f64 = 0.5;

pub(super) fn analyze(frame: &Frame, config: &PipelineConfig) -> IndicatorResult {
    let variances: Vec<f64> = (0..3)
        .map(|c| {
            let std = ops::std_dev(&frame.channel_plane(c));
            std * std
        })
        .collect();
    let max = variances.iter().cloned().fold(f64::MIN, f64::max);
    let min = variances.iter().cloned().fold(f64::MAX, f64::min);
    let spread = if max > 1e-9 { (max - min) / max } else { 0.0 };

    let triggered = spread < config.color_spread_min;

    IndicatorResult {
        name: "color_balance",
        triggered,
        score: if triggered { COLOR_SCORE } else { 0.0 },
        detail: json!({
            "variances": variances,
            "spread": spread,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::gray_frame;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_monochrome_frame_triggers() {
        let config = PipelineConfig::default();
        let frame = gray_frame(32, 32, |x, _| x as f64 * 4.0);
        let result = analyze(&frame, &config);
        assert!(result.triggered);
        assert!(result.detail["spread"].as_f64().unwrap() < config.color_spread_min);
    }

    #[test]
    fn test_independently_varying_channels_pass() {
        let config = PipelineConfig::default();
        let image = RgbImage::from_fn(32, 32, |x, y| {
            Rgb([(x * 8).min(255) as u8, 128, (y * 2).min(255) as u8])
        });
        let frame = Frame::new(image, 0.0);
        let result = analyze(&frame, &config);
        assert!(!result.triggered);
    }
}
