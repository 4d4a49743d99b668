//! Presentation-attack indicator bank.
//!
//! Six independent per-frame analyzers, each emitting a triggered flag and
//! a score. None of them is conclusive alone (consumer webcams trip
//! individual heuristics on sensor noise alone), so the bank only reports;
//! the fusion engine decides (see [`crate::liveness`]).

mod backlight;
mod color_balance;
mod edges;
mod moire;
mod motion;
mod texture;

pub use motion::MotionAnalyzer;

use ndarray::Array2;

use crate::config::PipelineConfig;
use crate::frame::Frame;

/// One analyzer's output for one frame. Produced fresh per frame, never
/// persisted; `detail` carries the raw measurements for the audit trail.
#[derive(Debug, Clone)]
pub struct IndicatorResult {
    pub name: &'static str,
    pub triggered: bool,
    /// Spoof weight in [0, 1]; only triggered scores enter the fusion mean.
    pub score: f64,
    pub detail: serde_json::Value,
}

/// Runs every analyzer over a frame. The motion analyzer is the only one
/// carrying rolling state (its grayscale history).
#[derive(Debug)]
pub struct IndicatorBank {
    motion: MotionAnalyzer,
}

impl IndicatorBank {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            motion: MotionAnalyzer::new(config.motion_history),
        }
    }

    /// Analyze one frame. `gray` must be the grayscale plane of `frame`
    /// (computed once by the caller and shared across stages).
    pub fn analyze(
        &mut self,
        frame: &Frame,
        gray: &Array2<f64>,
        config: &PipelineConfig,
    ) -> Vec<IndicatorResult> {
        vec![
            moire::analyze(gray, config),
            self.motion.analyze(gray, config),
            edges::analyze(gray, config),
            texture::analyze(gray, config),
            backlight::analyze(gray, config),
            color_balance::analyze(frame, config),
        ]
    }

    /// Drop rolling state (subject switch).
    pub fn reset(&mut self) {
        self.motion.reset();
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::gray_frame;
    use super::*;

    #[test]
    fn test_bank_reports_all_six_indicators() {
        let config = PipelineConfig::default();
        let mut bank = IndicatorBank::new(&config);
        let frame = gray_frame(64, 64, |x, _| x as f64 * 3.0);
        let gray = frame.to_gray();
        let results = bank.analyze(&frame, &gray, &config);
        let names: Vec<&str> = results.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "moire",
                "motion",
                "edges",
                "texture",
                "backlight",
                "color_balance"
            ]
        );
    }
}
