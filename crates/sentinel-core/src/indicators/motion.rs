//! Micro-motion indicator.
//!
//! A live head is never perfectly still: breathing, pulse and posture drift
//! produce small, spatially uneven motion between consecutive frames. A
//! printed photo is rigid (near-zero motion); a replayed video pans the
//! whole raster at once (uniform motion). Both patterns trigger.

use std::collections::VecDeque;

use ndarray::Array2;
use serde_json::json;

use super::IndicatorResult;
use crate::config::PipelineConfig;
use crate::ops;

const MOTION_SCORE: f64 = 0.7;

/// Rolling grayscale history; the only stateful analyzer in the bank.
#[derive(Debug)]
pub struct MotionAnalyzer {
    history: VecDeque<Array2<f64>>,
    capacity: usize,
}

impl MotionAnalyzer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(super) fn analyze(&mut self, gray: &Array2<f64>, config: &PipelineConfig) -> IndicatorResult {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(gray.clone());

        if self.history.len() < 2 {
            return IndicatorResult {
                name: "motion",
                triggered: false,
                score: 0.0,
                detail: json!({ "skipped": "insufficient_frames" }),
            };
        }

        let prev = &self.history[self.history.len() - 2];
        let flow = ops::normal_flow(prev, gray);
        let avg = ops::mean(&flow);
        let std = ops::std_dev(&flow);
        let variance = std * std;

        let reason = if avg < config.motion_static_max {
            Some("too_static")
        } else if variance < config.motion_uniform_variance && avg < config.motion_uniform_avg_max {
            Some("uniform_motion")
        } else {
            None
        };

        IndicatorResult {
            name: "motion",
            triggered: reason.is_some(),
            score: if reason.is_some() { MOTION_SCORE } else { 0.0 },
            detail: json!({
                "avg_flow": avg,
                "flow_variance": variance,
                "reason": reason,
            }),
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}
