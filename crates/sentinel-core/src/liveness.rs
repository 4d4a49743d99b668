//! Liveness fusion.
//!
//! Combines the heartbeat estimate with the indicator bank into a single
//! verdict. The heartbeat is the strongest evidence and overrides
//! everything: a face that held still long enough for a full window and
//! produced no pulse is not alive, whatever the per-frame indicators say.
//! Below that, the bank is counted, not averaged: one tripped heuristic is
//! webcam noise, three is an attack.

use serde::Serialize;
use serde_json::json;

use crate::config::PipelineConfig;
use crate::heartbeat::HeartbeatReading;
use crate::indicators::IndicatorResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessTag {
    RealFace,
    SuspiciousButAllowed,
    SpoofDetected,
    SpoofDetectedNoHeartbeat,
}

#[derive(Debug, Clone)]
pub struct LivenessVerdict {
    pub is_real: bool,
    /// Confidence in the verdict (whichever way it went), in [0, 100].
    pub confidence: f64,
    pub tag: LivenessTag,
    /// Names of the indicators that triggered, for the audit trail.
    pub triggered: Vec<String>,
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct LivenessFusion {
    no_heartbeat_confidence: f64,
    spoof_indicator_count: usize,
    spoof_confidence_fallback: f64,
}

impl LivenessFusion {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            no_heartbeat_confidence: config.no_heartbeat_confidence,
            spoof_indicator_count: config.spoof_indicator_count,
            spoof_confidence_fallback: config.spoof_confidence_fallback,
        }
    }

    pub fn fuse(
        &self,
        indicators: &[IndicatorResult],
        heartbeat: Option<&HeartbeatReading>,
    ) -> LivenessVerdict {
        let triggered: Vec<&IndicatorResult> =
            indicators.iter().filter(|r| r.triggered).collect();
        let triggered_names: Vec<String> =
            triggered.iter().map(|r| r.name.to_string()).collect();
        let texture = texture_score(indicators);
        let detail = json!({
            "indicators": indicators
                .iter()
                .map(|r| (r.name.to_string(), r.detail.clone()))
                .collect::<serde_json::Map<String, serde_json::Value>>(),
            "heartbeat": heartbeat.map(HeartbeatReading::detail),
        });

        // A completed window with no plausible pulse beats everything else.
        if heartbeat.is_some_and(HeartbeatReading::is_rejected) {
            return LivenessVerdict {
                is_real: false,
                confidence: self.no_heartbeat_confidence,
                tag: LivenessTag::SpoofDetectedNoHeartbeat,
                triggered: triggered_names,
                detail,
            };
        }

        let (is_real, confidence, tag) = if triggered.len() >= self.spoof_indicator_count {
            let mean_score =
                triggered.iter().map(|r| r.score).sum::<f64>() / triggered.len() as f64;
            let confidence = if mean_score > 0.0 {
                mean_score * 100.0
            } else {
                self.spoof_confidence_fallback
            };
            (false, confidence, LivenessTag::SpoofDetected)
        } else if triggered.len() == 2 {
            (
                true,
                (50.0 + texture / 10.0).min(100.0),
                LivenessTag::SuspiciousButAllowed,
            )
        } else if triggered.len() == 1 {
            (true, (70.0 + texture / 10.0).min(100.0), LivenessTag::RealFace)
        } else {
            (true, (85.0 + texture / 10.0).min(100.0), LivenessTag::RealFace)
        };

        LivenessVerdict {
            is_real,
            confidence,
            tag,
            triggered: triggered_names,
            detail,
        }
    }
}

/// Raw texture score carried by the texture indicator (0 when absent).
fn texture_score(indicators: &[IndicatorResult]) -> f64 {
    indicators
        .iter()
        .find(|r| r.name == "texture")
        .and_then(|r| r.detail["texture_score"].as_f64())
        .unwrap_or(0.0)
}
