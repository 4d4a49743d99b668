//! Access-decision engine.
//!
//! Final arbiter over the three checks, strictly fail-fast in trust order:
//! an injected feed makes every downstream pixel untrustworthy, so
//! injection is judged first, then liveness, then identity. Every decision
//! is appended to the audit ledger before it is returned.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::collaborators::IdentityVerdict;
use crate::frame::Frame;
use crate::injection::InjectionVerdict;
use crate::ledger::{DecisionLedger, LedgerEntry, LedgerStats};
use crate::liveness::LivenessVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionCode {
    InjectionAttackDetected,
    SpoofDetected,
    FaceMismatch,
    NoFaceDetected,
    AccessGranted,
}

impl std::fmt::Display for DecisionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InjectionAttackDetected => "INJECTION_ATTACK_DETECTED",
            Self::SpoofDetected => "SPOOF_DETECTED",
            Self::FaceMismatch => "FACE_MISMATCH",
            Self::NoFaceDetected => "NO_FACE_DETECTED",
            Self::AccessGranted => "ACCESS_GRANTED",
        };
        f.write_str(s)
    }
}

/// One stage's contribution to a decision, kept for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub name: String,
    pub passed: bool,
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub id: Uuid,
    pub granted: bool,
    pub code: DecisionCode,
    /// Confidence in this decision (grant or denial), in [0, 100].
    pub confidence: f64,
    pub subject: Option<String>,
    /// Human-readable grounds for the outcome, most significant first.
    pub reasons: Vec<String>,
    pub checks: Vec<CheckReport>,
    pub timestamp: DateTime<Utc>,
}

/// Weights for the granted-path confidence blend.
const GRANT_WEIGHT_INJECTION: f64 = 0.3;
const GRANT_WEIGHT_LIVENESS: f64 = 0.3;
const GRANT_WEIGHT_IDENTITY: f64 = 0.4;

pub struct DecisionEngine {
    ledger: Arc<Mutex<DecisionLedger>>,
}

impl DecisionEngine {
    pub fn new(ledger: Arc<Mutex<DecisionLedger>>) -> Self {
        Self { ledger }
    }

    /// Judge one frame's collected evidence. Later stages are `None` when an
    /// earlier stage already failed and the caller short-circuited.
    /// Denials record a frame snapshot when the ledger is configured for it.
    pub fn evaluate(
        &self,
        expected: &str,
        injection: &InjectionVerdict,
        liveness: Option<&LivenessVerdict>,
        identity: Option<&IdentityVerdict>,
        frame: &Frame,
    ) -> AccessDecision {
        let mut checks = vec![CheckReport {
            name: "injection".to_string(),
            passed: !injection.injected,
            detail: injection.detail.clone(),
        }];

        if let Some(live) = liveness {
            checks.push(CheckReport {
                name: "liveness".to_string(),
                passed: live.is_real,
                detail: json!({
                    "tag": live.tag,
                    "confidence": live.confidence,
                    "triggered": live.triggered,
                }),
            });
        }
        if let Some(ident) = identity {
            checks.push(CheckReport {
                name: "identity".to_string(),
                passed: ident.matched,
                detail: json!({
                    "similarity": ident.similarity,
                    "subject": ident.subject,
                }),
            });
        }

        let (granted, code, confidence, subject, reasons) = if injection.injected {
            (
                false,
                DecisionCode::InjectionAttackDetected,
                injection.score,
                None,
                vec![format!(
                    "camera injection detected (score {:.0}/100)",
                    injection.score
                )],
            )
        } else if let Some(live) = liveness.filter(|l| !l.is_real) {
            (
                false,
                DecisionCode::SpoofDetected,
                live.confidence,
                None,
                vec![format!(
                    "presentation attack detected: {}",
                    if live.triggered.is_empty() {
                        "no heartbeat".to_string()
                    } else {
                        live.triggered.join(", ")
                    }
                )],
            )
        } else if let Some(ident) = identity.filter(|i| !i.matched) {
            // Confidence carries the measured similarity so the audit trail
            // shows how near a miss it was
            (
                false,
                DecisionCode::FaceMismatch,
                ident.similarity,
                ident.subject.clone(),
                vec![format!(
                    "face does not match {expected} (similarity {:.0})",
                    ident.similarity
                )],
            )
        } else {
            // All three passed; blend the stage confidences
            let live_confidence = liveness.map(|l| l.confidence).unwrap_or(0.0);
            let similarity = identity.map(|i| i.similarity).unwrap_or(0.0);
            let confidence = GRANT_WEIGHT_INJECTION * (100.0 - injection.score)
                + GRANT_WEIGHT_LIVENESS * live_confidence
                + GRANT_WEIGHT_IDENTITY * similarity;
            (
                true,
                DecisionCode::AccessGranted,
                confidence,
                identity.and_then(|i| i.subject.clone()),
                vec!["all checks passed".to_string()],
            )
        };

        let decision = AccessDecision {
            id: Uuid::new_v4(),
            granted,
            code,
            confidence,
            subject,
            reasons,
            checks,
            timestamp: Utc::now(),
        };

        tracing::info!(
            code = %decision.code,
            confidence = decision.confidence,
            expected,
            "access decision"
        );
        self.record(&decision, expected, (!granted).then_some(frame));
        decision
    }

    /// Deny without evidence: no face was found in the frame. Never
    /// snapshots (an empty frame is not an attack) and carries zero
    /// confidence either way.
    pub fn no_face(&self, expected: &str) -> AccessDecision {
        let decision = AccessDecision {
            id: Uuid::new_v4(),
            granted: false,
            code: DecisionCode::NoFaceDetected,
            confidence: 0.0,
            subject: None,
            reasons: vec!["no face found in frame".to_string()],
            checks: Vec::new(),
            timestamp: Utc::now(),
        };
        self.record(&decision, expected, None);
        decision
    }

    pub fn statistics(&self) -> LedgerStats {
        self.lock_ledger().stats()
    }

    pub fn recent(&self, count: usize) -> Vec<LedgerEntry> {
        self.lock_ledger().recent(count).to_vec()
    }

    fn record(&self, decision: &AccessDecision, expected: &str, snapshot: Option<&Frame>) {
        let entry = LedgerEntry {
            id: decision.id,
            timestamp: decision.timestamp,
            expected: expected.to_string(),
            subject: decision.subject.clone(),
            granted: decision.granted,
            code: decision.code,
            confidence: decision.confidence,
            reasons: decision.reasons.clone(),
            checks: decision.checks.clone(),
            snapshot: None,
        };
        if let Err(error) = self.lock_ledger().append(entry, snapshot) {
            tracing::error!(%error, "failed to persist audit entry");
        }
    }

    fn lock_ledger(&self) -> MutexGuard<'_, DecisionLedger> {
        // A panic while holding the lock leaves the ledger usable; the
        // in-memory state is only appended to under the same lock.
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }
}
