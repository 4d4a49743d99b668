//! Per-subject verification session and the pipeline that drives it.
//!
//! A [`Session`] owns all rolling state for one authentication attempt:
//! the heartbeat window, the motion history, the injection baseline and
//! the previous grayscale plane. The [`Pipeline`] owns the stateless
//! machinery (detector seams, fusion, decision engine) and processes one
//! frame at a time, strictly fail-fast: injection, then liveness, then
//! identity.

use ndarray::Array2;
use uuid::Uuid;

use crate::collaborators::{
    BoundingBox, FaceLocator, IdentityMatcher, IdentityVerdict, SpoofClassifier,
};
use crate::config::PipelineConfig;
use crate::decision::{AccessDecision, DecisionEngine};
use crate::frame::Frame;
use crate::heartbeat::HeartbeatEstimator;
use crate::indicators::IndicatorBank;
use crate::injection::{EnvironmentScanner, InjectionChecker};
use crate::liveness::{LivenessFusion, LivenessTag, LivenessVerdict};

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    heartbeat: HeartbeatEstimator,
    bank: IndicatorBank,
    injection: InjectionChecker,
    prev_gray: Option<Array2<f64>>,
}

impl Session {
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_scanner_checker(config, InjectionChecker::with_process_scanner(config))
    }

    /// Session with a custom environment scanner (tests, embedded hosts
    /// without `/proc`).
    pub fn with_scanner(
        config: &PipelineConfig,
        scanner: Box<dyn EnvironmentScanner + Send>,
    ) -> Self {
        Self::with_scanner_checker(config, InjectionChecker::new(config, scanner))
    }

    fn with_scanner_checker(config: &PipelineConfig, injection: InjectionChecker) -> Self {
        Self {
            id: Uuid::new_v4(),
            heartbeat: HeartbeatEstimator::new(config),
            bank: IndicatorBank::new(config),
            injection,
            prev_gray: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pulse samples gathered so far, for progress reporting.
    pub fn heartbeat_samples(&self) -> usize {
        self.heartbeat.samples_collected()
    }

    /// Drop all rolling state for a fresh attempt (subject switch, camera
    /// reconnect). The session id is kept; it names the attempt stream,
    /// not the window contents.
    pub fn reset(&mut self) {
        self.heartbeat.reset();
        self.bank.reset();
        self.injection.reset();
        self.prev_gray = None;
        tracing::debug!(session = %self.id, "session state reset");
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    locator: Box<dyn FaceLocator + Send>,
    spoof: Option<Box<dyn SpoofClassifier + Send>>,
    matcher: Box<dyn IdentityMatcher + Send>,
    liveness: LivenessFusion,
    decision: DecisionEngine,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        locator: Box<dyn FaceLocator + Send>,
        matcher: Box<dyn IdentityMatcher + Send>,
        decision: DecisionEngine,
    ) -> Self {
        Self {
            liveness: LivenessFusion::new(&config),
            config,
            locator,
            spoof: None,
            matcher,
            decision,
        }
    }

    /// Attach an optional learned anti-spoofing model, consulted after the
    /// heuristic bank on frames it would otherwise pass.
    pub fn with_spoof_classifier(mut self, spoof: Box<dyn SpoofClassifier + Send>) -> Self {
        self.spoof = Some(spoof);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn decision(&self) -> &DecisionEngine {
        &self.decision
    }

    /// Run one frame through the full check chain and return the recorded
    /// decision. Every call yields exactly one ledger entry.
    pub fn process_frame(
        &mut self,
        session: &mut Session,
        frame: &Frame,
        expected: &str,
    ) -> AccessDecision {
        let gray = frame.to_gray();
        let decision = self.judge(session, frame, &gray, expected);
        session.prev_gray = Some(gray);
        decision
    }

    fn judge(
        &mut self,
        session: &mut Session,
        frame: &Frame,
        gray: &Array2<f64>,
        expected: &str,
    ) -> AccessDecision {
        let injection = session
            .injection
            .check(frame, gray, session.prev_gray.as_ref());
        if injection.injected {
            return self
                .decision
                .evaluate(expected, &injection, None, None, frame);
        }

        let faces = match self.locator.locate(frame) {
            Ok(faces) => faces,
            Err(error) => {
                tracing::warn!(%error, "face locator failed, treating as no face");
                Vec::new()
            }
        };
        let Some(face) = largest_face(&faces) else {
            return self.decision.no_face(expected);
        };

        if let Some(sample) = frame.forehead_green_mean(&face) {
            session.heartbeat.push(sample, frame.timestamp());
        }
        let heartbeat = session.heartbeat.estimate();
        let indicators = session.bank.analyze(frame, gray, &self.config);
        let mut liveness = self.liveness.fuse(&indicators, Some(&heartbeat));

        if liveness.is_real {
            if let Some(overridden) = self.consult_classifier(frame, &face, &liveness) {
                liveness = overridden;
            }
        }

        if !liveness.is_real {
            return self
                .decision
                .evaluate(expected, &injection, Some(&liveness), None, frame);
        }

        let identity = match self.matcher.verify(frame, &face, expected) {
            Ok(verdict) => verdict,
            Err(error) => {
                tracing::warn!(%error, "identity matcher failed, denying");
                IdentityVerdict::unknown()
            }
        };

        self.decision
            .evaluate(expected, &injection, Some(&liveness), Some(&identity), frame)
    }

    /// Second opinion from the learned model; a classifier failure never
    /// flips a verdict.
    fn consult_classifier(
        &mut self,
        frame: &Frame,
        face: &BoundingBox,
        current: &LivenessVerdict,
    ) -> Option<LivenessVerdict> {
        let spoof = self.spoof.as_mut()?;
        match spoof.spoof_probability(frame, face) {
            Ok(probability) if probability > 0.5 => {
                let mut triggered = current.triggered.clone();
                triggered.push("classifier".to_string());
                let mut detail = current.detail.clone();
                detail["classifier_probability"] = probability.into();
                Some(LivenessVerdict {
                    is_real: false,
                    confidence: probability * 100.0,
                    tag: LivenessTag::SpoofDetected,
                    triggered,
                    detail,
                })
            }
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(%error, "spoof classifier failed, keeping heuristic verdict");
                None
            }
        }
    }
}

fn largest_face(faces: &[BoundingBox]) -> Option<BoundingBox> {
    faces.iter().copied().max_by_key(BoundingBox::area)
}
