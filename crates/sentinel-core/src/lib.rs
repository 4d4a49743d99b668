//! Camera trust pipeline: liveness, anti-spoofing and feed-injection
//! analysis for webcam-based access control.
//!
//! The crate is organized around one [`session::Pipeline`] driving one
//! [`session::Session`] per authentication attempt:
//!
//! - [`heartbeat`] recovers a pulse from forehead skin-tone oscillation
//!   and rejects faces that produce none,
//! - [`indicators`] runs six per-frame presentation-attack heuristics,
//! - [`injection`] checks that frames come from a physical sensor at all,
//! - [`liveness`] fuses heartbeat and indicators into a verdict,
//! - [`decision`] arbitrates the checks fail-fast and writes every outcome
//!   to the [`ledger`].
//!
//! Face localization and identity matching are injected through the
//! [`collaborators`] traits; this crate never talks to a camera or a
//! model runtime itself.

pub mod collaborators;
pub mod config;
pub mod decision;
pub mod frame;
pub mod heartbeat;
pub mod indicators;
pub mod injection;
pub mod ledger;
pub mod liveness;
pub mod ops;
pub mod session;
pub mod signal;

pub use collaborators::{
    BoundingBox, CollaboratorError, FaceLocator, IdentityMatcher, IdentityVerdict, SpoofClassifier,
};
pub use config::PipelineConfig;
pub use decision::{AccessDecision, DecisionCode, DecisionEngine};
pub use frame::{CaptureInfo, Frame};
pub use heartbeat::{HeartbeatEstimator, HeartbeatReading};
pub use indicators::{IndicatorBank, IndicatorResult};
pub use injection::{EnvironmentScan, EnvironmentScanner, InjectionChecker, InjectionVerdict};
pub use ledger::{DecisionLedger, LedgerEntry, LedgerError, LedgerStats};
pub use liveness::{LivenessFusion, LivenessTag, LivenessVerdict};
pub use session::{Pipeline, Session};
