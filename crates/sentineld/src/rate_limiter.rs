use std::collections::HashMap;
use std::time::{Duration, Instant};

use sentinel_core::{AccessDecision, DecisionCode};

/// Maximum counted denials before lockout.
const MAX_FAILURES: u32 = 5;
/// Sliding window over which denials are counted.
const WINDOW: Duration = Duration::from_secs(60);
/// Lockout duration after exceeding MAX_FAILURES.
const LOCKOUT: Duration = Duration::from_secs(300);

struct IdentityRecord {
    failures: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

/// Per-identity rate limiter over access decisions.
///
/// After MAX_FAILURES denials within WINDOW seconds the identity is locked
/// out for LOCKOUT seconds. A `NO_FACE_DETECTED` denial is not counted —
/// an empty camera view is a framing problem, not an attack attempt.
pub struct RateLimiter {
    records: HashMap<String, IdentityRecord>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Return `Ok(())` if the identity may attempt verification.
    /// Return `Err(message)` if it is currently locked out.
    pub fn check(&mut self, identity: &str) -> Result<(), String> {
        let now = Instant::now();
        let record = self
            .records
            .entry(identity.to_string())
            .or_insert(IdentityRecord {
                failures: 0,
                window_start: now,
                locked_until: None,
            });

        if let Some(locked_until) = record.locked_until {
            if now < locked_until {
                let remaining = locked_until.duration_since(now).as_secs();
                return Err(format!(
                    "too many failed attempts; try again in {remaining}s"
                ));
            }
            // Lockout expired — reset
            *record = IdentityRecord {
                failures: 0,
                window_start: now,
                locked_until: None,
            };
        } else if now.duration_since(record.window_start) >= WINDOW {
            // Sliding window expired — reset failure counter
            record.failures = 0;
            record.window_start = now;
        }

        Ok(())
    }

    /// Feed a recorded decision into the limiter: grants clear the counter,
    /// counted denials may trigger a lockout.
    pub fn observe(&mut self, identity: &str, decision: &AccessDecision) {
        if decision.granted {
            self.records.remove(identity);
            return;
        }
        if decision.code == DecisionCode::NoFaceDetected {
            return;
        }

        let now = Instant::now();
        let record = self
            .records
            .entry(identity.to_string())
            .or_insert(IdentityRecord {
                failures: 0,
                window_start: now,
                locked_until: None,
            });

        if now.duration_since(record.window_start) >= WINDOW {
            record.failures = 0;
            record.window_start = now;
        }

        record.failures += 1;
        if record.failures >= MAX_FAILURES {
            record.locked_until = Some(now + LOCKOUT);
            tracing::warn!(
                identity,
                failures = record.failures,
                lockout_secs = LOCKOUT.as_secs(),
                "rate limit triggered — locking identity"
            );
        } else {
            tracing::debug!(
                identity,
                failures = record.failures,
                max = MAX_FAILURES,
                code = %decision.code,
                "denial counted"
            );
        }
    }
}
