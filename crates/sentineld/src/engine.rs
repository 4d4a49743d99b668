use std::collections::HashMap;
use std::sync::Mutex;

use sentinel_core::{AccessDecision, Frame, Pipeline, Session};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("session thread exited")]
    ChannelClosed,
    #[error("failed to spawn session thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Messages sent from async handlers to a session thread.
enum SessionRequest {
    Frame {
        frame: Frame,
        expected: String,
        reply: oneshot::Sender<AccessDecision>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to one session thread.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
}

impl SessionHandle {
    /// Run one frame through the pipeline and wait for its decision.
    pub async fn process(
        &self,
        frame: Frame,
        expected: &str,
    ) -> Result<AccessDecision, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Frame {
                frame,
                expected: expected.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Drop the session's rolling state (subject switch, camera reconnect).
    /// Completes after any in-flight frame, so the next frame sees a clean
    /// window.
    pub async fn reset(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Reset { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn one pipeline session on a dedicated OS thread.
///
/// Frame analysis is CPU-bound (FFTs, full-frame convolutions), so it runs
/// off the async runtime; the handle bridges with a bounded channel. The
/// thread exits when the last handle is dropped.
pub fn spawn_session(
    mut pipeline: Pipeline,
    mut session: Session,
) -> Result<SessionHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<SessionRequest>(4);

    std::thread::Builder::new()
        .name("sentinel-session".into())
        .spawn(move || {
            tracing::info!(session = %session.id(), "session thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    SessionRequest::Frame {
                        frame,
                        expected,
                        reply,
                    } => {
                        let decision = pipeline.process_frame(&mut session, &frame, &expected);
                        let _ = reply.send(decision);
                    }
                    SessionRequest::Reset { reply } => {
                        session.reset();
                        let _ = reply.send(());
                    }
                }
            }
            tracing::info!(session = %session.id(), "session thread exiting");
        })?;

    Ok(SessionHandle { tx })
}

/// Live sessions keyed by caller-chosen stream id (one per camera feed).
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session handle under `stream`, replacing any previous
    /// one; the replaced thread winds down when its handles drop.
    pub fn attach(&self, stream: &str, handle: SessionHandle) {
        self.lock().insert(stream.to_string(), handle);
    }

    pub fn get(&self, stream: &str) -> Option<SessionHandle> {
        self.lock().get(stream).cloned()
    }

    pub fn detach(&self, stream: &str) -> bool {
        self.lock().remove(stream).is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use sentinel_core::{
        BoundingBox, CollaboratorError, DecisionCode, DecisionEngine, DecisionLedger,
        EnvironmentScan, EnvironmentScanner, FaceLocator, IdentityMatcher, IdentityVerdict,
        PipelineConfig,
    };
    use std::path::PathBuf;
    use std::sync::Arc;

    struct CleanScanner;
    impl EnvironmentScanner for CleanScanner {
        fn scan(&mut self) -> EnvironmentScan {
            EnvironmentScan {
                detected: false,
                summary: "clean".to_string(),
            }
        }
    }

    struct NoFaceLocator;
    impl FaceLocator for NoFaceLocator {
        fn locate(&mut self, _frame: &Frame) -> Result<Vec<BoundingBox>, CollaboratorError> {
            Ok(Vec::new())
        }
    }

    struct AlwaysMatcher;
    impl IdentityMatcher for AlwaysMatcher {
        fn verify(
            &mut self,
            _frame: &Frame,
            _face: &BoundingBox,
            _expected: &str,
        ) -> Result<IdentityVerdict, CollaboratorError> {
            Ok(IdentityVerdict {
                matched: true,
                similarity: 95.0,
                subject: Some("alice".to_string()),
            })
        }
    }

    fn temp_ledger_path() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        std::env::temp_dir().join(format!("sentineld-engine-{nanos}/ledger.json"))
    }

    fn spawn_test_session() -> SessionHandle {
        let config = PipelineConfig::default();
        let ledger = DecisionLedger::open(temp_ledger_path(), None, 100).unwrap();
        let pipeline = Pipeline::new(
            config.clone(),
            Box::new(NoFaceLocator),
            Box::new(AlwaysMatcher),
            DecisionEngine::new(Arc::new(Mutex::new(ledger))),
        );
        let session = Session::with_scanner(&config, Box::new(CleanScanner));
        spawn_session(pipeline, session).unwrap()
    }

    fn frame() -> Frame {
        Frame::new(RgbImage::from_pixel(32, 32, Rgb([100; 3])), 0.0)
    }

    #[tokio::test]
    async fn test_frames_round_trip_through_the_session_thread() {
        let handle = spawn_test_session();
        let decision = handle.process(frame(), "alice").await.unwrap();
        assert_eq!(decision.code, DecisionCode::NoFaceDetected);
    }

    #[tokio::test]
    async fn test_reset_is_acknowledged() {
        let handle = spawn_test_session();
        handle.process(frame(), "alice").await.unwrap();
        handle.reset().await.unwrap();
    }

    #[tokio::test]
    async fn test_cloned_handle_keeps_the_session_alive() {
        let handle = spawn_test_session();
        let clone = handle.clone();
        drop(handle);
        // The thread is still alive through the clone
        assert!(clone.process(frame(), "alice").await.is_ok());
    }

    #[test]
    fn test_registry_attach_get_detach() {
        let registry = SessionRegistry::new();
        let handle = spawn_test_session();
        registry.attach("cam0", handle);
        assert!(registry.get("cam0").is_some());
        assert!(registry.get("cam1").is_none());
        assert!(registry.detach("cam0"));
        assert!(!registry.detach("cam0"));
    }
}
