//! Pluggable detector seams.
//!
//! Face localization, learned spoof classification and identity matching
//! are provided by the embedding application; the pipeline only defines
//! the contracts. Implementations may hold mutable backend state (model
//! sessions, device handles), hence `&mut self` throughout.

use thiserror::Error;

use crate::frame::Frame;

/// Axis-aligned face region in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("detector backend failure: {0}")]
    Backend(String),
    #[error("detector unavailable")]
    Unavailable,
}

/// Finds face regions in a frame. An empty vector means no face; errors
/// mean the detector itself failed and are treated as "no face" upstream.
pub trait FaceLocator {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, CollaboratorError>;
}

/// Optional learned anti-spoofing model, complementary to the heuristic
/// indicator bank. Returns the probability in [0, 1] that the face region
/// is a presentation attack.
pub trait SpoofClassifier {
    fn spoof_probability(
        &mut self,
        frame: &Frame,
        face: &BoundingBox,
    ) -> Result<f64, CollaboratorError>;
}

/// Face-recognition verdict for one frame against one expected subject.
#[derive(Debug, Clone)]
pub struct IdentityVerdict {
    pub matched: bool,
    /// Match similarity in [0, 100].
    pub similarity: f64,
    /// Recognized subject, when the matcher can name one.
    pub subject: Option<String>,
}

impl IdentityVerdict {
    /// The deny-by-default verdict used when the matcher fails.
    pub fn unknown() -> Self {
        Self {
            matched: false,
            similarity: 0.0,
            subject: None,
        }
    }
}

/// Compares the face region against an enrolled identity.
pub trait IdentityMatcher {
    fn verify(
        &mut self,
        frame: &Frame,
        face: &BoundingBox,
        expected: &str,
    ) -> Result<IdentityVerdict, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_area() {
        let face = BoundingBox {
            x: 5,
            y: 5,
            width: 40,
            height: 60,
        };
        assert_eq!(face.area(), 2400);
    }

    #[test]
    fn test_unknown_verdict_denies() {
        let verdict = IdentityVerdict::unknown();
        assert!(!verdict.matched);
        assert_eq!(verdict.similarity, 0.0);
        assert!(verdict.subject.is_none());
    }
}
