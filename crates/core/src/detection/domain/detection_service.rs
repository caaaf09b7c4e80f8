use thiserror::Error;

use crate::shared::face_region::FaceRegion;
use crate::shared::frame::Frame;

/// A single detection request failed. Callers treat it as zero faces for
/// that frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("malformed model output: {0}")]
    MalformedOutput(String),
    #[error("detection worker disconnected")]
    Disconnected,
}

/// Domain interface for face detection.
///
/// Implementations may hold an inference session, hence `&mut self`. The
/// order of the returned regions carries no meaning.
pub trait DetectionService: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, DetectionError>;
}
