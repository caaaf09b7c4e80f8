use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::detection::domain::detection_service::DetectionError;
use crate::shared::face_region::FaceRegion;
use crate::shared::frame::Frame;

/// A frame handed to detection, tagged with the capture generation that
/// submitted it.
#[derive(Clone, Debug)]
pub struct DetectionRequest {
    pub generation: u64,
    pub frame: Arc<Frame>,
}

/// The resolved result of one [`DetectionRequest`].
#[derive(Clone, Debug)]
pub struct DetectionOutcome {
    pub generation: u64,
    pub frame_index: usize,
    pub result: Result<Vec<FaceRegion>, DetectionError>,
    pub elapsed: Duration,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejected {
    #[error("detector is at capacity")]
    Busy,
    #[error("detector is no longer running")]
    Disconnected,
}

/// Non-blocking front end to a [`DetectionService`](super::detection_service::DetectionService).
///
/// `submit` never waits for inference. Results surface later through
/// `completed`, possibly several ticks after submission and in any order
/// relative to newer submissions.
pub trait DetectionDispatch: Send {
    fn submit(&mut self, request: DetectionRequest) -> Result<(), SubmitRejected>;

    /// Drains every outcome resolved since the last call.
    fn completed(&mut self) -> Vec<DetectionOutcome>;
}
