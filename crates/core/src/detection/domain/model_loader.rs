use thiserror::Error;

use crate::detection::domain::detection_dispatch::DetectionDispatch;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("model file unavailable: {0}")]
    Unavailable(#[source] BoxError),
    #[error("failed to create inference session: {0}")]
    Session(String),
    #[error("model loader panicked")]
    Panicked,
}

/// Produces a ready detector. Runs once, off the render thread, and may be
/// slow (file resolution, download, session creation).
pub trait ModelLoader: Send {
    fn load(self: Box<Self>) -> Result<Box<dyn DetectionDispatch>, ModelLoadError>;
}
