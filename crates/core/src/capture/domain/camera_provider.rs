use std::fmt;

use thiserror::Error;

use crate::capture::domain::frame_source::FrameSource;

/// Which way the requested camera should face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FacingMode {
    /// Front-facing, towards the person using the device.
    #[default]
    User,
    Environment,
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacingMode::User => write!(f, "user"),
            FacingMode::Environment => write!(f, "environment"),
        }
    }
}

/// Constraints passed when acquiring a stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamRequest {
    /// Preferred facing. Providers that cannot choose treat it as a hint.
    pub facing: FacingMode,
    /// Explicit device identifier, overriding the provider's default.
    pub device: Option<String>,
}

impl StreamRequest {
    pub fn front_facing() -> Self {
        Self {
            facing: FacingMode::User,
            device: None,
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }
}

/// Stream acquisition failed. The session stays usable and may retry when
/// asked again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraAccessError {
    #[error("permission to use camera {0} was denied")]
    PermissionDenied(String),
    #[error("no camera found at {0}")]
    NoDevice(String),
    #[error("failed to open camera: {0}")]
    Open(String),
    #[error("camera capture is not supported here: {0}")]
    Unsupported(String),
}

/// Domain interface for acquiring live video streams.
pub trait CameraProvider: Send {
    fn acquire(&mut self, request: &StreamRequest)
        -> Result<Box<dyn FrameSource>, CameraAccessError>;
}
