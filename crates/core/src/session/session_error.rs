use thiserror::Error;

use crate::capture::domain::camera_provider::CameraAccessError;
use crate::detection::domain::model_loader::ModelLoadError;
use crate::session::session_state::SessionState;
use crate::shared::constants::{CAMERA_ACCESS_FAILED_MESSAGE, MODEL_LOAD_FAILED_MESSAGE};

/// Lifecycle errors. `Display` yields the message shown to the user; the
/// underlying cause is available through `source()`.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{}", MODEL_LOAD_FAILED_MESSAGE)]
    ModelLoad(#[source] ModelLoadError),
    #[error("{}", CAMERA_ACCESS_FAILED_MESSAGE)]
    CameraAccess(#[source] CameraAccessError),
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },
}
