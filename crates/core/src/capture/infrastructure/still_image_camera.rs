use std::path::PathBuf;
use std::sync::Arc;

use crate::capture::domain::camera_provider::{CameraAccessError, CameraProvider, StreamRequest};
use crate::capture::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;

/// Serves a single still image as a never-changing live stream.
///
/// Useful for trying overlay placement on a photo without a camera.
pub struct StillImageCameraProvider {
    path: PathBuf,
}

impl StillImageCameraProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CameraProvider for StillImageCameraProvider {
    fn acquire(
        &mut self,
        _request: &StreamRequest,
    ) -> Result<Box<dyn FrameSource>, CameraAccessError> {
        let target = self.path.display().to_string();
        let img = image::open(&self.path)
            .map_err(|e| match e {
                image::ImageError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    CameraAccessError::NoDevice(target.clone())
                }
                image::ImageError::IoError(io)
                    if io.kind() == std::io::ErrorKind::PermissionDenied =>
                {
                    CameraAccessError::PermissionDenied(target.clone())
                }
                other => CameraAccessError::Open(format!("{target}: {other}")),
            })?
            .to_rgb8();

        let (width, height) = img.dimensions();
        log::info!("Still image stream opened: {target} ({width}x{height})");
        let frame = Frame::new(img.into_raw(), width, height, 3, 0);
        Ok(Box::new(StillImageStream {
            frame: Some(Arc::new(frame)),
        }))
    }
}

struct StillImageStream {
    frame: Option<Arc<Frame>>,
}

impl FrameSource for StillImageStream {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        self.frame.clone()
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.frame.is_some())
    }

    fn stop(&mut self) {
        self.frame = None;
    }
}
