use std::path::{Path, PathBuf};

use crate::detection::domain::detection_dispatch::DetectionDispatch;
use crate::detection::domain::model_loader::{ModelLoadError, ModelLoader};
use crate::detection::infrastructure::model_resolver::{self, ProgressFn};
use crate::detection::infrastructure::onnx_blazeface_detector::{
    OnnxBlazefaceDetector, DEFAULT_CONFIDENCE,
};
use crate::detection::infrastructure::threaded_detection_dispatch::ThreadedDetectionDispatch;
use crate::shared::constants::{BLAZEFACE_MODEL_NAME, DEFAULT_MAX_IN_FLIGHT};

/// Loads the BlazeFace model and starts a detection worker for it.
pub struct BlazefaceModelLoader {
    model_path: Option<PathBuf>,
    model_url: Option<String>,
    bundled_dir: Option<PathBuf>,
    confidence: f64,
    max_in_flight: usize,
    progress: Option<ProgressFn>,
}

impl BlazefaceModelLoader {
    pub fn new() -> Self {
        Self {
            model_path: None,
            model_url: None,
            bundled_dir: None,
            confidence: DEFAULT_CONFIDENCE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            progress: None,
        }
    }

    /// Use this model file and skip cache lookup entirely.
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn with_model_url(mut self, url: impl Into<String>) -> Self {
        self.model_url = Some(url.into());
        self
    }

    pub fn with_bundled_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_dir = Some(dir.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn resolve_model_path(&mut self) -> Result<PathBuf, ModelLoadError> {
        if let Some(path) = &self.model_path {
            if !path.is_file() {
                return Err(ModelLoadError::Unavailable(
                    format!("model file not found: {}", path.display()).into(),
                ));
            }
            return Ok(path.clone());
        }

        log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
        model_resolver::resolve(
            BLAZEFACE_MODEL_NAME,
            self.model_url.as_deref(),
            self.bundled_dir.as_deref(),
            self.progress.take(),
        )
        .map_err(|e| ModelLoadError::Unavailable(Box::new(e)))
    }
}

impl Default for BlazefaceModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLoader for BlazefaceModelLoader {
    fn load(mut self: Box<Self>) -> Result<Box<dyn DetectionDispatch>, ModelLoadError> {
        let path = self.resolve_model_path()?;
        let detector = create_detector(&path, self.confidence)?;
        log::info!(
            "Face detection model loaded from {} (confidence {:.2})",
            path.display(),
            self.confidence
        );
        Ok(Box::new(ThreadedDetectionDispatch::spawn(
            Box::new(detector),
            self.max_in_flight,
        )))
    }
}

fn create_detector(path: &Path, confidence: f64) -> Result<OnnxBlazefaceDetector, ModelLoadError> {
    OnnxBlazefaceDetector::new(path, confidence).map_err(|e| ModelLoadError::Session(e.to_string()))
}
