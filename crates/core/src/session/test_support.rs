//! Stubs for the session's ports, shared by tests across the crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::RgbaImage;

use crate::capture::domain::camera_provider::{CameraAccessError, CameraProvider, StreamRequest};
use crate::capture::domain::frame_source::FrameSource;
use crate::detection::domain::detection_dispatch::{
    DetectionDispatch, DetectionOutcome, DetectionRequest, SubmitRejected,
};
use crate::detection::domain::detection_service::DetectionError;
use crate::detection::domain::model_loader::{ModelLoadError, ModelLoader};
use crate::overlay::domain::canvas::Canvas;
use crate::overlay::domain::coordinate_mapper::RenderRect;
use crate::shared::face_region::FaceRegion;
use crate::shared::frame::Frame;

// ---------------------------------------------------------------------------
// Canvas
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum CanvasOp {
    Resize(u32, u32),
    Clear,
    /// Carries the frame index.
    DrawFrame(usize),
    DrawImage(RenderRect),
}

#[derive(Default)]
struct CanvasLog {
    size: (u32, u32),
    ops: Vec<CanvasOp>,
    /// Overlays drawn since the surface was last blanked.
    visible_overlays: usize,
}

/// Canvas that records every call. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingCanvas {
    log: Arc<Mutex<CanvasLog>>,
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        let canvas = Self::default();
        canvas.log.lock().unwrap().size = (width, height);
        canvas
    }

    pub fn ops(&self) -> Vec<CanvasOp> {
        self.log.lock().unwrap().ops.clone()
    }

    pub fn draws(&self) -> Vec<RenderRect> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CanvasOp::DrawImage(rect) => Some(rect),
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().ops.clear();
    }

    pub fn is_blank(&self) -> bool {
        self.log.lock().unwrap().visible_overlays == 0
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> (u32, u32) {
        self.log.lock().unwrap().size
    }

    fn resize(&mut self, width: u32, height: u32) {
        let mut log = self.log.lock().unwrap();
        if log.size != (width, height) {
            log.size = (width, height);
            log.visible_overlays = 0;
        }
        log.ops.push(CanvasOp::Resize(width, height));
    }

    fn clear(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.visible_overlays = 0;
        log.ops.push(CanvasOp::Clear);
    }

    fn draw_frame(&mut self, frame: &Frame) {
        self.log
            .lock()
            .unwrap()
            .ops
            .push(CanvasOp::DrawFrame(frame.index()));
    }

    fn draw_image(&mut self, _image: &RgbaImage, rect: &RenderRect) {
        let mut log = self.log.lock().unwrap();
        log.visible_overlays += 1;
        log.ops.push(CanvasOp::DrawImage(*rect));
    }

    fn to_image(&self) -> RgbaImage {
        let (w, h) = self.size();
        RgbaImage::new(w, h)
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

pub fn frame(width: u32, height: u32, index: usize) -> Arc<Frame> {
    Arc::new(Frame::new(
        vec![0u8; (width * height * 3) as usize],
        width,
        height,
        3,
        index,
    ))
}

/// Stream whose current frame is controlled by the test.
pub struct StubFrameSource {
    frame: Arc<Mutex<Option<Arc<Frame>>>>,
    live_tracks: Arc<AtomicUsize>,
}

impl FrameSource for StubFrameSource {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        self.frame.lock().unwrap().clone()
    }

    fn active_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.live_tracks.store(0, Ordering::SeqCst);
    }
}

/// Camera handing out [`StubFrameSource`]s. Clones share state.
#[derive(Clone, Default)]
pub struct StubCamera {
    failure: Arc<Mutex<Option<CameraAccessError>>>,
    frame: Arc<Mutex<Option<Arc<Frame>>>>,
    live_tracks: Arc<AtomicUsize>,
    acquisitions: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<StreamRequest>>>,
}

impl StubCamera {
    /// Camera whose stream shows `frame` from the start.
    pub fn with_frame(frame: Arc<Frame>) -> Self {
        let camera = Self::default();
        camera.set_frame(Some(frame));
        camera
    }

    pub fn failing(error: CameraAccessError) -> Self {
        let camera = Self::default();
        *camera.failure.lock().unwrap() = Some(error);
        camera
    }

    pub fn set_frame(&self, frame: Option<Arc<Frame>>) {
        *self.frame.lock().unwrap() = frame;
    }

    pub fn set_failure(&self, error: Option<CameraAccessError>) {
        *self.failure.lock().unwrap() = error;
    }

    pub fn live_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<StreamRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

impl CameraProvider for StubCamera {
    fn acquire(
        &mut self,
        request: &StreamRequest,
    ) -> Result<Box<dyn FrameSource>, CameraAccessError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.live_tracks.store(1, Ordering::SeqCst);
        Ok(Box::new(StubFrameSource {
            frame: self.frame.clone(),
            live_tracks: self.live_tracks.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DispatchLog {
    submitted: Vec<DetectionRequest>,
    resolved: Vec<DetectionOutcome>,
    busy: bool,
    disconnected: bool,
}

/// Dispatch whose detections resolve only when the test says so. Clones
/// share state.
#[derive(Clone, Default)]
pub struct ManualDispatch {
    log: Arc<Mutex<DispatchLog>>,
}

impl ManualDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<DetectionRequest> {
        self.log.lock().unwrap().submitted.clone()
    }

    pub fn set_busy(&self, busy: bool) {
        self.log.lock().unwrap().busy = busy;
    }

    pub fn set_disconnected(&self, disconnected: bool) {
        self.log.lock().unwrap().disconnected = disconnected;
    }

    /// Resolves the `nth` submitted request with `result`.
    pub fn resolve(&self, nth: usize, result: Result<Vec<FaceRegion>, DetectionError>) {
        let mut log = self.log.lock().unwrap();
        let request = log.submitted[nth].clone();
        log.resolved.push(DetectionOutcome {
            generation: request.generation,
            frame_index: request.frame.index(),
            result,
            elapsed: Duration::from_millis(3),
        });
    }

    /// Resolves the most recent submission with `result`.
    pub fn resolve_latest(&self, result: Result<Vec<FaceRegion>, DetectionError>) {
        let n = self.submitted().len();
        self.resolve(n - 1, result);
    }
}

impl DetectionDispatch for ManualDispatch {
    fn submit(&mut self, request: DetectionRequest) -> Result<(), SubmitRejected> {
        let mut log = self.log.lock().unwrap();
        if log.disconnected {
            return Err(SubmitRejected::Disconnected);
        }
        if log.busy {
            return Err(SubmitRejected::Busy);
        }
        log.submitted.push(request);
        Ok(())
    }

    fn completed(&mut self) -> Vec<DetectionOutcome> {
        std::mem::take(&mut self.log.lock().unwrap().resolved)
    }
}

/// Loader that hands back a prepared dispatch, or fails.
pub struct StubLoader {
    result: Result<ManualDispatch, String>,
}

impl StubLoader {
    pub fn succeeding(dispatch: ManualDispatch) -> Self {
        Self {
            result: Ok(dispatch),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
        }
    }
}

impl ModelLoader for StubLoader {
    fn load(self: Box<Self>) -> Result<Box<dyn DetectionDispatch>, ModelLoadError> {
        match self.result {
            Ok(dispatch) => Ok(Box::new(dispatch)),
            Err(reason) => Err(ModelLoadError::Session(reason)),
        }
    }
}

pub fn face(x1: f64, y1: f64, x2: f64, y2: f64) -> FaceRegion {
    FaceRegion::new((x1, y1), (x2, y2))
}
