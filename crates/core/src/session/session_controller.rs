use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::capture::domain::camera_provider::{CameraProvider, StreamRequest};
use crate::capture::domain::frame_source::FrameSource;
use crate::detection::domain::detection_dispatch::DetectionDispatch;
use crate::detection::domain::model_loader::{ModelLoadError, ModelLoader};
use crate::overlay::domain::canvas::Canvas;
use crate::session::capture_loop::{Applied, CaptureLoop, TickOutcome};
use crate::session::frame_scheduler::{FrameScheduler, TickHandle};
use crate::session::session_error::SessionError;
use crate::session::session_state::SessionState;

type LoadResult = Result<Box<dyn DetectionDispatch>, ModelLoadError>;

/// What one [`SessionController::pump`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Set when a scheduled tick ran.
    pub tick: Option<TickOutcome>,
    pub overlays_drawn: usize,
    pub outcomes_applied: usize,
    pub outcomes_discarded: usize,
}

/// Owns every resource of a capture session and drives its lifecycle.
///
/// The host calls [`pump`](Self::pump) once per presentation opportunity
/// (display refresh). Everything that touches the canvas happens inside
/// `pump` and [`stop`](Self::stop), on the caller's thread.
pub struct SessionController {
    state: SessionState,
    loader: Option<Box<dyn ModelLoader>>,
    pending_model: Option<Receiver<LoadResult>>,
    dispatch: Option<Box<dyn DetectionDispatch>>,
    camera: Box<dyn CameraProvider>,
    request: StreamRequest,
    stream: Option<Box<dyn FrameSource>>,
    scheduler: FrameScheduler,
    pending_tick: Option<TickHandle>,
    capture: CaptureLoop,
    canvas: Box<dyn Canvas>,
    generation: u64,
    error: Option<SessionError>,
}

impl SessionController {
    pub fn new(
        loader: Box<dyn ModelLoader>,
        camera: Box<dyn CameraProvider>,
        capture: CaptureLoop,
        canvas: Box<dyn Canvas>,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            loader: Some(loader),
            pending_model: None,
            dispatch: None,
            camera,
            request: StreamRequest::front_facing(),
            stream: None,
            scheduler: FrameScheduler::new(),
            pending_tick: None,
            capture,
            canvas,
            generation: 0,
            error: None,
        }
    }

    /// Constraints used whenever a stream is acquired.
    pub fn with_stream_request(mut self, request: StreamRequest) -> Self {
        self.request = request;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Start is offered only once the model is loaded and no session runs.
    pub fn can_start(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn is_camera_active(&self) -> bool {
        self.state == SessionState::Active && self.stream.is_some()
    }

    /// The user-facing message of the last lifecycle failure.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn canvas(&self) -> &dyn Canvas {
        self.canvas.as_ref()
    }

    pub fn capture(&self) -> &CaptureLoop {
        &self.capture
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn active_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.active_tracks())
    }

    pub fn is_tick_pending(&self) -> bool {
        self.pending_tick.is_some()
    }

    /// Begins loading the detection model in the background. Allowed once
    /// per controller.
    pub fn load_model(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("load model"));
        }
        let Some(loader) = self.loader.take() else {
            return Err(self.invalid("load model"));
        };

        let (tx, rx) = crossbeam_channel::bounded::<LoadResult>(1);
        let spawned = thread::Builder::new()
            .name("shadecam-model-load".into())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| loader.load()))
                    .unwrap_or(Err(ModelLoadError::Panicked));
                let _ = tx.send(result);
            });

        self.start_loading(spawned.map(|_| rx))
    }

    fn start_loading(
        &mut self,
        spawned: std::io::Result<Receiver<LoadResult>>,
    ) -> Result<(), SessionError> {
        match spawned {
            Ok(rx) => {
                log::info!("Loading face detection model");
                self.pending_model = Some(rx);
                self.state = SessionState::Loading;
                Ok(())
            }
            Err(e) => {
                let message = format!("cannot spawn model loader: {e}");
                self.fail_model_load(ModelLoadError::Session(message.clone()));
                Err(SessionError::ModelLoad(ModelLoadError::Session(message)))
            }
        }
    }

    /// Observes model loading without blocking. Called by `pump`.
    pub fn poll_model(&mut self) {
        if self.state != SessionState::Loading {
            return;
        }
        let Some(rx) = self.pending_model.as_ref() else {
            return;
        };

        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(ModelLoadError::Panicked),
        };
        self.pending_model = None;

        match result {
            Ok(dispatch) => {
                self.dispatch = Some(dispatch);
                self.state = SessionState::Ready;
                log::info!("Face detection model ready");
            }
            Err(e) => self.fail_model_load(e),
        }
    }

    fn fail_model_load(&mut self, e: ModelLoadError) {
        log::error!("Failed to load face detection model: {e}");
        self.error = Some(SessionError::ModelLoad(e));
        self.state = SessionState::Error;
    }

    /// Acquires the camera and starts the per-frame loop.
    ///
    /// On camera failure the session stays `Ready` with the error recorded;
    /// it is not retried until `start` is called again.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Ready {
            return Err(self.invalid("start"));
        }

        let stream = match self.camera.acquire(&self.request) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Failed to access camera: {e}");
                self.error = Some(SessionError::CameraAccess(e.clone()));
                return Err(SessionError::CameraAccess(e));
            }
        };

        self.stream = Some(stream);
        self.generation += 1;
        self.capture.begin(self.generation);
        self.pending_tick = Some(self.scheduler.schedule());
        self.error = None;
        self.state = SessionState::Active;
        log::info!("Capture started (generation {})", self.generation);
        Ok(())
    }

    /// Stops capture and blanks the canvas. A no-op unless `Active`.
    pub fn stop(&mut self) {
        if self.state != SessionState::Active {
            return;
        }
        self.state = SessionState::Stopping;

        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        if let Some(handle) = self.pending_tick.take() {
            self.scheduler.cancel(handle);
        }
        self.capture.end();
        self.capture.renderer().clear(self.canvas.as_mut());

        self.state = SessionState::Ready;
        log::info!("Capture stopped (generation {})", self.generation);
    }

    /// Starts when inactive, stops when active.
    pub fn toggle(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Active {
            self.stop();
            Ok(())
        } else {
            self.start()
        }
    }

    /// One presentation opportunity: poll loading, run the due tick, then
    /// draw whatever detections have resolved.
    pub fn pump(&mut self) -> PumpReport {
        let mut report = PumpReport::default();
        self.poll_model();

        if let Some(handle) = self.scheduler.take_due() {
            if self.pending_tick == Some(handle) {
                self.pending_tick = None;
                report.tick = self.run_tick();
            }
        }

        let Some(dispatch) = self.dispatch.as_mut() else {
            return report;
        };
        for outcome in dispatch.completed() {
            match self.capture.apply(outcome, self.canvas.as_mut()) {
                Applied::Drawn(n) => {
                    report.outcomes_applied += 1;
                    report.overlays_drawn += n;
                }
                Applied::Discarded => report.outcomes_discarded += 1,
            }
        }
        report
    }

    fn run_tick(&mut self) -> Option<TickOutcome> {
        if self.state != SessionState::Active {
            return None;
        }
        let (Some(stream), Some(dispatch)) = (self.stream.as_ref(), self.dispatch.as_mut()) else {
            return None;
        };

        let outcome = self
            .capture
            .tick(stream.as_ref(), dispatch.as_mut(), self.canvas.as_mut());
        // Rescheduled whatever the tick did; only stop() breaks the chain.
        self.pending_tick = Some(self.scheduler.schedule());
        Some(outcome)
    }

    /// Releases every session resource. Equivalent to dropping the
    /// controller.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.stop();
        if let Some(handle) = self.pending_tick.take() {
            self.scheduler.cancel(handle);
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        self.pending_model = None;
        self.dispatch = None;
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state,
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::camera_provider::CameraAccessError;
    use crate::capture::domain::viewport::FixedViewport;
    use crate::detection::domain::detection_service::DetectionError;
    use crate::overlay::domain::coordinate_mapper::CoordinateMapper;
    use crate::overlay::domain::overlay_asset::OverlayAsset;
    use crate::overlay::domain::overlay_renderer::{CompositeMode, OverlayRenderer};
    use crate::session::session_logger::NullSessionLogger;
    use crate::session::test_support::{
        face, frame, CanvasOp, ManualDispatch, RecordingCanvas, StubCamera, StubLoader,
    };
    use image::RgbaImage;
    use std::time::{Duration, Instant};

    struct Harness {
        controller: SessionController,
        camera: StubCamera,
        dispatch: ManualDispatch,
        canvas: RecordingCanvas,
    }

    fn capture_loop(asset: OverlayAsset) -> CaptureLoop {
        CaptureLoop::new(
            CoordinateMapper::default(),
            OverlayRenderer::new(asset, CompositeMode::OverlayOnly),
            Box::new(FixedViewport::new(640, 480)),
            Box::new(NullSessionLogger),
        )
    }

    fn harness_with(loader: StubLoader, camera: StubCamera, dispatch: ManualDispatch) -> Harness {
        let canvas = RecordingCanvas::new(640, 480);
        let controller = SessionController::new(
            Box::new(loader),
            Box::new(camera.clone()),
            capture_loop(OverlayAsset::ready(RgbaImage::new(4, 2))),
            Box::new(canvas.clone()),
        );
        Harness {
            controller,
            camera,
            dispatch,
            canvas,
        }
    }

    fn harness() -> Harness {
        let dispatch = ManualDispatch::new();
        harness_with(
            StubLoader::succeeding(dispatch.clone()),
            StubCamera::with_frame(frame(640, 480, 0)),
            dispatch,
        )
    }

    fn pump_until_loaded(controller: &mut SessionController) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.state() == SessionState::Loading && Instant::now() < deadline {
            controller.pump();
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// A harness whose session is already `Active`.
    fn active_harness() -> Harness {
        let mut h = harness();
        h.controller.load_model().unwrap();
        pump_until_loaded(&mut h.controller);
        h.controller.start().unwrap();
        h
    }

    // --- model loading ---

    #[test]
    fn test_starts_idle_and_cannot_start() {
        let h = harness();
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(!h.controller.can_start());
        assert!(h.controller.error_message().is_none());
    }

    #[test]
    fn test_model_load_reaches_ready() {
        let mut h = harness();
        h.controller.load_model().unwrap();
        assert_eq!(h.controller.state(), SessionState::Loading);
        assert!(!h.controller.can_start());

        pump_until_loaded(&mut h.controller);
        assert_eq!(h.controller.state(), SessionState::Ready);
        assert!(h.controller.can_start());
    }

    #[test]
    fn test_model_load_runs_once() {
        let mut h = harness();
        h.controller.load_model().unwrap();
        assert!(matches!(
            h.controller.load_model(),
            Err(SessionError::InvalidTransition { .. })
        ));
        pump_until_loaded(&mut h.controller);
        assert!(h.controller.load_model().is_err());
    }

    #[test]
    fn test_model_load_failure_is_terminal() {
        let mut h = harness_with(
            StubLoader::failing("corrupt weights"),
            StubCamera::with_frame(frame(640, 480, 0)),
            ManualDispatch::new(),
        );
        h.controller.load_model().unwrap();
        pump_until_loaded(&mut h.controller);

        assert_eq!(h.controller.state(), SessionState::Error);
        assert!(h.controller.state().is_terminal());
        assert_eq!(
            h.controller.error_message().as_deref(),
            Some("Failed to load face detection model")
        );
        assert!(!h.controller.can_start());
        assert!(h.controller.start().is_err());
        assert_eq!(h.camera.acquisitions(), 0);
    }

    #[test]
    fn test_loader_spawn_failure_is_returned() {
        let mut h = harness();
        let spawn_error = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no threads");

        let err = h.controller.start_loading(Err(spawn_error)).unwrap_err();

        assert!(matches!(err, SessionError::ModelLoad(ModelLoadError::Session(_))));
        assert_eq!(h.controller.state(), SessionState::Error);
        assert_eq!(
            h.controller.error_message().as_deref(),
            Some("Failed to load face detection model")
        );
        assert!(!h.controller.can_start());
    }

    // --- start ---

    #[test]
    fn test_start_before_ready_is_rejected() {
        let mut h = harness();
        let err = h.controller.start().unwrap_err();
        assert_eq!(err.to_string(), "cannot start while idle");
        assert_eq!(h.camera.acquisitions(), 0);
    }

    #[test]
    fn test_start_requests_front_camera_and_schedules_tick() {
        let h = active_harness();
        assert_eq!(h.controller.state(), SessionState::Active);
        assert!(h.controller.is_camera_active());
        assert!(h.controller.is_tick_pending());
        assert_eq!(h.controller.generation(), 1);
        assert_eq!(h.controller.active_tracks(), 1);
        assert_eq!(h.camera.last_request(), Some(StreamRequest::front_facing()));
    }

    #[test]
    fn test_camera_failure_keeps_ready_without_retry() {
        let dispatch = ManualDispatch::new();
        let mut h = harness_with(
            StubLoader::succeeding(dispatch.clone()),
            StubCamera::failing(CameraAccessError::PermissionDenied("/dev/video0".into())),
            dispatch,
        );
        h.controller.load_model().unwrap();
        pump_until_loaded(&mut h.controller);

        let err = h.controller.start().unwrap_err();
        assert_eq!(err.to_string(), "Failed to access camera");
        assert_eq!(h.controller.state(), SessionState::Ready);
        assert_eq!(
            h.controller.error_message().as_deref(),
            Some("Failed to access camera")
        );
        assert!(!h.controller.is_tick_pending());

        for _ in 0..5 {
            assert_eq!(h.controller.pump().tick, None);
        }
        assert_eq!(h.camera.acquisitions(), 1);
    }

    #[test]
    fn test_retry_after_camera_failure() {
        let dispatch = ManualDispatch::new();
        let camera = StubCamera::failing(CameraAccessError::NoDevice("/dev/video0".into()));
        let mut h = harness_with(StubLoader::succeeding(dispatch.clone()), camera, dispatch);
        h.controller.load_model().unwrap();
        pump_until_loaded(&mut h.controller);
        assert!(h.controller.start().is_err());

        h.camera.set_failure(None);
        h.camera.set_frame(Some(frame(640, 480, 0)));
        h.controller.start().unwrap();
        assert_eq!(h.controller.state(), SessionState::Active);
        assert!(h.controller.error_message().is_none());
    }

    // --- ticking ---

    #[test]
    fn test_pump_submits_and_draws_faces() {
        let mut h = active_harness();

        let report = h.controller.pump();
        assert_eq!(report.tick, Some(TickOutcome::Submitted { frame_index: 0 }));
        assert_eq!(h.dispatch.submitted().len(), 1);

        h.dispatch.resolve(
            0,
            Ok(vec![face(0.0, 0.0, 100.0, 100.0), face(300.0, 0.0, 400.0, 100.0)]),
        );
        let report = h.controller.pump();
        assert_eq!(report.overlays_drawn, 2);
        assert_eq!(report.outcomes_applied, 1);
        assert_eq!(h.canvas.draws().len(), 2);
    }

    #[test]
    fn test_each_tick_clears_before_drawing() {
        let mut h = active_harness();
        h.controller.pump();
        h.dispatch.resolve(0, Ok(vec![face(0.0, 0.0, 100.0, 100.0)]));
        h.controller.pump();

        let ops = h.canvas.ops();
        let clear_at = ops.iter().rposition(|op| *op == CanvasOp::Clear).unwrap();
        let draw_at = ops
            .iter()
            .position(|op| matches!(op, CanvasOp::DrawImage(_)))
            .unwrap();
        assert!(clear_at < draw_at);
        assert!(!h.canvas.is_blank());
    }

    #[test]
    fn test_failed_detection_keeps_loop_running() {
        let mut h = active_harness();
        h.controller.pump();
        h.dispatch
            .resolve(0, Err(DetectionError::Inference("session crashed".into())));

        let report = h.controller.pump();
        assert_eq!(report.overlays_drawn, 0);
        assert!(report.tick.is_some());
        assert!(h.controller.is_tick_pending());
        assert!(h.controller.error_message().is_none());
        assert_eq!(h.controller.state(), SessionState::Active);

        let report = h.controller.pump();
        assert!(matches!(report.tick, Some(TickOutcome::Submitted { .. })));
    }

    #[test]
    fn test_unready_video_still_reschedules() {
        let mut h = active_harness();
        h.camera.set_frame(None);

        for _ in 0..3 {
            assert_eq!(h.controller.pump().tick, Some(TickOutcome::NotReady));
            assert!(h.controller.is_tick_pending());
        }
        assert!(h.dispatch.submitted().is_empty());

        h.camera.set_frame(Some(frame(640, 480, 7)));
        assert_eq!(
            h.controller.pump().tick,
            Some(TickOutcome::Submitted { frame_index: 7 })
        );
    }

    #[test]
    fn test_busy_detector_still_reschedules() {
        let mut h = active_harness();
        h.dispatch.set_busy(true);
        assert_eq!(h.controller.pump().tick, Some(TickOutcome::DetectorBusy));
        assert!(h.controller.is_tick_pending());
    }

    #[test]
    fn test_one_tick_per_pump() {
        let mut h = active_harness();
        for _ in 0..4 {
            h.controller.pump();
        }
        assert_eq!(h.dispatch.submitted().len(), 4);
        assert_eq!(h.controller.capture().ticks(), 4);
    }

    // --- stop ---

    #[test]
    fn test_stop_leaves_clean_state() {
        let mut h = active_harness();
        h.controller.pump();
        h.dispatch.resolve(0, Ok(vec![face(0.0, 0.0, 100.0, 100.0)]));
        h.controller.pump();
        assert!(!h.canvas.is_blank());

        h.controller.stop();

        assert_eq!(h.controller.state(), SessionState::Ready);
        assert!(h.canvas.is_blank());
        assert_eq!(h.camera.live_tracks(), 0);
        assert_eq!(h.controller.active_tracks(), 0);
        assert!(!h.controller.is_camera_active());
        assert!(!h.controller.is_tick_pending());

        let submitted = h.dispatch.submitted().len();
        for _ in 0..5 {
            assert_eq!(h.controller.pump().tick, None);
        }
        assert_eq!(h.dispatch.submitted().len(), submitted);
    }

    #[test]
    fn test_late_detection_after_stop_draws_nothing() {
        let mut h = active_harness();
        h.controller.pump();
        h.controller.stop();
        h.canvas.clear_log();

        h.dispatch.resolve(0, Ok(vec![face(0.0, 0.0, 100.0, 100.0)]));
        let report = h.controller.pump();

        assert_eq!(report.outcomes_discarded, 1);
        assert_eq!(report.overlays_drawn, 0);
        assert!(h.canvas.ops().is_empty());
        assert!(h.canvas.is_blank());
    }

    #[test]
    fn test_late_detection_after_restart_is_discarded() {
        let mut h = active_harness();
        h.controller.pump();
        h.controller.stop();
        h.controller.start().unwrap();
        assert_eq!(h.controller.generation(), 2);

        h.dispatch.resolve(0, Ok(vec![face(0.0, 0.0, 100.0, 100.0)]));
        let report = h.controller.pump();
        assert_eq!(report.outcomes_discarded, 1);
        assert!(h.canvas.draws().is_empty());
    }

    #[test]
    fn test_stop_when_not_active_is_noop() {
        let mut h = harness();
        h.controller.stop();
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(h.canvas.ops().is_empty());
    }

    #[test]
    fn test_stop_twice_is_harmless() {
        let mut h = active_harness();
        h.controller.stop();
        h.controller.stop();
        assert_eq!(h.controller.state(), SessionState::Ready);
    }

    #[test]
    fn test_toggle_starts_and_stops() {
        let mut h = harness();
        h.controller.load_model().unwrap();
        pump_until_loaded(&mut h.controller);

        h.controller.toggle().unwrap();
        assert_eq!(h.controller.state(), SessionState::Active);
        h.controller.toggle().unwrap();
        assert_eq!(h.controller.state(), SessionState::Ready);
        assert_eq!(h.camera.live_tracks(), 0);
    }

    // --- teardown ---

    #[test]
    fn test_drop_releases_camera_without_stop() {
        let h = active_harness();
        let camera = h.camera.clone();
        assert_eq!(camera.live_tracks(), 1);
        drop(h);
        assert_eq!(camera.live_tracks(), 0);
    }

    #[test]
    fn test_close_releases_camera() {
        let h = active_harness();
        assert_eq!(h.camera.live_tracks(), 1);
        h.controller.close();
        assert_eq!(h.camera.live_tracks(), 0);
    }

    #[test]
    fn test_pending_asset_draws_nothing_without_error() {
        let dispatch = ManualDispatch::new();
        let camera = StubCamera::with_frame(frame(640, 480, 0));
        let canvas = RecordingCanvas::new(640, 480);
        let mut controller = SessionController::new(
            Box::new(StubLoader::succeeding(dispatch.clone())),
            Box::new(camera),
            capture_loop(OverlayAsset::pending()),
            Box::new(canvas.clone()),
        );
        controller.load_model().unwrap();
        pump_until_loaded(&mut controller);
        controller.start().unwrap();
        controller.pump();

        dispatch.resolve(0, Ok(vec![face(0.0, 0.0, 100.0, 100.0)]));
        let report = controller.pump();
        assert_eq!(report.overlays_drawn, 0);
        assert!(canvas.draws().is_empty());
        assert!(controller.error_message().is_none());
    }
}
