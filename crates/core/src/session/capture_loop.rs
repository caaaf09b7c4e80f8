use std::time::Instant;

use crate::capture::domain::frame_source::FrameSource;
use crate::capture::domain::viewport::Viewport;
use crate::detection::domain::detection_dispatch::{
    DetectionDispatch, DetectionOutcome, DetectionRequest, SubmitRejected,
};
use crate::detection::domain::detection_service::DetectionError;
use crate::overlay::domain::canvas::Canvas;
use crate::overlay::domain::coordinate_mapper::{CoordinateMapper, ScaleFactors};
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::session::session_logger::SessionLogger;

/// What a single presentation tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No decodable frame yet; nothing was drawn or submitted.
    NotReady,
    /// The frame was handed to detection.
    Submitted { frame_index: usize },
    /// Detection is saturated; this frame was skipped.
    DetectorBusy,
    /// The detector is gone; treated like a frame with no faces.
    DetectorUnavailable,
}

/// What applying one detection outcome did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// Number of overlays drawn (zero on detection failure).
    Drawn(usize),
    /// The outcome belongs to a closed capture generation.
    Discarded,
}

/// Per-tick work of an active session: frame readiness, surface sizing,
/// clearing and detection submission; then drawing outcomes as they arrive.
///
/// Each session start opens a new generation with [`begin`](Self::begin);
/// outcomes tagged with any other generation are discarded.
pub struct CaptureLoop {
    mapper: CoordinateMapper,
    renderer: OverlayRenderer,
    viewport: Box<dyn Viewport>,
    logger: Box<dyn SessionLogger>,
    scale: Option<ScaleFactors>,
    active_generation: Option<u64>,
    ticks: u64,
}

impl CaptureLoop {
    pub fn new(
        mapper: CoordinateMapper,
        renderer: OverlayRenderer,
        viewport: Box<dyn Viewport>,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        Self {
            mapper,
            renderer,
            viewport,
            logger,
            scale: None,
            active_generation: None,
            ticks: 0,
        }
    }

    pub fn begin(&mut self, generation: u64) {
        self.active_generation = Some(generation);
        self.scale = None;
        self.ticks = 0;
        self.logger.reset();
    }

    /// Closes the current generation. Outcomes still in flight will be
    /// discarded when they arrive.
    pub fn end(&mut self) {
        if self.active_generation.take().is_some() {
            self.logger.summary();
        }
        self.scale = None;
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.active_generation
    }

    /// Scale factors computed on the most recent ready tick.
    pub fn scale(&self) -> Option<ScaleFactors> {
        self.scale
    }

    pub fn renderer(&self) -> &OverlayRenderer {
        &self.renderer
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn tick(
        &mut self,
        source: &dyn FrameSource,
        dispatch: &mut dyn DetectionDispatch,
        canvas: &mut dyn Canvas,
    ) -> TickOutcome {
        let Some(generation) = self.active_generation else {
            return TickOutcome::NotReady;
        };
        self.ticks += 1;
        self.logger.tick(self.ticks);

        if !source.is_ready() {
            log::trace!("Tick {}: video not ready", self.ticks);
            return TickOutcome::NotReady;
        }
        let Some(frame) = source.current_frame() else {
            return TickOutcome::NotReady;
        };

        let (display_w, display_h) = self.viewport.display_size();
        canvas.resize(display_w, display_h);
        self.scale = Some(ScaleFactors::between(frame.size(), (display_w, display_h)));

        let started = Instant::now();
        self.renderer.begin_frame(canvas, &frame);
        self.logger
            .timing("clear", started.elapsed().as_secs_f64() * 1000.0);

        let frame_index = frame.index();
        match dispatch.submit(DetectionRequest { generation, frame }) {
            Ok(()) => TickOutcome::Submitted { frame_index },
            Err(SubmitRejected::Busy) => {
                log::trace!("Tick {}: detector busy, skipping frame {frame_index}", self.ticks);
                TickOutcome::DetectorBusy
            }
            Err(SubmitRejected::Disconnected) => {
                log::warn!("Face detection error: {}", DetectionError::Disconnected);
                self.logger.metric("faces", 0.0);
                TickOutcome::DetectorUnavailable
            }
        }
    }

    /// Draws the faces of `outcome` if it belongs to the active generation.
    pub fn apply(&mut self, outcome: DetectionOutcome, canvas: &mut dyn Canvas) -> Applied {
        if self.active_generation != Some(outcome.generation) {
            log::debug!(
                "Discarding detection for frame {} from closed generation {}",
                outcome.frame_index,
                outcome.generation
            );
            return Applied::Discarded;
        }
        self.logger
            .timing("detect", outcome.elapsed.as_secs_f64() * 1000.0);

        let regions = match outcome.result {
            Ok(regions) => regions,
            Err(e) => {
                log::warn!("Face detection error: {e}");
                Vec::new()
            }
        };
        self.logger.metric("faces", regions.len() as f64);

        let Some(scale) = self.scale else {
            return Applied::Drawn(0);
        };

        let started = Instant::now();
        let rects = self.mapper.map_all(&regions, scale);
        let drawn = self.renderer.draw_overlays(canvas, &rects);
        self.logger
            .timing("render", started.elapsed().as_secs_f64() * 1000.0);
        Applied::Drawn(drawn)
    }
}
