use std::sync::Arc;

use crate::shared::frame::Frame;

/// Domain interface for a live video stream.
///
/// Implementations are owned exclusively by the session while it is active
/// and are polled once per presentation tick from the render thread.
pub trait FrameSource: Send {
    /// The most recent decoded frame, or `None` before the first one arrives.
    fn current_frame(&self) -> Option<Arc<Frame>>;

    /// Whether the stream has decoded data with known, non-zero dimensions.
    fn is_ready(&self) -> bool {
        self.current_frame()
            .is_some_and(|frame| frame.has_valid_dimensions())
    }

    /// Native resolution of the stream as `(width, height)`.
    fn native_size(&self) -> Option<(u32, u32)> {
        self.current_frame().map(|frame| frame.size())
    }

    /// Number of underlying tracks still producing data.
    fn active_tracks(&self) -> usize;

    /// Stops every track. Idempotent.
    fn stop(&mut self);
}
