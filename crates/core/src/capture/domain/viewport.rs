/// The area the video is displayed in, in render-surface pixels.
///
/// Queried every tick; the render surface is resized to match.
pub trait Viewport: Send {
    fn display_size(&self) -> (u32, u32);
}

/// A viewport whose size never changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedViewport {
    width: u32,
    height: u32,
}

impl FixedViewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Viewport for FixedViewport {
    fn display_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
