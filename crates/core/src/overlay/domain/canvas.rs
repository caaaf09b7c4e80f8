use image::RgbaImage;

use crate::overlay::domain::coordinate_mapper::RenderRect;
use crate::shared::frame::Frame;

/// Domain interface for the render surface the overlay is drawn onto.
///
/// Sized in render-space pixels, which may differ from the video's native
/// resolution. Only the render thread mutates it.
pub trait Canvas: Send {
    /// Current surface size as `(width, height)`.
    fn size(&self) -> (u32, u32);

    /// Resizes the surface. Changing the size discards existing content.
    fn resize(&mut self, width: u32, height: u32);

    /// Resets every pixel to fully transparent.
    fn clear(&mut self);

    /// Draws `frame` stretched over the whole surface.
    fn draw_frame(&mut self, frame: &Frame);

    /// Alpha-composites `image` scaled into `rect`. Parts outside the surface
    /// are clipped.
    fn draw_image(&mut self, image: &RgbaImage, rect: &RenderRect);

    /// Copies the current surface content.
    fn to_image(&self) -> RgbaImage;
}
