use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

use crate::overlay::domain::canvas::Canvas;
use crate::overlay::domain::coordinate_mapper::RenderRect;
use crate::shared::frame::Frame;

/// Overlays larger than this (per side, in pixels) are skipped rather than
/// resampled.
const MAX_OVERLAY_SIDE: f64 = 8192.0;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// In-memory RGBA render surface backed by an [`RgbaImage`].
pub struct RgbaCanvas {
    image: RgbaImage,
}

impl RgbaCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    /// True when every pixel is fully transparent.
    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|p| p.0[3] == 0)
    }
}

impl Canvas for RgbaCanvas {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbaImage::new(width, height);
        }
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = TRANSPARENT;
        }
    }

    fn draw_frame(&mut self, frame: &Frame) {
        let (dst_w, dst_h) = self.image.dimensions();
        if dst_w == 0 || dst_h == 0 || !frame.has_valid_dimensions() || frame.channels() < 3 {
            return;
        }

        let src = frame.as_ndarray();
        let src_w = frame.width() as usize;
        let src_h = frame.height() as usize;

        // Nearest-neighbour stretch; the surface is redrawn every tick.
        for y in 0..dst_h {
            let src_y = (((y as f64 + 0.5) * src_h as f64 / dst_h as f64) as usize).min(src_h - 1);
            for x in 0..dst_w {
                let src_x =
                    (((x as f64 + 0.5) * src_w as f64 / dst_w as f64) as usize).min(src_w - 1);
                self.image.put_pixel(
                    x,
                    y,
                    Rgba([
                        src[[src_y, src_x, 0]],
                        src[[src_y, src_x, 1]],
                        src[[src_y, src_x, 2]],
                        255,
                    ]),
                );
            }
        }
    }

    fn draw_image(&mut self, image: &RgbaImage, rect: &RenderRect) {
        let width = rect.width.round();
        let height = rect.height.round();
        if !(rect.x.is_finite() && rect.y.is_finite()) {
            return;
        }
        if !(1.0..=MAX_OVERLAY_SIDE).contains(&width) || !(1.0..=MAX_OVERLAY_SIDE).contains(&height)
        {
            return;
        }

        let scaled = image::imageops::resize(image, width as u32, height as u32, FilterType::Triangle);
        image::imageops::overlay(
            &mut self.image,
            &scaled,
            rect.x.round() as i64,
            rect.y.round() as i64,
        );
    }

    fn to_image(&self) -> RgbaImage {
        self.image.clone()
    }
}
