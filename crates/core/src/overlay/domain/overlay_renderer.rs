use std::fmt;

use serde::{Deserialize, Serialize};

use crate::overlay::domain::canvas::Canvas;
use crate::overlay::domain::coordinate_mapper::RenderRect;
use crate::overlay::domain::overlay_asset::OverlayAsset;
use crate::shared::frame::Frame;

/// How the render surface relates to the live video.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeMode {
    /// Transparent surface layered above a separately displayed video.
    #[default]
    OverlayOnly,
    /// The surface carries a copy of the frame with the overlay on top.
    FramePlusOverlay,
}

impl fmt::Display for CompositeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeMode::OverlayOnly => write!(f, "overlay-only"),
            CompositeMode::FramePlusOverlay => write!(f, "frame-plus-overlay"),
        }
    }
}

/// Draws the overlay asset into mapped rectangles on a [`Canvas`].
///
/// A frame is rendered in two steps: [`begin_frame`](Self::begin_frame)
/// wipes whatever the previous frame left behind (once, never per rect), then
/// [`draw_overlays`](Self::draw_overlays) paints one asset per rect.
pub struct OverlayRenderer {
    asset: OverlayAsset,
    mode: CompositeMode,
}

impl OverlayRenderer {
    pub fn new(asset: OverlayAsset, mode: CompositeMode) -> Self {
        Self { asset, mode }
    }

    pub fn mode(&self) -> CompositeMode {
        self.mode
    }

    pub fn asset(&self) -> &OverlayAsset {
        &self.asset
    }

    /// Clears prior-frame content and, in [`CompositeMode::FramePlusOverlay`],
    /// lays down `frame` as the base layer.
    pub fn begin_frame(&self, canvas: &mut dyn Canvas, frame: &Frame) {
        canvas.clear();
        if self.mode == CompositeMode::FramePlusOverlay {
            canvas.draw_frame(frame);
        }
    }

    /// Draws the asset into each rect in order and returns the number of draw
    /// calls issued. Issues none while the asset is still decoding.
    pub fn draw_overlays(&self, canvas: &mut dyn Canvas, rects: &[RenderRect]) -> usize {
        let Some(image) = self.asset.image() else {
            if !rects.is_empty() {
                log::debug!("Overlay image not yet loaded, skipping {} overlay(s)", rects.len());
            }
            return 0;
        };

        for rect in rects {
            canvas.draw_image(image, rect);
        }
        rects.len()
    }

    /// Blanks the whole surface.
    pub fn clear(&self, canvas: &mut dyn Canvas) {
        canvas.clear();
    }
}
