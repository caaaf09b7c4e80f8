use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_HEIGHT_MULTIPLIER, DEFAULT_VERTICAL_OFFSET_FRACTION, DEFAULT_WIDTH_MULTIPLIER,
};
use crate::shared::face_region::FaceRegion;

/// Native video resolution divided by the displayed surface resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleFactors {
    pub scale_x: f64,
    pub scale_y: f64,
}

impl ScaleFactors {
    pub fn new(scale_x: f64, scale_y: f64) -> Self {
        Self { scale_x, scale_y }
    }

    /// Scale from `native` (video pixels) to `display` (surface pixels).
    ///
    /// A zero-extent display yields infinite factors; [`CoordinateMapper`]
    /// rejects those the same way it rejects zero.
    pub fn between(native: (u32, u32), display: (u32, u32)) -> Self {
        Self {
            scale_x: native.0 as f64 / display.0 as f64,
            scale_y: native.1 as f64 / display.1 as f64,
        }
    }

    pub fn is_usable(&self) -> bool {
        usable(self.scale_x) && usable(self.scale_y)
    }
}

fn usable(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}

/// Overlay placement relative to the face box, expressed in face units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayGeometry {
    pub width_multiplier: f64,
    pub height_multiplier: f64,
    /// Extra horizontal shift as a fraction of face width, applied after
    /// centering the overlay over the face.
    pub horizontal_offset_fraction: f64,
    /// Downward shift from the face top as a fraction of face height.
    pub vertical_offset_fraction: f64,
}

impl Default for OverlayGeometry {
    fn default() -> Self {
        Self {
            width_multiplier: DEFAULT_WIDTH_MULTIPLIER,
            height_multiplier: DEFAULT_HEIGHT_MULTIPLIER,
            horizontal_offset_fraction: 0.0,
            vertical_offset_fraction: DEFAULT_VERTICAL_OFFSET_FRACTION,
        }
    }
}

/// Where the overlay lands on the render surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum GeometryDegenerate {
    #[error("unusable scale factors ({scale_x}, {scale_y})")]
    Scale { scale_x: f64, scale_y: f64 },
    #[error("face region has no extent ({width} x {height})")]
    EmptyFace { width: f64, height: f64 },
}

/// Maps face boxes from native video pixels into render-surface rectangles.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CoordinateMapper {
    geometry: OverlayGeometry,
}

impl CoordinateMapper {
    pub fn new(geometry: OverlayGeometry) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &OverlayGeometry {
        &self.geometry
    }

    /// Computes the overlay rectangle for one face.
    ///
    /// Pure: identical inputs always produce identical output. Each face is
    /// mapped independently of any other face in the frame.
    pub fn map(
        &self,
        region: &FaceRegion,
        scale: ScaleFactors,
    ) -> Result<RenderRect, GeometryDegenerate> {
        if !scale.is_usable() {
            return Err(GeometryDegenerate::Scale {
                scale_x: scale.scale_x,
                scale_y: scale.scale_y,
            });
        }

        let face_w = region.width() / scale.scale_x;
        let face_h = region.height() / scale.scale_y;
        if !(face_w > 0.0 && face_h > 0.0) {
            return Err(GeometryDegenerate::EmptyFace {
                width: face_w,
                height: face_h,
            });
        }

        let g = &self.geometry;
        let width = face_w * g.width_multiplier;
        let height = face_h * g.height_multiplier;
        let x = region.top_left.0 / scale.scale_x - (width - face_w) / 2.0
            + face_w * g.horizontal_offset_fraction;
        let y = region.top_left.1 / scale.scale_y + face_h * g.vertical_offset_fraction;

        Ok(RenderRect {
            x,
            y,
            width,
            height,
        })
    }

    /// Maps every face, dropping the ones with degenerate geometry.
    pub fn map_all(&self, regions: &[FaceRegion], scale: ScaleFactors) -> Vec<RenderRect> {
        regions
            .iter()
            .filter_map(|r| match self.map(r, scale) {
                Ok(rect) => Some(rect),
                Err(e) => {
                    log::debug!("Skipping overlay: {e}");
                    None
                }
            })
            .collect()
    }
}
