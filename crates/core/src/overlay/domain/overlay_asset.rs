use std::sync::{Arc, OnceLock};

use image::RgbaImage;

/// The single static overlay image, shared read-only by every tick.
///
/// Decoding may still be in progress when the first frame is drawn, so
/// readers must check [`OverlayAsset::is_loaded`] (or use
/// [`OverlayAsset::image`]) before every draw. Once set the image never
/// changes.
#[derive(Clone, Debug, Default)]
pub struct OverlayAsset {
    slot: Arc<OnceLock<RgbaImage>>,
}

impl OverlayAsset {
    /// An asset whose image has not been decoded yet.
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn ready(image: RgbaImage) -> Self {
        let asset = Self::pending();
        asset.complete(image);
        asset
    }

    /// Publishes the decoded image. Returns `false` if already loaded, in
    /// which case the existing image is kept.
    pub fn complete(&self, image: RgbaImage) -> bool {
        self.slot.set(image).is_ok()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.slot.get()
    }
}
