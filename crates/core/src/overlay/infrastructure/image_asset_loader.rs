use std::path::{Path, PathBuf};
use std::thread;

use image::RgbaImage;

use crate::overlay::domain::overlay_asset::OverlayAsset;

/// Decodes an overlay image file into RGBA.
pub fn decode(path: &Path) -> Result<RgbaImage, Box<dyn std::error::Error + Send + Sync>> {
    let img = image::open(path)?.to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(format!("Overlay image {} is empty", path.display()).into());
    }
    Ok(img)
}

/// Starts decoding `path` on a background thread and returns the pending
/// asset immediately.
///
/// The asset becomes loaded when decoding finishes. A failed decode is
/// logged and leaves the asset pending for good, so overlays are simply never
/// drawn.
pub fn load_in_background(path: PathBuf) -> (OverlayAsset, thread::JoinHandle<()>) {
    let asset = OverlayAsset::pending();
    let slot = asset.clone();
    let handle = thread::spawn(move || match decode(&path) {
        Ok(img) => {
            log::info!(
                "Overlay image loaded: {} ({}x{})",
                path.display(),
                img.width(),
                img.height()
            );
            slot.complete(img);
        }
        Err(e) => {
            log::warn!("Failed to load overlay image {}: {e}", path.display());
        }
    });
    (asset, handle)
}
