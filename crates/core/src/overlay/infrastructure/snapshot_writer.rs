use std::path::{Path, PathBuf};

use image::RgbaImage;

/// Writes render-surface snapshots to PNG files using the `image` crate.
pub struct SnapshotWriter {
    dir: PathBuf,
    prefix: String,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "snapshot".to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Target path for the snapshot taken at presentation tick `tick`.
    pub fn path_for(&self, tick: u64) -> PathBuf {
        self.dir.join(format!("{}_{tick:06}.png", self.prefix))
    }

    /// Saves `image` for `tick` and returns where it landed.
    pub fn write(
        &self,
        tick: u64,
        image: &RgbaImage,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = self.path_for(tick);
        write_png(&path, image)?;
        Ok(path)
    }
}

/// Saves `image` to `path`, creating parent directories as needed.
pub fn write_png(path: &Path, image: &RgbaImage) -> Result<(), Box<dyn std::error::Error>> {
    if image.width() == 0 || image.height() == 0 {
        return Err("Cannot write an empty snapshot".into());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    image.save_with_format(path, image::ImageFormat::Png)?;
    log::debug!("Wrote snapshot {}", path.display());
    Ok(())
}
