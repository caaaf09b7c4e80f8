pub mod image_asset_loader;
pub mod rgba_canvas;
pub mod snapshot_writer;
