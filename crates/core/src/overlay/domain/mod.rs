pub mod canvas;
pub mod coordinate_mapper;
pub mod overlay_asset;
pub mod overlay_renderer;
