pub mod camera_provider;
pub mod frame_source;
pub mod viewport;
