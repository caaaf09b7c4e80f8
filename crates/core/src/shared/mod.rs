pub mod constants;
pub mod face_region;
pub mod frame;
pub mod settings;
