//! Real-time face detection to overlay pipeline.
//!
//! A [`session::session_controller::SessionController`] acquires a camera
//! stream, submits each presented frame to a face detector and composites a
//! static overlay image (sunglasses) over every detected face.

pub mod capture;
pub mod detection;
pub mod overlay;
pub mod session;
pub mod shared;
