pub mod detection_dispatch;
pub mod detection_service;
pub mod model_loader;
