pub mod blazeface_model_loader;
pub mod execution_provider;
pub mod model_resolver;
pub mod onnx_blazeface_detector;
pub mod threaded_detection_dispatch;
