pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// Application directory name used under the platform cache/config dirs.
pub const APP_DIR_NAME: &str = "ShadeCam";

pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Overlay geometry relative to the detected face box.
pub const DEFAULT_WIDTH_MULTIPLIER: f64 = 1.1;
pub const DEFAULT_HEIGHT_MULTIPLIER: f64 = 0.5;
pub const DEFAULT_VERTICAL_OFFSET_FRACTION: f64 = 0.2;

/// Presentation rate used when the host does not report a refresh rate.
pub const DEFAULT_PRESENTATION_FPS: f64 = 60.0;

/// Detection requests allowed in flight before ticks skip submission.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 2;

pub const DEFAULT_DISPLAY_SIZE: (u32, u32) = (640, 360);

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// User-facing error strings.
pub const MODEL_LOAD_FAILED_MESSAGE: &str = "Failed to load face detection model";
pub const CAMERA_ACCESS_FAILED_MESSAGE: &str = "Failed to access camera";
