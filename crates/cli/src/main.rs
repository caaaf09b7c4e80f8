use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use shadecam_core::capture::domain::camera_provider::{CameraProvider, StreamRequest};
use shadecam_core::capture::domain::viewport::FixedViewport;
use shadecam_core::capture::infrastructure::ffmpeg_camera::{CameraSource, FfmpegCameraProvider};
use shadecam_core::capture::infrastructure::still_image_camera::StillImageCameraProvider;
use shadecam_core::detection::infrastructure::blazeface_model_loader::BlazefaceModelLoader;
use shadecam_core::overlay::domain::coordinate_mapper::CoordinateMapper;
use shadecam_core::overlay::domain::overlay_renderer::{CompositeMode, OverlayRenderer};
use shadecam_core::overlay::infrastructure::image_asset_loader;
use shadecam_core::overlay::infrastructure::rgba_canvas::RgbaCanvas;
use shadecam_core::overlay::infrastructure::snapshot_writer::SnapshotWriter;
use shadecam_core::session::capture_loop::CaptureLoop;
use shadecam_core::session::session_controller::SessionController;
use shadecam_core::session::session_logger::LogSessionLogger;
use shadecam_core::session::session_state::SessionState;
use shadecam_core::shared::constants::IMAGE_EXTENSIONS;
use shadecam_core::shared::settings::Settings;

/// Summary log cadence, in ticks.
const LOG_THROTTLE_TICKS: u64 = 60;

/// Live virtual sunglasses over a camera, video file or still image.
#[derive(Parser)]
#[command(name = "shadecam")]
struct Cli {
    /// Capture device name (platform default when omitted).
    #[arg(long, conflicts_with_all = ["video", "image"])]
    device: Option<String>,

    /// Replay a video file instead of opening a camera.
    #[arg(long, conflicts_with = "image")]
    video: Option<PathBuf>,

    /// Use a still image as the camera.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Overlay image (PNG with alpha).
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Face detection model file. Resolved from the model cache otherwise.
    #[arg(long)]
    model: Option<PathBuf>,

    /// URL to download the model from when it is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// Settings file (JSON). Defaults to the platform config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Composite mode: overlay-only or frame-plus-overlay.
    #[arg(long)]
    composite_mode: Option<String>,

    /// Render surface size as WIDTHxHEIGHT.
    #[arg(long)]
    display: Option<String>,

    /// Presentation rate the session is pumped at.
    #[arg(long)]
    fps: Option<f64>,

    /// Number of ticks to run before stopping.
    #[arg(long, default_value = "300")]
    frames: u64,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Write rendered surfaces to this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Write a snapshot every Nth tick.
    #[arg(long, default_value = "30")]
    snapshot_every: u64,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let settings = effective_settings(&cli)?;
    validate_settings(&settings)?;

    let overlay_path = settings
        .overlay_image
        .clone()
        .ok_or("An overlay image is required (--overlay or overlay_image in settings)")?;
    let (asset, _decode) = image_asset_loader::load_in_background(overlay_path);

    let (display_w, display_h) = settings.display_size();
    let capture = CaptureLoop::new(
        CoordinateMapper::new(settings.geometry),
        OverlayRenderer::new(asset, settings.composite_mode),
        Box::new(FixedViewport::new(display_w, display_h)),
        Box::new(LogSessionLogger::new(LOG_THROTTLE_TICKS)),
    );

    let mut request = StreamRequest::front_facing();
    if let Some(device) = &settings.camera_device {
        request = request.with_device(device.clone());
    }

    let mut controller = SessionController::new(
        Box::new(build_loader(&settings)),
        open_camera(&cli),
        capture,
        Box::new(RgbaCanvas::new(display_w, display_h)),
    )
    .with_stream_request(request);

    controller.load_model()?;
    while controller.state() == SessionState::Loading {
        controller.pump();
        thread::sleep(Duration::from_millis(10));
    }
    eprintln!();
    if let Some(message) = controller.error_message() {
        return Err(message.into());
    }

    controller.start()?;
    let snapshots = cli.snapshot_dir.as_ref().map(SnapshotWriter::new);
    let period = Duration::from_secs_f64(1.0 / settings.presentation_fps);
    let mut ticks = 0u64;
    let mut faces = 0usize;

    while ticks < cli.frames {
        let started = Instant::now();
        let report = controller.pump();
        faces += report.overlays_drawn;

        if report.tick.is_some() {
            ticks += 1;
            eprint!("\rProcessing tick {ticks}/{}", cli.frames);
            if let Some(writer) = &snapshots {
                if ticks % cli.snapshot_every == 0 {
                    let path = writer.write(ticks, &controller.canvas().to_image())?;
                    log::debug!("Snapshot written to {}", path.display());
                }
            }
        }

        if let Some(rest) = period.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }
    eprintln!();

    controller.stop();
    controller.close();
    log::info!("Drew {faces} overlay(s) over {ticks} tick(s)");
    Ok(())
}

/// Settings from disk with command-line flags layered on top.
fn effective_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::load_default()?,
    };

    if let Some(overlay) = &cli.overlay {
        settings.overlay_image = Some(overlay.clone());
    }
    if let Some(model) = &cli.model {
        settings.model_path = Some(model.clone());
    }
    if let Some(url) = &cli.model_url {
        settings.model_url = Some(url.clone());
    }
    if let Some(device) = &cli.device {
        settings.camera_device = Some(device.clone());
    }
    if let Some(mode) = &cli.composite_mode {
        settings.composite_mode = parse_composite_mode(mode)?;
    }
    if let Some(display) = &cli.display {
        let (w, h) = parse_display(display)?;
        settings.display_width = w;
        settings.display_height = h;
    }
    if let Some(fps) = cli.fps {
        settings.presentation_fps = fps;
    }
    if let Some(confidence) = cli.confidence {
        settings.confidence = confidence;
    }
    Ok(settings)
}

fn build_loader(settings: &Settings) -> BlazefaceModelLoader {
    let mut loader = BlazefaceModelLoader::new()
        .with_confidence(settings.confidence)
        .with_max_in_flight(settings.max_in_flight)
        .with_progress(Box::new(download_progress));
    if let Some(path) = &settings.model_path {
        loader = loader.with_model_path(path);
    }
    if let Some(url) = &settings.model_url {
        loader = loader.with_model_url(url);
    }
    loader
}

fn open_camera(cli: &Cli) -> Box<dyn CameraProvider> {
    if let Some(image) = &cli.image {
        Box::new(StillImageCameraProvider::new(image))
    } else if let Some(video) = &cli.video {
        Box::new(FfmpegCameraProvider::new(CameraSource::File(video.clone())))
    } else {
        Box::new(FfmpegCameraProvider::new(CameraSource::Device(None)))
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(video) = &cli.video {
        if !video.exists() {
            return Err(format!("Input file not found: {}", video.display()).into());
        }
    }
    if let Some(image) = &cli.image {
        if !image.exists() {
            return Err(format!("Input file not found: {}", image.display()).into());
        }
        if !is_image(image) {
            return Err(format!("Not a supported image: {}", image.display()).into());
        }
    }
    if let Some(overlay) = &cli.overlay {
        if !overlay.exists() {
            return Err(format!("Overlay image not found: {}", overlay.display()).into());
        }
    }
    if let Some(confidence) = cli.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(
                format!("Confidence must be between 0.0 and 1.0, got {confidence}").into(),
            );
        }
    }
    if let Some(fps) = cli.fps {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(format!("FPS must be a positive number, got {fps}").into());
        }
    }
    if cli.snapshot_every == 0 {
        return Err("Snapshot interval must be at least 1".into());
    }
    Ok(())
}

/// Checks values that may come from the settings file rather than flags.
fn validate_settings(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let fps = settings.presentation_fps;
    if !(fps.is_finite() && fps > 0.0) {
        return Err(format!("FPS must be a positive number, got {fps}").into());
    }
    if !(0.0..=1.0).contains(&settings.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            settings.confidence
        )
        .into());
    }
    if settings.display_width == 0 || settings.display_height == 0 {
        return Err(format!(
            "Display size must be non-zero, got {}x{}",
            settings.display_width, settings.display_height
        )
        .into());
    }
    if settings.max_in_flight == 0 {
        return Err("Max in-flight detections must be at least 1".into());
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn parse_composite_mode(mode: &str) -> Result<CompositeMode, String> {
    match mode {
        "overlay-only" => Ok(CompositeMode::OverlayOnly),
        "frame-plus-overlay" => Ok(CompositeMode::FramePlusOverlay),
        other => Err(format!(
            "Composite mode must be 'overlay-only' or 'frame-plus-overlay', got '{other}'"
        )),
    }
}

fn parse_display(display: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("Display size must look like 640x360, got '{display}'");
    let (w, h) = display.split_once(['x', 'X']).ok_or_else(invalid)?;
    let w: u32 = w.trim().parse().map_err(|_| invalid())?;
    let h: u32 = h.trim().parse().map_err(|_| invalid())?;
    if w == 0 || h == 0 {
        return Err(invalid());
    }
    Ok((w, h))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
