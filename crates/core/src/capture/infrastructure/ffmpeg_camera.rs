use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender};

use crate::capture::domain::camera_provider::{CameraAccessError, CameraProvider, StreamRequest};
use crate::capture::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;

/// How long `acquire` waits for the device to open before giving up.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Where an [`FfmpegCameraProvider`] reads video from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraSource {
    /// Platform capture device. `None` picks the platform default.
    Device(Option<String>),
    /// Video file replayed at its native frame rate, standing in for a camera.
    File(PathBuf),
}

/// Acquires live streams through libavdevice (or a video file) via
/// ffmpeg-next.
///
/// Each acquired stream decodes on its own capture thread and publishes the
/// latest frame; the render loop only ever reads the newest one.
pub struct FfmpegCameraProvider {
    source: CameraSource,
    open_timeout: Duration,
}

impl FfmpegCameraProvider {
    pub fn new(source: CameraSource) -> Self {
        Self {
            source,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
        }
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }
}

impl CameraProvider for FfmpegCameraProvider {
    fn acquire(
        &mut self,
        request: &StreamRequest,
    ) -> Result<Box<dyn FrameSource>, CameraAccessError> {
        let source = match (&self.source, &request.device) {
            (CameraSource::Device(_), Some(device)) => CameraSource::Device(Some(device.clone())),
            (source, _) => source.clone(),
        };
        // libavdevice has no notion of facing; the preference is advisory.
        log::debug!("Acquiring {} camera from {:?}", request.facing, source);

        let stream = FfmpegCameraStream::open(source, self.open_timeout)?;
        Ok(Box::new(stream))
    }
}

/// Stream parameters reported by the capture thread once the input is open.
#[derive(Clone, Copy, Debug)]
struct StreamInfo {
    width: u32,
    height: u32,
    fps: f64,
}

type LatestFrame = Arc<Mutex<Option<Arc<Frame>>>>;

/// A running capture thread plus the slot it publishes frames into.
pub struct FfmpegCameraStream {
    latest: LatestFrame,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FfmpegCameraStream {
    fn open(source: CameraSource, timeout: Duration) -> Result<Self, CameraAccessError> {
        let latest: LatestFrame = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let (open_tx, open_rx) = bounded(1);

        let thread_latest = latest.clone();
        let thread_running = running.clone();
        // ffmpeg contexts are not Send, so the input is opened on the thread
        // that decodes it.
        let handle = thread::Builder::new()
            .name("shadecam-capture".into())
            .spawn(move || capture_thread(source, thread_latest, thread_running, open_tx))
            .map_err(|e| CameraAccessError::Open(e.to_string()))?;

        match open_rx.recv_timeout(timeout) {
            Ok(Ok(info)) => {
                log::info!(
                    "Camera stream opened: {}x{} @ {:.2} fps",
                    info.width,
                    info.height,
                    info.fps
                );
                Ok(Self {
                    latest,
                    running,
                    handle: Some(handle),
                })
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                // The thread may still be blocked inside the open call; it
                // exits on its own once that returns.
                running.store(false, Ordering::SeqCst);
                Err(CameraAccessError::Open(format!(
                    "timed out after {:?} waiting for the device",
                    timeout
                )))
            }
        }
    }
}

impl FrameSource for FfmpegCameraStream {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.handle.is_some() && self.running.load(Ordering::SeqCst))
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Camera capture thread panicked");
            }
            *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = None;
            log::info!("Camera stream stopped");
        }
    }
}

impl Drop for FfmpegCameraStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_thread(
    source: CameraSource,
    latest: LatestFrame,
    running: Arc<AtomicBool>,
    open_tx: Sender<Result<StreamInfo, CameraAccessError>>,
) {
    let mut capture = match Capture::open(&source) {
        Ok(capture) => capture,
        Err(e) => {
            let _ = open_tx.send(Err(e));
            return;
        }
    };
    if open_tx.send(Ok(capture.info())).is_err() {
        return;
    }

    // Devices deliver in real time; files are paced to their frame rate.
    let interval = match source {
        CameraSource::File(_) if capture.fps > 0.0 => Some(Duration::from_secs_f64(1.0 / capture.fps)),
        _ => None,
    };
    let started = Instant::now();

    while running.load(Ordering::SeqCst) {
        match capture.next_frame() {
            Ok(Some(frame)) => {
                if let Some(interval) = interval {
                    let due = started + interval.mul_f64(frame.index() as f64);
                    let now = Instant::now();
                    if due > now {
                        thread::sleep(due - now);
                    }
                }
                *latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(frame));
            }
            Ok(None) => {
                log::info!("Camera stream reached end of input");
                break;
            }
            Err(e) => {
                log::warn!("Camera decode failed: {e}");
                break;
            }
        }
    }
    // The track is over once decoding ends, whoever ended it.
    running.store(false, Ordering::SeqCst);
}

/// Demuxer, decoder and RGB converter for one open input.
struct Capture {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    video_stream_index: usize,
    fps: f64,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl Capture {
    fn open(source: &CameraSource) -> Result<Self, CameraAccessError> {
        ffmpeg_next::init().map_err(|e| CameraAccessError::Open(e.to_string()))?;

        let (ictx, target) = match source {
            CameraSource::File(path) => {
                let target = path.display().to_string();
                let ictx = ffmpeg_next::format::input(path)
                    .map_err(|e| map_open_error(e, &target))?;
                (ictx, target)
            }
            CameraSource::Device(device) => open_device(device.as_deref())?,
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CameraAccessError::NoDevice(format!("{target} (no video stream)")))?;

        let video_stream_index = stream.index();
        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| CameraAccessError::Open(format!("{target}: {e}")))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| CameraAccessError::Open(format!("{target}: {e}")))?;

        Ok(Self {
            ictx,
            decoder,
            scaler: None,
            video_stream_index,
            fps,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn info(&self) -> StreamInfo {
        StreamInfo {
            width: self.decoder.width(),
            height: self.decoder.height(),
            fps: self.fps,
        }
    }

    /// Decodes the next frame, or `None` once the input is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, ffmpeg_next::Error> {
        if self.done {
            return Ok(None);
        }
        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }
        if self.flushing {
            self.done = true;
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(frame) = self.try_receive()? {
                    return Ok(Some(frame));
                }
                self.done = true;
                return Ok(None);
            };

            if stream.index() != self.video_stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, ffmpeg_next::Error> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let width = decoded.width();
        let height = decoded.height();
        let stale = self
            .scaler
            .as_ref()
            .map_or(true, |s| s.input().width != width || s.input().height != height);
        if stale {
            // Device streams may only report their pixel format once data
            // flows, so the converter is built from the first decoded frame.
            self.scaler = Some(ffmpeg_next::software::scaling::Context::get(
                decoded.format(),
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )?);
        }
        let Some(scaler) = self.scaler.as_mut() else {
            return Ok(None);
        };

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&decoded, &mut rgb_frame)?;

        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        let frame = Frame::new(pixels, width, height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

/// Input format and default device name for this platform.
fn platform_device() -> Option<(&'static str, Option<&'static str>)> {
    if cfg!(target_os = "linux") {
        Some(("video4linux2", Some("/dev/video0")))
    } else if cfg!(target_os = "macos") {
        Some(("avfoundation", Some("0")))
    } else if cfg!(target_os = "windows") {
        Some(("dshow", None))
    } else {
        None
    }
}

fn open_device(
    device: Option<&str>,
) -> Result<(ffmpeg_next::format::context::Input, String), CameraAccessError> {
    let Some((format_name, default_device)) = platform_device() else {
        return Err(CameraAccessError::Unsupported(
            "no capture backend for this platform".into(),
        ));
    };
    let Some(name) = device.or(default_device) else {
        return Err(CameraAccessError::Unsupported(format!(
            "{format_name} needs an explicit device name"
        )));
    };

    ffmpeg_next::device::register_all();
    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name().split(',').any(|n| n == format_name))
        .ok_or_else(|| {
            CameraAccessError::Unsupported(format!("ffmpeg was built without {format_name}"))
        })?;

    let mut options = ffmpeg_next::Dictionary::new();
    if format_name == "avfoundation" {
        options.set("framerate", "30");
    }

    let ctx = ffmpeg_next::format::open_with(
        name,
        &ffmpeg_next::format::format::Format::Input(format),
        options,
    )
    .map_err(|e| map_open_error(e, name))?;
    Ok((ctx.input(), name.to_string()))
}

/// Classifies an open failure by its OS error code.
fn map_open_error(err: ffmpeg_next::Error, target: &str) -> CameraAccessError {
    if let ffmpeg_next::Error::Other { errno } = err {
        match std::io::Error::from_raw_os_error(errno).kind() {
            std::io::ErrorKind::PermissionDenied => {
                return CameraAccessError::PermissionDenied(target.to_string())
            }
            std::io::ErrorKind::NotFound => return CameraAccessError::NoDevice(target.to_string()),
            _ => {}
        }
    }
    CameraAccessError::Open(format!("{target}: {err}"))
}

fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
