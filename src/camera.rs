// src/camera.rs

//! Camera session: owns one video stream at a time and turns the current
//! frame into a JPEG data URI.

use crate::error::{Result, SinkError};
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// JPEG quality, 0.8 on a 0-1 scale
pub const JPEG_QUALITY: u8 = 80;

pub const CAMERA_ERROR_MESSAGE: &str = "Failed to access camera. Please check permissions.";

/// A source of user-facing video streams.
pub trait CameraDevice {
    fn open(&mut self) -> Result<Box<dyn VideoStream>>;
}

/// A live stream. Frames come back at the stream's native resolution.
pub trait VideoStream: Send {
    fn read_frame(&mut self) -> Result<RgbImage>;

    /// Releases every underlying device track.
    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
}

pub struct CameraSession<D: CameraDevice> {
    device: D,
    stream: Option<Box<dyn VideoStream>>,
    last_error: Option<String>,
}

impl<D: CameraDevice> CameraSession<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            stream: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.stream.is_some() {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// 最近一次 start 失败的提示信息
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 打开摄像头。已有的流会先被释放。
    /// 失败时保持 Idle，错误写入 last_error，可以再次调用 start 重试。
    pub fn start(&mut self) -> Result<()> {
        self.stop();
        self.last_error = None;

        match self.device.open() {
            Ok(stream) => {
                self.stream = Some(stream);
                info!("Camera started");
                Ok(())
            }
            Err(e) => {
                error!("Camera error: {}", e);
                self.last_error = Some(CAMERA_ERROR_MESSAGE.to_string());
                Err(SinkError::Camera(CAMERA_ERROR_MESSAGE.to_string()))
            }
        }
    }

    /// Idle 时调用是空操作
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!("Camera stopped");
        }
    }

    /// 抓取当前帧并编码为 JPEG data URI。Idle 时返回 None，会话保持 Active。
    pub fn capture(&mut self) -> Result<Option<String>> {
        let Some(stream) = self.stream.as_mut() else {
            debug!("capture ignored, camera is idle");
            return Ok(None);
        };
        let frame = stream.read_frame()?;
        debug!("Captured {}x{} frame", frame.width(), frame.height());
        encode_jpeg_data_uri(&frame).map(Some)
    }
}

impl<D: CameraDevice> Drop for CameraSession<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Encodes a frame as `data:image/jpeg;base64,...` at [`JPEG_QUALITY`].
pub fn encode_jpeg_data_uri(frame: &RgbImage) -> Result<String> {
    let mut jpeg = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
        encoder.encode_image(frame)?;
    }
    let payload = base64::engine::general_purpose::STANDARD.encode(&jpeg);
    Ok(format!("data:image/jpeg;base64,{}", payload))
}

/// Largest accepted frame edge, in pixels.
pub const MAX_DIMENSION: u32 = 8192;

const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(SinkError::InvalidInput(format!(
            "frame size {}x{} out of range (1..={} per side)",
            width, height, MAX_DIMENSION
        )));
    }
    Ok(())
}

/// Reads a V4L2 device through an `ffmpeg` child emitting raw rgb24 frames.
#[derive(Debug, Clone)]
pub struct FfmpegCamera {
    pub device: String,
    pub width: u32,
    pub height: u32,
}

impl Default for FfmpegCamera {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

impl FfmpegCamera {
    fn args(&self) -> Vec<String> {
        vec![
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "v4l2".to_string(),
            "-video_size".to_string(),
            format!("{}x{}", self.width, self.height),
            "-i".to_string(),
            self.device.clone(),
            // 驱动可能换成别的分辨率，输出尺寸固定下来
            "-vf".to_string(),
            format!("scale={}:{}", self.width, self.height),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-".to_string(), // stdout
        ]
    }
}

impl CameraDevice for FfmpegCamera {
    fn open(&mut self) -> Result<Box<dyn VideoStream>> {
        check_dimensions(self.width, self.height)?;
        info!(
            "Starting ffmpeg capture: {} {}x{}",
            self.device, self.width, self.height
        );
        let mut child = Command::new("ffmpeg")
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SinkError::Camera("ffmpeg stdout unavailable".to_string()));
        };

        let slot = FrameSlot::default();
        let reader_slot = slot.clone();
        let (width, height) = (self.width, self.height);
        let reader = match thread::Builder::new()
            .name("camera-reader".to_string())
            .spawn(move || pump_frames(stdout, width, height, &reader_slot))
        {
            Ok(handle) => handle,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        let mut stream = FfmpegStream {
            child: Some(child),
            reader: Some(reader),
            slot,
        };
        // 设备被拒绝时 ffmpeg 会立即退出，等不到第一帧
        stream.read_frame()?;
        Ok(Box::new(stream))
    }
}

#[derive(Default)]
struct LatestFrame {
    frame: Option<RgbImage>,
    ended: bool,
}

type FrameSlot = Arc<(Mutex<LatestFrame>, Condvar)>;

/// 持续读取原始帧，只保留最新的一帧，管道不会积压旧帧
fn pump_frames<R: Read>(mut reader: R, width: u32, height: u32, slot: &FrameSlot) {
    let (lock, cvar) = &**slot;
    let len = width as usize * height as usize * 3;
    let mut count = 0u64;
    loop {
        let mut buf = vec![0u8; len];
        if let Err(e) = reader.read_exact(&mut buf) {
            debug!("Camera stream closed: {}", e);
            break;
        }
        let Some(frame) = RgbImage::from_raw(width, height, buf) else {
            break;
        };
        count += 1;
        match lock.lock() {
            Ok(mut latest) => latest.frame = Some(frame),
            Err(_) => break,
        }
        cvar.notify_all();
    }
    info!("Camera reader finished after {} frames", count);
    if let Ok(mut latest) = lock.lock() {
        latest.ended = true;
    }
    cvar.notify_all();
}

struct FfmpegStream {
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    slot: FrameSlot,
}

impl VideoStream for FfmpegStream {
    fn read_frame(&mut self) -> Result<RgbImage> {
        let (lock, cvar) = &*self.slot;
        let poisoned = || SinkError::Camera("camera reader failed".to_string());
        let guard = lock.lock().map_err(|_| poisoned())?;
        let (latest, _) = cvar
            .wait_timeout_while(guard, FIRST_FRAME_TIMEOUT, |l| {
                l.frame.is_none() && !l.ended
            })
            .map_err(|_| poisoned())?;
        if latest.ended {
            return Err(SinkError::Camera("camera stream ended".to_string()));
        }
        latest
            .frame
            .clone()
            .ok_or_else(|| SinkError::Camera("no frame from camera device".to_string()))
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("Failed to kill ffmpeg: {}", e);
            }
            let _ = child.wait();
        }
        // ffmpeg 退出后读线程会读到 EOF
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Synthetic gradient frames for running without hardware.
#[derive(Debug, Clone)]
pub struct TestPatternCamera {
    pub width: u32,
    pub height: u32,
}

impl Default for TestPatternCamera {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

impl CameraDevice for TestPatternCamera {
    fn open(&mut self) -> Result<Box<dyn VideoStream>> {
        check_dimensions(self.width, self.height)?;
        info!("Starting test pattern {}x{}", self.width, self.height);
        Ok(Box::new(TestPatternStream {
            width: self.width,
            height: self.height,
            frame_no: 0,
        }))
    }
}

struct TestPatternStream {
    width: u32,
    height: u32,
    frame_no: u32,
}

impl VideoStream for TestPatternStream {
    fn read_frame(&mut self) -> Result<RgbImage> {
        let shift = self.frame_no.wrapping_mul(8);
        self.frame_no = self.frame_no.wrapping_add(1);
        let (w, h) = (self.width, self.height);
        Ok(RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                ((x * 255 / w + shift) % 256) as u8,
                ((y * 255 / h) % 256) as u8,
                (shift % 256) as u8,
            ])
        }))
    }

    fn stop(&mut self) {}
}
