//! Native camera capture via nokhwa
//!
//! The nokhwa `Camera` is not `Send`, so each stream runs its own capture
//! thread that owns the device and overwrites a single latest-frame slot.
//! Reading the slot never blocks.

use log::{debug, info, warn};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::camera::{CameraBackend, CameraDevice, CameraError, CameraStream, StreamRequest};
use super::{FrameSlot, VideoFrame};

/// Camera backend using the platform's native capture API
#[derive(Debug, Default)]
pub struct NokhwaBackend;

impl NokhwaBackend {
    pub fn new() -> Self {
        Self
    }

    fn requested_format(request: &StreamRequest) -> RequestedFormat<'static> {
        match request.resolution {
            Some((width, height)) => RequestedFormat::new::<RgbFormat>(
                RequestedFormatType::Closest(CameraFormat::new(
                    Resolution::new(width, height),
                    FrameFormat::MJPEG,
                    request.fps.unwrap_or(30),
                )),
            ),
            None => RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
        }
    }
}

impl CameraBackend for NokhwaBackend {
    type Stream = NokhwaStream;

    fn devices(&self) -> Result<Vec<CameraDevice>, CameraError> {
        let cameras =
            nokhwa::query(ApiBackend::Auto).map_err(|e| CameraError::Rejected(e.to_string()))?;

        Ok(cameras
            .iter()
            .enumerate()
            .map(|(i, info)| {
                let index = info.index().as_index().unwrap_or(i as u32);
                CameraDevice::new(index, info.human_name())
            })
            .collect())
    }

    fn open(&self, request: &StreamRequest) -> Result<NokhwaStream, CameraError> {
        let devices = self.devices()?;
        let device = request.select_device(&devices).ok_or_else(|| {
            CameraError::Rejected(format!(
                "no camera matches facing mode {:?}",
                request.facing
            ))
        })?;

        info!("Opening camera {} ({})", device.index, device.name);
        NokhwaStream::spawn(device.index, Self::requested_format(request))
    }
}

/// Live nokhwa stream driven by a background capture thread
pub struct NokhwaStream {
    latest: Arc<FrameSlot>,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl NokhwaStream {
    fn spawn(index: u32, format: RequestedFormat<'static>) -> Result<Self, CameraError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let latest = Arc::new(FrameSlot::new());
        let slot = latest.clone();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                let mut camera = match Camera::new(CameraIndex::Index(index), format)
                    .and_then(|mut cam| cam.open_stream().map(|_| cam))
                {
                    Ok(cam) => cam,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                info!("Camera stream open at {:?}", camera.resolution());
                let _ = ready_tx.send(Ok(()));

                capture_loop(&mut camera, &slot, &stop_rx);

                if let Err(e) = camera.stop_stream() {
                    warn!("Failed to stop camera stream: {}", e);
                }
                info!("Camera released");
            })
            .map_err(|e| CameraError::Rejected(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                latest,
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(CameraError::Rejected(e))
            }
            Err(_) => {
                let _ = thread.join();
                Err(CameraError::Rejected("capture thread exited".to_string()))
            }
        }
    }
}

fn capture_loop(
    camera: &mut Camera,
    slot: &FrameSlot,
    stop_rx: &mpsc::Receiver<()>,
) {
    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("Frame capture error: {}", e);
                thread::sleep(Duration::from_millis(100));
                continue;
            }
        };

        let rgb = match buffer.decode_image::<RgbFormat>() {
            Ok(img) => img,
            Err(e) => {
                debug!("Frame decode error: {}", e);
                continue;
            }
        };

        let (width, height) = rgb.dimensions();
        let frame = VideoFrame::from_rgb(width, height, rgb.as_raw());

        // Replaces any frame the scanner has not picked up yet
        slot.publish(frame);
    }
}

impl CameraStream for NokhwaStream {
    fn capture(&mut self) -> Result<VideoFrame, CameraError> {
        if self.stop_tx.is_none() {
            return Err(CameraError::Capture("stream stopped".to_string()));
        }
        if let Some(frame) = self.latest.take() {
            return Ok(frame);
        }
        if self.thread.as_ref().map_or(true, |t| t.is_finished()) {
            return Err(CameraError::Capture("capture thread exited".to_string()));
        }
        // Nothing new yet: report an empty frame so the caller reschedules
        Ok(VideoFrame::empty())
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn is_active(&self) -> bool {
        self.stop_tx.is_some()
    }
}

impl Drop for NokhwaStream {
    fn drop(&mut self) {
        self.stop();
    }
}
