//! Media Pipeline
//!
//! Camera acquisition and the frames handed to the QR decoder.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod camera;
#[cfg(feature = "camera")]
pub mod nokhwa_backend;
pub mod still;

pub use camera::{
    acquire, CameraBackend, CameraDevice, CameraError, CameraStream, FacingMode, StreamRequest,
};
#[cfg(feature = "camera")]
pub use nokhwa_backend::NokhwaBackend;
pub use still::StillImageBackend;

/// Global frame ID counter for unique frame identification
static FRAME_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique frame ID
pub fn next_frame_id() -> u64 {
    FRAME_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Captured camera frame, reduced to its luma plane.
///
/// QR detection only needs brightness, so every capture backend converts
/// into this one layout. Rows may carry stride padding.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Unique frame ID (monotonically increasing)
    pub frame_id: u64,
    pub width: u32,
    pub height: u32,
    /// Y plane (luma), `stride` bytes per row
    pub y_plane: Vec<u8>,
    pub y_stride: u32,
    pub timestamp_us: u64,
}

impl VideoFrame {
    /// Tightly packed luma frame
    pub fn from_luma(width: u32, height: u32, y_plane: Vec<u8>) -> Self {
        Self::from_luma_with_stride(width, height, width, y_plane)
    }

    /// Luma frame with explicit row stride
    pub fn from_luma_with_stride(width: u32, height: u32, stride: u32, y_plane: Vec<u8>) -> Self {
        Self {
            frame_id: next_frame_id(),
            width,
            height,
            y_plane,
            y_stride: stride,
            timestamp_us: now_us(),
        }
    }

    /// Convert an RGB8 buffer (as delivered by most webcams) into a luma frame
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> Self {
        Self::from_luma(width, height, to_luma(rgb, 3))
    }

    /// Convert an RGBA8 buffer into a luma frame
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Self {
        Self::from_luma(width, height, to_luma(rgba, 4))
    }

    /// Convert any decoded image into a luma frame
    pub fn from_image(img: &image::DynamicImage) -> Self {
        let luma = img.to_luma8();
        let (width, height) = luma.dimensions();
        Self::from_luma(width, height, luma.into_raw())
    }

    /// Frame without pixels, as reported by a stream that has not produced
    /// its first picture yet
    pub fn empty() -> Self {
        Self::from_luma(0, 0, Vec::new())
    }

    /// Whether the frame has a usable, non-zero picture area
    pub fn has_picture(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.y_stride >= self.width
            && self.y_plane.len() >= (self.y_stride as usize) * (self.height as usize)
    }

    /// Luma samples with stride padding removed. Callers check
    /// [`has_picture`](Self::has_picture) first.
    pub fn packed_luma(&self) -> Vec<u8> {
        let width = self.width as usize;
        let height = self.height as usize;
        let stride = self.y_stride as usize;

        if stride == width {
            return self.y_plane[..width * height].to_vec();
        }

        let mut packed = Vec::with_capacity(width * height);
        for row in 0..height {
            let row_start = row * stride;
            packed.extend_from_slice(&self.y_plane[row_start..row_start + width]);
        }
        packed
    }
}

/// Single-frame handoff between a capture thread and the scanner. A new
/// frame replaces any frame not yet taken.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<VideoFrame>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: VideoFrame) {
        *self.latest.lock() = Some(frame);
    }

    /// Newest frame since the last call, if any. Never blocks for long.
    pub fn take(&self) -> Option<VideoFrame> {
        self.latest.lock().take()
    }
}

/// BT.601 luma from interleaved 8-bit RGB(A)
fn to_luma(pixels: &[u8], channels: usize) -> Vec<u8> {
    pixels
        .chunks_exact(channels)
        .map(|p| {
            let y = 299 * p[0] as u32 + 587 * p[1] as u32 + 114 * p[2] as u32;
            (y / 1000) as u8
        })
        .collect()
}

fn now_us() -> u64 {
    chrono::Utc::now().timestamp_micros().max(0) as u64
}
