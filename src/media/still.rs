//! Still image "camera"
//!
//! Serves one decoded image file as an endless stream, so the scan pipeline
//! can run without capture hardware.

use log::info;
use std::path::{Path, PathBuf};

use super::camera::{CameraBackend, CameraDevice, CameraError, CameraStream, StreamRequest};
use super::VideoFrame;

/// Backend exposing a single image file as camera 0
#[derive(Debug, Clone)]
pub struct StillImageBackend {
    path: PathBuf,
}

impl StillImageBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl CameraBackend for StillImageBackend {
    type Stream = StillImageStream;

    fn devices(&self) -> Result<Vec<CameraDevice>, CameraError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Ok(vec![CameraDevice::new(0, self.path.display().to_string())])
    }

    /// A single still has no facing; every request is accepted
    fn open(&self, _request: &StreamRequest) -> Result<StillImageStream, CameraError> {
        let img = image::open(&self.path)
            .map_err(|e| CameraError::Rejected(format!("{}: {}", self.path.display(), e)))?;
        let frame = VideoFrame::from_image(&img);
        info!(
            "Loaded still image {} ({}x{})",
            self.path.display(),
            frame.width,
            frame.height
        );
        Ok(StillImageStream {
            frame: Some(frame),
        })
    }
}

pub struct StillImageStream {
    frame: Option<VideoFrame>,
}

impl CameraStream for StillImageStream {
    fn capture(&mut self) -> Result<VideoFrame, CameraError> {
        self.frame
            .as_ref()
            .map(|f| VideoFrame::from_luma_with_stride(f.width, f.height, f.y_stride, f.y_plane.clone()))
            .ok_or_else(|| CameraError::Capture("stream stopped".to_string()))
    }

    fn stop(&mut self) {
        self.frame = None;
    }

    fn is_active(&self) -> bool {
        self.frame.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_has_no_devices() {
        let backend = StillImageBackend::new("/nonexistent/ticket.png");
        assert!(backend.devices().unwrap().is_empty());
        assert!(backend.open(&StreamRequest::unconstrained()).is_err());
    }

    #[test]
    fn test_stream_serves_frames_until_stopped() {
        let path = std::env::temp_dir().join(format!("still-{}.png", std::process::id()));
        image::GrayImage::from_pixel(8, 6, image::Luma([200u8]))
            .save(&path)
            .unwrap();

        let backend = StillImageBackend::new(&path);
        let mut stream = backend.open(&StreamRequest::unconstrained()).unwrap();
        let first = stream.capture().unwrap();
        let second = stream.capture().unwrap();
        assert_eq!((first.width, first.height), (8, 6));
        assert!(second.frame_id > first.frame_id);

        stream.stop();
        stream.stop();
        assert!(!stream.is_active());
        assert!(stream.capture().is_err());

        let _ = std::fs::remove_file(&path);
    }
}
