//! Camera Acquisition
//!
//! Device enumeration and stream acquisition with rear-camera preference.
//! Platform capture lives behind [`CameraBackend`] so the scan loop does not
//! care whether frames come from a webcam or a still image.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::VideoFrame;

/// Camera errors
#[derive(Debug, Error)]
pub enum CameraError {
    /// No capture device present
    #[error("No camera devices found")]
    NoCamera,

    /// Both the preferred and the relaxed stream request were rejected
    #[error("Camera access failed: {0}")]
    Access(String),

    /// A single stream request was rejected by the platform
    #[error("Stream request rejected: {0}")]
    Rejected(String),

    /// Frame capture failed on an open stream
    #[error("Frame capture failed: {0}")]
    Capture(String),
}

/// Which physical camera to prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointing away from the user
    #[default]
    Environment,
    /// Front camera, pointing at the user
    User,
    /// No preference
    Any,
}

impl FacingMode {
    /// Guess the facing of a device from its human readable name
    pub fn from_device_name(name: &str) -> Option<FacingMode> {
        let name = name.to_lowercase();
        if ["back", "rear", "environment"].iter().any(|k| name.contains(k)) {
            Some(FacingMode::Environment)
        } else if ["front", "user", "facetime"].iter().any(|k| name.contains(k)) {
            Some(FacingMode::User)
        } else {
            None
        }
    }

    pub fn parse(value: &str) -> Option<FacingMode> {
        match value.to_lowercase().as_str() {
            "environment" | "rear" | "back" => Some(FacingMode::Environment),
            "user" | "front" => Some(FacingMode::User),
            "any" => Some(FacingMode::Any),
            _ => None,
        }
    }
}

/// Capture device as reported by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDevice {
    pub index: u32,
    pub name: String,
    pub facing: Option<FacingMode>,
}

impl CameraDevice {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        let facing = FacingMode::from_device_name(&name);
        Self {
            index,
            name,
            facing,
        }
    }
}

/// Stream constraints handed to a backend
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub facing: FacingMode,
    /// Explicit device, bypasses facing-mode matching
    pub device_index: Option<u32>,
    /// Ideal resolution hint (width, height)
    pub resolution: Option<(u32, u32)>,
    pub fps: Option<u32>,
}

impl StreamRequest {
    /// Request honoring a facing preference and resolution hint
    pub fn preferred(facing: FacingMode, resolution: (u32, u32), fps: u32) -> Self {
        Self {
            facing,
            device_index: None,
            resolution: Some(resolution),
            fps: Some(fps),
        }
    }

    /// Relaxed request: any camera, backend defaults
    pub fn unconstrained() -> Self {
        Self {
            facing: FacingMode::Any,
            device_index: None,
            resolution: None,
            fps: None,
        }
    }

    pub fn with_device(mut self, index: Option<u32>) -> Self {
        self.device_index = index;
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        *self == Self::unconstrained()
    }

    /// Pick the device satisfying this request, if any
    pub fn select_device<'a>(&self, devices: &'a [CameraDevice]) -> Option<&'a CameraDevice> {
        if let Some(index) = self.device_index {
            return devices.iter().find(|d| d.index == index);
        }
        match self.facing {
            FacingMode::Any => devices.first(),
            facing => devices.iter().find(|d| d.facing == Some(facing)),
        }
    }
}

/// Platform capture capability
pub trait CameraBackend: Send + Sync + 'static {
    type Stream: CameraStream + Send + 'static;

    /// All video input devices, possibly empty
    fn devices(&self) -> Result<Vec<CameraDevice>, CameraError>;

    /// One attempt at opening a stream. Holds the camera until the stream is
    /// stopped or dropped. May block while the device starts or the user
    /// answers a permission prompt; callers run it off the async executor.
    fn open(&self, request: &StreamRequest) -> Result<Self::Stream, CameraError>;
}

/// Live video stream and its tracks
pub trait CameraStream {
    /// Latest frame. Must not block: returns an empty (zero-sized) frame
    /// when nothing new is available, including before the stream warms up.
    fn capture(&mut self) -> Result<VideoFrame, CameraError>;

    /// Stop all tracks and release the device. Must be idempotent.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// List video input devices, failing with [`CameraError::NoCamera`] if there are none
pub fn enumerate<B: CameraBackend>(backend: &B) -> Result<Vec<CameraDevice>, CameraError> {
    let devices = backend.devices()?;
    if devices.is_empty() {
        return Err(CameraError::NoCamera);
    }
    info!("Found {} camera device(s)", devices.len());
    Ok(devices)
}

/// Acquire a stream, retrying once with an unconstrained request if the
/// preferred constraints cannot be satisfied
pub fn acquire<B: CameraBackend>(
    backend: &B,
    preferred: &StreamRequest,
) -> Result<B::Stream, CameraError> {
    let first_err = match backend.open(preferred) {
        Ok(stream) => return Ok(stream),
        Err(e) => e,
    };

    if preferred.is_unconstrained() {
        return Err(CameraError::Access(first_err.to_string()));
    }

    warn!("Preferred camera not available, using default: {}", first_err);
    backend
        .open(&StreamRequest::unconstrained())
        .map_err(|e| CameraError::Access(e.to_string()))
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scriptable in-memory camera for tests

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    pub struct FakeCamera {
        pub devices: Vec<CameraDevice>,
        /// Reject requests that carry a facing constraint
        pub reject_constrained: bool,
        pub reject_all: bool,
        /// Frames served in order; the last one repeats
        pub frames: Arc<Mutex<VecDeque<VideoFrame>>>,
        pub open_count: Arc<AtomicUsize>,
        pub active_streams: Arc<AtomicUsize>,
        pub requests: Arc<Mutex<Vec<StreamRequest>>>,
    }

    impl FakeCamera {
        pub fn with_frames(frames: Vec<VideoFrame>) -> Self {
            Self {
                devices: vec![CameraDevice::new(0, "Back Camera")],
                frames: Arc::new(Mutex::new(frames.into())),
                ..Default::default()
            }
        }
    }

    pub struct FakeStream {
        frames: Arc<Mutex<VecDeque<VideoFrame>>>,
        active: AtomicBool,
        active_streams: Arc<AtomicUsize>,
    }

    impl CameraBackend for FakeCamera {
        type Stream = FakeStream;

        fn devices(&self) -> Result<Vec<CameraDevice>, CameraError> {
            Ok(self.devices.clone())
        }

        fn open(&self, request: &StreamRequest) -> Result<FakeStream, CameraError> {
            self.requests.lock().push(request.clone());
            if self.reject_all || (self.reject_constrained && !request.is_unconstrained()) {
                return Err(CameraError::Rejected("permission denied".to_string()));
            }
            self.open_count.fetch_add(1, Ordering::SeqCst);
            self.active_streams.fetch_add(1, Ordering::SeqCst);
            Ok(FakeStream {
                frames: self.frames.clone(),
                active: AtomicBool::new(true),
                active_streams: self.active_streams.clone(),
            })
        }
    }

    impl CameraStream for FakeStream {
        fn capture(&mut self) -> Result<VideoFrame, CameraError> {
            let mut frames = self.frames.lock();
            if frames.len() > 1 {
                Ok(frames.pop_front().unwrap())
            } else {
                Ok(frames.front().cloned().unwrap_or_else(VideoFrame::empty))
            }
        }

        fn stop(&mut self) {
            if self.active.swap(false, Ordering::SeqCst) {
                self.active_streams.fetch_sub(1, Ordering::SeqCst);
            }
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    impl Drop for FakeStream {
        fn drop(&mut self) {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeCamera;
    use super::*;

    #[test]
    fn test_facing_from_name() {
        assert_eq!(
            FacingMode::from_device_name("Back Ultra Wide Camera"),
            Some(FacingMode::Environment)
        );
        assert_eq!(
            FacingMode::from_device_name("FaceTime HD Camera"),
            Some(FacingMode::User)
        );
        assert_eq!(FacingMode::from_device_name("USB2.0 HD UVC WebCam"), None);
    }

    #[test]
    fn test_enumerate_without_devices() {
        let camera = FakeCamera::default();
        assert!(matches!(enumerate(&camera), Err(CameraError::NoCamera)));
    }

    #[test]
    fn test_select_device_by_facing() {
        let devices = vec![
            CameraDevice::new(0, "Front Camera"),
            CameraDevice::new(1, "Back Camera"),
        ];
        let request = StreamRequest::preferred(FacingMode::Environment, (1280, 720), 30);
        assert_eq!(request.select_device(&devices).map(|d| d.index), Some(1));

        let pinned = request.clone().with_device(Some(0));
        assert_eq!(pinned.select_device(&devices).map(|d| d.index), Some(0));

        let webcam = vec![CameraDevice::new(0, "Integrated Webcam")];
        assert!(request.select_device(&webcam).is_none());
        assert_eq!(
            StreamRequest::unconstrained()
                .select_device(&webcam)
                .map(|d| d.index),
            Some(0)
        );
    }

    #[test]
    fn test_acquire_falls_back_to_any_camera() {
        let camera = FakeCamera {
            reject_constrained: true,
            ..FakeCamera::with_frames(vec![])
        };
        let request = StreamRequest::preferred(FacingMode::Environment, (1280, 720), 30);
        let stream = acquire(&camera, &request).unwrap();
        assert!(stream.is_active());

        let requests = camera.requests.lock();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].is_unconstrained());
    }

    #[test]
    fn test_acquire_fails_when_both_attempts_rejected() {
        let camera = FakeCamera {
            reject_all: true,
            ..FakeCamera::with_frames(vec![])
        };
        let request = StreamRequest::preferred(FacingMode::Environment, (1280, 720), 30);
        assert!(matches!(
            acquire(&camera, &request),
            Err(CameraError::Access(_))
        ));
        assert_eq!(camera.requests.lock().len(), 2);
    }
}
