//! Frame Decoder Loop
//!
//! Polls the camera, decodes one frame at a time and stops at the first QR
//! payload. Misses and decoder faults are retried forever; only camera
//! acquisition can fail a scan.

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::decoder::{InversionMode, QrDecoder};
use super::ScanError;
use crate::app::{ScanPhase, SessionHandle, Settings};
use crate::media::camera::{
    self, CameraBackend, CameraDevice, CameraError, CameraStream, StreamRequest,
};

struct ScanInner<S> {
    phase: ScanPhase,
    /// The one camera stream this scanner may hold
    stream: Option<S>,
    /// A stream is being opened, or is lent out for a capture. No new scan
    /// may start until it is back in `stream` or released.
    stream_out: bool,
    /// Bumped on every scan so a stale loop can tell it was superseded
    generation: u64,
}

impl<S: CameraStream> ScanInner<S> {
    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!("Camera released");
        }
    }
}

/// Clears `stream_out` if `scan()` is dropped while the camera is opening
struct PendingAcquire<'a, S> {
    inner: &'a Mutex<ScanInner<S>>,
    armed: bool,
}

impl<S> Drop for PendingAcquire<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.inner.lock();
            inner.stream_out = false;
            if inner.phase == ScanPhase::Acquiring {
                inner.phase = ScanPhase::Stopped;
            }
        }
    }
}

/// Camera QR scanner bound to a scan session
pub struct FrameScanner<B: CameraBackend, D: QrDecoder> {
    backend: Arc<B>,
    decoder: Arc<D>,
    session: SessionHandle,
    request: StreamRequest,
    interval: Duration,
    inversion: InversionMode,
    inner: Mutex<ScanInner<B::Stream>>,
    decode_attempts: AtomicU64,
}

impl<B: CameraBackend, D: QrDecoder> FrameScanner<B, D> {
    pub fn new(backend: B, decoder: D, session: SessionHandle, settings: &Settings) -> Self {
        Self {
            backend: Arc::new(backend),
            decoder: Arc::new(decoder),
            session,
            request: settings.camera.stream_request(),
            interval: settings.scan_interval(),
            inversion: settings.inversion,
            inner: Mutex::new(ScanInner {
                phase: ScanPhase::Idle,
                stream: None,
                stream_out: false,
                generation: 0,
            }),
            decode_attempts: AtomicU64::new(0),
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn phase(&self) -> ScanPhase {
        self.inner.lock().phase
    }

    /// Decode attempts since this scanner was created
    pub fn decode_attempts(&self) -> u64 {
        self.decode_attempts.load(Ordering::Relaxed)
    }

    /// Whether a camera stream is currently held
    pub fn has_stream(&self) -> bool {
        self.inner.lock().stream.is_some()
    }

    /// Available cameras; fails if there are none
    pub fn init(&self) -> Result<Vec<CameraDevice>, ScanError> {
        camera::enumerate(self.backend.as_ref()).map_err(|e| {
            error!("Failed to initialize scanner: {}", e);
            ScanError::from(e)
        })
    }

    /// Acquire the camera and scan until a code is decoded (`Some`) or the
    /// scan is stopped (`None`)
    pub async fn scan(&self) -> Result<Option<String>, ScanError> {
        let generation = {
            let mut inner = self.inner.lock();
            if !inner.phase.is_terminal() || inner.stream_out {
                return Err(ScanError::AlreadyScanning);
            }
            inner.phase = ScanPhase::Acquiring;
            inner.stream_out = true;
            inner.generation += 1;
            inner.generation
        };
        self.session.set_scanning(true);
        info!("QR scanner started");

        let mut pending = PendingAcquire {
            inner: &self.inner,
            armed: true,
        };
        let backend = self.backend.clone();
        let request = self.request.clone();
        let acquired = tokio::task::spawn_blocking(move || camera::acquire(&*backend, &request))
            .await
            .unwrap_or_else(|e| Err(CameraError::Access(format!("camera task failed: {}", e))));
        pending.armed = false;

        let stream = match acquired {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to start scanning: {}", e);
                {
                    let mut inner = self.inner.lock();
                    inner.stream_out = false;
                    if inner.phase == ScanPhase::Acquiring {
                        inner.phase = ScanPhase::Failed;
                    }
                }
                self.session.set_scanning(false);
                return Err(e.into());
            }
        };

        {
            let mut inner = self.inner.lock();
            inner.stream_out = false;
            inner.stream = Some(stream);
            if inner.phase == ScanPhase::Acquiring {
                inner.phase = ScanPhase::Scanning;
            }
            if !self.still_scanning(&mut inner, generation) {
                debug!("Scan stopped while the camera was starting");
                inner.release();
                return Ok(None);
            }
        }

        self.run_loop(generation).await
    }

    async fn run_loop(&self, generation: u64) -> Result<Option<String>, ScanError> {
        loop {
            let Some(mut stream) = self.lend_stream(generation) else {
                return Ok(None);
            };
            let captured = stream.capture();
            if !self.return_stream(generation, stream) {
                return Ok(None);
            }

            match captured {
                Ok(frame) if frame.has_picture() => {
                    self.decode_attempts.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "Scanning frame {} for QR code ({}x{})",
                        frame.frame_id, frame.width, frame.height
                    );

                    let decoder = self.decoder.clone();
                    let inversion = self.inversion;
                    let outcome =
                        tokio::task::spawn_blocking(move || decoder.decode(&frame, inversion))
                            .await;

                    if !self.still_scanning(&mut self.inner.lock(), generation) {
                        debug!("Scan stopped during decode, discarding result");
                        return Ok(None);
                    }

                    match outcome {
                        Ok(Ok(Some(payload))) => return Ok(Some(self.finish(generation, payload))),
                        Ok(Ok(None)) => {}
                        Ok(Err(e)) => warn!("QR scan error: {}", e),
                        Err(e) => error!("QR decoder crashed: {}", e),
                    }
                }
                Ok(_) => debug!("Waiting for first video frame"),
                Err(e) => warn!("Frame capture error: {}", e),
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// Take the stream out for one capture, so `inner` is free while the
    /// backend works
    fn lend_stream(&self, generation: u64) -> Option<B::Stream> {
        let mut inner = self.inner.lock();
        if !self.still_scanning(&mut inner, generation) {
            return None;
        }
        let stream = inner.stream.take()?;
        inner.stream_out = true;
        Some(stream)
    }

    /// Put a lent stream back. Releases it instead if the scan ended
    /// during the capture.
    fn return_stream(&self, generation: u64, stream: B::Stream) -> bool {
        let mut inner = self.inner.lock();
        inner.stream_out = false;
        inner.stream = Some(stream);
        if self.still_scanning(&mut inner, generation) {
            return true;
        }
        inner.release();
        false
    }

    /// Whether the loop for `generation` may continue. Releases the camera if
    /// the session gate was closed behind the scanner's back.
    fn still_scanning(&self, inner: &mut ScanInner<B::Stream>, generation: u64) -> bool {
        if inner.generation != generation || inner.phase != ScanPhase::Scanning {
            return false;
        }
        if !self.session.is_scanning() {
            inner.release();
            inner.phase = ScanPhase::Stopped;
            info!("QR scanner stopped");
            return false;
        }
        true
    }

    fn finish(&self, generation: u64, payload: String) -> String {
        info!("QR code detected: {}", payload);
        self.session.record_result(&payload);
        self.session.set_scanning(false);

        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.release();
            inner.phase = ScanPhase::Decoded;
        }
        payload
    }

    /// Stop scanning and release the camera. No-op when already stopped.
    ///
    /// A stream that is still opening, or lent out for a capture, is
    /// released by the scan loop as soon as it comes back.
    pub fn stop(&self) {
        self.session.set_scanning(false);

        let mut inner = self.inner.lock();
        inner.release();
        if !inner.phase.is_terminal() {
            inner.phase = ScanPhase::Stopped;
            info!("QR scanner stopped");
        }
    }
}

impl<B: CameraBackend, D: QrDecoder> Drop for FrameScanner<B, D> {
    fn drop(&mut self) {
        self.stop();
    }
}
