//! QR Scanner
//!
//! Turns a camera stream into a decoded ticket payload.

pub mod decoder;
mod frame_scanner;

pub use decoder::{DecodeError, InversionMode, QrDecoder, RqrrDecoder};
pub use frame_scanner::FrameScanner;

use thiserror::Error;

use crate::media::CameraError;

/// Failures that end a scan. Decode misses and faults never show up here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("No camera devices found")]
    NoCamera,

    #[error("Camera access failed: {0}")]
    CameraAccess(String),

    #[error("A scan is already running")]
    AlreadyScanning,
}

impl From<CameraError> for ScanError {
    fn from(e: CameraError) -> Self {
        match e {
            CameraError::NoCamera => ScanError::NoCamera,
            CameraError::Access(reason) => ScanError::CameraAccess(reason),
            other => ScanError::CameraAccess(other.to_string()),
        }
    }
}
