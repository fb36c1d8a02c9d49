//! QR Decoding
//!
//! The decode capability the scan loop calls once per frame. Backends are
//! swappable through [`QrDecoder`]; the default one uses rqrr.

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::VideoFrame;

/// Decoder faults. "No code in this frame" is not one of them.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Y plane too small: {actual} < {expected}")]
    FrameTooSmall { expected: usize, actual: usize },

    #[error("decoder failure: {0}")]
    Backend(String),
}

/// Whether to also look for light-on-dark codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InversionMode {
    /// Dark modules on light background only
    #[default]
    DontInvert,
    /// Light modules on dark background only
    OnlyInvert,
    /// Normal first, then inverted
    AttemptBoth,
    /// Inverted first, then normal
    InvertFirst,
}

impl InversionMode {
    /// Passes to run, `true` meaning inverted
    fn passes(self) -> &'static [bool] {
        match self {
            InversionMode::DontInvert => &[false],
            InversionMode::OnlyInvert => &[true],
            InversionMode::AttemptBoth => &[false, true],
            InversionMode::InvertFirst => &[true, false],
        }
    }
}

/// Given a frame, return the decoded QR text or nothing
pub trait QrDecoder: Send + Sync + 'static {
    fn decode(
        &self,
        frame: &VideoFrame,
        inversion: InversionMode,
    ) -> Result<Option<String>, DecodeError>;
}

/// QR decoder backed by rqrr
#[derive(Debug, Default, Clone)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }

    fn detect(luma: &[u8], width: usize, height: usize, inverted: bool) -> Option<String> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            let v = luma[y * width + x];
            if inverted {
                255 - v
            } else {
                v
            }
        });

        let grids = prepared.detect_grids();
        debug!("Found {} potential QR grids", grids.len());

        for grid in grids {
            match grid.decode() {
                Ok((_, content)) => return Some(content),
                Err(e) => debug!("Grid decode failed: {:?}", e),
            }
        }
        None
    }
}

impl QrDecoder for RqrrDecoder {
    fn decode(
        &self,
        frame: &VideoFrame,
        inversion: InversionMode,
    ) -> Result<Option<String>, DecodeError> {
        let height = frame.height as usize;
        if frame.y_stride < frame.width {
            // Rows shorter than the picture
            return Err(DecodeError::FrameTooSmall {
                expected: frame.width as usize * height,
                actual: frame.y_stride as usize * height,
            });
        }

        let expected = frame.y_stride as usize * height;
        if frame.y_plane.len() < expected {
            return Err(DecodeError::FrameTooSmall {
                expected,
                actual: frame.y_plane.len(),
            });
        }

        let luma = frame.packed_luma();
        let (width, height) = (frame.width as usize, frame.height as usize);

        Ok(inversion
            .passes()
            .iter()
            .find_map(|&inverted| Self::detect(&luma, width, height, inverted)))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::qr_frame;
    use super::*;

    #[test]
    fn test_decodes_rendered_code() {
        let decoder = RqrrDecoder::new();
        let frame = qr_frame("TICKET-42", false);
        let result = decoder.decode(&frame, InversionMode::DontInvert).unwrap();
        assert_eq!(result.as_deref(), Some("TICKET-42"));
    }

    #[test]
    fn test_blank_frame_is_a_miss() {
        let decoder = RqrrDecoder::new();
        let frame = VideoFrame::from_luma(64, 64, vec![255; 64 * 64]);
        assert_eq!(
            decoder.decode(&frame, InversionMode::AttemptBoth).unwrap(),
            None
        );
    }

    #[test]
    fn test_inverted_code_needs_inversion() {
        let decoder = RqrrDecoder::new();
        let frame = qr_frame("T123", true);
        assert_eq!(
            decoder.decode(&frame, InversionMode::OnlyInvert).unwrap().as_deref(),
            Some("T123")
        );
        assert_eq!(
            decoder.decode(&frame, InversionMode::InvertFirst).unwrap().as_deref(),
            Some("T123")
        );
    }

    #[test]
    fn test_narrow_stride_is_a_fault() {
        let decoder = RqrrDecoder::new();
        let frame = VideoFrame::from_luma_with_stride(4, 2, 2, vec![0; 4]);
        assert!(matches!(
            decoder.decode(&frame, InversionMode::AttemptBoth),
            Err(DecodeError::FrameTooSmall { expected: 8, actual: 4 })
        ));
    }

    #[test]
    fn test_short_buffer_is_a_fault() {
        let decoder = RqrrDecoder::new();
        let frame = VideoFrame::from_luma(10, 10, vec![0; 20]);
        assert!(matches!(
            decoder.decode(&frame, InversionMode::DontInvert),
            Err(DecodeError::FrameTooSmall { expected: 100, actual: 20 })
        ));
    }
}
