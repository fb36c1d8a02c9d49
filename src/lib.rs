//! Ticket Scanner
//!
//! Scans QR-coded tickets from a camera and checks them against a remote
//! ticketing API.

pub mod api;
pub mod app;
pub mod media;
pub mod scanner;

pub use api::{ApiError, Ticket, TicketApi, TicketApiClient, TicketResponse};
pub use app::{App, ScanPhase, SessionHandle, Settings, TicketCheck};
pub use media::{CameraBackend, StillImageBackend};
pub use scanner::{FrameScanner, QrDecoder, RqrrDecoder, ScanError};
