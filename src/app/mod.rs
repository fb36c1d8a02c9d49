//! Application State Management
//!
//! Wires the scanner, the scan session and the ticket API into the
//! scan → verify → mark-used workflow.

pub mod config;
pub mod session;
pub mod types;

pub use config::{CameraSettings, Settings, API_BASE_ENV};
pub use session::{ScanSession, SessionHandle, MAX_HISTORY};
pub use types::{ScanHistoryEntry, ScanPhase};

use log::{info, warn};

use crate::api::{ApiError, TicketApi, TicketResponse};
use crate::media::CameraBackend;
use crate::scanner::{FrameScanner, QrDecoder, ScanError};

/// What happened to one scanned ticket
#[derive(Debug)]
pub struct TicketCheck {
    /// Decoded payload, used as the ticket id
    pub payload: String,
    /// Verify call outcome
    pub verification: Result<TicketResponse, ApiError>,
    /// Mark-used call outcome, when one was made
    pub mark_used: Option<Result<TicketResponse, ApiError>>,
    /// User-facing message left in the session, if any
    pub message: Option<String>,
}

impl TicketCheck {
    /// Verified and (if requested) admitted without any error
    pub fn is_admitted(&self) -> bool {
        let verified = matches!(&self.verification, Ok(r) if r.success);
        let marked = match &self.mark_used {
            Some(result) => matches!(result, Ok(r) if r.success),
            None => true,
        };
        verified && marked
    }
}

/// Main application structure
pub struct App<A: TicketApi, B: CameraBackend, D: QrDecoder> {
    /// User settings
    pub settings: Settings,

    /// Session shared with the scanner
    session: SessionHandle,

    /// API client
    api: A,

    scanner: FrameScanner<B, D>,
}

impl<A: TicketApi, B: CameraBackend, D: QrDecoder> App<A, B, D> {
    pub fn new(settings: Settings, api: A, backend: B, decoder: D) -> Self {
        let session = SessionHandle::new();
        let scanner = FrameScanner::new(backend, decoder, session.clone(), &settings);
        Self {
            settings,
            session,
            api,
            scanner,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn scanner(&self) -> &FrameScanner<B, D> {
        &self.scanner
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Scan one code and check the ticket. `None` if scanning was stopped.
    pub async fn scan_and_check(&self) -> Result<Option<TicketCheck>, ScanError> {
        let Some(payload) = self.scanner.scan().await? else {
            return Ok(None);
        };
        Ok(Some(self.check_ticket(&payload).await))
    }

    /// Verify a ticket id and, with `auto_mark_used`, admit valid tickets
    pub async fn check_ticket(&self, ticket_id: &str) -> TicketCheck {
        let verification = self.session.verify(&self.api, ticket_id).await;

        let should_mark = match &verification {
            Ok(response) if response.success => {
                let already_used = response.ticket.as_ref().is_some_and(|t| t.is_used());
                if already_used {
                    warn!("Ticket {} verified but already used", ticket_id);
                }
                self.settings.auto_mark_used && !already_used
            }
            _ => false,
        };

        let mark_used = if should_mark {
            info!("Marking ticket {} as used", ticket_id);
            Some(self.session.mark_used(&self.api, ticket_id).await)
        } else {
            None
        };

        TicketCheck {
            payload: ticket_id.to_string(),
            verification,
            mark_used,
            message: self.session.lock().error().map(str::to_string),
        }
    }

    /// Stop any running scan and release the camera
    pub fn stop(&self) {
        self.scanner.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::api::Ticket;
    use crate::media::camera::fake::FakeCamera;
    use crate::scanner::decoder::testing::qr_frame;
    use crate::scanner::RqrrDecoder;

    fn settings(auto_mark_used: bool) -> Settings {
        Settings {
            scan_interval_ms: 1,
            auto_mark_used,
            ..Default::default()
        }
    }

    fn valid() -> Result<TicketResponse, ApiError> {
        Ok(TicketResponse {
            success: true,
            ticket: Some(Ticket::with_status("valid")),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_scan_and_verify() {
        let api = FakeApi::verifying(valid());
        let camera = FakeCamera::with_frames(vec![qr_frame("T123", false)]);
        let app = App::new(settings(false), api, camera, RqrrDecoder::new());

        let check = app.scan_and_check().await.unwrap().unwrap();
        assert_eq!(check.payload, "T123");
        assert!(check.is_admitted());
        assert!(check.mark_used.is_none());
        assert!(check.message.is_none());

        let session = app.session().snapshot();
        assert!(session.scan_history()[0].verified);
        assert_eq!(app.api().calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_auto_mark_used() {
        let api = FakeApi::verifying(valid());
        *api.mark_used_result.lock() = Some(Ok(TicketResponse {
            success: true,
            ticket: Some(Ticket::with_status("used")),
            ..Default::default()
        }));
        let camera = FakeCamera::with_frames(vec![]);
        let app = App::new(settings(true), api, camera, RqrrDecoder::new());
        app.session().record_result("T9");

        let check = app.check_ticket("T9").await;
        assert!(check.is_admitted());
        assert!(check.mark_used.is_some());
        assert_eq!(
            app.session().snapshot().scan_history()[0].status.as_deref(),
            Some("used")
        );
    }

    #[tokio::test]
    async fn test_used_ticket_not_marked_again() {
        let api = FakeApi::verifying(Ok(TicketResponse {
            success: true,
            ticket: Some(Ticket::with_status("used")),
            ..Default::default()
        }));
        let app = App::new(settings(true), api, FakeCamera::default(), RqrrDecoder::new());

        let check = app.check_ticket("T9").await;
        assert!(check.mark_used.is_none());
        assert_eq!(app.api().calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_ticket_reports_message() {
        let api = FakeApi::verifying(Ok(TicketResponse {
            success: false,
            error_code: Some("TICKET_NOT_FOUND".to_string()),
            ..Default::default()
        }));
        let app = App::new(settings(true), api, FakeCamera::default(), RqrrDecoder::new());

        let check = app.check_ticket("BAD").await;
        assert!(!check.is_admitted());
        assert!(check.mark_used.is_none());
        assert_eq!(
            check.message.as_deref(),
            Some("Ticket not found. Please check the QR code and try again.")
        );
    }

    #[tokio::test]
    async fn test_camera_failure_surfaces() {
        let camera = FakeCamera {
            reject_all: true,
            ..FakeCamera::default()
        };
        let app = App::new(settings(false), FakeApi::default(), camera, RqrrDecoder::new());
        assert!(app.scan_and_check().await.is_err());
        assert!(app.api().calls.lock().is_empty());
    }
}
