//! Ticket API
//!
//! Client for the remote ticketing service and the message tables used to
//! present its outcomes.

mod client;
pub mod messages;
pub mod types;

pub use client::{TicketApiClient, DEFAULT_API_BASE};
pub use messages::{error_code_message, transport_error_message};
pub use types::{Ticket, TicketResponse};

use std::future::Future;
use thiserror::Error;

/// The request did not produce a usable ticket response.
///
/// A well-formed `success: false` body is NOT an error; it comes back as
/// `Ok(TicketResponse)`.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Server answered with a non-2xx status
    #[error("API error: HTTP {status}")]
    Status {
        status: u16,
        /// `message` from the JSON error body, if any
        message: Option<String>,
    },

    /// Server could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// 2xx body that is not a ticket response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Remote ticket operations. No retries; callers decide.
pub trait TicketApi: Send + Sync {
    /// `GET /tickets/verify/{ticket_id}`
    fn verify(
        &self,
        ticket_id: &str,
    ) -> impl Future<Output = Result<TicketResponse, ApiError>> + Send;

    /// `GET /tickets/mark-used/{ticket_id}`
    fn mark_used(
        &self,
        ticket_id: &str,
    ) -> impl Future<Output = Result<TicketResponse, ApiError>> + Send;
}
