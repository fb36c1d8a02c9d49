//! Application Types
//!
//! Common types used across the application.

use chrono::{DateTime, Utc};

use crate::api::Ticket;

/// One successful decode, newest first in the session history
#[derive(Debug, Clone, PartialEq)]
pub struct ScanHistoryEntry {
    /// Creation time in milliseconds, bumped to stay strictly increasing
    pub id: i64,
    /// Raw decoded payload
    pub result: String,
    pub timestamp: DateTime<Utc>,
    pub verified: bool,
    pub ticket: Option<Ticket>,
    pub status: Option<String>,
}

impl ScanHistoryEntry {
    pub fn new(id: i64, result: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            result: result.to_string(),
            timestamp,
            verified: false,
            ticket: None,
            status: None,
        }
    }

    /// Whether this entry belongs to `ticket_id`
    pub fn matches(&self, ticket_id: &str) -> bool {
        !ticket_id.is_empty() && self.result.contains(ticket_id)
    }
}

/// Phase of the frame scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPhase {
    /// Not scanning
    #[default]
    Idle,
    /// Waiting for the camera
    Acquiring,
    /// Capturing and decoding frames
    Scanning,
    /// Stopped after a successful decode
    Decoded,
    /// Stopped on request
    Stopped,
    /// Camera acquisition failed
    Failed,
}

impl ScanPhase {
    /// Whether a new scan may start from this phase
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanPhase::Acquiring | ScanPhase::Scanning)
    }
}
