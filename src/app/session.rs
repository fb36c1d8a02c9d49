//! Scan Session State
//!
//! Everything a scanning session knows: whether the loop may run, what was
//! scanned, and the outcome of the last ticket call. The record has one
//! owner, [`SessionHandle`], which the scanner and the caller share.

use chrono::Utc;
use log::{error, info, warn};
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::Arc;

use super::types::ScanHistoryEntry;
use crate::api::{
    error_code_message, transport_error_message, ApiError, Ticket, TicketApi, TicketResponse,
};

/// Most entries kept in the scan history
pub const MAX_HISTORY: usize = 50;

/// Session record
#[derive(Debug, Clone, Default)]
pub struct ScanSession {
    is_scanning: bool,
    last_scan_result: Option<String>,
    scan_history: VecDeque<ScanHistoryEntry>,
    current_ticket: Option<Ticket>,
    loading: bool,
    error: Option<String>,
    last_id: i64,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_scanning(&self) -> bool {
        self.is_scanning
    }

    pub fn set_scanning(&mut self, scanning: bool) {
        self.is_scanning = scanning;
    }

    pub fn last_scan_result(&self) -> Option<&str> {
        self.last_scan_result.as_deref()
    }

    /// Newest first
    pub fn scan_history(&self) -> &VecDeque<ScanHistoryEntry> {
        &self.scan_history
    }

    pub fn current_ticket(&self) -> Option<&Ticket> {
        self.current_ticket.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn clear_current_ticket(&mut self) {
        self.current_ticket = None;
    }

    /// Record a decoded payload and prepend it to the history
    pub fn record_result(&mut self, result: &str) -> i64 {
        let now = Utc::now();
        let id = now.timestamp_millis().max(self.last_id + 1);
        self.last_id = id;

        self.last_scan_result = Some(result.to_string());
        self.scan_history
            .push_front(ScanHistoryEntry::new(id, result, now));
        self.scan_history.truncate(MAX_HISTORY);
        id
    }

    /// History entry for `ticket_id`: an exact payload match wins, otherwise
    /// the newest entry whose payload contains the id
    pub fn find_entry_mut(&mut self, ticket_id: &str) -> Option<&mut ScanHistoryEntry> {
        let index = self
            .scan_history
            .iter()
            .position(|e| e.result == ticket_id)
            .or_else(|| self.scan_history.iter().position(|e| e.matches(ticket_id)))?;
        self.scan_history.get_mut(index)
    }

    fn begin_request(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Fold a verify response into the session
    pub fn apply_verify(&mut self, ticket_id: &str, response: &TicketResponse) {
        if !response.success {
            self.apply_rejection(response);
            return;
        }

        self.current_ticket = response.ticket.clone();
        match self.find_entry_mut(ticket_id) {
            Some(entry) => {
                entry.verified = true;
                entry.ticket = response.ticket.clone();
                entry.status = response.ticket.as_ref().map(|t| t.status.clone());
            }
            None => warn!("Verified ticket {} has no scan history entry", ticket_id),
        }
    }

    /// Fold a mark-used response into the session
    pub fn apply_mark_used(&mut self, ticket_id: &str, response: &TicketResponse) {
        if !response.success {
            self.apply_rejection(response);
            return;
        }

        if let Some(ticket) = &response.ticket {
            self.current_ticket = Some(ticket.clone());
        }
        if let Some(entry) = self.find_entry_mut(ticket_id) {
            if response.ticket.is_some() {
                entry.ticket = response.ticket.clone();
            }
            entry.status = Some("used".to_string());
        }
    }

    /// Structured `success: false`: show the mapped message and any ticket
    fn apply_rejection(&mut self, response: &TicketResponse) {
        let message = error_code_message(response.error_code.as_deref(), response.message.as_deref());
        info!(
            "Ticket rejected ({}): {}",
            response.error_code.as_deref().unwrap_or("no code"),
            message
        );
        self.error = Some(message);
        if let Some(ticket) = &response.ticket {
            self.current_ticket = Some(ticket.clone());
        }
    }

    pub fn record_transport_failure(&mut self, err: &ApiError) {
        self.error = Some(transport_error_message(err));
    }
}

/// Shared owner of a [`ScanSession`]
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<ScanSession>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock for synchronous reads and updates. Never hold across `.await`.
    pub fn lock(&self) -> MutexGuard<'_, ScanSession> {
        self.inner.lock()
    }

    pub fn snapshot(&self) -> ScanSession {
        self.inner.lock().clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.lock().is_scanning()
    }

    pub fn set_scanning(&self, scanning: bool) {
        self.inner.lock().set_scanning(scanning);
    }

    pub fn record_result(&self, result: &str) -> i64 {
        self.inner.lock().record_result(result)
    }

    /// Verify a ticket and record the outcome.
    ///
    /// `Ok` carries the API response, including `success: false`; the mapped
    /// message is in [`ScanSession::error`]. Transport failures are recorded
    /// and returned.
    pub async fn verify<A: TicketApi>(
        &self,
        api: &A,
        ticket_id: &str,
    ) -> Result<TicketResponse, ApiError> {
        let _loading = self.begin_request();
        let result = api.verify(ticket_id).await;

        {
            let mut session = self.inner.lock();
            match &result {
                Ok(response) => session.apply_verify(ticket_id, response),
                Err(e) => {
                    error!("Verification error: {}", e);
                    session.record_transport_failure(e);
                }
            }
        }
        result
    }

    /// Mark a ticket used and record the outcome
    pub async fn mark_used<A: TicketApi>(
        &self,
        api: &A,
        ticket_id: &str,
    ) -> Result<TicketResponse, ApiError> {
        let _loading = self.begin_request();
        let result = api.mark_used(ticket_id).await;

        {
            let mut session = self.inner.lock();
            match &result {
                Ok(response) => session.apply_mark_used(ticket_id, response),
                Err(e) => {
                    error!("Mark-used error: {}", e);
                    session.record_transport_failure(e);
                }
            }
        }
        result
    }

    fn begin_request(&self) -> LoadingGuard {
        self.inner.lock().begin_request();
        LoadingGuard {
            session: self.inner.clone(),
        }
    }
}

/// Clears `loading` however the request ends, including cancellation
struct LoadingGuard {
    session: Arc<Mutex<ScanSession>>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.session.lock().loading = false;
    }
}
