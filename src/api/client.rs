//! Ticket API Client
//!
//! Issues the verify / mark-used calls against the ticketing service.

use log::{error, info};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;

use super::types::{ErrorBody, TicketResponse};
use super::{ApiError, TicketApi};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

pub struct TicketApiClient {
    client: Client,
    base_url: String,
}

impl TicketApiClient {
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(DEFAULT_API_BASE)
    }

    /// Client with a cookie store, so session cookies issued by the API are
    /// sent back on later calls
    pub fn with_base_url(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, action: &str, ticket_id: &str) -> String {
        format!(
            "{}/tickets/{}/{}",
            self.base_url,
            action,
            urlencoding::encode(ticket_id)
        )
    }

    async fn get_ticket(&self, url: &str) -> Result<TicketResponse, ApiError> {
        info!("Ticket API request: GET {}", url);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Ticket API error: {} - {}", status, body);
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await.map_err(classify)?;
        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

fn classify(e: reqwest::Error) -> ApiError {
    if let Some(status) = e.status() {
        ApiError::Status {
            status: status.as_u16(),
            message: None,
        }
    } else if e.is_decode() {
        ApiError::InvalidResponse(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}

impl TicketApi for TicketApiClient {
    async fn verify(&self, ticket_id: &str) -> Result<TicketResponse, ApiError> {
        self.get_ticket(&self.endpoint("verify", ticket_id)).await
    }

    async fn mark_used(&self, ticket_id: &str) -> Result<TicketResponse, ApiError> {
        self.get_ticket(&self.endpoint("mark-used", ticket_id)).await
    }
}
