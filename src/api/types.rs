//! Ticket API Types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ticket record as mirrored from the ticketing API.
///
/// Only `status` is interpreted locally; every other field is kept verbatim
/// for display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ticket {
    /// Lifecycle status ("valid", "used", "expired", ...)
    #[serde(default)]
    pub status: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Ticket {
    pub fn with_status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            fields: Map::new(),
        }
    }

    /// Raw field lookup
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String field, if present and a string
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    pub fn is_used(&self) -> bool {
        self.status.eq_ignore_ascii_case("used")
    }
}

/// Body of `/tickets/verify/{id}` and `/tickets/mark-used/{id}`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TicketResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Ticket>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error body of a non-2xx response; only `message` is of interest
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
