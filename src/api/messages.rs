//! User-facing messages for ticket API outcomes

use super::ApiError;

const TICKET_NOT_FOUND: &str = "Ticket not found. Please check the QR code and try again.";
const TICKET_ALREADY_USED: &str = "This ticket has already been used for entry.";
const TICKET_EXPIRED: &str = "This ticket has expired and is no longer valid.";
const VERIFICATION_ERROR: &str = "Unable to verify ticket. Please try again.";
const VERIFICATION_FAILED: &str = "Verification failed";

/// Message for a structured `success: false` response
pub fn error_code_message(error_code: Option<&str>, message: Option<&str>) -> String {
    let known = match error_code {
        Some("TICKET_NOT_FOUND") => Some(TICKET_NOT_FOUND),
        Some("TICKET_ALREADY_USED") => Some(TICKET_ALREADY_USED),
        Some("TICKET_EXPIRED") => Some(TICKET_EXPIRED),
        Some("VERIFICATION_ERROR") => Some(VERIFICATION_ERROR),
        _ => None,
    };

    known
        .or(non_empty(message))
        .unwrap_or(VERIFICATION_FAILED)
        .to_string()
}

/// Message for a request that never produced a usable response
pub fn transport_error_message(error: &ApiError) -> String {
    match error {
        ApiError::Status { status: 404, .. } => {
            "Ticket not found. Please check the QR code.".to_string()
        }
        ApiError::Status {
            status: 400,
            message,
        } => non_empty(message.as_deref())
            .unwrap_or("Invalid ticket or ticket already used.")
            .to_string(),
        ApiError::Status { status, .. } if *status >= 500 => {
            "Server error. Please try again later.".to_string()
        }
        ApiError::Network(_) => "Network error. Please check your connection.".to_string(),
        ApiError::Status { message, .. } => non_empty(message.as_deref())
            .unwrap_or(VERIFICATION_ERROR)
            .to_string(),
        ApiError::InvalidResponse(_) => VERIFICATION_ERROR.to_string(),
    }
}

/// Blank server messages fall back to the default text
fn non_empty(message: Option<&str>) -> Option<&str> {
    message.filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, message: Option<&str>) -> ApiError {
        ApiError::Status {
            status,
            message: message.map(str::to_string),
        }
    }

    #[test]
    fn test_known_error_codes() {
        assert_eq!(
            error_code_message(Some("TICKET_NOT_FOUND"), None),
            "Ticket not found. Please check the QR code and try again."
        );
        assert_eq!(
            error_code_message(Some("TICKET_ALREADY_USED"), Some("ignored")),
            "This ticket has already been used for entry."
        );
        assert_eq!(
            error_code_message(Some("TICKET_EXPIRED"), None),
            "This ticket has expired and is no longer valid."
        );
        assert_eq!(
            error_code_message(Some("VERIFICATION_ERROR"), None),
            "Unable to verify ticket. Please try again."
        );
    }

    #[test]
    fn test_unknown_error_code_uses_response_message() {
        assert_eq!(
            error_code_message(Some("EVENT_CLOSED"), Some("Doors are closed")),
            "Doors are closed"
        );
        assert_eq!(error_code_message(None, None), "Verification failed");
    }

    #[test]
    fn test_transport_classification() {
        assert_eq!(
            transport_error_message(&status(404, Some("nope"))),
            "Ticket not found. Please check the QR code."
        );
        assert_eq!(
            transport_error_message(&status(400, Some("Bad ticket id"))),
            "Bad ticket id"
        );
        assert_eq!(
            transport_error_message(&status(400, None)),
            "Invalid ticket or ticket already used."
        );
        assert_eq!(
            transport_error_message(&status(503, Some("down"))),
            "Server error. Please try again later."
        );
        assert_eq!(
            transport_error_message(&ApiError::Network("connection refused".into())),
            "Network error. Please check your connection."
        );
        assert_eq!(
            transport_error_message(&status(403, Some("Forbidden"))),
            "Forbidden"
        );
        assert_eq!(
            transport_error_message(&status(401, None)),
            "Unable to verify ticket. Please try again."
        );
        assert_eq!(
            transport_error_message(&ApiError::InvalidResponse("eof".into())),
            "Unable to verify ticket. Please try again."
        );
    }

    #[test]
    fn test_blank_messages_use_defaults() {
        assert_eq!(
            error_code_message(Some("EVENT_CLOSED"), Some("")),
            "Verification failed"
        );
        assert_eq!(
            error_code_message(None, Some("   ")),
            "Verification failed"
        );
        assert_eq!(
            transport_error_message(&status(400, Some(""))),
            "Invalid ticket or ticket already used."
        );
        assert_eq!(
            transport_error_message(&status(409, Some(""))),
            "Unable to verify ticket. Please try again."
        );
    }
}
