//! Error categorization.
//!
//! Maps transport errors onto the upload failure taxonomy so that the delivery
//! controller and the notification sink see one consistent set of outcomes.

use super::types::UploadError;

/// Categorizes a `reqwest::Error` into an `UploadError`.
///
/// Status errors keep their code, timeouts and connect failures get their own
/// variants, and everything else is reported as a generic request error.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> UploadError {
    // Check HTTP status codes first
    if let Some(status) = error.status() {
        return UploadError::Status(status.as_u16());
    }

    if error.is_timeout() {
        UploadError::Timeout
    } else if error.is_connect() {
        UploadError::Connectivity(error.to_string())
    } else if error.is_builder() {
        UploadError::Request(format!("invalid request: {error}"))
    } else {
        UploadError::Request(error.to_string())
    }
}
