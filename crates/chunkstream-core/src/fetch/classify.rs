//! Map curl errors and HTTP status codes onto `FetchError`.

use super::error::FetchError;

/// `None` for a 2xx status, otherwise the matching `FetchError::Http`.
pub fn classify_http_status(code: u32) -> Option<FetchError> {
    match code {
        200..=299 => None,
        _ => Some(FetchError::Http(code)),
    }
}

/// Classify a curl error. An abort from the progress callback is a cancellation.
pub fn classify_curl_error(e: &curl::Error) -> FetchError {
    if e.is_aborted_by_callback() {
        return FetchError::Cancelled;
    }
    if e.is_operation_timedout() {
        return FetchError::Timeout(e.to_string());
    }
    FetchError::Transport(e.to_string())
}

impl From<curl::Error> for FetchError {
    fn from(e: curl::Error) -> Self {
        classify_curl_error(&e)
    }
}
