//! Mapping of SDK failures onto HTTP responses for the service an agent runs
//! behind. Only a short message leaves the process; details stay in the logs.

use http::StatusCode;
use tracing::debug;

use theoriq_token::TokenError;

use crate::error::SdkError;

/// 401 for token rejections, 400 for malformed payloads, 500 otherwise.
pub fn status_for(err: &SdkError) -> StatusCode {
    match err {
        SdkError::Token(e) => status_for_token_error(e),
        SdkError::Payload(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn status_for_token_error(err: &TokenError) -> StatusCode {
    if err.is_rejection() {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Status and client-facing message for `err`.
pub fn error_response(err: &SdkError) -> (StatusCode, String) {
    let status = status_for(err);
    debug!("request failed with {}: {}", status, err);
    let message = match status {
        StatusCode::UNAUTHORIZED => "invalid or unauthorized token".to_string(),
        StatusCode::BAD_REQUEST => err.to_string(),
        _ => "internal error".to_string(),
    };
    (status, message)
}
