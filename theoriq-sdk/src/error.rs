use std::time::Duration;

use thiserror::Error;

use theoriq_api::ApiError;
use theoriq_config::ConfigError;
use theoriq_token::{FactError, TokenError};

/// Errors that can occur in the Theoriq SDK
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// API error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Token error
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// The token provider could not hand out a token
    #[error("Token provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Request payload does not match the expected schema
    #[error("Invalid payload: {0}")]
    Payload(String),

    /// Generic error
    #[error("{0}")]
    Generic(String),
}

impl SdkError {
    pub fn payload(msg: impl Into<String>) -> Self {
        SdkError::Payload(msg.into())
    }

    pub fn generic(msg: impl Into<String>) -> Self {
        SdkError::Generic(msg.into())
    }
}

impl From<FactError> for SdkError {
    fn from(err: FactError) -> Self {
        SdkError::Token(err.into())
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Payload(err.to_string())
    }
}

/// Why a [`TokenProvider`](crate::TokenProvider) could not produce a token.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No usable credential: {0}")]
    MissingCredential(String),

    #[error("Token renewal failed: {0}")]
    Renewal(String),

    #[error("Token renewal timed out after {0:?}")]
    Timeout(Duration),

    #[error("Issued token rejected: {0}")]
    Token(#[from] TokenError),

    #[error("Issuer request failed: {0}")]
    Api(#[from] ApiError),
}
