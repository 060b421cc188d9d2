use thiserror::Error;
use uuid::Uuid;

use crate::address::{AddressError, AgentAddress};
use crate::facts::{FactError, Predicate};
use crate::hash::{HashError, PayloadHash};

/// Errors raised while building, parsing, authorizing or verifying tokens.
#[derive(Error, Debug)]
pub enum TokenError {
    /// Malformed encoding or a signature that does not verify. Deliberately
    /// carries no detail about which part failed.
    #[error("failed to parse token")]
    Parse,

    #[error("authorization failed: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("malformed token facts: {0}")]
    DataIntegrity(#[from] DataIntegrityError),

    #[error("invalid fact: {0}")]
    Fact(#[from] FactError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("biscuit error: {0}")]
    Biscuit(String),

    #[error("{0}")]
    Generic(String),
}

impl TokenError {
    pub fn generic(msg: impl Into<String>) -> Self {
        TokenError::Generic(msg.into())
    }

    pub fn invalid_key_format(msg: impl Into<String>) -> Self {
        TokenError::InvalidKeyFormat(msg.into())
    }

    pub fn biscuit_error(err: biscuit_auth::error::Token) -> Self {
        TokenError::Biscuit(err.to_string())
    }

    /// True for the failures a receiving agent must answer with "unauthorized".
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TokenError::Parse
                | TokenError::Authorization(_)
                | TokenError::Verification(_)
                | TokenError::DataIntegrity(_)
        )
    }
}

impl From<biscuit_auth::error::Token> for TokenError {
    fn from(err: biscuit_auth::error::Token) -> Self {
        TokenError::biscuit_error(err)
    }
}

impl From<hex::FromHexError> for TokenError {
    fn from(err: hex::FromHexError) -> Self {
        TokenError::InvalidKeyFormat(err.to_string())
    }
}

/// Why the authorizer denied a structurally valid token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("token does not authorize agent {expected}")]
    SubjectMismatch { expected: AgentAddress },

    #[error("token is expired or carries no expiry")]
    Expired,

    #[error("token check failed: {0}")]
    CheckFailed(String),

    #[error("authorization could not be evaluated: {0}")]
    Evaluation(String),
}

/// The token was authorized but does not describe the request actually received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("request is addressed to {actual}, not to {expected}")]
    RecipientMismatch {
        expected: AgentAddress,
        actual: AgentAddress,
    },

    #[error("body hash {actual} does not match request body hash {expected}")]
    BodyHashMismatch {
        expected: PayloadHash,
        actual: PayloadHash,
    },
}

/// Joined facts are missing, duplicated or unreadable inside a signed token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataIntegrityError {
    #[error("token carries no {0} fact")]
    Missing(Predicate),

    #[error("token carries {count} competing {predicate} facts")]
    Duplicate { predicate: Predicate, count: usize },

    #[error("{predicate} fact for request {req_id} has no matching {missing} fact")]
    Unpaired {
        predicate: Predicate,
        missing: Predicate,
        req_id: Uuid,
    },

    #[error("unreadable {predicate} fact: {reason}")]
    Malformed { predicate: Predicate, reason: String },
}
