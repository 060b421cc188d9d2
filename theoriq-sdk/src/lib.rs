//! # Theoriq SDK
//!
//! Rust SDK for agents taking part in the Theoriq protocol.
//!
//! This crate combines functionality from:
//! - `theoriq-token`: capability tokens, attenuation and request verification
//! - `theoriq-config`: configuration management
//! - `theoriq-api`: HTTP client for the token issuing service
//!
//! and adds the [`TokenProvider`], which keeps an agent's operational token
//! fresh, and the [`Agent`] facade tying them together.
//!
//! ## Feature Flags
//!
//! - `toml`: Enables configuration loading from TOML files

mod agent;
mod error;
pub mod status;
mod provider;
mod source;

pub use agent::{provider_from_config, Agent, ConfiguredProvider};
pub use error::{ProviderError, SdkError};
pub use provider::{
    CachedToken, TokenProvider, TokenSource, DEFAULT_FETCH_TIMEOUT, DEFAULT_RENEW_MARGIN_SECS,
};
pub use source::{ApiKeySource, CredentialSource, PrivateKeySource, CHALLENGE_TTL_SECS};

// Re-export everything from the component crates
pub use theoriq_token::{
    biscuit_key_from_string, keypair_from_hex, mint_agent_token, parse_bearer_header,
    public_key_from_pem_file, public_key_to_string, AddressError, AgentAddress, AuthorizationError,
    Authorizer, Biscuit, Budget, CapabilityToken, Cost, Currency, DataIntegrityError, ExpiresAt,
    Fact, FactConvertible, FactError, FactStore, HashError, KeyPair, PayloadHash, Predicate,
    ProtocolProfile, PublicKey, RawTerm, Request, RequestBiscuit, RequestFacts, RequestVerifier,
    Response, ResponseBiscuit, ResponseFacts, Subject, SubjectRule, TokenBuilder, TokenError,
    TokenTimeConfig, VerificationError, VerifiedRequest, THEORIQ,
};

pub use theoriq_config::{try_load_default_config, ConfigError, TheoriqConfig, TheoriqConfigBuilder};

pub use theoriq_api::{
    ApiError, ReqwestTransport, TheoriqClient, TheoriqClientBuilder, Transport, TransportResponse,
};
