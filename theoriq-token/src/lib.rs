//! # Theoriq Token
//!
//! Capability tokens for Theoriq agents.
//!
//! A token is a biscuit whose authority block, signed by the issuer, names the
//! agent it was issued to (`theoriq:subject`) and when it expires
//! (`theoriq:expires_at`). Each party that handles a request appends its own
//! independently signed block: the sender records the request and its budget,
//! the receiver records the response and what it cost. Earlier blocks can never
//! be rewritten, so the token doubles as an audit trail of the exchange.
//!
//! This crate has no networking dependencies.
//!
//! ## Usage
//!
//! ```no_run
//! use theoriq_token::{
//!     biscuit_key_from_string, Budget, Currency, KeyPair, Request, RequestBiscuit,
//!     RequestVerifier, TokenBuilder, AgentAddress,
//! };
//!
//! fn main() -> Result<(), theoriq_token::TokenError> {
//!     let issuer = KeyPair::new();
//!     let me = AgentAddress::one();
//!     let peer: AgentAddress = "0x0202020202020202020202020202020202020202020202020202020202020202".parse()?;
//!
//!     let token = TokenBuilder::new(me, 4_000_000_000).build(&issuer)?;
//!     let request = RequestBiscuit::attenuate_for_request(
//!         &token,
//!         Request::new(b"hello", me, peer),
//!         Budget::from_amount("10", Currency::Usdc)?,
//!         &KeyPair::new(),
//!     )?;
//!
//!     let issuer_key = biscuit_key_from_string(&issuer.public().to_string())?;
//!     let verified = RequestVerifier::new(issuer_key, peer)
//!         .with_subject(me)
//!         .verify(&request.token().to_encoded()?, b"hello")?;
//!     println!("verified request {}", verified.req_id());
//!     Ok(())
//! }
//! ```

mod address;
mod attenuate;
mod currency;
mod error;
mod exchange;
mod facts;
mod hash;
mod keys;
mod mint;
mod profile;
mod store;
mod token;
mod verifier;
mod verify;

pub use address::{AddressError, AgentAddress, ADDRESS_LEN};
pub use currency::Currency;
pub use error::{AuthorizationError, DataIntegrityError, TokenError, VerificationError};
pub use exchange::{RequestBiscuit, RequestFacts, ResponseBiscuit, ResponseFacts};
pub use facts::{
    Budget, Cost, ExpiresAt, Fact, FactConvertible, FactError, Predicate, RawTerm, Request,
    Response, Subject, AGENT_ROLE,
};
pub use hash::{HashError, PayloadHash};
pub use keys::{
    biscuit_key_from_string, keypair_from_hex, public_key_from_pem_file, public_key_to_string,
};
pub use mint::{mint_agent_token, TokenBuilder, TokenTimeConfig};
pub use profile::{ProtocolProfile, THEORIQ};
pub use store::FactStore;
pub use token::CapabilityToken;
pub use verifier::{parse_bearer_header, RequestVerifier, SubjectRule, VerifiedRequest};
pub use verify::Authorizer;

// Re-export biscuit types that are needed for public API
pub use biscuit_auth::{Biscuit, KeyPair, PublicKey};
