//! # Theoriq
//!
//! Capability tokens for agents on the Theoriq protocol.
//!
//! Agents exchange requests and responses that carry their own authorization:
//! a biscuit issued to the agent and extended, block by block, by every party
//! that handles the exchange. Any recipient verifies it offline against the
//! issuer's public key.
//!
//! This crate re-exports [`theoriq_sdk`]; see its documentation for details.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use theoriq::{Agent, Budget, Cost, Currency, TheoriqConfig};
//!
//! # async fn example() -> Result<(), theoriq::SdkError> {
//! let config = TheoriqConfig::from_env_or_file("THEORIQ")?;
//! let agent = Agent::from_config(&config).await?;
//!
//! // inbound: verify before acting, then answer on the same token
//! # let (authorization, body) = ("bearer ...", b"{}".as_slice());
//! let verified = agent.verify_request(authorization, body)?;
//! let response = agent.respond(&verified, b"{\"answer\":42}", Cost::new("2", Currency::Usdc)?)?;
//! println!("Authorization: {}", response.to_bearer()?);
//!
//! // outbound: record what is asked of whom, and the budget for it
//! let request = agent
//!     .outbound_request(b"hello", verified.sender(), Budget::from_amount("10", Currency::Usdc)?)
//!     .await?;
//! println!("request {}", request.req_id());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `toml`: Enables configuration loading from TOML files

pub use theoriq_sdk::*;
