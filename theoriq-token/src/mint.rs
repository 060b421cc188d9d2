extern crate biscuit_auth as biscuit;

use biscuit::{Biscuit, KeyPair};
use chrono::Utc;
use tracing::info;

use crate::address::AgentAddress;
use crate::error::TokenError;
use crate::facts::{ExpiresAt, Fact, FactError, Subject};
use crate::profile::{ProtocolProfile, THEORIQ};
use crate::token::CapabilityToken;

/// TokenTimeConfig allows control over token creation times and durations
#[derive(Debug, Clone, Copy)]
pub struct TokenTimeConfig {
    /// Optional custom start time (now time override)
    pub start_time: Option<i64>,
    /// Lifetime in seconds (default: one hour)
    pub duration: i64,
}

impl TokenTimeConfig {
    pub fn expires_at(&self) -> i64 {
        self.start_time.unwrap_or_else(|| Utc::now().timestamp()) + self.duration
    }
}

impl Default for TokenTimeConfig {
    fn default() -> Self {
        Self {
            start_time: None,
            duration: 3600,
        }
    }
}

/// Builds the authority block of a new token.
///
/// The block always carries exactly one `Subject` and one `ExpiresAt`; extra
/// facts may be added but cannot repeat either of them.
#[derive(Debug, Clone)]
pub struct TokenBuilder {
    subject: AgentAddress,
    expires_at: i64,
    facts: Vec<Fact>,
    profile: ProtocolProfile,
}

impl TokenBuilder {
    pub fn new(subject: AgentAddress, expires_at: i64) -> Self {
        Self {
            subject,
            expires_at,
            facts: Vec::new(),
            profile: THEORIQ,
        }
    }

    pub fn with_profile(mut self, profile: ProtocolProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn fact(mut self, fact: impl Into<Fact>) -> Result<Self, TokenError> {
        let fact = fact.into();
        if self.profile.is_authority(fact.predicate()) {
            return Err(FactError::AuthorityFact(fact.predicate()).into());
        }
        self.facts.push(fact);
        Ok(self)
    }

    /// Signs the authority block with `keypair`.
    ///
    /// # Arguments
    ///
    /// * `keypair` - The issuer keypair; receivers verify against its public key
    ///
    /// # Returns
    ///
    /// A single-block token carrying the subject, the expiry and any extra facts
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Biscuit`] if a fact is rejected by the biscuit
    /// builder or signing fails.
    pub fn build(self, keypair: &KeyPair) -> Result<CapabilityToken, TokenError> {
        let authority = [
            Fact::from(Subject::agent(self.subject)),
            Fact::from(ExpiresAt(self.expires_at)),
        ];

        let mut builder = Biscuit::builder();
        for fact in authority.iter().chain(self.facts.iter()) {
            builder = builder.fact(fact.to_biscuit_fact(&self.profile))?;
        }

        let biscuit = builder.build(keypair)?;
        info!("biscuit (authority): {}", biscuit);

        Ok(CapabilityToken::from_biscuit(biscuit, self.profile))
    }
}

/// Mints an agent token for `subject` signed by `keypair`.
pub fn mint_agent_token(
    subject: AgentAddress,
    keypair: &KeyPair,
    time_config: TokenTimeConfig,
) -> Result<CapabilityToken, TokenError> {
    TokenBuilder::new(subject, time_config.expires_at()).build(keypair)
}
