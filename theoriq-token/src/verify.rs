extern crate biscuit_auth as biscuit;

use biscuit::error::{FailedCheck, Logic, Token};
use biscuit::AuthorizerBuilder;
use chrono::Utc;
use tracing::debug;

use crate::address::AgentAddress;
use crate::error::AuthorizationError;
use crate::facts::{Predicate, AGENT_ROLE};
use crate::profile::ProtocolProfile;
use crate::token::CapabilityToken;

/// Decides whether a token authorizes a given agent right now.
///
/// Policy: allow if the authority block names `expected` as its agent subject.
/// Check: the authority block carries an expiry strictly later than `now`.
/// Both run with the engine's default trust, so facts added by attenuation
/// blocks can neither satisfy the policy nor extend the expiry.
#[derive(Debug, Clone, Copy)]
pub struct Authorizer {
    expected: AgentAddress,
    now: Option<i64>,
}

impl Authorizer {
    pub fn new(expected: AgentAddress) -> Self {
        Self {
            expected,
            now: None,
        }
    }

    /// Evaluates expiry against `now` instead of the system clock.
    pub fn at(mut self, now: i64) -> Self {
        self.now = Some(now);
        self
    }

    pub fn expected(&self) -> AgentAddress {
        self.expected
    }

    pub fn authorize(&self, token: &CapabilityToken) -> Result<(), AuthorizationError> {
        let now = self.now.unwrap_or_else(|| Utc::now().timestamp());
        let profile = token.profile();

        let check = expiry_check(profile, now);
        let policy = subject_policy(profile, &self.expected);

        let mut authorizer = AuthorizerBuilder::new()
            .check(check.as_str())
            .and_then(|builder| builder.policy(policy.as_str()))
            .and_then(|builder| builder.build(token.biscuit()))
            .map_err(|e| AuthorizationError::Evaluation(e.to_string()))?;

        match authorizer.authorize() {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!("token denied for {}: {}", self.expected, e);
                Err(self.classify(e))
            }
        }
    }

    fn classify(&self, err: Token) -> AuthorizationError {
        let (checks, matched_policy) = match &err {
            Token::FailedLogic(Logic::Unauthorized { checks, .. }) => (checks, true),
            Token::FailedLogic(Logic::NoMatchingPolicy { checks, .. }) => (checks, false),
            _ => return AuthorizationError::Evaluation(err.to_string()),
        };

        if checks
            .iter()
            .any(|check| matches!(check, FailedCheck::Authorizer(_)))
        {
            return AuthorizationError::Expired;
        }
        if let Some(FailedCheck::Block(block)) = checks
            .iter()
            .find(|check| matches!(check, FailedCheck::Block(_)))
        {
            return AuthorizationError::CheckFailed(block.rule.clone());
        }
        if !matched_policy {
            return AuthorizationError::SubjectMismatch {
                expected: self.expected,
            };
        }
        AuthorizationError::Evaluation(err.to_string())
    }
}

fn subject_policy(profile: &ProtocolProfile, expected: &AgentAddress) -> String {
    format!(
        "allow if {}(\"{}\", \"{}\")",
        profile.predicate_name(Predicate::Subject),
        AGENT_ROLE,
        expected
    )
}

fn expiry_check(profile: &ProtocolProfile, now: i64) -> String {
    format!(
        "check if {}($t), $t > {}",
        profile.predicate_name(Predicate::ExpiresAt),
        now
    )
}
