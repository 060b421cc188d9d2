use biscuit_auth::{KeyPair, PublicKey};
use tracing::{debug, info};
use uuid::Uuid;

use crate::address::AgentAddress;
use crate::error::{TokenError, VerificationError};
use crate::exchange::{RequestBiscuit, RequestFacts, ResponseBiscuit};
use crate::facts::Cost;
use crate::hash::PayloadHash;
use crate::profile::{ProtocolProfile, THEORIQ};
use crate::token::CapabilityToken;
use crate::verify::Authorizer;

/// Extracts the token from an `Authorization: bearer <token>` header value.
/// The scheme is matched case-insensitively.
pub fn parse_bearer_header(value: &str) -> Result<&str, TokenError> {
    let (scheme, token) = value.trim().split_once(' ').ok_or(TokenError::Parse)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        debug!("unsupported authorization scheme: {}", scheme);
        return Err(TokenError::Parse);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Parse);
    }
    Ok(token)
}

/// Which subject a token must be issued to for a request to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectRule {
    /// The receiving agent's own address.
    Receiver,
    /// The sender named in the token's own `Request` fact.
    Sender,
    /// A fixed address.
    Fixed(AgentAddress),
}

/// Checks an incoming request before the receiving agent acts on it.
///
/// In order: the token parses and verifies against the issuer key, it
/// authorizes the subject, its `Request` is addressed to this agent, and the
/// received body hashes to the recorded `body_hash`.
#[derive(Debug, Clone)]
pub struct RequestVerifier {
    issuer_key: PublicKey,
    own_address: AgentAddress,
    subject: SubjectRule,
    now: Option<i64>,
    profile: ProtocolProfile,
}

impl RequestVerifier {
    pub fn new(issuer_key: PublicKey, own_address: AgentAddress) -> Self {
        Self {
            issuer_key,
            own_address,
            subject: SubjectRule::Receiver,
            now: None,
            profile: THEORIQ,
        }
    }

    /// Authorizes tokens issued to `subject` rather than to this agent's own
    /// address.
    pub fn with_subject(mut self, subject: AgentAddress) -> Self {
        self.subject = SubjectRule::Fixed(subject);
        self
    }

    /// Authorizes tokens issued to the agent that sent the request, as named
    /// by the token's `Request` fact. A sender can then only present its own
    /// token.
    pub fn with_sender_subject(mut self) -> Self {
        self.subject = SubjectRule::Sender;
        self
    }

    pub fn subject_rule(&self) -> SubjectRule {
        self.subject
    }

    pub fn with_profile(mut self, profile: ProtocolProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Evaluates expiry at `now` instead of the system clock.
    pub fn at(mut self, now: i64) -> Self {
        self.now = Some(now);
        self
    }

    pub fn own_address(&self) -> AgentAddress {
        self.own_address
    }

    /// Verifies a transport-encoded request token against the received body.
    ///
    /// # Arguments
    ///
    /// * `encoded` - The request token, without the `bearer` scheme
    /// * `body` - The raw request body as received
    ///
    /// # Returns
    ///
    /// A [`VerifiedRequest`] that can be answered with
    /// [`VerifiedRequest::respond`].
    ///
    /// # Errors
    ///
    /// * [`TokenError::Parse`] if the token does not decode or verify against
    ///   the issuer key
    /// * [`TokenError::Authorization`] if the token is expired, not issued to
    ///   the expected subject, or a block check fails
    /// * [`TokenError::DataIntegrity`] if the token carries no single readable
    ///   `Request` and `Budget` pair
    /// * [`TokenError::Verification`] if the request is addressed to another
    ///   agent or the body does not match its recorded hash
    pub fn verify(&self, encoded: &str, body: &[u8]) -> Result<VerifiedRequest, TokenError> {
        let token =
            CapabilityToken::from_encoded_with_profile(encoded, self.issuer_key, self.profile)?;

        let subject = match self.subject {
            SubjectRule::Receiver => self.own_address,
            SubjectRule::Fixed(subject) => subject,
            SubjectRule::Sender => RequestFacts::from_biscuit(&token)?.request.from_addr,
        };
        let mut authorizer = Authorizer::new(subject);
        if let Some(now) = self.now {
            authorizer = authorizer.at(now);
        }
        authorizer.authorize(&token)?;

        let request = RequestBiscuit::new(token)?;

        if request.target_address() != self.own_address {
            return Err(VerificationError::RecipientMismatch {
                expected: self.own_address,
                actual: request.target_address(),
            }
            .into());
        }

        let received = PayloadHash::of(body);
        if received != request.body_hash() {
            return Err(VerificationError::BodyHashMismatch {
                expected: request.body_hash(),
                actual: received,
            }
            .into());
        }

        info!("verified request {} for {}", request.req_id(), self.own_address);
        Ok(VerifiedRequest { request })
    }

    /// Same as [`verify`](Self::verify), starting from the raw header value.
    pub fn verify_header(
        &self,
        authorization: &str,
        body: &[u8],
    ) -> Result<VerifiedRequest, TokenError> {
        self.verify(parse_bearer_header(authorization)?, body)
    }
}

/// A request that passed every verification step. Only a verified request
/// can be answered.
#[derive(Debug, Clone)]
pub struct VerifiedRequest {
    request: RequestBiscuit,
}

impl VerifiedRequest {
    pub fn req_id(&self) -> Uuid {
        self.request.req_id()
    }

    pub fn sender(&self) -> AgentAddress {
        self.request.request_facts().request.from_addr
    }

    pub fn request_facts(&self) -> &RequestFacts {
        self.request.request_facts()
    }

    pub fn request_biscuit(&self) -> &RequestBiscuit {
        &self.request
    }

    /// Attenuates the verified token with this agent's response.
    pub fn respond(
        &self,
        body: &[u8],
        cost: Cost,
        signer_key: &KeyPair,
    ) -> Result<ResponseBiscuit, TokenError> {
        self.request.attenuate_for_response(body, cost, signer_key)
    }
}
