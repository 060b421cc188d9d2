//! Request and response views over a capability token.

use biscuit_auth::KeyPair;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::address::AgentAddress;
use crate::error::TokenError;
use crate::facts::{Budget, Cost, Fact, Request, Response};
use crate::hash::PayloadHash;
use crate::token::CapabilityToken;

/// The `Request` and `Budget` facts of one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestFacts {
    pub req_id: Uuid,
    pub request: Request,
    pub budget: Budget,
}

impl RequestFacts {
    pub fn from_biscuit(token: &CapabilityToken) -> Result<Self, TokenError> {
        let (req_id, request, budget) = token.facts()?.request_facts()?;
        Ok(Self {
            req_id,
            request,
            budget,
        })
    }

    pub fn to_facts(&self) -> [Fact; 2] {
        [
            Fact::Request(self.req_id, self.request.clone()),
            Fact::Budget(self.req_id, self.budget.clone()),
        ]
    }
}

/// The `Response` and `Cost` facts of one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseFacts {
    pub req_id: Uuid,
    pub response: Response,
    pub cost: Cost,
}

impl ResponseFacts {
    pub fn from_biscuit(token: &CapabilityToken) -> Result<Self, TokenError> {
        let (req_id, response, cost) = token.facts()?.response_facts()?;
        Ok(Self {
            req_id,
            response,
            cost,
        })
    }

    pub fn to_facts(&self) -> [Fact; 2] {
        [
            Fact::Response(self.req_id, self.response.clone()),
            Fact::Cost(self.req_id, self.cost.clone()),
        ]
    }
}

/// A token carrying exactly one request, with its facts extracted up front.
#[derive(Debug, Clone)]
pub struct RequestBiscuit {
    token: CapabilityToken,
    facts: RequestFacts,
}

impl RequestBiscuit {
    /// Wraps `token`, failing immediately if its request facts are missing,
    /// duplicated or unpaired.
    pub fn new(token: CapabilityToken) -> Result<Self, TokenError> {
        let facts = RequestFacts::from_biscuit(&token)?;
        Ok(Self { token, facts })
    }

    /// Sender side: binds `request` and `budget` to a fresh request id and
    /// appends them to `token` as a block signed by `sender_key`.
    pub fn attenuate_for_request(
        token: &CapabilityToken,
        request: Request,
        budget: Budget,
        sender_key: &KeyPair,
    ) -> Result<Self, TokenError> {
        let facts = RequestFacts {
            req_id: Uuid::new_v4(),
            request,
            budget,
        };
        let attenuated = token.attenuate(&facts.to_facts(), sender_key)?;
        info!(
            "request {} from {} to {}",
            facts.req_id, facts.request.from_addr, facts.request.to_addr
        );
        RequestBiscuit::new(attenuated)
    }

    /// Receiver side: records the response body and its cost, addressed back
    /// to the original sender under the same request id.
    pub fn attenuate_for_response(
        &self,
        body: &[u8],
        cost: Cost,
        signer_key: &KeyPair,
    ) -> Result<ResponseBiscuit, TokenError> {
        let facts = ResponseFacts {
            req_id: self.facts.req_id,
            response: Response::new(body, self.facts.request.from_addr),
            cost,
        };
        let attenuated = self.token.attenuate(&facts.to_facts(), signer_key)?;
        info!(
            "response {} to {} costing {} {}",
            facts.req_id,
            facts.response.to_addr,
            facts.cost.amount(),
            facts.cost.currency()
        );
        Ok(ResponseBiscuit {
            token: attenuated,
            facts,
        })
    }

    pub fn req_id(&self) -> Uuid {
        self.facts.req_id
    }

    pub fn target_address(&self) -> AgentAddress {
        self.facts.request.to_addr
    }

    pub fn body_hash(&self) -> PayloadHash {
        self.facts.request.body_hash
    }

    pub fn request_facts(&self) -> &RequestFacts {
        &self.facts
    }

    pub fn token(&self) -> &CapabilityToken {
        &self.token
    }

    /// `bearer <token>`, ready for an `Authorization` header.
    pub fn to_bearer(&self) -> Result<String, TokenError> {
        Ok(format!("bearer {}", self.token.to_encoded()?))
    }
}

/// A token carrying the response to a request.
#[derive(Debug, Clone)]
pub struct ResponseBiscuit {
    token: CapabilityToken,
    facts: ResponseFacts,
}

impl ResponseBiscuit {
    pub fn new(token: CapabilityToken) -> Result<Self, TokenError> {
        let facts = ResponseFacts::from_biscuit(&token)?;
        Ok(Self { token, facts })
    }

    pub fn req_id(&self) -> Uuid {
        self.facts.req_id
    }

    pub fn response_facts(&self) -> &ResponseFacts {
        &self.facts
    }

    pub fn token(&self) -> &CapabilityToken {
        &self.token
    }

    pub fn to_bearer(&self) -> Result<String, TokenError> {
        Ok(format!("bearer {}", self.token.to_encoded()?))
    }
}
