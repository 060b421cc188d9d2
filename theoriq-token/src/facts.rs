//! Typed facts carried by Theoriq tokens.
//!
//! Each fact type knows its predicate and its fixed term layout. Facts that
//! belong to one request/response exchange (`Request`, `Budget`, `Response`,
//! `Cost`) do not store their correlation id: it is supplied when the fact is
//! serialized and handed back when it is parsed, so `(req_id, fact)` is the
//! unit that round-trips.

use std::fmt;

use biscuit_auth::builder::{self, Term};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::address::AgentAddress;
use crate::currency::Currency;
use crate::hash::PayloadHash;
use crate::profile::{ProtocolProfile, THEORIQ};

/// Role string every agent subject carries.
pub const AGENT_ROLE: &str = "agent";

/// A single term as it appears in a token fact.
///
/// Theoriq facts only use strings and integers; any other term found in a
/// token is kept as is so that it fails type checks instead of loading.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RawTerm {
    Str(String),
    Int(i64),
    Other(Term),
}

impl RawTerm {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawTerm::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RawTerm::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn to_term(&self) -> Term {
        match self {
            RawTerm::Str(value) => builder::string(value),
            RawTerm::Int(value) => builder::int(*value),
            RawTerm::Other(term) => term.clone(),
        }
    }
}

impl fmt::Display for RawTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawTerm::Str(value) => write!(f, "{:?}", value),
            RawTerm::Int(value) => write!(f, "{}", value),
            RawTerm::Other(term) => write!(f, "{}", term),
        }
    }
}

impl From<Term> for RawTerm {
    fn from(term: Term) -> Self {
        match term {
            Term::Str(value) => RawTerm::Str(value),
            Term::Integer(value) => RawTerm::Int(value),
            other => RawTerm::Other(other),
        }
    }
}

impl From<&str> for RawTerm {
    fn from(value: &str) -> Self {
        RawTerm::Str(value.to_string())
    }
}

impl From<String> for RawTerm {
    fn from(value: String) -> Self {
        RawTerm::Str(value)
    }
}

impl From<i64> for RawTerm {
    fn from(value: i64) -> Self {
        RawTerm::Int(value)
    }
}

/// Predicates of the fact schema, without namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Predicate {
    Subject,
    ExpiresAt,
    Request,
    Budget,
    Response,
    Cost,
}

impl Predicate {
    pub const ALL: [Predicate; 6] = [
        Predicate::Subject,
        Predicate::ExpiresAt,
        Predicate::Request,
        Predicate::Budget,
        Predicate::Response,
        Predicate::Cost,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Predicate::Subject => "subject",
            Predicate::ExpiresAt => "expires_at",
            Predicate::Request => "request",
            Predicate::Budget => "budget",
            Predicate::Response => "response",
            Predicate::Cost => "cost",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Predicate::Subject => 2,
            Predicate::ExpiresAt => 1,
            Predicate::Request | Predicate::Budget => 4,
            Predicate::Response | Predicate::Cost => 3,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactError {
    #[error("budget amount requires a currency")]
    MissingCurrency,

    #[error("budget cannot carry both an amount and a voucher")]
    AmountAndVoucher,

    #[error("budget needs either an amount or a voucher")]
    EmptyBudget,

    #[error("invalid amount '{0}': expected a non-negative decimal")]
    InvalidAmount(String),

    #[error("unknown currency '{0}'")]
    UnknownCurrency(String),

    #[error("{predicate} expects {expected} terms, got {actual}")]
    Arity {
        predicate: Predicate,
        expected: usize,
        actual: usize,
    },

    #[error("term {position} of {predicate} must be a {expected}")]
    TermType {
        predicate: Predicate,
        position: usize,
        expected: &'static str,
    },

    #[error("term {position} of {predicate} is invalid: {reason}")]
    InvalidTerm {
        predicate: Predicate,
        position: usize,
        reason: String,
    },

    #[error("{0} is part of the authority contract and is set by the token builder")]
    AuthorityFact(Predicate),
}

/// Conversion between a typed fact and its ordered term list.
pub trait FactConvertible: Sized {
    /// Correlation key supplied alongside the fact: `()` for authority facts,
    /// the request id for exchange facts.
    type Key;

    const PREDICATE: Predicate;

    fn to_representation(&self, key: &Self::Key) -> Vec<RawTerm>;

    fn from_representation(terms: &[RawTerm]) -> Result<(Self::Key, Self), FactError>;
}

struct Terms<'a> {
    predicate: Predicate,
    terms: &'a [RawTerm],
}

impl<'a> Terms<'a> {
    fn new(predicate: Predicate, terms: &'a [RawTerm]) -> Result<Self, FactError> {
        if terms.len() != predicate.arity() {
            return Err(FactError::Arity {
                predicate,
                expected: predicate.arity(),
                actual: terms.len(),
            });
        }
        Ok(Self { predicate, terms })
    }

    fn str(&self, position: usize) -> Result<&'a str, FactError> {
        self.terms[position]
            .as_str()
            .ok_or(FactError::TermType {
                predicate: self.predicate,
                position,
                expected: "string",
            })
    }

    fn int(&self, position: usize) -> Result<i64, FactError> {
        self.terms[position].as_int().ok_or(FactError::TermType {
            predicate: self.predicate,
            position,
            expected: "integer",
        })
    }

    fn parse<T, E: fmt::Display>(
        &self,
        position: usize,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> Result<T, FactError> {
        parse(self.str(position)?).map_err(|e| FactError::InvalidTerm {
            predicate: self.predicate,
            position,
            reason: e.to_string(),
        })
    }

    fn req_id(&self, position: usize) -> Result<Uuid, FactError> {
        self.parse(position, Uuid::parse_str)
    }

    fn address(&self, position: usize) -> Result<AgentAddress, FactError> {
        self.parse(position, AgentAddress::new)
    }

    fn hash(&self, position: usize) -> Result<PayloadHash, FactError> {
        self.parse(position, PayloadHash::new)
    }
}

fn validate_amount(amount: &str) -> Result<(), FactError> {
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    let valid = match amount.split_once('.') {
        Some((whole, fraction)) => digits(whole) && digits(fraction),
        None => digits(amount),
    };
    if valid {
        Ok(())
    } else {
        Err(FactError::InvalidAmount(amount.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub role: String,
    pub address: AgentAddress,
}

impl Subject {
    pub fn agent(address: AgentAddress) -> Self {
        Self {
            role: AGENT_ROLE.to_string(),
            address,
        }
    }
}

impl FactConvertible for Subject {
    type Key = ();
    const PREDICATE: Predicate = Predicate::Subject;

    fn to_representation(&self, _: &()) -> Vec<RawTerm> {
        vec![
            RawTerm::from(self.role.as_str()),
            RawTerm::from(self.address.to_string()),
        ]
    }

    fn from_representation(terms: &[RawTerm]) -> Result<((), Self), FactError> {
        let terms = Terms::new(Self::PREDICATE, terms)?;
        Ok((
            (),
            Subject {
                role: terms.str(0)?.to_string(),
                address: terms.address(1)?,
            },
        ))
    }
}

/// Unix timestamp (seconds) after which the token is no longer valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ExpiresAt(pub i64);

impl ExpiresAt {
    pub fn timestamp(&self) -> i64 {
        self.0
    }
}

impl FactConvertible for ExpiresAt {
    type Key = ();
    const PREDICATE: Predicate = Predicate::ExpiresAt;

    fn to_representation(&self, _: &()) -> Vec<RawTerm> {
        vec![RawTerm::Int(self.0)]
    }

    fn from_representation(terms: &[RawTerm]) -> Result<((), Self), FactError> {
        let terms = Terms::new(Self::PREDICATE, terms)?;
        Ok(((), ExpiresAt(terms.int(0)?)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    pub body_hash: PayloadHash,
    pub from_addr: AgentAddress,
    pub to_addr: AgentAddress,
}

impl Request {
    pub fn new(body: &[u8], from_addr: AgentAddress, to_addr: AgentAddress) -> Self {
        Self {
            body_hash: PayloadHash::of(body),
            from_addr,
            to_addr,
        }
    }
}

impl FactConvertible for Request {
    type Key = Uuid;
    const PREDICATE: Predicate = Predicate::Request;

    fn to_representation(&self, req_id: &Uuid) -> Vec<RawTerm> {
        vec![
            RawTerm::from(req_id.to_string()),
            RawTerm::from(self.body_hash.to_string()),
            RawTerm::from(self.from_addr.to_string()),
            RawTerm::from(self.to_addr.to_string()),
        ]
    }

    fn from_representation(terms: &[RawTerm]) -> Result<(Uuid, Self), FactError> {
        let terms = Terms::new(Self::PREDICATE, terms)?;
        Ok((
            terms.req_id(0)?,
            Request {
                body_hash: terms.hash(1)?,
                from_addr: terms.address(2)?,
                to_addr: terms.address(3)?,
            },
        ))
    }
}

/// What the sender is willing to pay for a request: an amount in a currency,
/// or an opaque voucher. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Budget {
    amount: String,
    currency: Option<Currency>,
    voucher: String,
}

impl Budget {
    pub fn new(
        amount: impl Into<String>,
        currency: Option<Currency>,
        voucher: impl Into<String>,
    ) -> Result<Self, FactError> {
        let amount = amount.into();
        let voucher = voucher.into();

        match (amount.is_empty(), voucher.is_empty()) {
            (false, false) => return Err(FactError::AmountAndVoucher),
            (true, true) => return Err(FactError::EmptyBudget),
            (false, true) => {
                if currency.is_none() {
                    return Err(FactError::MissingCurrency);
                }
                validate_amount(&amount)?;
            }
            (true, false) => {}
        }

        Ok(Self {
            amount,
            currency,
            voucher,
        })
    }

    pub fn from_amount(amount: impl Into<String>, currency: Currency) -> Result<Self, FactError> {
        Self::new(amount, Some(currency), "")
    }

    pub fn from_voucher(voucher: impl Into<String>) -> Result<Self, FactError> {
        Self::new("", None, voucher)
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn currency(&self) -> Option<Currency> {
        self.currency
    }

    pub fn voucher(&self) -> &str {
        &self.voucher
    }
}

impl FactConvertible for Budget {
    type Key = Uuid;
    const PREDICATE: Predicate = Predicate::Budget;

    fn to_representation(&self, req_id: &Uuid) -> Vec<RawTerm> {
        vec![
            RawTerm::from(req_id.to_string()),
            RawTerm::from(self.amount.as_str()),
            RawTerm::from(self.currency.map(|c| c.code()).unwrap_or("")),
            RawTerm::from(self.voucher.as_str()),
        ]
    }

    fn from_representation(terms: &[RawTerm]) -> Result<(Uuid, Self), FactError> {
        let terms = Terms::new(Self::PREDICATE, terms)?;
        let currency = match terms.str(2)? {
            "" => None,
            _ => Some(terms.parse(2, Currency::parse)?),
        };
        let budget = Budget::new(terms.str(1)?, currency, terms.str(3)?)?;
        Ok((terms.req_id(0)?, budget))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub body_hash: PayloadHash,
    pub to_addr: AgentAddress,
}

impl Response {
    pub fn new(body: &[u8], to_addr: AgentAddress) -> Self {
        Self {
            body_hash: PayloadHash::of(body),
            to_addr,
        }
    }
}

impl FactConvertible for Response {
    type Key = Uuid;
    const PREDICATE: Predicate = Predicate::Response;

    fn to_representation(&self, req_id: &Uuid) -> Vec<RawTerm> {
        vec![
            RawTerm::from(req_id.to_string()),
            RawTerm::from(self.body_hash.to_string()),
            RawTerm::from(self.to_addr.to_string()),
        ]
    }

    fn from_representation(terms: &[RawTerm]) -> Result<(Uuid, Self), FactError> {
        let terms = Terms::new(Self::PREDICATE, terms)?;
        Ok((
            terms.req_id(0)?,
            Response {
                body_hash: terms.hash(1)?,
                to_addr: terms.address(2)?,
            },
        ))
    }
}

/// What the receiver charged for serving a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cost {
    amount: String,
    currency: Currency,
}

impl Cost {
    pub fn new(amount: impl Into<String>, currency: Currency) -> Result<Self, FactError> {
        let amount = amount.into();
        validate_amount(&amount)?;
        Ok(Self { amount, currency })
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }
}

impl FactConvertible for Cost {
    type Key = Uuid;
    const PREDICATE: Predicate = Predicate::Cost;

    fn to_representation(&self, req_id: &Uuid) -> Vec<RawTerm> {
        vec![
            RawTerm::from(req_id.to_string()),
            RawTerm::from(self.amount.as_str()),
            RawTerm::from(self.currency.code()),
        ]
    }

    fn from_representation(terms: &[RawTerm]) -> Result<(Uuid, Self), FactError> {
        let terms = Terms::new(Self::PREDICATE, terms)?;
        let currency = terms.parse(2, Currency::parse)?;
        let cost = Cost::new(terms.str(1)?, currency)?;
        Ok((terms.req_id(0)?, cost))
    }
}

/// Any fact of the schema, with its correlation id where it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    Subject(Subject),
    ExpiresAt(ExpiresAt),
    Request(Uuid, Request),
    Budget(Uuid, Budget),
    Response(Uuid, Response),
    Cost(Uuid, Cost),
}

impl Fact {
    pub fn predicate(&self) -> Predicate {
        match self {
            Fact::Subject(_) => Predicate::Subject,
            Fact::ExpiresAt(_) => Predicate::ExpiresAt,
            Fact::Request(..) => Predicate::Request,
            Fact::Budget(..) => Predicate::Budget,
            Fact::Response(..) => Predicate::Response,
            Fact::Cost(..) => Predicate::Cost,
        }
    }

    pub fn terms(&self) -> Vec<RawTerm> {
        match self {
            Fact::Subject(f) => f.to_representation(&()),
            Fact::ExpiresAt(f) => f.to_representation(&()),
            Fact::Request(id, f) => f.to_representation(id),
            Fact::Budget(id, f) => f.to_representation(id),
            Fact::Response(id, f) => f.to_representation(id),
            Fact::Cost(id, f) => f.to_representation(id),
        }
    }

    /// Rebuilds a fact from its predicate and term list.
    pub fn parse(predicate: Predicate, terms: &[RawTerm]) -> Result<Fact, FactError> {
        Ok(match predicate {
            Predicate::Subject => Fact::Subject(Subject::from_representation(terms)?.1),
            Predicate::ExpiresAt => Fact::ExpiresAt(ExpiresAt::from_representation(terms)?.1),
            Predicate::Request => {
                let (id, f) = Request::from_representation(terms)?;
                Fact::Request(id, f)
            }
            Predicate::Budget => {
                let (id, f) = Budget::from_representation(terms)?;
                Fact::Budget(id, f)
            }
            Predicate::Response => {
                let (id, f) = Response::from_representation(terms)?;
                Fact::Response(id, f)
            }
            Predicate::Cost => {
                let (id, f) = Cost::from_representation(terms)?;
                Fact::Cost(id, f)
            }
        })
    }

    /// Textual form, e.g. `theoriq:expires_at(1700000000)`.
    pub fn render(&self, profile: &ProtocolProfile) -> String {
        let terms = self
            .terms()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", profile.predicate_name(self.predicate()), terms)
    }

    pub(crate) fn to_biscuit_fact(&self, profile: &ProtocolProfile) -> builder::Fact {
        let terms = self.terms().iter().map(RawTerm::to_term).collect::<Vec<_>>();
        builder::fact(&profile.predicate_name(self.predicate()), &terms)
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&THEORIQ))
    }
}

impl From<Subject> for Fact {
    fn from(value: Subject) -> Self {
        Fact::Subject(value)
    }
}

impl From<ExpiresAt> for Fact {
    fn from(value: ExpiresAt) -> Self {
        Fact::ExpiresAt(value)
    }
}
