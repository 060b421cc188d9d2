extern crate biscuit_auth as biscuit;

use std::collections::BTreeMap;

use biscuit::{builder, Authorizer, AuthorizerBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DataIntegrityError, TokenError};
use crate::facts::{
    Budget, Cost, ExpiresAt, Fact, FactConvertible, Predicate, RawTerm, Request, Response,
    Subject,
};
use crate::token::CapabilityToken;

/// Facts of every block of a token, indexed by predicate.
///
/// Rows are kept as raw terms and parsed on demand, so one unreadable fact
/// only fails the queries that touch its predicate.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    rows: BTreeMap<Predicate, Vec<Vec<RawTerm>>>,
}

impl FactStore {
    /// Loads the facts of all blocks, attenuation blocks included.
    pub fn from_token(token: &CapabilityToken) -> Result<Self, TokenError> {
        let mut authorizer = AuthorizerBuilder::new().build(token.biscuit())?;
        let profile = token.profile();
        let mut store = FactStore::default();

        for predicate in Predicate::ALL {
            let name = profile.predicate_name(predicate);
            let rows = query_rows(&mut authorizer, predicate, &name)?;
            store.insert_rows(predicate, rows);
        }

        debug!("loaded {} facts from token", store.len());
        Ok(store)
    }

    /// Builds a store from already-typed facts.
    pub fn from_facts<'a>(facts: impl IntoIterator<Item = &'a Fact>) -> Self {
        let mut store = FactStore::default();
        for fact in facts {
            store.insert_rows(fact.predicate(), vec![fact.terms()]);
        }
        store
    }

    fn insert_rows(&mut self, predicate: Predicate, rows: Vec<Vec<RawTerm>>) {
        if rows.is_empty() {
            return;
        }
        let entry = self.rows.entry(predicate).or_default();
        entry.extend(rows);
        entry.sort();
        entry.dedup();
    }

    pub fn len(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw term rows stored under `predicate`.
    pub fn rows(&self, predicate: Predicate) -> &[Vec<RawTerm>] {
        self.rows.get(&predicate).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every row of `F`, parsed.
    pub fn typed<F: FactConvertible>(&self) -> Result<Vec<(F::Key, F)>, DataIntegrityError> {
        self.rows(F::PREDICATE)
            .iter()
            .map(|terms| {
                F::from_representation(terms).map_err(|e| DataIntegrityError::Malformed {
                    predicate: F::PREDICATE,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Every fact in the store, parsed.
    pub fn facts(&self) -> Result<Vec<Fact>, DataIntegrityError> {
        let mut facts = Vec::with_capacity(self.len());
        for (predicate, rows) in &self.rows {
            for terms in rows {
                let fact = Fact::parse(*predicate, terms).map_err(|e| {
                    DataIntegrityError::Malformed {
                        predicate: *predicate,
                        reason: e.to_string(),
                    }
                })?;
                facts.push(fact);
            }
        }
        Ok(facts)
    }

    pub fn subjects(&self) -> Result<Vec<Subject>, DataIntegrityError> {
        Ok(self
            .typed::<Subject>()?
            .into_iter()
            .map(|(_, subject)| subject)
            .collect())
    }

    /// The earliest expiry carried by the token.
    pub fn expires_at(&self) -> Result<i64, DataIntegrityError> {
        self.typed::<ExpiresAt>()?
            .into_iter()
            .map(|(_, expiry)| expiry.timestamp())
            .min()
            .ok_or(DataIntegrityError::Missing(Predicate::ExpiresAt))
    }

    /// The single `Request` of the token joined with its `Budget`.
    pub fn request_facts(&self) -> Result<(Uuid, Request, Budget), DataIntegrityError> {
        self.join::<Request, Budget>()
    }

    /// The single `Response` of the token joined with its `Cost`.
    pub fn response_facts(&self) -> Result<(Uuid, Response, Cost), DataIntegrityError> {
        self.join::<Response, Cost>()
    }

    /// Joins the one row of `A` with the one row of `B` sharing its request id.
    /// Zero or competing rows on either side are integrity failures.
    fn join<A, B>(&self) -> Result<(Uuid, A, B), DataIntegrityError>
    where
        A: FactConvertible<Key = Uuid>,
        B: FactConvertible<Key = Uuid>,
    {
        let mut primary = self.typed::<A>()?;
        let (req_id, left) = match primary.len() {
            0 => return Err(DataIntegrityError::Missing(A::PREDICATE)),
            1 => primary.remove(0),
            count => {
                return Err(DataIntegrityError::Duplicate {
                    predicate: A::PREDICATE,
                    count,
                })
            }
        };

        let mut partners = self
            .typed::<B>()?
            .into_iter()
            .filter(|(id, _)| *id == req_id)
            .collect::<Vec<_>>();
        let right = match partners.len() {
            0 => {
                return Err(DataIntegrityError::Unpaired {
                    predicate: A::PREDICATE,
                    missing: B::PREDICATE,
                    req_id,
                })
            }
            1 => partners.remove(0).1,
            count => {
                return Err(DataIntegrityError::Duplicate {
                    predicate: B::PREDICATE,
                    count,
                })
            }
        };

        Ok((req_id, left, right))
    }
}

/// Every fact named `name` with the predicate's arity, terms left untyped.
fn query_rows(
    authorizer: &mut Authorizer,
    predicate: Predicate,
    name: &str,
) -> Result<Vec<Vec<RawTerm>>, TokenError> {
    let variables = (0..predicate.arity())
        .map(|i| format!("$t{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let rule = format!("data({vars}) <- {name}({vars})", vars = variables, name = name);

    let rows: Vec<builder::Fact> = authorizer.query_all(rule.as_str())?;
    Ok(rows
        .into_iter()
        .map(|fact| fact.predicate.terms.into_iter().map(RawTerm::from).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AgentAddress;
    use crate::currency::Currency;
    use crate::exchange::RequestBiscuit;
    use crate::mint::TokenBuilder;
    use crate::profile::THEORIQ;
    use biscuit::builder::BlockBuilder;
    use biscuit::KeyPair;

    fn request_pair(req_id: Uuid, body: &[u8]) -> [Fact; 2] {
        [
            Fact::Request(
                req_id,
                Request::new(body, AgentAddress::one(), AgentAddress::null()),
            ),
            Fact::Budget(req_id, Budget::from_amount("10", Currency::Usdc).unwrap()),
        ]
    }

    #[test]
    fn test_request_join() {
        let id = Uuid::new_v4();
        let facts = request_pair(id, b"hello");
        let store = FactStore::from_facts(&facts);
        let (req_id, request, budget) = store.request_facts().unwrap();
        assert_eq!(req_id, id);
        assert!(request.body_hash.matches(b"hello"));
        assert_eq!(budget.amount(), "10");
    }

    #[test]
    fn test_join_missing_rows() {
        let store = FactStore::from_facts(&[]);
        assert_eq!(
            store.request_facts().unwrap_err(),
            DataIntegrityError::Missing(Predicate::Request)
        );
        assert_eq!(
            store.expires_at().unwrap_err(),
            DataIntegrityError::Missing(Predicate::ExpiresAt)
        );
    }

    #[test]
    fn test_join_unpaired() {
        let id = Uuid::new_v4();
        let [request, _] = request_pair(id, b"hello");
        let [_, other_budget] = request_pair(Uuid::new_v4(), b"hello");
        let store = FactStore::from_facts(&[request, other_budget]);
        assert_eq!(
            store.request_facts().unwrap_err(),
            DataIntegrityError::Unpaired {
                predicate: Predicate::Request,
                missing: Predicate::Budget,
                req_id: id,
            }
        );
    }

    #[test]
    fn test_join_competing_requests() {
        let id = Uuid::new_v4();
        let first = request_pair(id, b"hello");
        let second = request_pair(id, b"goodbye");
        let store = FactStore::from_facts(first.iter().chain(second.iter()));
        assert_eq!(
            store.request_facts().unwrap_err(),
            DataIntegrityError::Duplicate {
                predicate: Predicate::Request,
                count: 2,
            }
        );
    }

    #[test]
    fn test_identical_facts_are_collapsed() {
        let id = Uuid::new_v4();
        let first = request_pair(id, b"hello");
        let store = FactStore::from_facts(first.iter().chain(first.iter()));
        assert_eq!(store.len(), 2);
        assert!(store.request_facts().is_ok());
    }

    #[test]
    fn test_expires_at_takes_earliest() {
        let facts = [Fact::from(ExpiresAt(200)), Fact::from(ExpiresAt(100))];
        let store = FactStore::from_facts(&facts);
        assert_eq!(store.expires_at().unwrap(), 100);
    }

    #[test]
    fn test_store_loads_every_block() {
        let issuer = KeyPair::new();
        let sender = KeyPair::new();
        let token = TokenBuilder::new(AgentAddress::one(), 1_000)
            .build(&issuer)
            .unwrap();
        let id = Uuid::new_v4();
        let attenuated = token.attenuate(&request_pair(id, b"hello"), &sender).unwrap();

        let store = FactStore::from_token(&attenuated).unwrap();
        assert_eq!(store.expires_at().unwrap(), 1_000);
        assert_eq!(store.subjects().unwrap(), vec![Subject::agent(AgentAddress::one())]);
        assert_eq!(store.request_facts().unwrap().0, id);
        assert_eq!(store.facts().unwrap().len(), 4);
    }

    /// Appends a block signed by `relay` holding the given datalog facts.
    fn with_relay_block(token: &CapabilityToken, facts: &[&str]) -> CapabilityToken {
        let relay = KeyPair::new();
        let mut block = BlockBuilder::new();
        for fact in facts {
            block = block.fact(*fact).unwrap();
        }
        let request = token.biscuit().third_party_request().unwrap();
        let block = request.create_block(&relay.private(), block).unwrap();
        let biscuit = token
            .biscuit()
            .append_third_party(relay.public(), block)
            .unwrap();
        CapabilityToken::from_biscuit(biscuit, THEORIQ)
    }

    #[test]
    fn test_unreadable_fact_only_fails_its_predicate() {
        let token = TokenBuilder::new(AgentAddress::one(), 1_000)
            .build(&KeyPair::new())
            .unwrap();
        let id = Uuid::new_v4();
        let token = token
            .attenuate(&request_pair(id, b"hello"), &KeyPair::new())
            .unwrap();
        let token = with_relay_block(&token, &["theoriq:expires_at(\"soon\")"]);

        let store = FactStore::from_token(&token).unwrap();
        assert_eq!(store.rows(Predicate::ExpiresAt).len(), 2);
        assert_eq!(store.request_facts().unwrap().0, id);
        assert!(matches!(
            store.expires_at(),
            Err(DataIntegrityError::Malformed {
                predicate: Predicate::ExpiresAt,
                ..
            })
        ));

        let request = RequestBiscuit::new(token).unwrap();
        assert_eq!(request.req_id(), id);
    }

    #[test]
    fn test_non_string_terms_are_kept_untyped() {
        let token = TokenBuilder::new(AgentAddress::one(), 1_000)
            .build(&KeyPair::new())
            .unwrap();
        let token = with_relay_block(&token, &["theoriq:subject(true, 42)"]);

        let store = FactStore::from_token(&token).unwrap();
        assert!(store
            .rows(Predicate::Subject)
            .iter()
            .any(|row| matches!(row[0], RawTerm::Other(_)) && row[1] == RawTerm::Int(42)));
        assert!(store.subjects().is_err());
        assert_eq!(store.expires_at().unwrap(), 1_000);
    }
}
