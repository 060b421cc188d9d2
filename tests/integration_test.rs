use chrono::Utc;
use serde_json::json;
use std::error::Error;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use theoriq::{
    keypair_from_hex, provider_from_config, Agent, AgentAddress, AuthorizationError, Budget,
    CapabilityToken, Cost, Currency, KeyPair, PayloadHash, ProviderError, Request,
    RequestBiscuit, RequestVerifier, ResponseFacts, SdkError, TheoriqConfig, TokenBuilder,
    TokenError,
};

const AGENT_SECRET: &str = "1f1e1d1c1b1a191817161514131211100f0e0d0c0b0a09080706050403020100";

fn small_address(value: u8) -> AgentAddress {
    let mut bytes = [0u8; 32];
    bytes[31] = value;
    AgentAddress::from_bytes(bytes)
}

#[test]
fn test_request_response_round_trip() -> Result<(), Box<dyn Error>> {
    let issuer = KeyPair::new();
    let subject = AgentAddress::from_bytes([0xAA; 32]);
    let sender = small_address(1);
    let receiver = small_address(2);
    assert_eq!(sender, AgentAddress::one());

    // issuer
    let token = TokenBuilder::new(subject, Utc::now().timestamp() + 3600).build(&issuer)?;

    // sender
    let request = RequestBiscuit::attenuate_for_request(
        &token,
        Request::new(b"hello", sender, receiver),
        Budget::from_amount("10", Currency::Usdc)?,
        &KeyPair::new(),
    )?;
    let req_id = request.req_id();
    let header = request.to_bearer()?;

    // receiver
    let verified = RequestVerifier::new(issuer.public(), receiver)
        .with_subject(subject)
        .verify_header(&header, b"hello")?;
    assert_eq!(verified.req_id(), req_id);
    assert_eq!(verified.sender(), sender);
    assert_eq!(verified.request_facts().budget.amount(), "10");
    assert_eq!(verified.request_facts().budget.currency(), Some(Currency::Usdc));
    assert_eq!(verified.request_facts().budget.voucher(), "");

    let response = verified.respond(b"hi", Cost::new("2", Currency::Usdc)?, &KeyPair::new())?;
    assert_eq!(response.token().block_count(), 3);

    // anyone holding the issuer key can read the response back
    let reparsed = CapabilityToken::from_encoded(&response.token().to_encoded()?, issuer.public())?;
    let facts = ResponseFacts::from_biscuit(&reparsed)?;
    assert_eq!(facts.req_id, req_id);
    assert_eq!(facts.response.body_hash, PayloadHash::of(b"hi"));
    assert_eq!(facts.response.to_addr, sender);
    assert_eq!(facts.cost.amount(), "2");
    assert_eq!(facts.cost.currency(), Currency::Usdc);
    assert_eq!(&facts, response.response_facts());

    Ok(())
}

#[test]
fn test_response_token_still_authorizes_subject() -> Result<(), Box<dyn Error>> {
    let issuer = KeyPair::new();
    let subject = AgentAddress::from_bytes([0xAA; 32]);
    let token = TokenBuilder::new(subject, Utc::now().timestamp() + 3600).build(&issuer)?;
    let request = RequestBiscuit::attenuate_for_request(
        &token,
        Request::new(b"hello", small_address(1), small_address(2)),
        Budget::from_voucher("voucher-7")?,
        &KeyPair::new(),
    )?;

    let verifier = RequestVerifier::new(issuer.public(), small_address(2));
    let err = verifier
        .verify(&request.token().to_encoded()?, b"hello")
        .unwrap_err();
    assert!(matches!(
        err,
        TokenError::Authorization(AuthorizationError::SubjectMismatch { .. })
    ));

    let verified = verifier
        .with_subject(subject)
        .verify(&request.token().to_encoded()?, b"hello")?;
    assert_eq!(verified.request_facts().budget.voucher(), "voucher-7");
    Ok(())
}

#[tokio::test]
async fn test_provider_exchanges_api_key_once() -> Result<(), Box<dyn Error>> {
    let mock_server = MockServer::start().await;
    let issuer = KeyPair::new();
    let token = TokenBuilder::new(AgentAddress::one(), Utc::now().timestamp() + 3600)
        .build(&issuer)?;

    Mock::given(method("GET"))
        .and(path("/api/v1alpha2/auth/biscuits/public-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "public_key": issuer.public().to_string() })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1alpha2/auth/api-keys/exchange"))
        .and(header("authorization", "bearer tq-test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "biscuit": token.to_encoded()? })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TheoriqConfig::builder()
        .base_url(mock_server.uri())
        .api_key("tq-test-key")
        .build()?;
    let configured = provider_from_config(&config).await?;
    assert_eq!(configured.issuer_key, issuer.public());

    let first = configured.provider.get_token().await?;
    let second = configured.provider.get_token().await?;
    assert_eq!(first.to_encoded()?, second.to_encoded()?);
    assert_eq!(first.to_encoded()?, token.to_encoded()?);

    Ok(())
}

#[tokio::test]
async fn test_provider_surfaces_issuer_failure() -> Result<(), Box<dyn Error>> {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1alpha2/auth/api-keys/exchange"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unknown api key"))
        .mount(&mock_server)
        .await;

    let config = TheoriqConfig::builder()
        .base_url(mock_server.uri())
        .issuer_public_key(KeyPair::new().public().to_string())
        .api_key("revoked")
        .build()?;
    let configured = provider_from_config(&config).await?;

    assert!(matches!(
        configured.provider.get_token().await,
        Err(ProviderError::Api(_))
    ));
    assert!(configured.provider.cached().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_agent_from_config() -> Result<(), Box<dyn Error>> {
    let mock_server = MockServer::start().await;
    let issuer = KeyPair::new();
    let agent_address = AgentAddress::from_public_key(&keypair_from_hex(AGENT_SECRET)?.public());
    let token =
        TokenBuilder::new(agent_address, Utc::now().timestamp() + 3600).build(&issuer)?;

    Mock::given(method("POST"))
        .and(path("/api/v1alpha2/auth/agents/biscuits"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "biscuit": token.to_encoded()? })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TheoriqConfig::builder()
        .base_url(mock_server.uri())
        .issuer_public_key(issuer.public().to_string())
        .agent_private_key(AGENT_SECRET)
        .build()?;
    let agent = Agent::from_config(&config).await?;
    assert_eq!(agent.address(), agent_address);

    // an agent calling itself exercises both sides of the exchange
    let request = agent
        .outbound_request(
            b"ping",
            agent.address(),
            Budget::from_amount("0.5", Currency::Usdt)?,
        )
        .await?;
    let verified = agent.verify_request(&request.to_bearer()?, b"ping")?;
    let response = agent.respond(&verified, b"pong", Cost::new("0.25", Currency::Usdt)?)?;
    assert_eq!(response.req_id(), request.req_id());

    Ok(())
}

#[tokio::test]
async fn test_agent_requires_private_key() -> Result<(), Box<dyn Error>> {
    let config = TheoriqConfig::builder()
        .base_url("http://127.0.0.1:9")
        .api_key("key")
        .build()?;
    assert!(matches!(
        Agent::from_config(&config).await,
        Err(SdkError::Provider(ProviderError::MissingCredential(_)))
    ));
    Ok(())
}
