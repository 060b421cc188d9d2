use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use theoriq_api::{ReqwestTransport, TheoriqClient, Transport};
use theoriq_config::TheoriqConfig;
use theoriq_token::{
    keypair_from_hex, mint_agent_token, public_key_to_string, AgentAddress, CapabilityToken,
    KeyPair, PublicKey, TokenTimeConfig,
};

use crate::error::ProviderError;
use crate::provider::TokenSource;

/// Lifetime of the self-signed proof sent with an agent key exchange.
pub const CHALLENGE_TTL_SECS: i64 = 60;

/// Exchanges a long-lived API key for operational tokens.
pub struct ApiKeySource<T = ReqwestTransport> {
    client: Arc<TheoriqClient<T>>,
    api_key: String,
    issuer_key: PublicKey,
}

impl<T: Transport> ApiKeySource<T> {
    pub fn new(
        client: Arc<TheoriqClient<T>>,
        api_key: impl Into<String>,
        issuer_key: PublicKey,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            issuer_key,
        }
    }
}

#[async_trait]
impl<T: Transport> TokenSource for ApiKeySource<T> {
    async fn fetch(&self) -> Result<CapabilityToken, ProviderError> {
        debug!("exchanging API key at {}", self.client.base_url());
        let encoded = self.client.exchange_api_key(&self.api_key).await?;
        Ok(CapabilityToken::from_encoded(&encoded, self.issuer_key)?)
    }
}

/// Obtains tokens by proving possession of the agent's private key.
///
/// The proof is a short-lived token the agent mints for its own address and
/// signs with its own key; the issuer checks it against the submitted public
/// key before issuing an operational token.
pub struct PrivateKeySource<T = ReqwestTransport> {
    client: Arc<TheoriqClient<T>>,
    keypair: Arc<KeyPair>,
    issuer_key: PublicKey,
    challenge_ttl: i64,
}

impl<T: Transport> PrivateKeySource<T> {
    pub fn new(client: Arc<TheoriqClient<T>>, keypair: Arc<KeyPair>, issuer_key: PublicKey) -> Self {
        Self {
            client,
            keypair,
            issuer_key,
            challenge_ttl: CHALLENGE_TTL_SECS,
        }
    }

    pub fn address(&self) -> AgentAddress {
        AgentAddress::from_public_key(&self.keypair.public())
    }

    fn challenge(&self) -> Result<String, ProviderError> {
        let time = TokenTimeConfig {
            start_time: None,
            duration: self.challenge_ttl,
        };
        Ok(mint_agent_token(self.address(), &self.keypair, time)?.to_encoded()?)
    }
}

#[async_trait]
impl<T: Transport> TokenSource for PrivateKeySource<T> {
    async fn fetch(&self) -> Result<CapabilityToken, ProviderError> {
        debug!("requesting agent token for {}", self.address());
        let public_key = public_key_to_string(&self.keypair.public());
        let encoded = self
            .client
            .request_agent_biscuit(&public_key, &self.challenge()?)
            .await?;
        Ok(CapabilityToken::from_encoded(&encoded, self.issuer_key)?)
    }
}

/// Whichever credential a configuration carries.
pub enum CredentialSource<T = ReqwestTransport> {
    ApiKey(ApiKeySource<T>),
    PrivateKey(PrivateKeySource<T>),
}

impl<T: Transport> CredentialSource<T> {
    /// Picks the agent private key when present, the API key otherwise.
    pub fn from_config(
        config: &TheoriqConfig,
        client: Arc<TheoriqClient<T>>,
        issuer_key: PublicKey,
    ) -> Result<Self, ProviderError> {
        if let Some(private_key) = &config.agent_private_key {
            let keypair = Arc::new(keypair_from_hex(private_key)?);
            return Ok(CredentialSource::PrivateKey(PrivateKeySource::new(
                client, keypair, issuer_key,
            )));
        }
        if let Some(api_key) = &config.api_key {
            return Ok(CredentialSource::ApiKey(ApiKeySource::new(
                client, api_key, issuer_key,
            )));
        }
        Err(ProviderError::MissingCredential(
            "configuration has neither agent_private_key nor api_key".to_string(),
        ))
    }
}

#[async_trait]
impl<T: Transport> TokenSource for CredentialSource<T> {
    async fn fetch(&self) -> Result<CapabilityToken, ProviderError> {
        match self {
            CredentialSource::ApiKey(source) => source.fetch().await,
            CredentialSource::PrivateKey(source) => source.fetch().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HeaderMap;
    use http::StatusCode;
    use std::sync::Mutex;
    use theoriq_api::{AgentBiscuitRequest, ApiError, TransportResponse};
    use theoriq_token::{biscuit_key_from_string, TokenBuilder};

    const SECRET: &str = "1f1e1d1c1b1a191817161514131211100f0e0d0c0b0a09080706050403020100";

    /// Issues a token for whatever agent key is presented, after checking
    /// the challenge was signed by that key.
    struct FakeIssuer {
        issuer: KeyPair,
        bodies: Mutex<Vec<Vec<u8>>>,
    }

    impl FakeIssuer {
        fn new() -> Self {
            Self {
                issuer: KeyPair::new(),
                bodies: Mutex::new(Vec::new()),
            }
        }

        fn issue(&self, subject: AgentAddress) -> TransportResponse {
            let token = TokenBuilder::new(subject, 4_000_000_000)
                .build(&self.issuer)
                .unwrap();
            let body = serde_json::json!({ "biscuit": token.to_encoded().unwrap() });
            TransportResponse::new(StatusCode::OK, body.to_string())
        }
    }

    #[async_trait]
    impl Transport for FakeIssuer {
        async fn post(
            &self,
            _url: &str,
            body: Vec<u8>,
            _headers: HeaderMap,
        ) -> Result<TransportResponse, ApiError> {
            self.bodies.lock().unwrap().push(body.clone());
            match serde_json::from_slice::<AgentBiscuitRequest>(&body) {
                Ok(request) => {
                    let agent_key = biscuit_key_from_string(&request.public_key).unwrap();
                    let challenge = CapabilityToken::from_encoded(&request.challenge, agent_key)
                        .map_err(|_| ApiError::Internal("bad challenge".to_string()))?;
                    let subject = challenge.facts().unwrap().subjects().unwrap()[0].address;
                    Ok(self.issue(subject))
                }
                Err(_) => Ok(self.issue(AgentAddress::one())),
            }
        }

        async fn get(&self, _url: &str, _headers: HeaderMap) -> Result<TransportResponse, ApiError> {
            Ok(TransportResponse::new(StatusCode::NOT_FOUND, ""))
        }
    }

    fn config(agent_key: Option<&str>, api_key: Option<&str>) -> TheoriqConfig {
        let mut builder = TheoriqConfig::builder().base_url("http://issuer");
        if let Some(key) = agent_key {
            builder = builder.agent_private_key(key);
        }
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn test_private_key_source_proves_key() {
        let issuer = FakeIssuer::new();
        let issuer_key = issuer.issuer.public();
        let client = Arc::new(TheoriqClient::with_transport("http://issuer", issuer));
        let keypair = Arc::new(keypair_from_hex(SECRET).unwrap());
        let source = PrivateKeySource::new(client, keypair.clone(), issuer_key);

        let token = source.fetch().await.unwrap();
        let subjects = token.facts().unwrap().subjects().unwrap();
        assert_eq!(subjects[0].address, AgentAddress::from_public_key(&keypair.public()));
    }

    #[tokio::test]
    async fn test_token_from_other_issuer_is_rejected() {
        let client = Arc::new(TheoriqClient::with_transport("http://issuer", FakeIssuer::new()));
        let source = ApiKeySource::new(client, "key", KeyPair::new().public());
        assert!(matches!(
            source.fetch().await,
            Err(ProviderError::Token(_))
        ));
    }

    #[tokio::test]
    async fn test_credential_precedence() {
        let issuer = FakeIssuer::new();
        let issuer_key = issuer.issuer.public();
        let client = Arc::new(TheoriqClient::with_transport("http://issuer", issuer));

        let source =
            CredentialSource::from_config(&config(Some(SECRET), Some("key")), client.clone(), issuer_key)
                .unwrap();
        assert!(matches!(source, CredentialSource::PrivateKey(_)));

        let source =
            CredentialSource::from_config(&config(None, Some("key")), client.clone(), issuer_key)
                .unwrap();
        assert!(matches!(source, CredentialSource::ApiKey(_)));
        source.fetch().await.unwrap();
    }

    #[test]
    fn test_missing_credential() {
        let client = Arc::new(TheoriqClient::with_transport("http://issuer", FakeIssuer::new()));
        let result = CredentialSource::from_config(
            &config(None, None),
            client,
            KeyPair::new().public(),
        );
        assert!(matches!(result, Err(ProviderError::MissingCredential(_))));
    }
}
