use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use theoriq_api::{TheoriqClient, Transport};
use theoriq_config::TheoriqConfig;
use theoriq_token::{
    biscuit_key_from_string, keypair_from_hex, AgentAddress, Budget, CapabilityToken, Cost,
    KeyPair, PublicKey, Request, RequestBiscuit, RequestVerifier, ResponseBiscuit,
    VerifiedRequest,
};

use crate::error::{ProviderError, SdkError};
use crate::provider::{TokenProvider, TokenSource};
use crate::source::{CredentialSource, PrivateKeySource};

/// An agent's view of the protocol: its identity, the issuer it trusts and
/// a provider for its own operational token.
///
/// Responses can only be produced from a [`VerifiedRequest`], so a reply is
/// never attenuated onto a token that has not passed verification.
pub struct Agent<S> {
    keypair: Arc<KeyPair>,
    address: AgentAddress,
    issuer_key: PublicKey,
    provider: Arc<TokenProvider<S>>,
}

impl<S: TokenSource> Agent<S> {
    pub fn new(keypair: Arc<KeyPair>, issuer_key: PublicKey, provider: Arc<TokenProvider<S>>) -> Self {
        let address = AgentAddress::from_public_key(&keypair.public());
        Self {
            keypair,
            address,
            issuer_key,
            provider,
        }
    }

    pub fn address(&self) -> AgentAddress {
        self.address
    }

    pub fn issuer_key(&self) -> PublicKey {
        self.issuer_key
    }

    pub fn provider(&self) -> &Arc<TokenProvider<S>> {
        &self.provider
    }

    /// The agent's current operational token, renewed if needed.
    pub async fn token(&self) -> Result<CapabilityToken, SdkError> {
        Ok(self.provider.get_token().await?)
    }

    /// Attenuates `token` with a request from this agent to `to` carrying
    /// `body`, under `budget`.
    pub fn prepare_request(
        &self,
        token: &CapabilityToken,
        body: &[u8],
        to: AgentAddress,
        budget: Budget,
    ) -> Result<RequestBiscuit, SdkError> {
        let request = Request::new(body, self.address, to);
        Ok(RequestBiscuit::attenuate_for_request(
            token,
            request,
            budget,
            &self.keypair,
        )?)
    }

    /// Same as [`prepare_request`](Self::prepare_request) using the agent's
    /// own operational token.
    pub async fn outbound_request(
        &self,
        body: &[u8],
        to: AgentAddress,
        budget: Budget,
    ) -> Result<RequestBiscuit, SdkError> {
        let token = self.token().await?;
        self.prepare_request(&token, body, to, budget)
    }

    /// Verifier bound to this agent's address and issuer. Requests must be
    /// addressed to this agent and carry a token issued to their sender.
    pub fn verifier(&self) -> RequestVerifier {
        RequestVerifier::new(self.issuer_key, self.address).with_sender_subject()
    }

    /// Verifies an inbound request from its `Authorization` header value and
    /// raw body.
    pub fn verify_request(
        &self,
        authorization: &str,
        body: &[u8],
    ) -> Result<VerifiedRequest, SdkError> {
        Ok(self.verifier().verify_header(authorization, body)?)
    }

    pub fn respond(
        &self,
        verified: &VerifiedRequest,
        body: &[u8],
        cost: Cost,
    ) -> Result<ResponseBiscuit, SdkError> {
        let response = verified.respond(body, cost, &self.keypair)?;
        info!("responded to request {}", response.req_id());
        Ok(response)
    }
}

impl<T: Transport> Agent<PrivateKeySource<T>> {
    /// Builds an agent around its own private key, obtaining operational
    /// tokens by proving possession of that key.
    pub fn with_private_key(
        client: Arc<TheoriqClient<T>>,
        keypair: Arc<KeyPair>,
        issuer_key: PublicKey,
    ) -> Self {
        let source = PrivateKeySource::new(client, keypair.clone(), issuer_key);
        Self::new(keypair, issuer_key, Arc::new(TokenProvider::new(source)))
    }
}

impl Agent<CredentialSource> {
    /// Builds an agent from configuration. The issuer public key is fetched
    /// from the issuing service when the configuration does not pin it.
    pub async fn from_config(config: &TheoriqConfig) -> Result<Self, SdkError> {
        let private_key = config.agent_private_key.as_deref().ok_or_else(|| {
            ProviderError::MissingCredential("agent_private_key is required".to_string())
        })?;
        let keypair = Arc::new(keypair_from_hex(private_key)?);

        let provider = provider_from_config(config).await?;
        let issuer_key = provider.issuer_key;
        Ok(Self::new(keypair, issuer_key, Arc::new(provider.provider)))
    }
}

/// A configured provider and the issuer key its tokens are checked against.
pub struct ConfiguredProvider {
    pub provider: TokenProvider<CredentialSource>,
    pub issuer_key: PublicKey,
}

/// Builds a [`TokenProvider`] from configuration, for callers that only need
/// tokens and not the full agent.
pub async fn provider_from_config(config: &TheoriqConfig) -> Result<ConfiguredProvider, SdkError> {
    config.validate()?;
    let client = Arc::new(TheoriqClient::from_config(config)?);
    let issuer_key = resolve_issuer_key(config, &client).await?;

    let source = CredentialSource::from_config(config, client, issuer_key)?;
    let provider = TokenProvider::new(source)
        .with_timeout(Duration::from_secs(config.timeout_secs))
        .with_renew_margin(config.renew_margin_secs);
    Ok(ConfiguredProvider {
        provider,
        issuer_key,
    })
}

async fn resolve_issuer_key<T: Transport>(
    config: &TheoriqConfig,
    client: &TheoriqClient<T>,
) -> Result<PublicKey, SdkError> {
    let key = match &config.issuer_public_key {
        Some(key) => key.clone(),
        None => {
            info!("fetching issuer public key from {}", client.base_url());
            client.get_public_key().await?
        }
    };
    Ok(biscuit_key_from_string(&key)?)
}
