//! # Theoriq API
//!
//! HTTP client for the Theoriq token issuing service.
//!
//! The client only needs two calls from its transport, `post` and `get`, so
//! tests and embedders can swap the reqwest-based [`ReqwestTransport`] for
//! their own [`Transport`].
//!
//! ## Endpoints
//!
//! - `GET api/v1alpha2/auth/biscuits/public-key`: the issuer's public key
//! - `POST api/v1alpha2/auth/api-keys/exchange`: trade an API key for a token
//! - `POST api/v1alpha2/auth/agents/biscuits`: trade an agent key proof for a token

use std::time::Duration;

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use theoriq_config::TheoriqConfig;

pub const PUBLIC_KEY_PATH: &str = "api/v1alpha2/auth/biscuits/public-key";
pub const API_KEY_EXCHANGE_PATH: &str = "api/v1alpha2/auth/api-keys/exchange";
pub const AGENT_BISCUIT_PATH: &str = "api/v1alpha2/auth/agents/biscuits";

// Error type for the API client
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("HTTP error: {status} - {body}")]
    Status { status: StatusCode, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token request error: {0}")]
    TokenRequest(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Fails with [`ApiError::Status`] unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Status {
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            })
        }
    }

    pub fn json<R: DeserializeOwned>(&self) -> Result<R, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

/// The request/response client the API calls go through.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> Result<TransportResponse, ApiError>;

    async fn get(&self, url: &str, headers: HeaderMap) -> Result<TransportResponse, ApiError>;
}

/// [`Transport`] backed by a reqwest client with a fixed per-request timeout.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::ClientBuilder::new().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn finish(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<TransportResponse, ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(TransportResponse::new(status, body.to_vec()))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::HttpClient(err)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> Result<TransportResponse, ApiError> {
        self.finish(self.client.post(url).headers(headers).body(body))
            .await
    }

    async fn get(&self, url: &str, headers: HeaderMap) -> Result<TransportResponse, ApiError> {
        self.finish(self.client.get(url).headers(headers)).await
    }
}

// Request and response structures
#[derive(Serialize, Deserialize, Debug)]
pub struct PublicKeyResponse {
    pub public_key: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BiscuitResponse {
    pub biscuit: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AgentBiscuitRequest {
    /// Agent public key as "ed25519/<hex>"
    pub public_key: String,
    /// Short-lived token signed by the agent key, proving possession of it
    pub challenge: String,
}

/// Client for the issuing service.
pub struct TheoriqClient<T = ReqwestTransport> {
    base_url: String,
    transport: T,
}

pub struct TheoriqClientBuilder {
    base_url: String,
    timeout: Duration,
}

impl TheoriqClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(mut self, config: &TheoriqConfig) -> Self {
        self.base_url = config.base_url.clone();
        self.timeout = Duration::from_secs(config.timeout_secs);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<TheoriqClient, ApiError> {
        if self.base_url.is_empty() {
            return Err(ApiError::Internal("base URL is required".to_string()));
        }
        let transport = ReqwestTransport::new(self.timeout)?;
        Ok(TheoriqClient::with_transport(self.base_url, transport))
    }
}

impl Default for TheoriqClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TheoriqClient {
    pub fn builder() -> TheoriqClientBuilder {
        TheoriqClientBuilder::new()
    }

    pub fn from_config(config: &TheoriqConfig) -> Result<Self, ApiError> {
        Self::builder().from_config(config).build()
    }
}

impl<T: Transport> TheoriqClient<T> {
    pub fn with_transport(base_url: impl Into<String>, transport: T) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send_request<B, R>(
        &self,
        path: &str,
        request_body: &B,
        mut headers: HeaderMap,
    ) -> Result<R, ApiError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let body = serde_json::to_vec(request_body)
            .map_err(|e| ApiError::Internal(format!("Failed to serialize request: {}", e)))?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let url = self.url(path);
        debug!("POST {}", url);
        self.transport
            .post(&url, body, headers)
            .await?
            .error_for_status()?
            .json()
    }

    /// Fetches the key the issuer signs tokens with, as "ed25519/<hex>".
    pub async fn get_public_key(&self) -> Result<String, ApiError> {
        let url = self.url(PUBLIC_KEY_PATH);
        debug!("GET {}", url);
        let response: PublicKeyResponse = self
            .transport
            .get(&url, HeaderMap::new())
            .await?
            .error_for_status()?
            .json()?;
        Ok(response.public_key)
    }

    /// Exchanges a long-lived API key for an operational token.
    pub async fn exchange_api_key(&self, api_key: &str) -> Result<String, ApiError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("bearer {}", api_key))
            .map_err(|e| ApiError::TokenRequest(format!("Invalid API key: {}", e)))?;
        headers.insert(AUTHORIZATION, value);

        let response: BiscuitResponse = self
            .send_request(API_KEY_EXCHANGE_PATH, &serde_json::json!({}), headers)
            .await?;
        non_empty(response.biscuit)
    }

    /// Exchanges proof of an agent key for an operational token.
    pub async fn request_agent_biscuit(
        &self,
        public_key: &str,
        challenge: &str,
    ) -> Result<String, ApiError> {
        let request = AgentBiscuitRequest {
            public_key: public_key.to_string(),
            challenge: challenge.to_string(),
        };
        let response: BiscuitResponse = self
            .send_request(AGENT_BISCUIT_PATH, &request, HeaderMap::new())
            .await?;
        non_empty(response.biscuit)
    }
}

fn non_empty(biscuit: String) -> Result<String, ApiError> {
    if biscuit.trim().is_empty() {
        Err(ApiError::TokenRequest(
            "Issuer returned an empty token".to_string(),
        ))
    } else {
        Ok(biscuit)
    }
}
