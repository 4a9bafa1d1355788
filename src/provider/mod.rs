//! Cloudflare API client: zone listing and GraphQL analytics transport

pub mod graphql;
pub mod zones;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use graphql::{AnalyticsQuery, DEFAULT_QUERY_LIMIT};
pub use zones::{filter_by_id, filter_paid_tier, PlanTier, Zone};

pub const DEFAULT_API_URL: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.cloudflare.com/client/v4/graphql/";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Cloudflare rejected the credentials: {0}")]
    Auth(String),
    #[error("Cloudflare API unavailable: {0}")]
    Unavailable(String),
    #[error("analytics query failed: {0}")]
    Query(String),
    #[error("malformed analytics response: {0}")]
    MalformedResponse(String),
    #[error("analytics query timed out after {0:?}")]
    Timeout(Duration),
}

/// API credentials. Token mode wins whenever a token is configured.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    KeyEmail { key: String, email: String },
}

impl Credentials {
    /// Pick the credential mode from raw configuration values.
    ///
    /// Returns `None` when neither a token nor a complete key/email pair is set.
    pub fn select(token: &str, key: &str, email: &str) -> Option<Self> {
        let (token, key, email) = (token.trim(), key.trim(), email.trim());

        if !token.is_empty() {
            Some(Credentials::Token(token.to_string()))
        } else if !key.is_empty() && !email.is_empty() {
            Some(Credentials::KeyEmail {
                key: key.to_string(),
                email: email.to_string(),
            })
        } else {
            None
        }
    }

    /// Attach the authentication headers for this mode
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::KeyEmail { key, email } => request
                .header("X-AUTH-EMAIL", email)
                .header("X-AUTH-KEY", key),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Credentials::Token(_) => "api-token",
            Credentials::KeyEmail { .. } => "api-key",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
            Credentials::KeyEmail { email, .. } => f
                .debug_struct("KeyEmail")
                .field("key", &"<redacted>")
                .field("email", email)
                .finish(),
        }
    }
}

/// The remote side of a scrape cycle
#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    /// List every zone the credentials can see
    async fn list_zones(&self) -> Result<Vec<Zone>, ProviderError>;

    /// Run one analytics query and return the GraphQL `data` payload
    async fn fetch_analytics(&self, query: &AnalyticsQuery) -> Result<Value, ProviderError>;
}

#[derive(Clone)]
pub struct CloudflareClient {
    http: Client,
    credentials: Credentials,
    api_url: String,
    graphql_url: String,
}

impl CloudflareClient {
    /// `request_timeout` bounds every request end to end, so a server that
    /// accepts the connection and then stalls still fails the call.
    pub fn new(
        credentials: Credentials,
        api_url: impl Into<String>,
        graphql_url: impl Into<String>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("cloudflare-exporter/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client for the Cloudflare API")?;

        Ok(Self {
            http,
            credentials,
            api_url: api_url.into(),
            graphql_url: graphql_url.into(),
        })
    }
}

#[async_trait]
impl AnalyticsProvider for CloudflareClient {
    async fn list_zones(&self) -> Result<Vec<Zone>, ProviderError> {
        zones::list_zones(&self.http, &self.api_url, &self.credentials).await
    }

    async fn fetch_analytics(&self, query: &AnalyticsQuery) -> Result<Value, ProviderError> {
        graphql::execute(&self.http, &self.graphql_url, query, &self.credentials).await
    }
}
