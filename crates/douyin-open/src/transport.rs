use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use rustls::{ClientConfig, crypto::ring};
use rustls_platform_verifier::BuilderVerifierExt;
use serde_json::Value;
use tracing::debug;

use crate::error::OpenApiError;

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Blackbox request seam consumed by the credential cascade and the data
/// endpoints. Implementations resolve `path` against the configured API
/// host and return the parsed JSON body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, path: &str, query: &[(&str, String)])
    -> Result<Value, OpenApiError>;
}

pub fn default_client() -> Client {
    let provider = Arc::new(ring::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("Failed to configure default TLS protocol versions")
        .with_platform_verifier()
        .unwrap()
        .with_no_client_auth();

    Client::builder()
        .use_preconfigured_tls(tls_config)
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client")
}

/// Default transport built on reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    host: String,
}

impl HttpTransport {
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self::with_client(default_client(), host)
    }

    pub fn with_client<S: Into<String>>(client: Client, host: S) -> Self {
        Self {
            client,
            host: host.into(),
        }
    }
}

fn join_url(host: &str, path: &str) -> String {
    format!(
        "{}/{}",
        host.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, OpenApiError> {
        let url = join_url(&self.host, path);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, DEFAULT_UA)
            .query(query)
            .send()
            .await?;

        Ok(response.json().await?)
    }
}
