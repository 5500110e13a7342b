use crate::error::OpenApiError;

pub const DEFAULT_HOST: &str = "https://open.douyin.com";
pub const DEFAULT_KEY_PREFIX: &str = "dy:openapi";

/// Configurable options for an [`OpenApiClient`](crate::OpenApiClient).
///
/// `client_key` and `open_id` are required and checked before any I/O;
/// `client_secret` is only needed for the one-time authorization-code
/// exchange and is checked there.
#[derive(Debug, Clone)]
pub struct OpenApiConfig {
    /// App identity issued by the platform.
    pub client_key: String,
    /// App secret, required only for the authorization-code exchange.
    pub client_secret: Option<String>,
    /// Identifies the authorized user this client acts on behalf of.
    pub open_id: String,
    /// API host base URL.
    pub host: String,
    /// Namespace prefix for all credential cache keys.
    pub key_prefix: String,
}

impl OpenApiConfig {
    pub fn new<K: Into<String>, O: Into<String>>(client_key: K, open_id: O) -> Self {
        Self {
            client_key: client_key.into(),
            client_secret: None,
            open_id: open_id.into(),
            host: DEFAULT_HOST.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn with_client_secret<S: Into<String>>(mut self, secret: S) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_key_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), OpenApiError> {
        if self.client_key.is_empty() {
            return Err(OpenApiError::Validation(
                "client_key cannot be empty".to_string(),
            ));
        }
        if self.open_id.is_empty() {
            return Err(OpenApiError::Validation(
                "open_id cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn require_client_secret(&self) -> Result<&str, OpenApiError> {
        self.client_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| OpenApiError::Validation("client_secret cannot be empty".to_string()))
    }
}
