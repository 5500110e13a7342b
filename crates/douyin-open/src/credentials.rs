use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::apis;
use crate::config::OpenApiConfig;
use crate::error::OpenApiError;
use crate::models::{self, OauthPayload, TokenGrant};
use crate::store::{CredentialStore, NamespaceKeys};
use crate::transport::Transport;

/// Cache-backed credential manager for one `(client_key, open_id)` pair.
///
/// Resolving an access token walks a three-level fallback chain, most
/// volatile level first: the cached access token, then a refresh-token
/// exchange, then renewal of the refresh token from the stored grant. Each
/// level escalates only on a cache miss, so a warm cache never touches the
/// network.
pub struct Credentials {
    config: OpenApiConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    keys: NamespaceKeys,
    // Serializes renewal for this namespace; concurrent cascades that all
    // miss the refresh token collapse into a single renewal call.
    renew_lock: Mutex<()>,
}

impl Credentials {
    pub(crate) fn new(
        config: OpenApiConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let keys = NamespaceKeys::new(&config.key_prefix, &config.client_key, &config.open_id);
        Self {
            config,
            transport,
            store,
            keys,
            renew_lock: Mutex::new(()),
        }
    }

    pub fn keys(&self) -> &NamespaceKeys {
        &self.keys
    }

    /// Returns a bearer token valid for API calls, refreshing through the
    /// fallback chain as needed.
    pub async fn access_token(&self) -> Result<String, OpenApiError> {
        if let Some(token) = self.store.get(&self.keys.access_token).await? {
            debug!(key = %self.keys.access_token, "access token cache hit");
            return Ok(token);
        }
        debug!("access token cache miss, exchanging refresh token");
        self.refresh_access_token().await
    }

    /// Mints a new access token from the cached refresh token, renewing the
    /// refresh token first when its cache entry has expired.
    pub async fn refresh_access_token(&self) -> Result<String, OpenApiError> {
        let refresh_token = match self.store.get(&self.keys.refresh_token).await? {
            Some(token) => token,
            None => {
                debug!("refresh token cache miss, renewing from stored grant");
                self.renew_refresh_token().await?
            }
        };

        let query = [
            ("client_key", self.config.client_key.clone()),
            ("grant_type", apis::GRANT_TYPE_REFRESH_TOKEN.to_string()),
            ("refresh_token", refresh_token),
        ];
        let body = self
            .transport
            .get_json(apis::OAUTH_REFRESH_TOKEN, &query)
            .await?;
        let payload: OauthPayload = models::decode_data(body)?;
        if payload.code() != 0 {
            warn!(code = payload.code(), "refresh token exchange rejected");
            return Err(OpenApiError::UpstreamRefresh {
                code: payload.code(),
                description: payload.description(),
            });
        }

        let access_token = payload.access_token.ok_or_else(|| {
            OpenApiError::Parse("no access_token in oauth/refresh_token response".to_string())
        })?;
        let expires_in = payload.expires_in.ok_or_else(|| {
            OpenApiError::Parse("no expires_in in oauth/refresh_token response".to_string())
        })?;

        self.store
            .set(
                &self.keys.access_token,
                &access_token,
                Some(Duration::from_secs(expires_in)),
            )
            .await?;
        debug!(expires_in, "stored refreshed access token");
        Ok(access_token)
    }

    /// Exchanges the grant's stored refresh token for a new one, then
    /// republishes both the cache entry and the grant record.
    ///
    /// Fails with the terminal [`OpenApiError::UnauthorizedUser`] when no
    /// grant (or no refresh token within it) exists; re-running the
    /// authorization-code flow out-of-band is the only remedy.
    pub async fn renew_refresh_token(&self) -> Result<String, OpenApiError> {
        let _guard = self.renew_lock.lock().await;

        // A concurrent cascade may have renewed while we waited on the lock.
        if let Some(token) = self.store.get(&self.keys.refresh_token).await? {
            return Ok(token);
        }

        let mut grant = self.grant().await?.ok_or(OpenApiError::UnauthorizedUser)?;
        let current = grant
            .refresh_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or(OpenApiError::UnauthorizedUser)?;

        let query = [
            ("client_key", self.config.client_key.clone()),
            ("refresh_token", current),
        ];
        let body = self
            .transport
            .get_json(apis::OAUTH_RENEW_REFRESH_TOKEN, &query)
            .await?;
        let payload: OauthPayload = models::decode_data(body)?;
        if payload.code() != 0 {
            warn!(code = payload.code(), "refresh token renewal rejected");
            return Err(OpenApiError::UpstreamRenew {
                code: payload.code(),
                description: payload.description(),
            });
        }

        let refresh_token = payload.refresh_token.ok_or_else(|| {
            OpenApiError::Parse(
                "no refresh_token in oauth/renew_refresh_token response".to_string(),
            )
        })?;
        let expires_in = payload.expires_in.ok_or_else(|| {
            OpenApiError::Parse("no expires_in in oauth/renew_refresh_token response".to_string())
        })?;

        self.store
            .set(
                &self.keys.refresh_token,
                &refresh_token,
                Some(Duration::from_secs(expires_in)),
            )
            .await?;

        // Read-modify-write: the grant record keeps pointing at the live
        // refresh token across renewals.
        grant.refresh_token = Some(refresh_token.clone());
        self.write_grant(&grant).await?;
        debug!(expires_in, "renewed refresh token and republished grant");
        Ok(refresh_token)
    }

    /// One-time authorization-code exchange. Stores the grant record plus
    /// both derived token entries as one unit; a rejected exchange performs
    /// no cache writes.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, OpenApiError> {
        let client_secret = self.config.require_client_secret()?.to_string();
        if code.is_empty() {
            return Err(OpenApiError::Validation("code cannot be empty".to_string()));
        }

        let query = [
            ("client_key", self.config.client_key.clone()),
            ("client_secret", client_secret),
            ("code", code.to_string()),
            (
                "grant_type",
                apis::GRANT_TYPE_AUTHORIZATION_CODE.to_string(),
            ),
        ];
        let body = self
            .transport
            .get_json(apis::OAUTH_ACCESS_TOKEN, &query)
            .await?;
        let payload: OauthPayload = models::decode_data(body)?;
        if payload.code() != 0 {
            warn!(code = payload.code(), "authorization code exchange rejected");
            return Err(OpenApiError::UpstreamAuth {
                code: payload.code(),
                description: payload.description(),
            });
        }

        let access_token = payload.access_token.clone().ok_or_else(|| {
            OpenApiError::Parse("no access_token in oauth/access_token response".to_string())
        })?;
        let refresh_token = payload.refresh_token.clone().ok_or_else(|| {
            OpenApiError::Parse("no refresh_token in oauth/access_token response".to_string())
        })?;
        let expires_in = payload.expires_in.ok_or_else(|| {
            OpenApiError::Parse("no expires_in in oauth/access_token response".to_string())
        })?;
        let refresh_expires_in = payload.refresh_expires_in.ok_or_else(|| {
            OpenApiError::Parse("no refresh_expires_in in oauth/access_token response".to_string())
        })?;

        let grant = TokenGrant {
            access_token: Some(access_token.clone()),
            refresh_token: Some(refresh_token.clone()),
            expires_in: Some(expires_in),
            refresh_expires_in: Some(refresh_expires_in),
            open_id: payload.open_id,
            scope: payload.scope,
        };

        self.write_grant(&grant).await?;
        self.store
            .set(
                &self.keys.access_token,
                &access_token,
                Some(Duration::from_secs(expires_in)),
            )
            .await?;
        self.store
            .set(
                &self.keys.refresh_token,
                &refresh_token,
                Some(Duration::from_secs(refresh_expires_in)),
            )
            .await?;
        debug!(
            expires_in,
            refresh_expires_in, "stored grant from code exchange"
        );
        Ok(grant)
    }

    /// The stored grant record, if the user has completed authorization.
    pub async fn grant(&self) -> Result<Option<TokenGrant>, OpenApiError> {
        match self.store.get(&self.keys.grant).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write_grant(&self, grant: &TokenGrant) -> Result<(), OpenApiError> {
        let raw = serde_json::to_string(grant)?;
        self.store.set(&self.keys.grant, &raw, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{ScriptedTransport, query_value};
    use serde_json::json;
    use tokio::time::advance;

    fn manager(
        transport: ScriptedTransport,
    ) -> (Credentials, Arc<ScriptedTransport>, Arc<MemoryStore>) {
        let transport = Arc::new(transport);
        let store = Arc::new(MemoryStore::new());
        let config = OpenApiConfig::new("ck1", "u1").with_client_secret("cs1");
        let credentials = Credentials::new(config, transport.clone(), store.clone());
        (credentials, transport, store)
    }

    async fn seed_grant(store: &MemoryStore, grant: serde_json::Value) {
        store
            .set("dy:openapi:ck1:u1", &grant.to_string(), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cached_access_token_short_circuits() {
        let (credentials, transport, store) = manager(ScriptedTransport::new());
        store
            .set("dy:openapi:ck1:u1:access_token", "at0", None)
            .await
            .unwrap();

        let token = credentials.access_token().await.unwrap();
        assert_eq!(token, "at0");
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn cached_refresh_token_skips_renewal() {
        let (credentials, transport, store) = manager(ScriptedTransport::new().respond(
            apis::OAUTH_REFRESH_TOKEN,
            json!({
                "data": { "error_code": 0, "access_token": "at2", "expires_in": 100 }
            }),
        ));
        store
            .set("dy:openapi:ck1:u1:refresh_token", "rt1", None)
            .await
            .unwrap();

        let token = credentials.access_token().await.unwrap();
        assert_eq!(token, "at2");
        assert_eq!(transport.called_paths(), vec![apis::OAUTH_REFRESH_TOKEN]);

        let calls = transport.calls();
        assert_eq!(query_value(&calls[0].1, "refresh_token"), Some("rt1"));
        assert_eq!(
            query_value(&calls[0].1, "grant_type"),
            Some(apis::GRANT_TYPE_REFRESH_TOKEN)
        );
        assert_eq!(
            store
                .get("dy:openapi:ck1:u1:access_token")
                .await
                .unwrap()
                .as_deref(),
            Some("at2")
        );
    }

    #[tokio::test]
    async fn full_cascade_renews_then_refreshes() {
        let (credentials, transport, store) = manager(
            ScriptedTransport::new()
                .respond(
                    apis::OAUTH_RENEW_REFRESH_TOKEN,
                    json!({
                        "data": { "error_code": 0, "refresh_token": "rt2", "expires_in": 500 }
                    }),
                )
                .respond(
                    apis::OAUTH_REFRESH_TOKEN,
                    json!({
                        "data": { "error_code": 0, "access_token": "at2", "expires_in": 100 }
                    }),
                ),
        );
        seed_grant(&store, json!({ "refresh_token": "rt1" })).await;

        let token = credentials.access_token().await.unwrap();
        assert_eq!(token, "at2");

        // Renewal first, with the grant's token; then the refresh exchange
        // with the renewed one.
        let calls = transport.calls();
        assert_eq!(
            transport.called_paths(),
            vec![apis::OAUTH_RENEW_REFRESH_TOKEN, apis::OAUTH_REFRESH_TOKEN]
        );
        assert_eq!(query_value(&calls[0].1, "refresh_token"), Some("rt1"));
        assert_eq!(query_value(&calls[1].1, "refresh_token"), Some("rt2"));

        assert_eq!(
            store
                .get("dy:openapi:ck1:u1:refresh_token")
                .await
                .unwrap()
                .as_deref(),
            Some("rt2")
        );
        assert_eq!(
            store
                .get("dy:openapi:ck1:u1:access_token")
                .await
                .unwrap()
                .as_deref(),
            Some("at2")
        );

        // The grant record was republished with the renewed token.
        let grant = credentials.grant().await.unwrap().unwrap();
        assert_eq!(grant.refresh_token.as_deref(), Some("rt2"));
    }

    #[tokio::test]
    async fn missing_grant_is_terminal_without_network() {
        let (credentials, transport, _store) = manager(ScriptedTransport::new());

        let err = credentials.access_token().await.unwrap_err();
        assert!(matches!(err, OpenApiError::UnauthorizedUser));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn grant_without_refresh_token_is_terminal_without_network() {
        let (credentials, transport, store) = manager(ScriptedTransport::new());
        seed_grant(&store, json!({ "open_id": "u1" })).await;

        let err = credentials.access_token().await.unwrap_err();
        assert!(matches!(err, OpenApiError::UnauthorizedUser));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn upstream_refresh_error_surfaces() {
        let (credentials, _transport, store) = manager(ScriptedTransport::new().respond(
            apis::OAUTH_REFRESH_TOKEN,
            json!({
                "data": { "error_code": 10010, "description": "refresh_token expired" }
            }),
        ));
        store
            .set("dy:openapi:ck1:u1:refresh_token", "rt1", None)
            .await
            .unwrap();

        let err = credentials.access_token().await.unwrap_err();
        match err {
            OpenApiError::UpstreamRefresh { code, description } => {
                assert_eq!(code, 10010);
                assert_eq!(description, "refresh_token expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn upstream_renew_error_surfaces() {
        let (credentials, transport, store) = manager(ScriptedTransport::new().respond(
            apis::OAUTH_RENEW_REFRESH_TOKEN,
            json!({
                "data": { "error_code": 2190002, "description": "user banned" }
            }),
        ));
        seed_grant(&store, json!({ "refresh_token": "rt1" })).await;

        let err = credentials.access_token().await.unwrap_err();
        assert!(matches!(
            err,
            OpenApiError::UpstreamRenew { code: 2190002, .. }
        ));
        // The failing renewal never reached the refresh endpoint.
        assert_eq!(
            transport.called_paths(),
            vec![apis::OAUTH_RENEW_REFRESH_TOKEN]
        );
    }

    #[tokio::test]
    async fn renewal_rechecks_cache_under_lock() {
        let (credentials, transport, store) = manager(ScriptedTransport::new().respond(
            apis::OAUTH_RENEW_REFRESH_TOKEN,
            json!({
                "data": { "error_code": 0, "refresh_token": "rt2", "expires_in": 500 }
            }),
        ));
        seed_grant(&store, json!({ "refresh_token": "rt1" })).await;

        assert_eq!(credentials.renew_refresh_token().await.unwrap(), "rt2");
        // Second renewal finds the fresh cache entry and stays off the
        // network.
        assert_eq!(credentials.renew_refresh_token().await.unwrap(), "rt2");
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn exchange_code_stores_grant_and_derived_entries() {
        let (credentials, transport, store) = manager(ScriptedTransport::new().respond(
            apis::OAUTH_ACCESS_TOKEN,
            json!({
                "data": {
                    "error_code": 0,
                    "access_token": "at1",
                    "refresh_token": "rt1",
                    "expires_in": 7200,
                    "refresh_expires_in": 2592000,
                    "open_id": "u1",
                    "scope": "user_info"
                }
            }),
        ));

        let grant = credentials.exchange_code("auth-code").await.unwrap();
        assert_eq!(grant.access_token.as_deref(), Some("at1"));
        assert_eq!(grant.refresh_token.as_deref(), Some("rt1"));

        let calls = transport.calls();
        assert_eq!(query_value(&calls[0].1, "code"), Some("auth-code"));
        assert_eq!(query_value(&calls[0].1, "client_secret"), Some("cs1"));
        assert_eq!(
            query_value(&calls[0].1, "grant_type"),
            Some(apis::GRANT_TYPE_AUTHORIZATION_CODE)
        );

        assert!(store.get("dy:openapi:ck1:u1").await.unwrap().is_some());
        assert_eq!(
            store
                .get("dy:openapi:ck1:u1:access_token")
                .await
                .unwrap()
                .as_deref(),
            Some("at1")
        );
        assert_eq!(
            store
                .get("dy:openapi:ck1:u1:refresh_token")
                .await
                .unwrap()
                .as_deref(),
            Some("rt1")
        );
    }

    #[tokio::test]
    async fn failed_exchange_writes_nothing() {
        let (credentials, _transport, store) = manager(ScriptedTransport::new().respond(
            apis::OAUTH_ACCESS_TOKEN,
            json!({
                "data": { "error_code": 10008, "description": "invalid code" }
            }),
        ));

        let err = credentials.exchange_code("bad-code").await.unwrap_err();
        assert!(matches!(err, OpenApiError::UpstreamAuth { code: 10008, .. }));

        assert!(store.get("dy:openapi:ck1:u1").await.unwrap().is_none());
        assert!(
            store
                .get("dy:openapi:ck1:u1:access_token")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .get("dy:openapi:ck1:u1:refresh_token")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn exchange_code_validates_before_any_io() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(MemoryStore::new());
        let config = OpenApiConfig::new("ck1", "u1");
        let credentials = Credentials::new(config, transport.clone(), store);

        let err = credentials.exchange_code("auth-code").await.unwrap_err();
        assert!(matches!(err, OpenApiError::Validation(_)));
        assert!(transport.calls().is_empty());

        let (credentials, transport, _store) = manager(ScriptedTransport::new());
        let err = credentials.exchange_code("").await.unwrap_err();
        assert!(matches!(err, OpenApiError::Validation(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exchanged_tokens_expire_on_their_own_ttls() {
        let (credentials, _transport, store) = manager(ScriptedTransport::new().respond(
            apis::OAUTH_ACCESS_TOKEN,
            json!({
                "data": {
                    "error_code": 0,
                    "access_token": "at1",
                    "refresh_token": "rt1",
                    "expires_in": 7200,
                    "refresh_expires_in": 2592000
                }
            }),
        ));
        credentials.exchange_code("auth-code").await.unwrap();

        advance(Duration::from_secs(7199)).await;
        assert!(
            store
                .get("dy:openapi:ck1:u1:access_token")
                .await
                .unwrap()
                .is_some()
        );

        advance(Duration::from_secs(2)).await;
        assert!(
            store
                .get("dy:openapi:ck1:u1:access_token")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .get("dy:openapi:ck1:u1:refresh_token")
                .await
                .unwrap()
                .is_some()
        );

        advance(Duration::from_secs(2_592_000)).await;
        assert!(
            store
                .get("dy:openapi:ck1:u1:refresh_token")
                .await
                .unwrap()
                .is_none()
        );
        // The grant record has no TTL and survives both expirations.
        assert!(credentials.grant().await.unwrap().is_some());
    }
}
