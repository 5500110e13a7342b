use std::sync::Arc;

use crate::apis;
use crate::config::OpenApiConfig;
use crate::credentials::Credentials;
use crate::error::OpenApiError;
use crate::models::{
    self, TokenGrant, UserDataKind, UserDataPayload, UserDataPoint, VideoListPage,
    VideoListPayload,
};
use crate::store::{CredentialStore, MemoryStore};
use crate::transport::{HttpTransport, Transport};

/// Client for the Open Platform data API on behalf of one authorized user.
///
/// Owns its collaborators: an HTTP transport, a credential store, and the
/// credential manager wired on top of them. The data endpoints resolve
/// their bearer token through the manager's fallback chain, so callers
/// never handle token lifecycle.
pub struct OpenApiClient {
    config: OpenApiConfig,
    transport: Arc<dyn Transport>,
    credentials: Credentials,
}

impl std::fmt::Debug for OpenApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenApiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OpenApiClient {
    /// Client with the default reqwest transport and in-process store.
    pub fn new(config: OpenApiConfig) -> Result<Self, OpenApiError> {
        let transport = Arc::new(HttpTransport::new(config.host.clone()));
        Self::with_collaborators(config, transport, Arc::new(MemoryStore::new()))
    }

    /// Client with injected transport and store. Validates the client
    /// identity before any I/O.
    pub fn with_collaborators(
        config: OpenApiConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, OpenApiError> {
        config.validate()?;
        let credentials = Credentials::new(config.clone(), transport.clone(), store);
        Ok(Self {
            config,
            transport,
            credentials,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// See [`Credentials::access_token`].
    pub async fn access_token(&self) -> Result<String, OpenApiError> {
        self.credentials.access_token().await
    }

    /// See [`Credentials::exchange_code`].
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, OpenApiError> {
        self.credentials.exchange_code(code).await
    }

    /// Daily user metrics of `kind` over the trailing `date_type` days
    /// (the platform accepts 7, 15, and 30).
    pub async fn user_data(
        &self,
        kind: UserDataKind,
        date_type: u32,
    ) -> Result<Vec<UserDataPoint>, OpenApiError> {
        let access_token = self.credentials.access_token().await?;
        let path = format!("{}/{}", apis::DATA_EXTERNAL_USER, kind.as_path());
        let query = [
            ("open_id", self.config.open_id.clone()),
            ("access_token", access_token),
            ("date_type", date_type.to_string()),
        ];
        let body = self.transport.get_json(&path, &query).await?;
        let payload: UserDataPayload = models::decode_data(body)?;
        let code = payload.error_code.unwrap_or(-1);
        if code != 0 {
            return Err(OpenApiError::UpstreamData {
                endpoint: path,
                code,
                description: payload
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(payload.result_list)
    }

    pub async fn user_data_item(&self, date_type: u32) -> Result<Vec<UserDataPoint>, OpenApiError> {
        self.user_data(UserDataKind::Item, date_type).await
    }

    pub async fn user_data_fans(&self, date_type: u32) -> Result<Vec<UserDataPoint>, OpenApiError> {
        self.user_data(UserDataKind::Fans, date_type).await
    }

    pub async fn user_data_like(&self, date_type: u32) -> Result<Vec<UserDataPoint>, OpenApiError> {
        self.user_data(UserDataKind::Like, date_type).await
    }

    pub async fn user_data_comment(
        &self,
        date_type: u32,
    ) -> Result<Vec<UserDataPoint>, OpenApiError> {
        self.user_data(UserDataKind::Comment, date_type).await
    }

    pub async fn user_data_share(
        &self,
        date_type: u32,
    ) -> Result<Vec<UserDataPoint>, OpenApiError> {
        self.user_data(UserDataKind::Share, date_type).await
    }

    pub async fn user_data_profile(
        &self,
        date_type: u32,
    ) -> Result<Vec<UserDataPoint>, OpenApiError> {
        self.user_data(UserDataKind::Profile, date_type).await
    }

    /// One page of the authorized account's videos.
    pub async fn video_list(
        &self,
        count: u32,
        cursor: u64,
    ) -> Result<VideoListPage, OpenApiError> {
        let access_token = self.credentials.access_token().await?;
        let query = [
            ("open_id", self.config.open_id.clone()),
            ("access_token", access_token),
            ("count", count.to_string()),
            ("cursor", cursor.to_string()),
        ];
        let body = self.transport.get_json(apis::VIDEO_LIST, &query).await?;
        let payload: VideoListPayload = models::decode_data(body)?;
        let code = payload.error_code.unwrap_or(-1);
        if code != 0 {
            return Err(OpenApiError::UpstreamData {
                endpoint: apis::VIDEO_LIST.to_string(),
                code,
                description: payload
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(VideoListPage {
            cursor: payload.cursor,
            has_more: payload.has_more,
            list: payload.list,
        })
    }
}
