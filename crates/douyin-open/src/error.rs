use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum OpenApiError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("oauth/access_token failed (error_code={code}): {description}")]
    UpstreamAuth { code: i64, description: String },
    #[error("oauth/refresh_token failed (error_code={code}): {description}")]
    UpstreamRefresh { code: i64, description: String },
    #[error("oauth/renew_refresh_token failed (error_code={code}): {description}")]
    UpstreamRenew { code: i64, description: String },
    #[error("{endpoint} failed (error_code={code}): {description}")]
    UpstreamData {
        endpoint: String,
        code: i64,
        description: String,
    },
    #[error("user has not authorized this client, re-run the authorization-code flow")]
    UnauthorizedUser,
    #[error("unexpected response shape: {0}")]
    Parse(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
