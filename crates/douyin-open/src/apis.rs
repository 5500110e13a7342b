//! Remote endpoint paths, resolved against the configured API host.

pub(crate) const OAUTH_ACCESS_TOKEN: &str = "oauth/access_token";
pub(crate) const OAUTH_REFRESH_TOKEN: &str = "oauth/refresh_token";
pub(crate) const OAUTH_RENEW_REFRESH_TOKEN: &str = "oauth/renew_refresh_token";
pub(crate) const DATA_EXTERNAL_USER: &str = "data/external/user";
pub(crate) const VIDEO_LIST: &str = "video/list";

pub(crate) const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";
pub(crate) const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";
