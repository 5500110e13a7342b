use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OpenApiError;

/// Wire envelope shared by every Open Platform endpoint: the payload sits
/// under a single `data` field.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

pub(crate) fn decode_data<T: DeserializeOwned>(body: Value) -> Result<T, OpenApiError> {
    let envelope: Envelope<T> = serde_json::from_value(body)?;
    Ok(envelope.data)
}

/// Raw payload of the three oauth endpoints, deserialized before the
/// `error_code` gate. Token fields are absent on error responses, so
/// everything past `error_code` is optional.
#[derive(Debug, Deserialize)]
pub(crate) struct OauthPayload {
    pub error_code: Option<i64>,
    pub description: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_expires_in: Option<u64>,
    pub open_id: Option<String>,
    pub scope: Option<String>,
}

impl OauthPayload {
    /// Remote error code; a missing field reads as failure, not success.
    pub fn code(&self) -> i64 {
        self.error_code.unwrap_or(-1)
    }

    pub fn description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Durable grant record stored per (client, user) pair.
///
/// Every field is optional on deserialization: records seeded by older
/// writers may be partial, and "grant exists but carries no refresh token"
/// is a state the renewal path must be able to observe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Supported report kinds under `data/external/user/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserDataKind {
    Item,
    Fans,
    Like,
    Comment,
    Share,
    Profile,
}

impl UserDataKind {
    pub const ALL: [UserDataKind; 6] = [
        UserDataKind::Item,
        UserDataKind::Fans,
        UserDataKind::Like,
        UserDataKind::Comment,
        UserDataKind::Share,
        UserDataKind::Profile,
    ];

    pub fn as_path(&self) -> &'static str {
        match self {
            UserDataKind::Item => "item",
            UserDataKind::Fans => "fans",
            UserDataKind::Like => "like",
            UserDataKind::Comment => "comment",
            UserDataKind::Share => "share",
            UserDataKind::Profile => "profile",
        }
    }
}

impl FromStr for UserDataKind {
    type Err = OpenApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "item" => Ok(UserDataKind::Item),
            "fans" => Ok(UserDataKind::Fans),
            "like" => Ok(UserDataKind::Like),
            "comment" => Ok(UserDataKind::Comment),
            "share" => Ok(UserDataKind::Share),
            "profile" => Ok(UserDataKind::Profile),
            other => Err(OpenApiError::Validation(format!(
                "unsupported user data path: {other}"
            ))),
        }
    }
}

/// Daily metric point returned by the user-data endpoints. The metric
/// columns differ per report kind, so they stay as a flattened map.
#[derive(Debug, Clone, Deserialize)]
pub struct UserDataPoint {
    pub date: String,
    #[serde(flatten)]
    pub metrics: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserDataPayload {
    pub error_code: Option<i64>,
    pub description: Option<String>,
    #[serde(default)]
    pub result_list: Vec<UserDataPoint>,
}

/// One entry from `video/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoRecord {
    pub item_id: String,
    pub title: Option<String>,
    pub cover: Option<String>,
    pub create_time: Option<i64>,
    pub is_top: Option<bool>,
    pub share_url: Option<String>,
    pub statistics: Option<VideoStatistics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoStatistics {
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub digg_count: i64,
    #[serde(default)]
    pub download_count: i64,
    #[serde(default)]
    pub forward_count: i64,
    #[serde(default)]
    pub play_count: i64,
    #[serde(default)]
    pub share_count: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoListPayload {
    pub error_code: Option<i64>,
    pub description: Option<String>,
    #[serde(default)]
    pub cursor: i64,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub list: Vec<VideoRecord>,
}

/// One page of the authorized account's videos.
#[derive(Debug, Clone)]
pub struct VideoListPage {
    pub cursor: i64,
    pub has_more: bool,
    pub list: Vec<VideoRecord>,
}
