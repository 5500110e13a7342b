//! Test doubles shared across module tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::OpenApiError;
use crate::transport::Transport;

/// Scripted transport: replays a canned JSON body per endpoint path and
/// records every call together with its query parameters.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, path: &str, body: Value) -> Self {
        self.responses.lock().insert(path.to_string(), body);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls.lock().clone()
    }

    pub fn called_paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, OpenApiError> {
        self.calls.lock().push((
            path.to_string(),
            query
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        ));
        self.responses
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| OpenApiError::Validation(format!("unscripted request to {path}")))
    }
}

pub(crate) fn query_value<'a>(
    query: &'a [(String, String)],
    key: &str,
) -> Option<&'a str> {
    query
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}
