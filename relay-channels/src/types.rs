use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One invocation as handed over by the hosting platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl InboundEvent {
    /// Header names are case-insensitive; entries that are not valid HTTP headers are dropped.
    ///
    /// Keys that differ only in case collapse to one header. Keys are applied in byte
    /// order and the last one wins, so `authorization` beats `Authorization`.
    pub fn header_map(&self) -> HeaderMap {
        let mut entries: Vec<(&String, &String)> = self.headers.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        let mut map = HeaderMap::with_capacity(entries.len());
        for (name, value) in entries {
            let Ok(name) = HeaderName::from_bytes(name.trim().as_bytes()) else {
                tracing::debug!(header = %name, "dropping invalid header name");
                continue;
            };
            let Ok(value) = HeaderValue::from_str(value) else {
                tracing::debug!(header = %name, "dropping invalid header value");
                continue;
            };
            map.insert(name, value);
        }
        map
    }
}

/// Outgoing-webhook message body. Only `text` drives the relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamsMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub from: Option<TeamsSender>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamsSender {
    #[serde(default)]
    pub name: Option<String>,
}

impl TeamsMessage {
    pub fn from_body(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    pub fn sender_name(&self) -> &str {
        self.from
            .as_ref()
            .and_then(|from| from.name.as_deref())
            .unwrap_or("unknown")
    }
}

pub const ACK_MESSAGE: &str = "Ok!";

/// Reply returned to the hosting platform, identical for every outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformResponse {
    pub status_code: u16,
    pub body: String,
}

impl PlatformResponse {
    pub fn ack() -> Self {
        Self {
            status_code: 200,
            body: format!("\"{ACK_MESSAGE}\""),
        }
    }
}
