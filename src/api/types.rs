// src/api/types.rs

use serde::{Deserialize, Deserializer, Serialize};

pub const INVALID_USERNAME_REPLY: &str = "Please provide a valid username.";
pub const MISSING_MESSAGE_REPLY: &str = "Please provide a message.";
pub const INVALID_BODY_REPLY: &str = "Invalid request body.";
pub const APOLOGY_REPLY: &str = "Sorry, an error occurred. Try again.";
pub const HEALTH_STATUS: &str = "Server is running";

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatBody {
    #[serde(default, deserialize_with = "string_or_none")]
    pub message: Option<String>,
    /// Non-string values are treated as missing.
    #[serde(default, deserialize_with = "string_or_none")]
    pub username: Option<String>,
    #[serde(default, rename = "sessionId", deserialize_with = "string_or_none")]
    pub session_id: Option<String>,
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// Every chat response, success or not, is `{reply}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub reply: String,
}

impl ChatReply {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}
