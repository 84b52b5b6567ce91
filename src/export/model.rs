//! Push-channel protocol: client commands and server notifications.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ExportError;
use crate::session::DownloadId;

/// Command sent by the browser over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Start exporting a channel.
    Export(ExportRequest),
}

/// Parameters of a single export run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub channel_id: String,
    #[serde(default = "empty_token", deserialize_with = "deserialize_token")]
    pub discord_token: SecretString,
    #[serde(default)]
    pub max_messages: Option<i64>,
}

fn empty_token() -> SecretString {
    SecretString::from("")
}

fn deserialize_token<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(SecretString::from(raw.unwrap_or_default()))
}

impl ExportRequest {
    pub fn new(
        channel_id: impl Into<String>,
        discord_token: impl Into<String>,
        max_messages: Option<i64>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            discord_token: SecretString::from(discord_token.into()),
            max_messages,
        }
    }

    /// Both the channel id and the token must be present.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.channel_id.trim().is_empty() || self.discord_token.expose_secret().is_empty() {
            return Err(ExportError::InvalidRequest);
        }
        Ok(())
    }

    /// Message budget for a flat channel. Unset or zero falls back to `default`.
    pub fn message_budget(&self, default: u32) -> u32 {
        match self.max_messages {
            None | Some(0) => default,
            Some(n) => u32::try_from(n.max(0)).unwrap_or(u32::MAX),
        }
    }

    /// Comment cap per forum post. Anything but a positive value falls back to `default`.
    pub fn thread_cap(&self, default: u32) -> u32 {
        match self.max_messages {
            Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
            _ => default,
        }
    }
}

/// Payload of a `progress` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressData {
    /// 1-based batch (flat channel) or post (forum) number.
    pub set: u32,
    pub messages_found: u32,
    pub total_messages: u32,
    pub new_content: Vec<String>,
}

/// Payload of the final `complete` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteData {
    pub success: bool,
    pub total_messages: u32,
    pub batches_total: u32,
    pub download_id: DownloadId,
}

/// Notification sent from server to browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected { message: String },
    Log { message: String },
    Error { message: String },
    Progress { data: ProgressData },
    Complete { data: CompleteData },
}
