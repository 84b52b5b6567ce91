//! Discord REST payloads: only the fields the exporter reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel type code Discord uses for forum channels.
pub const FORUM_CHANNEL_TYPE: u8 = 15;

/// A channel message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub timestamp: String,
}

impl Message {
    /// The trimmed body, or `None` when nothing is left after trimming.
    pub fn body(&self) -> Option<&str> {
        let trimmed = self.content.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// A channel or thread descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub thread_metadata: Option<ThreadMetadata>,
}

impl Channel {
    pub fn is_forum(&self) -> bool {
        self.kind == FORUM_CHANNEL_TYPE
    }

    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or("Untitled")
    }

    /// When the thread was archived, if Discord reported a parseable timestamp.
    pub fn archive_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.thread_metadata.as_ref()?.archive_timestamp.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadMetadata {
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub archive_timestamp: Option<String>,
}

/// Response body of the active/archived thread listing endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadList {
    #[serde(default)]
    pub threads: Vec<Channel>,
    #[serde(default)]
    pub has_more: bool,
}

/// Where a message page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Most recent messages.
    Latest,
    /// Messages strictly older than this id.
    Before(String),
    /// Messages strictly newer than this id.
    After(String),
}

/// One bounded request against the channel messages endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    pub cursor: Cursor,
    pub limit: u32,
}

impl MessagePage {
    pub fn latest(limit: u32) -> Self {
        Self {
            cursor: Cursor::Latest,
            limit,
        }
    }

    pub fn before(id: impl Into<String>, limit: u32) -> Self {
        Self {
            cursor: Cursor::Before(id.into()),
            limit,
        }
    }

    pub fn after(id: impl Into<String>, limit: u32) -> Self {
        Self {
            cursor: Cursor::After(id.into()),
            limit,
        }
    }
}
