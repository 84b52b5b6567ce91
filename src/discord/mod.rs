//! Discord REST access.
//!
//! The exporter only talks to Discord through [`MessageSource`];
//! [`DiscordClient`] is the HTTP implementation.

pub mod client;
pub mod model;

pub use client::DiscordClient;
pub use model::{Channel, Cursor, Message, MessagePage, ThreadList};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::error::DiscordError;

/// Paginated read access to channels, threads and messages.
///
/// Every call carries the caller's own credential; implementations never
/// retry.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch a channel's descriptor.
    async fn channel(
        &self,
        token: &SecretString,
        channel_id: &str,
    ) -> Result<Channel, DiscordError>;

    /// List every active thread in a guild.
    async fn active_threads(
        &self,
        token: &SecretString,
        guild_id: &str,
    ) -> Result<ThreadList, DiscordError>;

    /// List archived public threads of a channel, archived before `before`.
    async fn archived_threads(
        &self,
        token: &SecretString,
        channel_id: &str,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<ThreadList, DiscordError>;

    /// Fetch one page of messages.
    async fn messages(
        &self,
        token: &SecretString,
        channel_id: &str,
        page: &MessagePage,
    ) -> Result<Vec<Message>, DiscordError>;
}
