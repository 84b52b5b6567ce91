//! Discord REST client over reqwest.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use super::MessageSource;
use super::model::{Channel, Cursor, Message, MessagePage, ThreadList};
use crate::config::DEFAULT_DISCORD_API_BASE;
use crate::error::DiscordError;

/// HTTP client for the Discord REST API.
#[derive(Clone)]
pub struct DiscordClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for DiscordClient {
    fn default() -> Self {
        Self::new(DEFAULT_DISCORD_API_BASE)
    }
}

impl DiscordClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path` with the caller's token and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &SecretString,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, DiscordError> {
        let resp = self
            .client
            .get(self.api_url(path))
            .header(reqwest::header::AUTHORIZATION, token.expose_secret())
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            tracing::debug!(path, status = status.as_u16(), "Discord request rejected");
            return Err(DiscordError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MessageSource for DiscordClient {
    async fn channel(
        &self,
        token: &SecretString,
        channel_id: &str,
    ) -> Result<Channel, DiscordError> {
        self.get_json(token, &format!("/channels/{channel_id}"), &[])
            .await
    }

    async fn active_threads(
        &self,
        token: &SecretString,
        guild_id: &str,
    ) -> Result<ThreadList, DiscordError> {
        self.get_json(token, &format!("/guilds/{guild_id}/threads/active"), &[])
            .await
    }

    async fn archived_threads(
        &self,
        token: &SecretString,
        channel_id: &str,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<ThreadList, DiscordError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(before) = before {
            query.push((
                "before",
                before.to_rfc3339_opts(SecondsFormat::Millis, true),
            ));
        }
        self.get_json(
            token,
            &format!("/channels/{channel_id}/threads/archived/public"),
            &query,
        )
        .await
    }

    async fn messages(
        &self,
        token: &SecretString,
        channel_id: &str,
        page: &MessagePage,
    ) -> Result<Vec<Message>, DiscordError> {
        let mut query = vec![("limit", page.limit.to_string())];
        match &page.cursor {
            Cursor::Latest => {}
            Cursor::Before(id) => query.push(("before", id.clone())),
            Cursor::After(id) => query.push(("after", id.clone())),
        }
        self.get_json(token, &format!("/channels/{channel_id}/messages"), &query)
            .await
    }
}
