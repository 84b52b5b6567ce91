//! Scripted message source and helpers shared by export tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::model::{ExportRequest, ProgressData, ServerMessage};
use super::orchestrator::{ExportContext, ExportStrategy, ExportTotals};
use super::reporter::ExportReporter;
use crate::config::ExportConfig;
use crate::discord::model::{FORUM_CHANNEL_TYPE, ThreadMetadata};
use crate::discord::{Channel, Cursor, Message, MessagePage, MessageSource, ThreadList};
use crate::error::{DiscordError, ExportError};

type Scripted<T> = Result<T, u16>;

fn status_error(status: u16) -> DiscordError {
    DiscordError::Status {
        status,
        body: "scripted failure".into(),
    }
}

/// In-memory [`MessageSource`] that replays queued pages and records every call.
///
/// Unscripted message and listing requests return empty pages; unknown
/// channels return 404.
#[derive(Default)]
pub struct ScriptedSource {
    channels: HashMap<String, Channel>,
    active: Option<Scripted<ThreadList>>,
    archived: Mutex<VecDeque<Scripted<ThreadList>>>,
    pages: Mutex<HashMap<String, VecDeque<Scripted<Vec<Message>>>>>,
    openings: HashMap<String, Scripted<Vec<Message>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn text_channel(id: &str) -> Self {
        Self::default().with_channel(Channel {
            id: id.to_string(),
            kind: 0,
            guild_id: Some("g0".into()),
            name: Some("general".into()),
            parent_id: None,
            thread_metadata: None,
        })
    }

    pub fn forum(id: &str, guild_id: &str) -> Self {
        Self::default().with_channel(Channel {
            id: id.to_string(),
            kind: FORUM_CHANNEL_TYPE,
            guild_id: Some(guild_id.to_string()),
            name: Some("forum".into()),
            parent_id: None,
            thread_metadata: None,
        })
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.insert(channel.id.clone(), channel);
        self
    }

    pub fn with_active(mut self, threads: Vec<Channel>) -> Self {
        self.active = Some(Ok(ThreadList {
            threads,
            has_more: false,
        }));
        self
    }

    pub fn with_active_error(mut self, status: u16) -> Self {
        self.active = Some(Err(status));
        self
    }

    pub fn with_archived_page(self, threads: Vec<Channel>, has_more: bool) -> Self {
        self.push_archived(Ok(ThreadList { threads, has_more }))
    }

    pub fn with_archived_error(self, status: u16) -> Self {
        self.push_archived(Err(status))
    }

    fn push_archived(self, page: Scripted<ThreadList>) -> Self {
        self.archived
            .lock()
            .unwrap()
            .push_back(page);
        self
    }

    /// Queue a page for `before`/latest requests on `channel_id`.
    pub fn with_message_page(self, channel_id: &str, page: Vec<Message>) -> Self {
        self.push_page(channel_id, Ok(page))
    }

    pub fn with_message_error(self, channel_id: &str, status: u16) -> Self {
        self.push_page(channel_id, Err(status))
    }

    fn push_page(self, channel_id: &str, page: Scripted<Vec<Message>>) -> Self {
        self.pages
            .lock()
            .unwrap()
            .entry(channel_id.to_string())
            .or_default()
            .push_back(page);
        self
    }

    /// Answer for the `after=0&limit=1` opening-message lookup.
    pub fn with_opening(mut self, thread_id: &str, message: Message) -> Self {
        self.openings
            .insert(thread_id.to_string(), Ok(vec![message]));
        self
    }

    pub fn with_opening_error(mut self, thread_id: &str, status: u16) -> Self {
        self.openings.insert(thread_id.to_string(), Err(status));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of message requests (any cursor) against `channel_id`.
    pub fn message_calls(&self, channel_id: &str) -> usize {
        let prefix = format!("messages {channel_id} ");
        self.calls()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn channel(
        &self,
        _token: &SecretString,
        channel_id: &str,
    ) -> Result<Channel, DiscordError> {
        self.record(format!("channel {channel_id}"));
        self.channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| status_error(404))
    }

    async fn active_threads(
        &self,
        _token: &SecretString,
        guild_id: &str,
    ) -> Result<ThreadList, DiscordError> {
        self.record(format!("active {guild_id}"));
        match &self.active {
            Some(Ok(list)) => Ok(list.clone()),
            Some(Err(status)) => Err(status_error(*status)),
            None => Ok(ThreadList::default()),
        }
    }

    async fn archived_threads(
        &self,
        _token: &SecretString,
        channel_id: &str,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<ThreadList, DiscordError> {
        let cursor = before.map_or_else(|| "none".to_string(), |b| b.to_rfc3339());
        self.record(format!("archived {channel_id} {cursor} {limit}"));
        match self.archived.lock().unwrap().pop_front() {
            Some(Ok(list)) => Ok(list),
            Some(Err(status)) => Err(status_error(status)),
            None => Ok(ThreadList::default()),
        }
    }

    async fn messages(
        &self,
        _token: &SecretString,
        channel_id: &str,
        page: &MessagePage,
    ) -> Result<Vec<Message>, DiscordError> {
        let cursor = match &page.cursor {
            Cursor::Latest => "latest".to_string(),
            Cursor::Before(id) => format!("before {id}"),
            Cursor::After(id) => format!("after {id}"),
        };
        self.record(format!("messages {channel_id} {cursor} {}", page.limit));

        if let Cursor::After(_) = page.cursor {
            return match self.openings.get(channel_id) {
                Some(Ok(messages)) => Ok(messages.clone()),
                Some(Err(status)) => Err(status_error(*status)),
                None => Ok(Vec::new()),
            };
        }

        let next = self
            .pages
            .lock()
            .unwrap()
            .get_mut(channel_id)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(messages)) => Ok(messages),
            Some(Err(status)) => Err(status_error(status)),
            None => Ok(Vec::new()),
        }
    }
}

pub fn message(id: &str, content: &str) -> Message {
    Message {
        id: id.to_string(),
        content: content.to_string(),
        author: None,
        timestamp: "2024-01-01T00:00:00+00:00".to_string(),
    }
}

/// Messages `m{i}` with body `message {i}` for every `i` in `range`.
pub fn messages(range: std::ops::Range<usize>) -> Vec<Message> {
    range
        .map(|i| message(&format!("m{i}"), &format!("message {i}")))
        .collect()
}

pub fn thread(id: &str, parent_id: &str, name: &str, archived_at: Option<&str>) -> Channel {
    Channel {
        id: id.to_string(),
        kind: 11,
        guild_id: Some("g1".into()),
        name: Some(name.to_string()),
        parent_id: Some(parent_id.to_string()),
        thread_metadata: archived_at.map(|ts| ThreadMetadata {
            archived: true,
            archive_timestamp: Some(ts.to_string()),
        }),
    }
}

/// Everything queued on a reporter so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut events = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        events.push(msg);
    }
    events
}

/// Outcome of running a strategy directly.
pub struct StrategyRun {
    pub result: Result<ExportTotals, ExportError>,
    pub content: String,
    pub events: Vec<ServerMessage>,
}

impl StrategyRun {
    /// Totals of a run that is expected to succeed.
    pub fn totals(&self) -> ExportTotals {
        *self.result.as_ref().expect("strategy failed")
    }

    pub fn progress(&self) -> Vec<&ProgressData> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ServerMessage::Progress { data } => Some(data),
                _ => None,
            })
            .collect()
    }
}

/// Probe the channel on `source` and run `strategy` against it without delays.
pub async fn run_strategy(
    strategy: &dyn ExportStrategy,
    source: &ScriptedSource,
    request: ExportRequest,
) -> StrategyRun {
    run_strategy_with(strategy, source, request, ExportConfig::without_delays()).await
}

pub async fn run_strategy_with(
    strategy: &dyn ExportStrategy,
    source: &ScriptedSource,
    request: ExportRequest,
    config: ExportConfig,
) -> StrategyRun {
    let token = request.discord_token.clone();
    let channel = source
        .channel(&token, &request.channel_id)
        .await
        .expect("channel must be scripted");
    let (reporter, mut rx) = ExportReporter::channel();
    let cancel = CancellationToken::new();

    let mut ctx = ExportContext {
        source,
        request: &request,
        channel: &channel,
        config: &config,
        reporter: &reporter,
        cancel: &cancel,
        content: String::new(),
    };
    let result = strategy.export(&mut ctx).await;
    let content = ctx.content;

    StrategyRun {
        result,
        content,
        events: drain(&mut rx),
    }
}
