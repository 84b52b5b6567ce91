//! Session store: in-memory registry of finished exports keyed by download id.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Opaque handle the client uses to fetch a finished export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(String);

impl DownloadId {
    /// Generate a fresh id for an export of `channel_id`.
    ///
    /// The random suffix keeps two exports of the same channel apart even when
    /// they start in the same second.
    pub fn generate(channel_id: &str) -> Self {
        Self(format!("{}-{}", channel_id, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DownloadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fully accumulated text of one export.
#[derive(Debug, Clone)]
pub struct ExportSession {
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub channel_id: String,
}

impl ExportSession {
    pub fn new(channel_id: impl Into<String>, content: String) -> Self {
        Self {
            content,
            created_at: Utc::now(),
            channel_id: channel_id.into(),
        }
    }

    /// Attachment filename offered to the browser.
    pub fn filename(&self) -> String {
        format!(
            "discord-channel-{}-{}.txt",
            self.channel_id,
            self.created_at.format("%Y-%m-%d")
        )
    }

    pub fn size_kb(&self) -> f64 {
        self.content.len() as f64 / 1024.0
    }
}

/// How long finished exports are kept around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Entries older than this read as missing. `None` keeps them forever.
    pub ttl: Option<Duration>,
    /// Upper bound on stored entries; the oldest are evicted first.
    pub max_entries: Option<usize>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::from_secs(3600)),
            max_entries: Some(256),
        }
    }
}

impl RetentionPolicy {
    /// Keep everything for the life of the process.
    pub fn unbounded() -> Self {
        Self {
            ttl: None,
            max_entries: None,
        }
    }

    fn is_expired(&self, stored_at: Instant) -> bool {
        self.ttl.is_some_and(|ttl| stored_at.elapsed() >= ttl)
    }
}

struct StoredSession {
    session: Arc<ExportSession>,
    stored_at: Instant,
    seq: u64,
}

struct Inner {
    sessions: HashMap<DownloadId, StoredSession>,
    next_seq: u64,
}

/// In-memory export registry guarded by a reader/writer lock.
pub struct SessionStore {
    inner: RwLock<Inner>,
    policy: RetentionPolicy,
}

impl SessionStore {
    pub fn new(policy: RetentionPolicy) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner {
                sessions: HashMap::new(),
                next_seq: 0,
            }),
            policy,
        })
    }

    /// Store a finished export, evicting the oldest entries past capacity.
    pub async fn put(&self, id: DownloadId, session: ExportSession) {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;

        inner.sessions.insert(
            id.clone(),
            StoredSession {
                session: Arc::new(session),
                stored_at: Instant::now(),
                seq,
            },
        );

        if let Some(max) = self.policy.max_entries {
            while inner.sessions.len() > max {
                let oldest = inner
                    .sessions
                    .iter()
                    .min_by_key(|(_, stored)| stored.seq)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        inner.sessions.remove(&key);
                        debug!(download_id = %key, "Evicted export over capacity");
                    }
                    None => break,
                }
            }
        }

        debug!(download_id = %id, "Export stored");
    }

    /// Look up a finished export. Expired entries read as missing.
    pub async fn get(&self, id: &DownloadId) -> Option<Arc<ExportSession>> {
        let inner = self.inner.read().await;
        let stored = inner.sessions.get(id)?;
        if self.policy.is_expired(stored.stored_at) {
            return None;
        }
        Some(Arc::clone(&stored.session))
    }

    /// Drop expired entries. Returns how many were removed.
    pub async fn prune_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, stored| !self.policy.is_expired(stored.stored_at));
        let removed = before - inner.sessions.len();

        if removed > 0 {
            info!(count = removed, "Expired exports pruned");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sessions.is_empty()
    }
}

/// Spawn a background task that periodically prunes expired exports.
pub fn spawn_sweep_task(store: Arc<SessionStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            store.prune_expired().await;
        }
    })
}
