//! Export orchestrator: probes the channel, runs the matching strategy and
//! hands the result to the session store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::flat::FlatChannelExport;
use super::forum::ForumExport;
use super::model::{CompleteData, ExportRequest};
use super::reporter::ExportReporter;
use crate::config::ExportConfig;
use crate::discord::{Channel, MessageSource};
use crate::error::ExportError;
use crate::session::{DownloadId, ExportSession, SessionStore};

/// Everything a strategy needs while it runs, plus the shared text buffer.
pub struct ExportContext<'a> {
    pub source: &'a dyn MessageSource,
    pub request: &'a ExportRequest,
    pub channel: &'a Channel,
    pub config: &'a ExportConfig,
    pub reporter: &'a ExportReporter,
    pub cancel: &'a CancellationToken,
    /// Accumulated export text.
    pub content: String,
}

impl ExportContext<'_> {
    pub fn token(&self) -> &SecretString {
        &self.request.discord_token
    }

    pub fn channel_id(&self) -> &str {
        &self.channel.id
    }

    pub fn check_cancelled(&self) -> Result<(), ExportError> {
        if self.cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        Ok(())
    }

    /// Rate-limit pause that ends early when the export is cancelled.
    pub async fn pause(&self, delay: Duration) -> Result<(), ExportError> {
        if delay.is_zero() {
            return self.check_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ExportError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Counts reported in the final `complete` notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportTotals {
    pub messages: u32,
    /// Batches (flat channel) or posts (forum) processed.
    pub steps: u32,
}

/// One way of walking a channel's history into the context buffer.
#[async_trait]
pub trait ExportStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Label for the unit counted by [`ExportTotals::steps`].
    fn step_label(&self) -> &'static str;

    async fn export(&self, ctx: &mut ExportContext<'_>) -> Result<ExportTotals, ExportError>;
}

/// Pick the strategy for a probed channel.
pub fn strategy_for(channel: &Channel) -> Box<dyn ExportStrategy> {
    if channel.is_forum() {
        Box::new(ForumExport)
    } else {
        Box::new(FlatChannelExport)
    }
}

/// Runs exports and stores their results.
#[derive(Clone)]
pub struct Exporter {
    source: Arc<dyn MessageSource>,
    sessions: Arc<SessionStore>,
    config: ExportConfig,
}

impl Exporter {
    pub fn new(
        source: Arc<dyn MessageSource>,
        sessions: Arc<SessionStore>,
        config: ExportConfig,
    ) -> Self {
        Self {
            source,
            sessions,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Run an export on its own task. The caller is not expected to await it.
    pub fn spawn(
        &self,
        request: ExportRequest,
        reporter: ExportReporter,
        cancel: CancellationToken,
    ) -> JoinHandle<Option<DownloadId>> {
        let exporter = self.clone();
        tokio::spawn(async move { exporter.run(request, &reporter, &cancel).await })
    }

    /// Run an export to completion, reporting any failure to the client.
    ///
    /// Returns the download id when a session was stored.
    pub async fn run(
        &self,
        request: ExportRequest,
        reporter: &ExportReporter,
        cancel: &CancellationToken,
    ) -> Option<DownloadId> {
        match self.try_run(&request, reporter, cancel).await {
            Ok(id) => Some(id),
            Err(ExportError::Cancelled) => {
                info!(channel_id = %request.channel_id, "Export cancelled, connection closed");
                None
            }
            Err(e) => {
                warn!(channel_id = %request.channel_id, error = %e, "Export failed");
                reporter.error(e.to_string());
                None
            }
        }
    }

    async fn try_run(
        &self,
        request: &ExportRequest,
        reporter: &ExportReporter,
        cancel: &CancellationToken,
    ) -> Result<DownloadId, ExportError> {
        request.validate()?;

        let channel_id = request.channel_id.trim();
        let download_id = DownloadId::generate(channel_id);

        reporter.log("Starting content-only scrape...");
        reporter.log(format!("Channel ID: {channel_id}"));

        let channel = self
            .source
            .channel(&request.discord_token, channel_id)
            .await
            .map_err(ExportError::ChannelLookup)?;

        let strategy = strategy_for(&channel);
        info!(
            channel_id = %channel_id,
            download_id = %download_id,
            strategy = strategy.name(),
            "Export started"
        );

        let mut ctx = ExportContext {
            source: self.source.as_ref(),
            request,
            channel: &channel,
            config: &self.config,
            reporter,
            cancel,
            content: String::new(),
        };
        let totals = strategy.export(&mut ctx).await?;
        let content = ctx.content;

        reporter.log("Export completed!");
        reporter.log(format!("Total messages exported: {}", totals.messages));
        reporter.log(format!(
            "{} processed: {}",
            strategy.step_label(),
            totals.steps
        ));

        let session = ExportSession::new(channel_id, content);
        let size_kb = session.size_kb();
        self.sessions.put(download_id.clone(), session).await;

        reporter.log(format!("Content ready for download ({size_kb:.2} KB)"));
        reporter.complete(CompleteData {
            success: true,
            total_messages: totals.messages,
            batches_total: totals.steps,
            download_id: download_id.clone(),
        });

        info!(
            download_id = %download_id,
            messages = totals.messages,
            size_kb,
            "Export stored"
        );
        Ok(download_id)
    }
}
