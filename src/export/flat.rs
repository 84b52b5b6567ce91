//! Flat text channel export: page backward through history 50 messages at a time.

use async_trait::async_trait;
use secrecy::SecretString;

use super::model::ProgressData;
use super::orchestrator::{ExportContext, ExportStrategy, ExportTotals};
use crate::discord::{Message, MessagePage, MessageSource};
use crate::error::{DiscordError, ExportError};

/// Messages requested per batch.
pub const BATCH_SIZE: u32 = 50;

/// Result of one batch request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// `false` once the API returned an empty page.
    pub has_more: bool,
    /// Id of the oldest message in the page, the cursor for the next batch.
    pub next_before: Option<String>,
    /// Trimmed, non-empty message bodies in API order.
    pub lines: Vec<String>,
}

impl Batch {
    pub fn count(&self) -> u32 {
        self.lines.len() as u32
    }
}

/// Fetch one batch of messages older than `before` (or the newest batch).
pub async fn fetch_batch(
    source: &dyn MessageSource,
    token: &SecretString,
    channel_id: &str,
    before: Option<&str>,
) -> Result<Batch, DiscordError> {
    let page = match before {
        Some(id) => MessagePage::before(id, BATCH_SIZE),
        None => MessagePage::latest(BATCH_SIZE),
    };
    let messages = source.messages(token, channel_id, &page).await?;

    let Some(oldest) = messages.last() else {
        return Ok(Batch::default());
    };

    let lines = messages
        .iter()
        .filter_map(Message::body)
        .map(str::to_string)
        .collect();

    Ok(Batch {
        has_more: true,
        next_before: Some(oldest.id.clone()),
        lines,
    })
}

/// Strategy for ordinary (non-forum) channels.
pub struct FlatChannelExport;

#[async_trait]
impl ExportStrategy for FlatChannelExport {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn step_label(&self) -> &'static str {
        "Batches"
    }

    async fn export(&self, ctx: &mut ExportContext<'_>) -> Result<ExportTotals, ExportError> {
        let max_messages = ctx.request.message_budget(ctx.config.default_max_messages);
        let max_batches = max_messages.div_ceil(BATCH_SIZE);

        let mut before: Option<String> = None;
        let mut set: u32 = 1;
        let mut total: u32 = 0;

        while set <= max_batches {
            ctx.check_cancelled()?;
            ctx.reporter
                .log(format!("Fetching batch {set}/{max_batches}"));

            let batch = fetch_batch(ctx.source, ctx.token(), ctx.channel_id(), before.as_deref())
                .await
                .map_err(|source| ExportError::Batch { set, source })?;

            if !batch.has_more {
                ctx.reporter.log("No more messages to fetch");
                break;
            }

            let count = batch.count();
            total += count;
            before = batch.next_before;

            ctx.reporter.log(format!("Set {set}: Saved {count} lines"));
            tracing::debug!(set, count, channel_id = %ctx.channel_id(), "Batch fetched");

            for line in &batch.lines {
                ctx.content.push_str(line);
                ctx.content.push('\n');
            }

            ctx.reporter.progress(ProgressData {
                set,
                messages_found: count,
                total_messages: total,
                new_content: batch.lines,
            });

            set += 1;

            if set <= max_batches {
                ctx.reporter.log(format!(
                    "Waiting {:.1} seconds before next batch...",
                    ctx.config.batch_delay.as_secs_f64()
                ));
                ctx.pause(ctx.config.batch_delay).await?;
            }
        }

        Ok(ExportTotals {
            messages: total,
            steps: set - 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::model::{ExportRequest, ServerMessage};
    use crate::config::ExportConfig;
    use std::time::Duration;
    use crate::export::test_support::{
        ScriptedSource, message, messages, run_strategy, run_strategy_with,
    };

    #[tokio::test]
    async fn batch_trims_and_skips_blank_bodies() {
        let source = ScriptedSource::text_channel("1").with_message_page(
            "1",
            vec![
                message("30", "  newest  "),
                message("20", "   "),
                message("10", "\toldest\n"),
            ],
        );
        let token = SecretString::from("tok");

        let batch = fetch_batch(&source, &token, "1", None).await.unwrap();
        assert!(batch.has_more);
        assert_eq!(batch.lines, vec!["newest", "oldest"]);
        assert_eq!(batch.count(), 2);
        assert_eq!(batch.next_before.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn empty_page_ends_pagination() {
        let source = ScriptedSource::text_channel("1");
        let token = SecretString::from("tok");

        let batch = fetch_batch(&source, &token, "1", Some("10")).await.unwrap();
        assert_eq!(batch, Batch::default());
    }

    #[tokio::test]
    async fn stops_reactively_on_empty_page() {
        let source = ScriptedSource::text_channel("123")
            .with_message_page("123", messages(0..50))
            .with_message_page("123", messages(50..100))
            .with_message_page("123", vec![]);

        let run = run_strategy(
            &FlatChannelExport,
            &source,
            ExportRequest::new("123", "tok", Some(120)),
        )
        .await;

        let totals = run.totals();
        assert_eq!(totals, ExportTotals { messages: 100, steps: 2 });
        assert_eq!(run.progress().len(), 2);
        assert_eq!(source.message_calls("123"), 3);
        assert!(run.events.contains(&ServerMessage::Log {
            message: "No more messages to fetch".into()
        }));
        assert_eq!(run.content.lines().count(), 100);
    }

    #[tokio::test]
    async fn issues_ceil_of_budget_over_fifty_requests() {
        let mut source = ScriptedSource::text_channel("9");
        for page in 0..10 {
            source = source.with_message_page("9", messages(page * 50..page * 50 + 50));
        }

        let run = run_strategy(
            &FlatChannelExport,
            &source,
            ExportRequest::new("9", "tok", Some(101)),
        )
        .await;

        assert_eq!(run.totals().steps, 3);
        assert_eq!(source.message_calls("9"), 3);
    }

    #[tokio::test]
    async fn cursor_advances_to_oldest_message() {
        let source = ScriptedSource::text_channel("5")
            .with_message_page("5", messages(0..50))
            .with_message_page("5", messages(50..100));

        let run = run_strategy(
            &FlatChannelExport,
            &source,
            ExportRequest::new("5", "tok", Some(100)),
        )
        .await;
        assert_eq!(run.totals().steps, 2);

        let calls: Vec<String> = source
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("messages "))
            .collect();
        assert_eq!(calls, vec!["messages 5 latest 50", "messages 5 before m49 50"]);
    }

    #[tokio::test]
    async fn batch_error_is_fatal() {
        let source = ScriptedSource::text_channel("123")
            .with_message_page("123", messages(0..50))
            .with_message_error("123", 403);

        let run = run_strategy(
            &FlatChannelExport,
            &source,
            ExportRequest::new("123", "tok", Some(500)),
        )
        .await;

        match &run.result {
            Err(ExportError::Batch { set, .. }) => assert_eq!(*set, 2),
            other => panic!("expected batch error, got {other:?}"),
        }
        assert_eq!(run.progress().len(), 1);
    }

    #[tokio::test]
    async fn every_stored_line_is_trimmed_and_non_empty() {
        let source = ScriptedSource::text_channel("1").with_message_page(
            "1",
            vec![
                message("4", " a "),
                message("3", ""),
                message("2", "\n\n"),
                message("1", "b\t"),
            ],
        );

        let run = run_strategy(
            &FlatChannelExport,
            &source,
            ExportRequest::new("1", "tok", Some(50)),
        )
        .await;

        assert_eq!(run.totals().messages, 2);
        assert_eq!(run.content, "a\nb\n");
        for line in run.content.lines() {
            assert!(!line.is_empty());
            assert_eq!(line, line.trim());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_only_between_batches() {
        let source = ScriptedSource::text_channel("7")
            .with_message_page("7", messages(0..50))
            .with_message_page("7", messages(50..100))
            .with_message_page("7", messages(100..150));

        let started = tokio::time::Instant::now();
        let run = run_strategy_with(
            &FlatChannelExport,
            &source,
            ExportRequest::new("7", "tok", Some(150)),
            ExportConfig::default(),
        )
        .await;
        let elapsed = started.elapsed();

        assert_eq!(run.totals(), ExportTotals { messages: 150, steps: 3 });
        // Two 1.5s pauses; none after the final batch.
        assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "elapsed {elapsed:?}");
        let waits = run
            .events
            .iter()
            .filter(|e| matches!(e, ServerMessage::Log { message } if message.starts_with("Waiting 1.5 seconds")))
            .count();
        assert_eq!(waits, 2);
    }
}
