//! Forum channel export: every post becomes a self-contained text block.
//!
//! Posts are gathered from two listings: the guild's active threads (filtered
//! to this forum, best effort) and the forum's archived public threads (paged
//! by archive timestamp). Each post contributes its opening message as the
//! description plus up to a capped number of comments.

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::model::ProgressData;
use super::orchestrator::{ExportContext, ExportStrategy, ExportTotals};
use crate::discord::{Channel, Message, MessagePage};
use crate::error::ExportError;

/// Threads requested per archived listing page.
pub const THREAD_PAGE_SIZE: u32 = 100;

/// Messages requested per comment page.
pub const COMMENT_PAGE_SIZE: u32 = 50;

/// One exported forum post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumPost {
    pub title: String,
    /// Opening message, empty when it could not be fetched.
    pub description: String,
    pub comments: Vec<String>,
}

impl ForumPost {
    /// Messages this post contributes; the description counts when present.
    pub fn message_count(&self) -> u32 {
        self.comments.len() as u32 + u32::from(!self.description.is_empty())
    }

    /// Render the delimited text block for the export file.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("------\n");
        let _ = writeln!(out, "Title: {}", self.title);
        let _ = writeln!(out, "Description: {}", self.description);
        if !self.description.is_empty() {
            out.push('\n');
        }
        out.push_str("Comments:\n");
        for comment in &self.comments {
            out.push_str(comment);
            out.push('\n');
        }
        out.push_str("--------\n\n");
        out
    }
}

/// Strategy for forum channels (type 15).
pub struct ForumExport;

#[async_trait]
impl ExportStrategy for ForumExport {
    fn name(&self) -> &'static str {
        "forum"
    }

    fn step_label(&self) -> &'static str {
        "Posts"
    }

    async fn export(&self, ctx: &mut ExportContext<'_>) -> Result<ExportTotals, ExportError> {
        ctx.reporter.log("Forum channel detected, exporting posts...");

        let threads = list_threads(ctx).await?;
        if threads.is_empty() {
            ctx.reporter.log("No posts found in this forum");
            return Ok(ExportTotals::default());
        }

        let post_count = threads.len() as u32;
        ctx.reporter.log(format!("Found {post_count} posts"));

        let cap = ctx.request.thread_cap(ctx.config.default_thread_cap);
        let mut total: u32 = 0;

        for (index, thread) in threads.iter().enumerate() {
            ctx.check_cancelled()?;
            let set = index as u32 + 1;
            ctx.reporter.log(format!(
                "Processing post {set}/{post_count}: {}",
                thread.title()
            ));

            let opening = fetch_opening_message(ctx, thread).await;
            let description = opening
                .as_ref()
                .and_then(Message::body)
                .unwrap_or_default()
                .to_string();
            let opening_id = opening.as_ref().map(|m| m.id.as_str());
            let comments = fetch_comments(ctx, thread, cap, opening_id).await?;

            let post = ForumPost {
                title: thread.title().to_string(),
                description,
                comments,
            };
            let found = post.message_count();
            total += found;
            ctx.content.push_str(&post.render());

            ctx.reporter.progress(ProgressData {
                set,
                messages_found: found,
                total_messages: total,
                new_content: vec![post.title],
            });

            ctx.pause(ctx.config.thread_delay).await?;
        }

        ctx.reporter.log(format!(
            "Forum export finished: {post_count} posts, {total} messages"
        ));
        info!(
            channel_id = %ctx.channel_id(),
            posts = post_count,
            messages = total,
            "Forum export finished"
        );

        Ok(ExportTotals {
            messages: total,
            steps: post_count,
        })
    }
}

/// Active threads of this forum followed by all archived public ones.
async fn list_threads(ctx: &ExportContext<'_>) -> Result<Vec<Channel>, ExportError> {
    let mut threads = Vec::new();

    match ctx.channel.guild_id.as_deref() {
        Some(guild_id) => match ctx.source.active_threads(ctx.token(), guild_id).await {
            Ok(list) => {
                let forum_id = ctx.channel_id();
                let active: Vec<Channel> = list
                    .threads
                    .into_iter()
                    .filter(|t| t.parent_id.as_deref() == Some(forum_id))
                    .collect();
                ctx.reporter
                    .log(format!("Found {} active posts", active.len()));
                threads.extend(active);
            }
            Err(e) => {
                warn!(guild_id, error = %e, "Active thread listing failed, using archived only");
                ctx.reporter.log(format!(
                    "Could not list active posts: {}",
                    e.user_message()
                ));
            }
        },
        None => warn!(channel_id = %ctx.channel_id(), "Forum has no guild id, skipping active threads"),
    }

    let mut before: Option<DateTime<Utc>> = None;
    let mut pages: u32 = 0;
    let mut archived: usize = 0;

    loop {
        ctx.check_cancelled()?;
        if pages > 0 {
            ctx.pause(ctx.config.archive_page_delay).await?;
        }

        let page = match ctx
            .source
            .archived_threads(ctx.token(), ctx.channel_id(), before, THREAD_PAGE_SIZE)
            .await
        {
            Ok(page) => page,
            Err(e) if pages == 0 => return Err(ExportError::ThreadListing(e)),
            Err(e) => {
                warn!(page = pages + 1, error = %e, "Archived thread page failed, keeping what we have");
                ctx.reporter.log(format!(
                    "Stopped listing archived posts: {}",
                    e.user_message()
                ));
                break;
            }
        };
        pages += 1;

        if page.threads.is_empty() {
            break;
        }

        let next = page
            .threads
            .iter()
            .filter_map(Channel::archive_timestamp)
            .min()
            .unwrap_or_else(|| before.unwrap_or_else(Utc::now) - chrono::Duration::hours(1));

        archived += page.threads.len();
        threads.extend(page.threads);

        if !page.has_more {
            break;
        }
        if before.is_some_and(|prev| next >= prev) {
            warn!(cursor = %next, "Archived thread cursor did not move, stopping");
            break;
        }
        before = Some(next);
    }

    ctx.reporter
        .log(format!("Found {archived} archived posts"));
    Ok(threads)
}

/// Earliest message of a thread, used as the post description.
async fn fetch_opening_message(ctx: &ExportContext<'_>, thread: &Channel) -> Option<Message> {
    match ctx
        .source
        .messages(ctx.token(), &thread.id, &MessagePage::after("0", 1))
        .await
    {
        Ok(messages) => messages.into_iter().next(),
        Err(e) => {
            warn!(thread_id = %thread.id, error = %e, "Opening message fetch failed");
            ctx.reporter.log(format!(
                "Could not fetch description for \"{}\": {}",
                thread.title(),
                e.user_message()
            ));
            None
        }
    }
}

/// Up to `cap` comment bodies, newest first. Fetch failures keep what was gathered.
async fn fetch_comments(
    ctx: &ExportContext<'_>,
    thread: &Channel,
    cap: u32,
    opening_id: Option<&str>,
) -> Result<Vec<String>, ExportError> {
    let mut comments: Vec<String> = Vec::new();
    let mut before: Option<String> = None;

    while (comments.len() as u32) < cap {
        ctx.check_cancelled()?;

        let page = match &before {
            Some(id) => MessagePage::before(id.as_str(), COMMENT_PAGE_SIZE),
            None => MessagePage::latest(COMMENT_PAGE_SIZE),
        };

        let messages = match ctx.source.messages(ctx.token(), &thread.id, &page).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    thread_id = %thread.id,
                    gathered = comments.len(),
                    error = %e,
                    "Comment fetch failed, keeping partial comments"
                );
                ctx.reporter.log(format!(
                    "Could not fetch all comments for \"{}\": {}",
                    thread.title(),
                    e.user_message()
                ));
                break;
            }
        };

        let Some(oldest) = messages.last() else {
            break;
        };
        before = Some(oldest.id.clone());

        for msg in &messages {
            if opening_id == Some(msg.id.as_str()) {
                continue;
            }
            if let Some(body) = msg.body() {
                comments.push(body.to_string());
                if comments.len() as u32 >= cap {
                    break;
                }
            }
        }

        if (comments.len() as u32) < cap {
            ctx.pause(ctx.config.comment_page_delay).await?;
        }
    }

    Ok(comments)
}
