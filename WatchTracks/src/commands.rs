//! Telegram command layer
//!
//! Long-polls the Bot API for updates and translates commands into watcher
//! operations. Every reply is rendered here; the tracking engine itself
//! never formats chat-facing text beyond the shared notification templates.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use wttelegram::{InlineKeyboardButton, InlineKeyboardMarkup, TelegramClient, Update};
use wttracker::{
    ArtworkFetch, CycleOutcome, Error, PlaylistWatcher, render_initialized, render_summary,
};

/// Long-poll wait passed to `getUpdates`.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause before re-polling after a transport error.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Callback data of the inline help button.
const CALLBACK_HELP: &str = "help";

/// Dispatches incoming Telegram updates to watcher operations.
pub struct CommandHandler {
    telegram: Arc<TelegramClient>,
    watcher: PlaylistWatcher,
    artwork: Arc<dyn ArtworkFetch>,
    bot_username: String,
}

impl CommandHandler {
    pub fn new(
        telegram: Arc<TelegramClient>,
        watcher: PlaylistWatcher,
        artwork: Arc<dyn ArtworkFetch>,
        bot_username: String,
    ) -> Self {
        Self {
            telegram,
            watcher,
            artwork,
            bot_username,
        }
    }

    /// Runs the long-polling loop until the task is dropped
    ///
    /// Transport errors pause the loop briefly and polling resumes; a
    /// failure while handling one update is logged and never stops the
    /// loop or skips later updates.
    pub async fn run(self) {
        info!("Command polling started");
        let mut offset: Option<i64> = None;

        loop {
            let updates = match self.telegram.get_updates(offset, POLL_TIMEOUT_SECS).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "Failed to poll updates, retrying");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                if let Err(e) = self.handle_update(&update).await {
                    warn!(update_id = update.update_id, error = %e, "Failed to handle update");
                }
            }
        }
    }

    async fn handle_update(&self, update: &Update) -> anyhow::Result<()> {
        if let Some(message) = &update.message {
            if let Some(text) = &message.text {
                self.handle_command(message.chat.id, text.trim()).await?;
            }
            return Ok(());
        }

        if let Some(query) = &update.callback_query {
            self.handle_callback(query).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn handle_command(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        if !text.starts_with('/') {
            return Ok(());
        }

        let mut parts = text.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default();
        let argument = parts.next().map(str::trim).unwrap_or_default();

        // In groups commands arrive as /command@botname
        let command = match command.split_once('@') {
            Some((name, target)) if target.eq_ignore_ascii_case(&self.bot_username) => name,
            Some(_) => return Ok(()),
            None => command,
        };

        debug!(chat_id, command, "Handling command");
        match command {
            "/start" => self.cmd_start(chat_id).await?,
            "/help" => {
                self.telegram.send_message(chat_id, &help_text()).await?;
            }
            "/subscribe" => self.cmd_subscribe(chat_id).await?,
            "/unsubscribe" => self.cmd_unsubscribe(chat_id).await?,
            "/setplaylist" => self.cmd_set_playlist(chat_id, argument).await?,
            "/reset" => self.cmd_reset(chat_id).await?,
            "/check" => self.cmd_check(chat_id).await?,
            "/status" => self.cmd_status(chat_id).await?,
            _ => {
                self.telegram
                    .send_message(chat_id, "Unknown command. Send /help to see what I can do.")
                    .await?;
            }
        }
        Ok(())
    }

    async fn cmd_start(&self, chat_id: i64) -> anyhow::Result<()> {
        let keyboard = InlineKeyboardMarkup::single_row(vec![
            InlineKeyboardButton::callback("\u{1f4d6} Help", CALLBACK_HELP),
            InlineKeyboardButton::url(
                "\u{2795} Add to group",
                format!("https://t.me/{}?startgroup=true", self.bot_username),
            ),
        ]);
        let text = "\u{1f3b5} <b>Welcome to WatchTracks!</b>\n\n\
                    I watch a YouTube Music playlist and tell you when songs \
                    are added or removed.\n\n\
                    Send /subscribe to start receiving notifications, or /help \
                    for the full command list.";
        self.telegram
            .send_message_with_keyboard(chat_id, text, &keyboard)
            .await?;
        Ok(())
    }

    async fn cmd_subscribe(&self, chat_id: i64) -> anyhow::Result<()> {
        self.watcher.subscribe(chat_id).await?;
        self.telegram
            .send_message(
                chat_id,
                "\u{1f514} Subscribed! You'll be notified when the playlist changes.",
            )
            .await?;
        Ok(())
    }

    async fn cmd_unsubscribe(&self, chat_id: i64) -> anyhow::Result<()> {
        self.watcher.unsubscribe(chat_id).await?;
        self.telegram
            .send_message(chat_id, "\u{1f515} Unsubscribed. Send /subscribe to resume.")
            .await?;
        Ok(())
    }

    async fn cmd_set_playlist(&self, chat_id: i64, argument: &str) -> anyhow::Result<()> {
        if argument.is_empty() {
            self.telegram
                .send_message(
                    chat_id,
                    "Usage: /setplaylist &lt;playlist id or URL&gt;\n\n\
                     Example: /setplaylist https://music.youtube.com/playlist?list=PLxxxx",
                )
                .await?;
            return Ok(());
        }

        match self.watcher.set_playlist_override(chat_id, argument).await {
            Ok(meta) => {
                let text = format!(
                    "\u{2705} Now tracking <b>{}</b> by {}. The first check \
                     initializes silently; you'll be notified on changes after that.",
                    escape_html(&meta.title),
                    escape_html(&meta.author),
                );
                self.telegram.send_message(chat_id, &text).await?;
            }
            Err(e) if e.is_validation() => {
                self.telegram
                    .send_message(
                        chat_id,
                        "\u{274c} That doesn't look like a YouTube Music playlist \
                         id or URL. Send /help for examples.",
                    )
                    .await?;
            }
            Err(e) if e.is_fetch() => {
                warn!(chat_id, error = %e, "Playlist verification failed");
                self.telegram
                    .send_message(
                        chat_id,
                        "\u{274c} I couldn't fetch that playlist. Check that it \
                         exists and is public, then try again.",
                    )
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn cmd_reset(&self, chat_id: i64) -> anyhow::Result<()> {
        self.watcher.reset_tracking(chat_id).await?;
        self.telegram
            .send_message(
                chat_id,
                "\u{1f504} Tracking state reset. The next check will re-initialize \
                 from the current playlist contents.",
            )
            .await?;
        Ok(())
    }

    async fn cmd_check(&self, chat_id: i64) -> anyhow::Result<()> {
        match self.watcher.check_now(chat_id).await {
            Ok(CycleOutcome::Initialized { track_count }) => {
                self.telegram
                    .send_message(chat_id, &render_initialized(track_count))
                    .await?;
            }
            Ok(CycleOutcome::NoChange) => {
                self.telegram
                    .send_message(chat_id, "\u{2728} No changes detected")
                    .await?;
            }
            Ok(CycleOutcome::Changed(changes)) => {
                self.telegram
                    .send_message(chat_id, &render_summary(&changes))
                    .await?;
            }
            Err(Error::Deadline(_)) => {
                self.telegram
                    .send_message(
                        chat_id,
                        "\u{23f1} The check took too long and was abandoned. \
                         Please try again in a moment.",
                    )
                    .await?;
            }
            Err(e) if e.is_fetch() => {
                warn!(chat_id, error = %e, "Manual check failed to fetch");
                self.telegram
                    .send_message(
                        chat_id,
                        "\u{274c} I couldn't fetch the playlist right now. \
                         Please try again later.",
                    )
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn cmd_status(&self, chat_id: i64) -> anyhow::Result<()> {
        let status = self.watcher.status(chat_id).await?;

        let mut lines = vec!["\u{1f4ca} <b>Tracking status</b>".to_string(), String::new()];
        lines.push(format!(
            "Notifications: {}",
            if status.subscribed {
                "on \u{1f514}"
            } else {
                "off \u{1f515}"
            }
        ));
        match &status.meta {
            Some(meta) => {
                lines.push(format!(
                    "Playlist: <b>{}</b> by {}{}",
                    escape_html(&meta.title),
                    escape_html(&meta.author),
                    if status.override_active {
                        " (your override)"
                    } else {
                        ""
                    }
                ));
                lines.push(format!("Tracked songs: {}", status.tracked_count));
            }
            None => {
                lines.push(format!(
                    "Playlist: <code>{}</code>{} (not yet observed)",
                    status.tracked_key,
                    if status.override_active {
                        " (your override)"
                    } else {
                        ""
                    }
                ));
            }
        }
        if let Some(checked) = status.last_checked {
            lines.push(format!(
                "Last checked: {}",
                checked.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        lines.push(format!(
            "Checking: every {} minutes",
            status.check_interval.as_secs().div_ceil(60).max(1)
        ));
        let text = lines.join("\n");

        // A cover photo is nice to have; fall back to text when the
        // artwork cannot be fetched
        if let Some(url) = status.meta.as_ref().and_then(|m| m.thumbnail_url.clone()) {
            match self.artwork.fetch(&url).await {
                Ok(image) => {
                    self.telegram.send_photo(chat_id, image, &text).await?;
                    return Ok(());
                }
                Err(e) => {
                    debug!(chat_id, error = %e, "Status artwork unavailable, sending text");
                }
            }
        }
        self.telegram.send_message(chat_id, &text).await?;
        Ok(())
    }

    // ========================================================================
    // Inline keyboard callbacks
    // ========================================================================

    async fn handle_callback(&self, query: &wttelegram::CallbackQuery) -> anyhow::Result<()> {
        self.telegram.answer_callback_query(&query.id).await?;

        if query.data.as_deref() == Some(CALLBACK_HELP) {
            if let Some(message) = &query.message {
                self.telegram
                    .edit_message_text(message.chat.id, message.message_id, &help_text(), None)
                    .await?;
            }
        }
        Ok(())
    }
}

fn help_text() -> String {
    "\u{1f3b5} <b>WatchTracks commands</b>\n\n\
     /subscribe - get notified when the playlist changes\n\
     /unsubscribe - stop notifications\n\
     /setplaylist &lt;id or URL&gt; - track your own playlist\n\
     /reset - forget the stored snapshot and re-initialize\n\
     /check - check for changes right now\n\
     /status - show what is being tracked\n\
     /help - this message"
        .to_string()
}

/// Escape user-controlled text for Telegram HTML parse mode
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("Rock & <Roll>"), "Rock &amp; &lt;Roll&gt;");
    }

    #[test]
    fn test_help_text_lists_commands() {
        let help = help_text();
        for command in [
            "/subscribe",
            "/unsubscribe",
            "/setplaylist",
            "/reset",
            "/check",
            "/status",
        ] {
            assert!(help.contains(command), "missing {}", command);
        }
    }
}
