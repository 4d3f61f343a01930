//! Notification dispatch
//!
//! Turns a [`Changes`] result into an ordered sequence of delivery
//! attempts: for each recipient, removed tracks first, then added tracks,
//! each in the order the comparison produced them. Artwork enrichment is
//! attempted under a bounded timeout and silently degrades to a text-only
//! message. Consecutive sends through the transport are spaced by a fixed
//! minimum delay, and a failure for one recipient never aborts delivery to
//! the others.

use crate::diff::Changes;
use crate::registry::Subscriber;
use crate::source::{ArtworkFetch, MessageSink};
use crate::track::Track;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Default minimum delay between two consecutive sends
const DEFAULT_SEND_SPACING: Duration = Duration::from_millis(500);

/// Default deadline for one artwork download
const DEFAULT_ARTWORK_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of track lines listed in a summary message
const SUMMARY_TRACK_LIMIT: usize = 10;

/// Tunable delivery behavior
///
/// The spacing between sends exists to respect the downstream transport's
/// rate limits; it is a policy parameter rather than an inline pause so
/// tests can run with zero spacing.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Minimum delay between two consecutive sends to the transport
    pub send_spacing: Duration,
    /// Deadline for one artwork download before degrading to text
    pub artwork_timeout: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            send_spacing: DEFAULT_SEND_SPACING,
            artwork_timeout: DEFAULT_ARTWORK_TIMEOUT,
        }
    }
}

/// Outcome of one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Messages accepted by the transport
    pub delivered: usize,
    /// Messages the transport rejected (logged, never fatal)
    pub failed: usize,
}

impl DeliveryReport {
    fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// Delivers change notifications to subscribers
///
/// Cloning is cheap: clones share the transport, the artwork fetcher and
/// the send pacing state, so the spacing policy holds across every cycle
/// using the same transport.
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn MessageSink>,
    artwork: Arc<dyn ArtworkFetch>,
    policy: DispatchPolicy,
    last_send: Arc<Mutex<Option<Instant>>>,
}

impl Dispatcher {
    /// Creates a dispatcher over a message transport and an artwork fetcher
    pub fn new(
        sink: Arc<dyn MessageSink>,
        artwork: Arc<dyn ArtworkFetch>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            sink,
            artwork,
            policy,
            last_send: Arc::new(Mutex::new(None)),
        }
    }

    /// The configured delivery policy
    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Delivers per-track change events to every recipient
    ///
    /// For each recipient the removed tracks are announced before the
    /// added ones, each list in the order produced by the comparison. A
    /// rejected send is logged with the recipient's chat id and counted,
    /// and delivery continues with the remaining events and recipients.
    pub async fn dispatch(&self, changes: &Changes, recipients: &[Subscriber]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if changes.is_empty() {
            return report;
        }

        for recipient in recipients {
            report.merge(self.dispatch_to(changes, recipient.chat_id).await);
        }
        report
    }

    /// Sends the summary message of a cycle to every recipient
    pub async fn announce_summary(
        &self,
        changes: &Changes,
        recipients: &[Subscriber],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let text = render_summary(changes);

        for recipient in recipients {
            self.pace().await;
            match self.sink.send_text(recipient.chat_id, &text).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    error!(chat_id = recipient.chat_id, error = %e, "Failed to send cycle summary");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// All events of one diff, to one recipient
    async fn dispatch_to(&self, changes: &Changes, chat_id: i64) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let events = changes
            .removed
            .iter()
            .map(|t| (EventKind::Removed, t))
            .chain(changes.added.iter().map(|t| (EventKind::Added, t)));

        for (kind, track) in events {
            match self.deliver(chat_id, kind, track).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    error!(
                        chat_id,
                        video_id = %track.video_id,
                        error = %e,
                        "Failed to notify subscriber"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// One event to one recipient, with artwork enrichment when possible
    async fn deliver(&self, chat_id: i64, kind: EventKind, track: &Track) -> crate::Result<()> {
        let caption = render_event(kind, track);

        if let Some(url) = &track.thumbnail_url {
            match tokio::time::timeout(self.policy.artwork_timeout, self.artwork.fetch(url)).await
            {
                Ok(Ok(image)) => {
                    self.pace().await;
                    return self.sink.send_photo(chat_id, image, &caption).await;
                }
                // Degradation is silent to the recipient
                Ok(Err(e)) => {
                    debug!(url = %url, error = %e, "Artwork fetch failed, sending text only");
                }
                Err(_) => {
                    warn!(url = %url, "Artwork fetch timed out, sending text only");
                }
            }
        }

        self.pace().await;
        self.sink.send_text(chat_id, &caption).await
    }

    /// Enforces the minimum spacing between consecutive sends
    async fn pace(&self) {
        if self.policy.send_spacing.is_zero() {
            return;
        }

        let mut last = self.last_send.lock().await;
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < self.policy.send_spacing {
                tokio::time::sleep(self.policy.send_spacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Added,
    Removed,
}

/// Renders the HTML caption of one change event
fn render_event(kind: EventKind, track: &Track) -> String {
    let headline = match kind {
        EventKind::Added => "\u{2795} <b>Song added</b>",
        EventKind::Removed => "\u{2796} <b>Song removed</b>",
    };
    let mut text = format!("{}\n\n\u{1F3B5} {}", headline, escape_html(&track.title));
    if !track.artists.is_empty() {
        text.push_str(&format!("\n\u{1F464} {}", escape_html(&track.artists)));
    }
    text
}

/// Renders the summary message of a cycle, in HTML
///
/// Lists up to ten tracks per direction and compresses the rest into an
/// "and N more" line.
pub fn render_summary(changes: &Changes) -> String {
    if changes.is_empty() {
        return "\u{2728} No changes detected".to_string();
    }

    let mut text = String::from("\u{1F4CB} <b>Playlist changes</b>\n");

    if !changes.added.is_empty() {
        text.push_str(&format!("\n\u{2795} {} added:\n", changes.added.len()));
        text.push_str(&track_lines(&changes.added));
    }
    if !changes.removed.is_empty() {
        text.push_str(&format!("\n\u{2796} {} removed:\n", changes.removed.len()));
        text.push_str(&track_lines(&changes.removed));
    }
    text
}

/// Renders the reply to the first observation of a playlist
pub fn render_initialized(track_count: usize) -> String {
    format!(
        "\u{2705} Initialized! Tracking {} songs. You'll be notified when the playlist changes.",
        track_count
    )
}

fn track_lines(tracks: &[Track]) -> String {
    let mut lines = String::new();
    for track in tracks.iter().take(SUMMARY_TRACK_LIMIT) {
        lines.push_str(&format!("  \u{2022} {}\n", escape_html(&track.label())));
    }
    if tracks.len() > SUMMARY_TRACK_LIMIT {
        lines.push_str(&format!(
            "  \u{2026} and {} more\n",
            tracks.len() - SUMMARY_TRACK_LIMIT
        ));
    }
    lines
}

/// Escapes the three characters Telegram's HTML parse mode reserves
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::source::MessageSink;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    /// Records every send; fails for chat ids in `failing`
    struct RecordingSink {
        sent: StdMutex<Vec<(i64, String, bool)>>,
        failing: HashSet<i64>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                sent: StdMutex::new(Vec::new()),
                failing: HashSet::new(),
            }
        }

        fn failing_for(chat_ids: &[i64]) -> Self {
            Self {
                sent: StdMutex::new(Vec::new()),
                failing: chat_ids.iter().copied().collect(),
            }
        }

        fn sent(&self) -> Vec<(i64, String, bool)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send_text(&self, recipient: i64, text: &str) -> crate::Result<()> {
            if self.failing.contains(&recipient) {
                return Err(Error::send("recipient blocked the bot"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient, text.to_string(), false));
            Ok(())
        }

        async fn send_photo(
            &self,
            recipient: i64,
            _image: Vec<u8>,
            caption: &str,
        ) -> crate::Result<()> {
            if self.failing.contains(&recipient) {
                return Err(Error::send("recipient blocked the bot"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient, caption.to_string(), true));
            Ok(())
        }
    }

    struct FixedArtwork {
        result: crate::Result<Vec<u8>>,
    }

    impl FixedArtwork {
        fn ok() -> Self {
            Self {
                result: Ok(vec![0xFF, 0xD8]),
            }
        }

        fn failing() -> Self {
            Self {
                result: Err(Error::enrichment("404")),
            }
        }
    }

    #[async_trait]
    impl crate::source::ArtworkFetch for FixedArtwork {
        async fn fetch(&self, _url: &str) -> crate::Result<Vec<u8>> {
            match &self.result {
                Ok(bytes) => Ok(bytes.clone()),
                Err(e) => Err(Error::enrichment(e.to_string())),
            }
        }
    }

    fn instant_policy() -> DispatchPolicy {
        DispatchPolicy {
            send_spacing: Duration::ZERO,
            artwork_timeout: Duration::from_secs(1),
        }
    }

    fn subscriber(chat_id: i64) -> Subscriber {
        Subscriber {
            chat_id,
            active: true,
            playlist_override: None,
        }
    }

    fn changes(added: Vec<Track>, removed: Vec<Track>) -> Changes {
        Changes {
            added,
            removed,
            initializing: false,
        }
    }

    #[tokio::test]
    async fn test_removed_events_precede_added_events() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = Dispatcher::new(
            sink.clone(),
            Arc::new(FixedArtwork::failing()),
            instant_policy(),
        );

        let diff = changes(
            vec![Track::new("new1", "Added One", "A")],
            vec![
                Track::new("old1", "Removed One", "A"),
                Track::new("old2", "Removed Two", "A"),
            ],
        );
        let report = dispatcher.dispatch(&diff, &[subscriber(7)]).await;

        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 0);

        let sent = sink.sent();
        assert!(sent[0].1.contains("Removed One"));
        assert!(sent[1].1.contains("Removed Two"));
        assert!(sent[2].1.contains("Added One"));
    }

    #[tokio::test]
    async fn test_failing_recipient_does_not_block_others() {
        let sink = Arc::new(RecordingSink::failing_for(&[1]));
        let dispatcher = Dispatcher::new(
            sink.clone(),
            Arc::new(FixedArtwork::failing()),
            instant_policy(),
        );

        let diff = changes(vec![Track::new("a", "Song", "Artist")], vec![]);
        let report = dispatcher
            .dispatch(&diff, &[subscriber(1), subscriber(2)])
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(sink.sent().len(), 1);
        assert_eq!(sink.sent()[0].0, 2);
    }

    #[tokio::test]
    async fn test_artwork_enrichment_sends_photo() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher =
            Dispatcher::new(sink.clone(), Arc::new(FixedArtwork::ok()), instant_policy());

        let diff = changes(
            vec![Track::new("a", "Song", "Artist").with_thumbnail("https://img/a.jpg")],
            vec![],
        );
        dispatcher.dispatch(&diff, &[subscriber(1)]).await;

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].2, "expected a photo message");
    }

    #[tokio::test]
    async fn test_artwork_failure_degrades_to_text() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = Dispatcher::new(
            sink.clone(),
            Arc::new(FixedArtwork::failing()),
            instant_policy(),
        );

        let diff = changes(
            vec![Track::new("a", "Song", "Artist").with_thumbnail("https://img/a.jpg")],
            vec![],
        );
        let report = dispatcher.dispatch(&diff, &[subscriber(1)]).await;

        assert_eq!(report.delivered, 1, "degradation must not count as failure");
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].2, "expected a text message");
        assert!(sent[0].1.contains("Song"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_are_spaced() {
        let sink = Arc::new(RecordingSink::new());
        let spacing = Duration::from_millis(500);
        let dispatcher = Dispatcher::new(
            sink.clone(),
            Arc::new(FixedArtwork::failing()),
            DispatchPolicy {
                send_spacing: spacing,
                artwork_timeout: Duration::from_secs(1),
            },
        );

        let diff = changes(
            vec![
                Track::new("a", "One", "A"),
                Track::new("b", "Two", "A"),
                Track::new("c", "Three", "A"),
            ],
            vec![],
        );

        let start = Instant::now();
        dispatcher.dispatch(&diff, &[subscriber(1)]).await;

        // Three sends need at least two full spacing intervals
        assert!(start.elapsed() >= spacing * 2);
        assert_eq!(sink.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_changes_send_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = Dispatcher::new(
            sink.clone(),
            Arc::new(FixedArtwork::failing()),
            instant_policy(),
        );

        let report = dispatcher
            .dispatch(&Changes::default(), &[subscriber(1)])
            .await;

        assert_eq!(report, DeliveryReport::default());
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn test_render_event_escapes_html() {
        let track = Track::new("a", "Tom & Jerry <3", "A > B");
        let caption = render_event(EventKind::Added, &track);

        assert!(caption.contains("Tom &amp; Jerry &lt;3"));
        assert!(caption.contains("A &gt; B"));
    }

    #[test]
    fn test_render_summary_caps_track_list() {
        let added: Vec<Track> = (0..13)
            .map(|i| Track::new(format!("id{}", i), format!("Song {}", i), "Artist"))
            .collect();
        let text = render_summary(&changes(added, vec![]));

        assert!(text.contains("13 added"));
        assert!(text.contains("and 3 more"));
        assert!(text.contains("Song 9"));
        assert!(!text.contains("Song 10"));
    }

    #[test]
    fn test_render_summary_no_changes() {
        assert!(render_summary(&Changes::default()).contains("No changes"));
    }

    #[test]
    fn test_render_initialized_mentions_count() {
        assert!(render_initialized(42).contains("42"));
    }
}
