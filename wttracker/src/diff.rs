//! Pure snapshot comparison

use crate::track::{Snapshot, Track};
use std::collections::{HashMap, HashSet};

/// Membership changes between two snapshots of the same playlist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    /// Tracks present in the new snapshot only, in new-snapshot order
    pub added: Vec<Track>,
    /// Tracks present in the old snapshot only, in old-snapshot order
    pub removed: Vec<Track>,
    /// True when the old snapshot had never been observed; no changes are
    /// reported in that case regardless of the new snapshot's contents
    pub initializing: bool,
}

impl Changes {
    /// Whether the comparison found no membership change
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Total number of changed tracks
    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Compares two snapshots by track identity
///
/// Membership is decided solely by [`Track::identity_key`]: `added` holds
/// the tracks of `new` whose key is absent from `old`, in `new`'s order,
/// and `removed` holds the tracks of `old` whose key is absent from `new`,
/// in `old`'s order. Tracks without a usable identity key are ignored on
/// both sides. When a key occurs more than once within one snapshot it
/// counts once for membership and the last occurrence provides the payload.
///
/// An empty `old` snapshot means the playlist was never observed before:
/// the result is flagged `initializing` and carries no changes, so the
/// first observation of a playlist never floods recipients with one
/// notification per track.
pub fn compare(old: &Snapshot, new: &Snapshot) -> Changes {
    if old.is_empty() {
        return Changes {
            initializing: true,
            ..Changes::default()
        };
    }

    let old_keys = key_set(&old.tracks);
    let new_keys = key_set(&new.tracks);

    Changes {
        added: only_in(&new.tracks, &old_keys),
        removed: only_in(&old.tracks, &new_keys),
        initializing: false,
    }
}

/// Identity keys present in a track list
fn key_set(tracks: &[Track]) -> HashSet<&str> {
    tracks.iter().filter_map(Track::identity_key).collect()
}

/// Tracks whose key is absent from `other_keys`, deduplicated, in list
/// order with last-occurrence payloads
fn only_in(tracks: &[Track], other_keys: &HashSet<&str>) -> Vec<Track> {
    let mut last_payload: HashMap<&str, &Track> = HashMap::new();
    for track in tracks {
        if let Some(key) = track.identity_key() {
            last_payload.insert(key, track);
        }
    }

    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for track in tracks {
        if let Some(key) = track.identity_key() {
            if !other_keys.contains(key) && seen.insert(key) {
                if let Some(payload) = last_payload.get(key) {
                    result.push((*payload).clone());
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::PlaylistMeta;

    fn snapshot(tracks: Vec<Track>) -> Snapshot {
        Snapshot::new(tracks, PlaylistMeta::default())
    }

    fn track(id: &str, title: &str) -> Track {
        Track::new(id, title, "Artist")
    }

    #[test]
    fn test_identical_snapshots_yield_no_changes() {
        let s = snapshot(vec![track("a", "Song A"), track("b", "Song B")]);
        let changes = compare(&s, &s.clone());

        assert!(changes.is_empty());
        assert!(!changes.initializing);
    }

    #[test]
    fn test_added_track_detected() {
        let old = snapshot(vec![track("a", "Song A")]);
        let new = snapshot(vec![track("a", "Song A"), track("b", "Song B")]);

        let changes = compare(&old, &new);
        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.added[0].video_id, "b");
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn test_removed_track_detected() {
        let old = snapshot(vec![track("a", "Song A"), track("b", "Song B")]);
        let new = snapshot(vec![track("a", "Song A")]);

        let changes = compare(&old, &new);
        assert!(changes.added.is_empty());
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(changes.removed[0].video_id, "b");
    }

    #[test]
    fn test_never_observed_old_initializes_without_changes() {
        let old = Snapshot::empty();
        let new = snapshot(vec![track("a", "Song A"), track("b", "Song B")]);

        let changes = compare(&old, &new);
        assert!(changes.initializing);
        assert!(changes.added.is_empty());
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn test_membership_partition_by_key() {
        let old = snapshot(vec![track("a", "A"), track("b", "B"), track("c", "C")]);
        let new = snapshot(vec![track("b", "B"), track("d", "D"), track("a", "A")]);

        let changes = compare(&old, &new);
        let added: Vec<&str> = changes.added.iter().map(|t| t.video_id.as_str()).collect();
        let removed: Vec<&str> = changes.removed.iter().map(|t| t.video_id.as_str()).collect();

        // added ∪ (old ∩ new) covers new, removed ∪ (old ∩ new) covers old
        assert_eq!(added, vec!["d"]);
        assert_eq!(removed, vec!["c"]);
    }

    #[test]
    fn test_result_independent_of_ordering() {
        let old = snapshot(vec![track("a", "A"), track("b", "B")]);
        let shuffled_old = snapshot(vec![track("b", "B"), track("a", "A")]);
        let new = snapshot(vec![track("b", "B"), track("c", "C")]);

        let changes = compare(&old, &new);
        let shuffled = compare(&shuffled_old, &new);

        let keys = |v: &[Track]| {
            let mut k: Vec<String> = v.iter().map(|t| t.video_id.clone()).collect();
            k.sort();
            k
        };
        assert_eq!(keys(&changes.added), keys(&shuffled.added));
        assert_eq!(keys(&changes.removed), keys(&shuffled.removed));
    }

    #[test]
    fn test_added_preserves_new_snapshot_order() {
        let old = snapshot(vec![track("x", "X")]);
        let new = snapshot(vec![
            track("c", "C"),
            track("x", "X"),
            track("a", "A"),
            track("b", "B"),
        ]);

        let changes = compare(&old, &new);
        let added: Vec<&str> = changes.added.iter().map(|t| t.video_id.as_str()).collect();
        assert_eq!(added, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_removed_preserves_old_snapshot_order() {
        let old = snapshot(vec![
            track("c", "C"),
            track("x", "X"),
            track("a", "A"),
        ]);
        let new = snapshot(vec![track("x", "X")]);

        let changes = compare(&old, &new);
        let removed: Vec<&str> = changes.removed.iter().map(|t| t.video_id.as_str()).collect();
        assert_eq!(removed, vec!["c", "a"]);
    }

    #[test]
    fn test_keyless_tracks_are_excluded() {
        let old = snapshot(vec![track("a", "A"), track("", "No id old")]);
        let new = snapshot(vec![track("a", "A"), track("", "No id new")]);

        // Neither keyless track may appear, and they must not cancel each
        // other out through a shared empty key
        let changes = compare(&old, &new);
        assert!(changes.is_empty());

        let new_only = snapshot(vec![track("a", "A"), track("", "No id")]);
        let changes = compare(&old, &new_only);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_duplicate_keys_count_once_with_last_payload() {
        let old = snapshot(vec![track("a", "A")]);
        let new = snapshot(vec![
            track("a", "A"),
            track("b", "First payload"),
            track("b", "Last payload"),
        ]);

        let changes = compare(&old, &new);
        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.added[0].title, "Last payload");
    }

    #[test]
    fn test_empty_new_snapshot_removes_everything() {
        let old = snapshot(vec![track("a", "A"), track("b", "B")]);
        let new = snapshot(Vec::new());

        let changes = compare(&old, &new);
        assert!(changes.added.is_empty());
        assert_eq!(changes.removed.len(), 2);
    }
}
