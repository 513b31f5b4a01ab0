use std::collections::HashSet;

use crate::model::{PlayerEntry, Snapshot, MAX_TRACKED_RANK};

/// Classification of one changed leaderboard entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// The player's score moved; deltas are current minus prior.
    ScoreChange { score_delta: i64, invaders_delta: i64 },
    /// Same score and invader count under a different name.
    Rename { previous_name: String },
    /// No prior entry matched by name or by eligible rank.
    Unmatched,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub player: PlayerEntry,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Human-readable notification line for this change.
    pub fn message(&self) -> String {
        match &self.kind {
            ChangeKind::ScoreChange {
                score_delta,
                invaders_delta,
            } => format!(
                "{}. {} flashed {} \u{1F47E} for {} pts",
                self.player.rank, self.player.name, invaders_delta, score_delta
            ),
            ChangeKind::Rename { previous_name } => format!(
                "{}. {} is now known as {}",
                self.player.rank, previous_name, self.player.name
            ),
            ChangeKind::Unmatched => format!(
                "{}. {} appears with {} pts ({} \u{1F47E})",
                self.player.rank, self.player.name, self.player.score, self.player.invaders_count
            ),
        }
    }
}

/// Compare two snapshots and classify every notification-worthy change.
///
/// `previous` is treated as a set under the structural identity rule of
/// [`PlayerEntry`]; any current entry not in that set gets matched to a prior
/// entry via [`lookup_player`] and classified. Pure function; neither input
/// is mutated. Output is sorted by rank so results are stable regardless of
/// the order the API returned entries in.
pub fn compute_diff(current: &Snapshot, previous: &Snapshot) -> Vec<ChangeEvent> {
    let known: HashSet<&PlayerEntry> = previous.iter().collect();

    let mut changes = Vec::new();
    for entry in current.iter() {
        if known.contains(entry) {
            continue;
        }

        let kind = match lookup_player(previous, &entry.name, entry.rank) {
            Some(prior) if prior.score != entry.score => ChangeKind::ScoreChange {
                score_delta: entry.score - prior.score,
                invaders_delta: entry.invaders_count - prior.invaders_count,
            },
            Some(prior) => ChangeKind::Rename {
                previous_name: prior.name.clone(),
            },
            None => ChangeKind::Unmatched,
        };

        changes.push(ChangeEvent {
            player: entry.clone(),
            kind,
        });
    }

    changes.sort_by_key(|c| c.player.rank);
    changes
}

/// Find the prior entry for a changed player: exact name match first, then
/// same rank. Rank 50 sits at the edge of the tracked window and churns too
/// much for rank matching to mean anything, so it is excluded from the
/// fallback.
pub fn lookup_player<'a>(
    previous: &'a Snapshot,
    name: &str,
    rank: u32,
) -> Option<&'a PlayerEntry> {
    if let Some(p) = previous.iter().find(|p| p.name == name) {
        return Some(p);
    }
    previous
        .iter()
        .find(|p| p.rank == rank && rank != MAX_TRACKED_RANK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, score: i64, invaders: i64, rank: u32) -> PlayerEntry {
        PlayerEntry {
            name: name.to_string(),
            score,
            invaders_count: invaders,
            rank,
            city_count: 1,
        }
    }

    fn snapshot(entries: Vec<PlayerEntry>) -> Snapshot {
        Snapshot::from_entries(entries)
    }

    #[test]
    fn identical_snapshots_produce_no_changes() {
        let snap = snapshot(vec![
            entry("Alice", 200, 10, 1),
            entry("Bob", 100, 5, 10),
            entry("Carol", 50, 2, 50),
        ]);
        assert!(compute_diff(&snap, &snap.clone()).is_empty());
    }

    #[test]
    fn rank_move_alone_is_not_a_change() {
        let previous = snapshot(vec![entry("Bob", 100, 5, 10)]);
        let current = snapshot(vec![entry("Bob", 100, 5, 8)]);
        assert!(compute_diff(&current, &previous).is_empty());
    }

    #[test]
    fn score_change_carries_both_deltas() {
        // Bob climbs from rank 10 to 9 with 2 new invaders worth 50 pts.
        let previous = snapshot(vec![entry("Bob", 100, 5, 10)]);
        let current = snapshot(vec![entry("Bob", 150, 7, 9)]);

        let diff = compute_diff(&current, &previous);
        assert_eq!(diff.len(), 1);
        assert_eq!(
            diff[0].kind,
            ChangeKind::ScoreChange {
                score_delta: 50,
                invaders_delta: 2,
            }
        );
        assert_eq!(diff[0].message(), "9. Bob flashed 2 \u{1F47E} for 50 pts");
    }

    #[test]
    fn unchanged_score_with_new_name_is_a_rename() {
        let previous = snapshot(vec![entry("Bob", 100, 5, 10)]);
        let current = snapshot(vec![entry("Bobby", 100, 5, 10)]);

        let diff = compute_diff(&current, &previous);
        assert_eq!(diff.len(), 1);
        assert_eq!(
            diff[0].kind,
            ChangeKind::Rename {
                previous_name: "Bob".to_string(),
            }
        );
        assert_eq!(diff[0].message(), "10. Bob is now known as Bobby");
    }

    #[test]
    fn rank_50_is_excluded_from_the_rank_fallback() {
        // Name changed at rank 50 with identical score: without the
        // exclusion this would be misclassified as a rename.
        let previous = snapshot(vec![entry("Old", 50, 2, 50)]);
        let current = snapshot(vec![entry("New", 50, 2, 50)]);

        let diff = compute_diff(&current, &previous);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].kind, ChangeKind::Unmatched);
        assert!(lookup_player(&previous, "New", 50).is_none());
    }

    #[test]
    fn rank_fallback_matches_below_rank_50() {
        let previous = snapshot(vec![entry("Old", 50, 2, 49)]);
        let current = snapshot(vec![entry("New", 50, 2, 49)]);

        let diff = compute_diff(&current, &previous);
        assert_eq!(
            diff[0].kind,
            ChangeKind::Rename {
                previous_name: "Old".to_string(),
            }
        );
    }

    #[test]
    fn newcomer_with_no_prior_entry_is_unmatched() {
        let previous = snapshot(vec![entry("Alice", 200, 10, 1)]);
        let current = snapshot(vec![entry("Alice", 200, 10, 1), entry("Zoe", 80, 4, 12)]);

        let diff = compute_diff(&current, &previous);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].player.name, "Zoe");
        assert_eq!(diff[0].kind, ChangeKind::Unmatched);
    }

    #[test]
    fn output_is_sorted_by_rank() {
        let previous = snapshot(vec![
            entry("Alice", 200, 10, 3),
            entry("Bob", 100, 5, 20),
            entry("Carol", 90, 4, 7),
        ]);
        let current = snapshot(vec![
            entry("Bob", 120, 6, 20),
            entry("Alice", 230, 11, 3),
            entry("Carol", 95, 5, 7),
        ]);

        let ranks: Vec<u32> = compute_diff(&current, &previous)
            .iter()
            .map(|c| c.player.rank)
            .collect();
        assert_eq!(ranks, vec![3, 7, 20]);
    }

    #[test]
    fn lookup_prefers_name_over_rank() {
        let previous = snapshot(vec![entry("Bob", 100, 5, 10), entry("Eve", 90, 4, 9)]);
        let found = lookup_player(&previous, "Bob", 9).unwrap();
        assert_eq!(found.name, "Bob");
    }
}
