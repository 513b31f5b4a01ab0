use crate::model::{FlashEvent, FlashFeedSnapshot};

/// Flashes older than this relative to the feed's server timestamp are stale
/// with respect to the leaderboard snapshot and never attributed.
pub const FLASH_WINDOW_SECS: i64 = 660;

/// Candidate flashes that could explain a score change for `player_name`.
///
/// Eligible events (within [`FLASH_WINDOW_SECS`] of the feed's server clock)
/// fall into three buckets: exact name matches, anonymous reports from the
/// configured home city, and anonymous reports from anywhere else. Named
/// matches lead the result; anonymous other-city entries have always sorted
/// ahead of home-city ones here and downstream consumers rely on the order,
/// so it stays that way.
///
/// Never fails; returns an empty vec when nothing qualifies.
pub fn find_candidates(
    player_name: &str,
    home_city: &str,
    feed: &FlashFeedSnapshot,
) -> Vec<FlashEvent> {
    let mut named = Vec::new();
    let mut anonymous_home = Vec::new();
    let mut anonymous_other = Vec::new();

    for flash in &feed.events {
        if feed.server_timestamp - flash.timestamp >= FLASH_WINDOW_SECS {
            continue;
        }
        if flash.player == player_name {
            named.push(flash.clone());
        } else if flash.is_anonymous() && flash.city == home_city {
            anonymous_home.push(flash.clone());
        } else if flash.is_anonymous() {
            anonymous_other.push(flash.clone());
        }
    }

    named
        .into_iter()
        .chain(anonymous_other)
        .chain(anonymous_home)
        .collect()
}
