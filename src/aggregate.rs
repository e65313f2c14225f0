use crate::models::{Play, Ranking, TrackKey, TrackTally};
use std::collections::HashMap;

/// Count unique tracks and rank them.
///
/// Order is count descending, then artist, title and album ascending, so the
/// result depends only on the multiset of plays and never on hash order.
pub fn tally(plays: &[Play]) -> Ranking {
    let mut counts: HashMap<TrackKey, u64> = HashMap::new();
    for p in plays {
        *counts.entry(TrackKey::from(p)).or_insert(0) += 1;
    }

    let mut ranking: Ranking = counts
        .into_iter()
        .map(|(key, count)| TrackTally { key, count })
        .collect();
    ranking.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.key.artist_name.cmp(&b.key.artist_name))
            .then_with(|| a.key.track_title.cmp(&b.key.track_title))
            .then_with(|| a.key.album_name.cmp(&b.key.album_name))
    });
    ranking
}
