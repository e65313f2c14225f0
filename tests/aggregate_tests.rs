use scrobble_playlist_sync as lib;
use lib::aggregate::tally;
use lib::models::{Play, TrackKey};
use std::collections::HashMap;

#[test]
fn repeated_plays_are_counted_and_ranked() {
    let plays = vec![
        Play::new("A", "T", "X"),
        Play::new("A", "T", "X"),
        Play::new("B", "U", ""),
        Play::new("A", "T", "X"),
    ];
    let ranking = tally(&plays);
    let got: Vec<(TrackKey, u64)> = ranking.into_iter().map(|t| (t.key, t.count)).collect();
    assert_eq!(
        got,
        vec![
            (TrackKey::from(&Play::new("A", "T", "X")), 3),
            (TrackKey::from(&Play::new("B", "U", "")), 1),
        ]
    );
}

#[test]
fn counts_match_grouping_and_sum_to_input_len() {
    let plays: Vec<Play> = (0..57)
        .map(|i| Play::new(format!("Artist {}", i % 4), format!("Song {}", i % 7), "LP"))
        .collect();

    let mut expected: HashMap<TrackKey, u64> = HashMap::new();
    for p in &plays {
        *expected.entry(TrackKey::from(p)).or_default() += 1;
    }

    let ranking = tally(&plays);
    assert_eq!(ranking.iter().map(|t| t.count).sum::<u64>(), plays.len() as u64);
    assert_eq!(ranking.len(), expected.len());
    for t in &ranking {
        assert_eq!(expected.get(&t.key), Some(&t.count));
    }
    assert!(ranking.windows(2).all(|w| w[0].count >= w[1].count));
}

#[test]
fn ranking_does_not_depend_on_input_order() {
    let mut plays = vec![
        Play::new("b", "two", ""),
        Play::new("a", "one", ""),
        Play::new("a", "one", "Live"),
        Play::new("c", "three", ""),
        Play::new("b", "two", ""),
        Play::new("a", "one", ""),
    ];
    let first = tally(&plays);
    plays.reverse();
    assert_eq!(tally(&plays), first);
    plays.rotate_left(2);
    assert_eq!(tally(&plays), first);
}

#[test]
fn keys_compare_exactly() {
    let plays = vec![Play::new("Band", "Song", ""), Play::new("band", "Song", ""), Play::new("Band ", "Song", "")];
    assert_eq!(tally(&plays).len(), 3);
}
