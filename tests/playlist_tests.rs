use anyhow::Result;
use async_trait::async_trait;
use scrobble_playlist_sync as lib;
use lib::api::mock::MockProvider;
use lib::api::ScrobbleSource;
use lib::config::Settings;
use lib::models::{Play, TrackKey, TrackTally};
use lib::pipeline::sync_with;
use lib::playlist::{append, build_description, clear, materialize};

struct FixedPlays(Vec<Play>);

#[async_trait]
impl ScrobbleSource for FixedPlays {
    async fn fetch_plays(&self, _user: &str, _since_unix: i64) -> Result<Vec<Play>> {
        Ok(self.0.clone())
    }
}

struct BrokenSource;

#[async_trait]
impl ScrobbleSource for BrokenSource {
    async fn fetch_plays(&self, _user: &str, _since_unix: i64) -> Result<Vec<Play>> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

fn uris(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("spotify:track:{:04}", i)).collect()
}

fn tally(artist: &str, title: &str, count: u64) -> TrackTally {
    TrackTally {
        key: TrackKey {
            artist_name: artist.into(),
            track_title: title.into(),
            album_name: String::new(),
        },
        count,
    }
}

/// `n` distinct tracks where track i is played `n - i` times.
fn ranked_plays(n: usize) -> Vec<Play> {
    let mut plays = Vec::new();
    for i in 0..n {
        for _ in 0..(n - i) {
            plays.push(Play::new(format!("Artist {}", i), format!("Song {}", i), "Album"));
        }
    }
    plays
}

#[tokio::test]
async fn unresolved_tracks_are_skipped() {
    let plays = vec![
        Play::new("A", "one", ""),
        Play::new("A", "one", ""),
        Play::new("A", "one", ""),
        Play::new("B", "two", ""),
        Play::new("B", "two", ""),
        Play::new("C", "three", ""),
    ];
    let provider = MockProvider::new();
    provider.add_catalog_entry("A", "one", "spotify:track:uri1");
    provider.add_catalog_entry("C", "three", "spotify:track:uri3");

    let outcome = sync_with(&FixedPlays(plays), &provider, "listener", 0, &Settings::default())
        .await
        .unwrap();

    assert_eq!(outcome.appended, 2);
    assert_eq!(outcome.unique_tracks, 3);
    assert_eq!(provider.add_batches(), vec![vec!["spotify:track:uri1".to_string(), "spotify:track:uri3".to_string()]]);
}

#[tokio::test]
async fn appends_in_batches_of_at_most_one_hundred() {
    let provider = MockProvider::new();
    let id = provider.insert_playlist("Target", Vec::new());
    let list = uris(205);

    let (appended, failed) = append(&provider, &id, &list, 100).await;

    assert_eq!(appended, 205);
    assert!(failed.is_empty());
    let batches = provider.add_batches();
    assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![100, 100, 5]);
    assert_eq!(batches.concat(), list);
}

#[tokio::test]
async fn clears_existing_tracks_in_batches() {
    let provider = MockProvider::new();
    let existing = uris(225);
    let id = provider.insert_playlist("Target", existing.clone());

    let (removed, failed) = clear(&provider, &id, &existing, 100).await;

    assert_eq!(removed, 225);
    assert!(failed.is_empty());
    let batches = provider.remove_batches();
    assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![100, 100, 25]);
    assert_eq!(batches.concat(), existing);
    assert!(provider.playlist(&id).unwrap().tracks.is_empty());
}

#[tokio::test]
async fn oversized_batch_setting_is_capped() {
    let provider = MockProvider::new();
    let id = provider.insert_playlist("Target", Vec::new());
    append(&provider, &id, &uris(150), 1000).await;
    assert_eq!(provider.add_batches().iter().map(Vec::len).collect::<Vec<_>>(), vec![100, 50]);
}

#[test]
fn description_lists_top_tallies() {
    let ranking = vec![tally("A", "T1", 5), tally("B", "T2", 3)];
    assert_eq!(
        build_description(&ranking, &Settings::default()),
        "Top 100 songs from the last 30 days. Top 10 most played:\n1. A - T1 (5 plays)\n2. B - T2 (3 plays)\n"
    );
}

#[test]
fn description_line_count_is_header_plus_top_ten() {
    for n in [0usize, 1, 9, 10, 11, 40] {
        let ranking: Vec<TrackTally> = (0..n).map(|i| tally(&format!("A{}", i), "T", 100 - i as u64)).collect();
        let d = build_description(&ranking, &Settings::default());
        assert_eq!(d.lines().count(), 1 + n.min(10), "ranking of {}", n);
        for (k, line) in d.lines().skip(1).enumerate() {
            let t = &ranking[k];
            assert_eq!(line, format!("{}. {} - {} ({} plays)", k + 1, t.artist(), t.title(), t.count));
        }
    }
}

#[test]
fn description_header_follows_settings() {
    let settings = Settings {
        max_tracks: 50,
        window_days: 7,
        ..Settings::default()
    };
    assert_eq!(
        build_description(&[], &settings),
        "Top 50 songs from the last 7 days. Top 10 most played:\n"
    );
}

#[tokio::test]
async fn playlist_holds_first_hundred_resolved_in_ranking_order() {
    let plays = ranked_plays(160);
    let provider = MockProvider::new();
    for i in 0..160 {
        if i % 3 != 1 {
            provider.add_catalog_entry(&format!("Artist {}", i), &format!("Song {}", i), &format!("spotify:track:{}", i));
        }
    }
    let stale = provider.insert_playlist("Last.fm Top 100", uris(3));

    let outcome = sync_with(&FixedPlays(plays), &provider, "listener", 0, &Settings::default())
        .await
        .unwrap();

    let expected: Vec<String> = (0..160)
        .filter(|i| i % 3 != 1)
        .take(100)
        .map(|i| format!("spotify:track:{}", i))
        .collect();
    assert_eq!(outcome.playlist_id, stale);
    assert_eq!(outcome.appended, 100);
    let pl = provider.playlist(&stale).unwrap();
    assert_eq!(pl.tracks, expected);
    assert!(pl.description.starts_with("Top 100 songs from the last 30 days. Top 10 most played:\n1. Artist 0 - Song 0 (160 plays)\n"));
}

#[tokio::test]
async fn second_run_yields_identical_playlist() {
    let plays = ranked_plays(20);
    let provider = MockProvider::new();
    for i in 0..20 {
        provider.add_catalog_entry(&format!("Artist {}", i), &format!("Song {}", i), &format!("spotify:track:{}", i));
    }
    let settings = Settings::default();

    let first = sync_with(&FixedPlays(plays.clone()), &provider, "listener", 0, &settings).await.unwrap();
    let after_first = provider.playlists();
    let second = sync_with(&FixedPlays(plays), &provider, "listener", 0, &settings).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.playlists(), after_first);
    assert_eq!(after_first.len(), 1);
    assert_eq!(after_first[0].tracks.len(), 20);
}

#[tokio::test]
async fn failed_add_batch_is_not_counted() {
    let provider = MockProvider::new();
    provider.fail_add_batch(1);

    let done = materialize(&provider, "Target", "desc", &uris(205), 100).await.unwrap();

    assert!(done.created);
    assert_eq!(done.appended, 105);
    assert_eq!(done.failed_batches, vec![(100, 200)]);
    assert_eq!(provider.add_batches().len(), 3);
}

#[tokio::test]
async fn failed_clear_batch_and_description_do_not_stop_the_run() {
    let provider = MockProvider::new();
    let id = provider.insert_playlist("Target", uris(150));
    provider.fail_remove_batch(0);
    provider.fail_description_updates();

    let done = materialize(&provider, "Target", "desc", &uris(10), 100).await.unwrap();

    assert_eq!(done.playlist_id, id);
    assert_eq!(done.removed, 50);
    assert_eq!(done.failed_batches, vec![(0, 100)]);
    assert_eq!(done.appended, 10);
}

#[tokio::test]
async fn listing_failure_aborts_before_any_mutation() {
    let provider = MockProvider::new();
    provider.insert_playlist("Target", uris(5));
    provider.fail_track_listing();

    assert!(materialize(&provider, "Target", "desc", &uris(3), 100).await.is_err());
    assert!(provider.remove_batches().is_empty());
    assert!(provider.add_batches().is_empty());
}

#[tokio::test]
async fn ingest_failure_touches_nothing() {
    let provider = MockProvider::new();
    let res = sync_with(&BrokenSource, &provider, "listener", 0, &Settings::default()).await;
    assert!(res.is_err());
    assert!(provider.playlists().is_empty());
    assert!(provider.searches().is_empty());
}

#[tokio::test]
async fn new_playlist_gets_created_with_description() {
    let provider = MockProvider::new();
    provider.add_catalog_entry("A", "one", "spotify:track:1");

    let outcome = sync_with(&FixedPlays(vec![Play::new("A", "one", "")]), &provider, "listener", 0, &Settings::default())
        .await
        .unwrap();

    let pl = provider.playlist(&outcome.playlist_id).unwrap();
    assert_eq!(pl.name, "Last.fm Top 100");
    assert_eq!(pl.tracks, vec!["spotify:track:1"]);
    assert!(pl.description.ends_with("1. A - one (1 plays)\n"));
    assert!(provider.remove_batches().is_empty());
}
