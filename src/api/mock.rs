use super::Provider;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockPlaylist {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tracks: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    playlists: Vec<MockPlaylist>,
    catalog: HashMap<(String, String), String>,
    search_errors: HashSet<(String, String)>,
    failing_adds: HashSet<usize>,
    failing_removes: HashSet<usize>,
    fail_description: bool,
    fail_listing: bool,
    add_batches: Vec<Vec<String>>,
    remove_batches: Vec<Vec<String>>,
    searches: Vec<(String, String)>,
    next_id: usize,
}

/// In-memory provider used in tests.
/// Keeps playlists and a small catalog, records every mutation batch and can
/// be told to fail specific calls.
#[derive(Debug, Default)]
pub struct MockProvider {
    state: Mutex<State>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> Result<R> {
        let mut g = self.state.lock().map_err(|_| anyhow!("mock state poisoned"))?;
        Ok(f(&mut g))
    }

    /// Apply a setup change, logging when the state can't be reached.
    fn configure(&self, what: &str, f: impl FnOnce(&mut State)) {
        if let Err(e) = self.with_state(f) {
            warn!("MockProvider: {} ignored: {}", what, e);
        }
    }

    /// Register a search hit for (artist, title).
    pub fn add_catalog_entry(&self, artist: &str, title: &str, uri: &str) {
        self.configure("add_catalog_entry", |s| {
            s.catalog.insert((artist.to_string(), title.to_string()), uri.to_string());
        });
    }

    /// Make searches for (artist, title) fail.
    pub fn fail_search(&self, artist: &str, title: &str) {
        self.configure("fail_search", |s| {
            s.search_errors.insert((artist.to_string(), title.to_string()));
        });
    }

    /// Make the n-th add call (0-based, counted over the provider's life) fail.
    pub fn fail_add_batch(&self, n: usize) {
        self.configure("fail_add_batch", |s| {
            s.failing_adds.insert(n);
        });
    }

    pub fn fail_remove_batch(&self, n: usize) {
        self.configure("fail_remove_batch", |s| {
            s.failing_removes.insert(n);
        });
    }

    pub fn fail_description_updates(&self) {
        self.configure("fail_description_updates", |s| s.fail_description = true);
    }

    pub fn fail_track_listing(&self) {
        self.configure("fail_track_listing", |s| s.fail_listing = true);
    }

    /// Seed an existing playlist and return its id.
    pub fn insert_playlist(&self, name: &str, tracks: Vec<String>) -> String {
        self.with_state(|s| {
            s.next_id += 1;
            let id = format!("mock-playlist-{}", s.next_id);
            s.playlists.push(MockPlaylist {
                id: id.clone(),
                name: name.to_string(),
                description: String::new(),
                tracks,
            });
            id
        })
        .unwrap_or_default()
    }

    pub fn playlists(&self) -> Vec<MockPlaylist> {
        self.with_state(|s| s.playlists.clone()).unwrap_or_default()
    }

    pub fn playlist(&self, id: &str) -> Option<MockPlaylist> {
        self.playlists().into_iter().find(|p| p.id == id)
    }

    /// Every add call attempted, failed ones included.
    pub fn add_batches(&self) -> Vec<Vec<String>> {
        self.with_state(|s| s.add_batches.clone()).unwrap_or_default()
    }

    pub fn remove_batches(&self) -> Vec<Vec<String>> {
        self.with_state(|s| s.remove_batches.clone()).unwrap_or_default()
    }

    /// (title, artist) pairs in the order they were searched.
    pub fn searches(&self) -> Vec<(String, String)> {
        self.with_state(|s| s.searches.clone()).unwrap_or_default()
    }
}

fn playlist_mut<'a>(s: &'a mut State, id: &str) -> Result<&'a mut MockPlaylist> {
    s.playlists
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| anyhow!("no such playlist: {}", id))
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn find_playlist(&self, name: &str) -> Result<Option<String>> {
        self.with_state(|s| s.playlists.iter().find(|p| p.name == name).map(|p| p.id.clone()))
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        info!("MockProvider: create_playlist {}", name);
        let id = self.insert_playlist(name, Vec::new());
        self.with_state(|s| playlist_mut(s, &id).map(|p| p.description = description.to_string()))??;
        Ok(id)
    }

    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<String>> {
        self.with_state(|s| {
            if s.fail_listing {
                return Err(anyhow!("listing tracks of {} failed", playlist_id));
            }
            playlist_mut(s, playlist_id).map(|p| p.tracks.clone())
        })?
    }

    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        info!("MockProvider: remove_tracks {} -> {} tracks", playlist_id, uris.len());
        self.with_state(|s| {
            let n = s.remove_batches.len();
            s.remove_batches.push(uris.to_vec());
            if s.failing_removes.contains(&n) {
                return Err(anyhow!("remove batch {} rejected", n));
            }
            let p = playlist_mut(s, playlist_id)?;
            p.tracks.retain(|t| !uris.contains(t));
            Ok(())
        })?
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        info!("MockProvider: add_tracks {} -> {} tracks", playlist_id, uris.len());
        self.with_state(|s| {
            let n = s.add_batches.len();
            s.add_batches.push(uris.to_vec());
            if s.failing_adds.contains(&n) {
                return Err(anyhow!("add tracks failed: expected 201, got 500"));
            }
            let p = playlist_mut(s, playlist_id)?;
            p.tracks.extend(uris.iter().cloned());
            Ok(())
        })?
    }

    async fn update_description(&self, playlist_id: &str, description: &str) -> Result<()> {
        self.with_state(|s| {
            if s.fail_description {
                return Err(anyhow!("description update rejected"));
            }
            playlist_mut(s, playlist_id).map(|p| p.description = description.to_string())
        })?
    }

    async fn search_track_uri(&self, title: &str, artist: &str) -> Result<Option<String>> {
        self.with_state(|s| {
            s.searches.push((title.to_string(), artist.to_string()));
            let key = (artist.to_string(), title.to_string());
            if s.search_errors.contains(&key) {
                return Err(anyhow!("search failed for {} - {}", artist, title));
            }
            Ok(s.catalog.get(&key).cloned())
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn setters_log_instead_of_panicking_on_poisoned_state() {
        let p = MockProvider::new();
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _g = p.state.lock().unwrap();
            panic!("poison the lock");
        }));
        assert!(p.state.is_poisoned());

        p.add_catalog_entry("A", "1", "spotify:track:a1");
        p.fail_add_batch(0);
        p.fail_track_listing();
        assert!(p.playlists().is_empty());
        assert!(p.searches().is_empty());
    }

    #[tokio::test]
    async fn configured_failures_apply() {
        let p = MockProvider::new();
        let id = p.insert_playlist("P", vec!["spotify:track:x".into()]);
        p.fail_track_listing();
        assert!(p.list_playlist_tracks(&id).await.is_err());
    }
}
