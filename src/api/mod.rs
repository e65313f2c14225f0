pub mod lastfm;
pub mod mock;
pub mod spotify;
pub mod spotify_auth;

use crate::models::Play;
use anyhow::Result;

/// Source of listening history.
#[async_trait::async_trait]
pub trait ScrobbleSource: Send + Sync {
    /// All plays for `user` since `since_unix` (epoch seconds). Any failing
    /// page fails the whole call.
    async fn fetch_plays(&self, user: &str, since_unix: i64) -> Result<Vec<Play>>;
}

/// Provider trait: the catalog and playlist operations the pipeline needs.
/// Implementations: spotify::SpotifyProvider, mock::MockProvider.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Return the provider's name (for logging)
    fn name(&self) -> &str;

    /// Id of the first playlist owned by the current user with exactly this name.
    async fn find_playlist(&self, name: &str) -> Result<Option<String>>;

    /// Create a private playlist and return its id.
    async fn create_playlist(&self, name: &str, description: &str) -> Result<String>;

    /// Every track URI currently in the playlist, in playlist order.
    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<String>>;

    /// Remove tracks (URIs) from playlist (batching done by caller)
    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// Add tracks (URIs) to playlist (batching done by caller)
    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    async fn update_description(&self, playlist_id: &str, description: &str) -> Result<()>;

    /// Search for a track by metadata: title, artist. Return a remote URI if found.
    async fn search_track_uri(&self, title: &str, artist: &str) -> Result<Option<String>>;
}
