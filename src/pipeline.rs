use crate::aggregate;
use crate::api::lastfm::LastFmClient;
use crate::api::spotify::SpotifyProvider;
use crate::api::spotify_auth::TokenBroker;
use crate::api::{Provider, ScrobbleSource};
use crate::config::{Config, ConfigError, Settings};
use crate::http::HttpClient;
use crate::models::Play;
use crate::playlist;
use crate::resolve;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;

/// Counters of one completed sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub playlist_id: String,
    pub playlist_name: String,
    pub plays: usize,
    pub unique_tracks: usize,
    pub resolved: usize,
    /// Tracks the service accepted into the playlist.
    pub appended: usize,
}

impl SyncOutcome {
    pub fn message(&self) -> String {
        format!(
            "Playlist '{}' updated with {} tracks ({} plays, {} unique, {} matched)",
            self.playlist_name, self.appended, self.plays, self.unique_tracks, self.resolved
        )
    }
}

/// Unix seconds `window_days` before now.
pub fn window_start(settings: &Settings) -> Result<i64, ConfigError> {
    Duration::try_days(i64::from(settings.window_days))
        .and_then(|d| Utc::now().checked_sub_signed(d))
        .map(|t| t.timestamp())
        .ok_or_else(|| ConfigError::Invalid {
            key: "window_days".into(),
            value: settings.window_days.to_string(),
        })
}

/// Ingest, rank, resolve and write the playlist using the given collaborators.
pub async fn sync_with(
    source: &dyn ScrobbleSource,
    provider: &dyn Provider,
    user: &str,
    since_unix: i64,
    settings: &Settings,
) -> Result<SyncOutcome> {
    let plays = ingest(source, user, since_unix).await?;
    publish(provider, &plays, settings).await
}

async fn ingest(source: &dyn ScrobbleSource, user: &str, since_unix: i64) -> Result<Vec<Play>> {
    source
        .fetch_plays(user, since_unix)
        .await
        .context("fetching listening history")
}

/// Rank `plays`, resolve the ranking and write the playlist.
pub async fn publish(provider: &dyn Provider, plays: &[Play], settings: &Settings) -> Result<SyncOutcome> {
    let ranking = aggregate::tally(plays);
    info!(plays = plays.len(), unique = ranking.len(), "aggregated plays");

    let resolutions = resolve::resolve_ranking(
        provider,
        &ranking,
        settings.max_tracks,
        settings.resolve_concurrency,
    )
    .await;
    let uris = resolve::uris(&resolutions);
    info!(
        searched = resolutions.len(),
        resolved = uris.len(),
        "resolved ranking against catalog"
    );

    let description = playlist::build_description(&ranking, settings);
    let done = playlist::materialize(
        provider,
        &settings.playlist_name,
        &description,
        &uris,
        settings.effective_batch_size(),
    )
    .await?;

    Ok(SyncOutcome {
        playlist_id: done.playlist_id,
        playlist_name: settings.playlist_name.clone(),
        plays: plays.len(),
        unique_tracks: ranking.len(),
        resolved: uris.len(),
        appended: done.appended,
    })
}

/// One full run against the live services described by `cfg`.
pub async fn run_once(cfg: &Config) -> Result<SyncOutcome> {
    let creds = cfg.credentials()?;
    let settings = &cfg.settings;
    let http = HttpClient::new(settings.request_timeout())?;

    let source = LastFmClient::new(
        http.clone(),
        settings.endpoints.lastfm_api_base.clone(),
        creds.lastfm_api_key,
    );
    let since = window_start(settings)?;
    info!(user = %creds.lastfm_user, since, window_days = settings.window_days, "starting sync");
    let plays = ingest(&source, &creds.lastfm_user, since).await?;

    let broker = TokenBroker::new(
        http.clone(),
        settings.endpoints.spotify_auth_base.clone(),
        creds.spotify_client_id,
        creds.spotify_client_secret,
        creds.spotify_refresh_token,
    );
    let token = broker.access_token().await?;
    let provider = SpotifyProvider::new(http, settings.endpoints.spotify_api_base.clone(), token.token);

    let outcome = publish(&provider, &plays, settings).await?;
    info!("{}", outcome.message());
    Ok(outcome)
}
