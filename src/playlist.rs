//! Bring a named remote playlist to a target track list.
//!
//! The playlist is located (or created), emptied batch by batch, given a fresh
//! description and refilled in ranking order. Locating, creating and listing
//! are fatal when they fail; every later step logs and carries on.
use crate::api::Provider;
use crate::config::{Settings, MAX_BATCH};
use crate::models::{CatalogUri, TrackTally};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use tracing::{info, warn};

/// Description given to a playlist when it is first created.
pub const PLACEHOLDER_DESCRIPTION: &str = "Most played tracks from Last.fm";

/// Number of ranking lines listed in the description.
pub const DESCRIPTION_TOP: usize = 10;

/// Result of one materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub playlist_id: String,
    pub created: bool,
    pub removed: usize,
    /// URIs in add batches the service accepted.
    pub appended: usize,
    /// Index ranges of add or remove batches that failed.
    pub failed_batches: Vec<(usize, usize)>,
}

pub fn build_description(ranking: &[TrackTally], settings: &Settings) -> String {
    let mut out = format!(
        "Top {} songs from the last {} days. Top {} most played:\n",
        settings.max_tracks, settings.window_days, DESCRIPTION_TOP
    );
    for (i, t) in ranking.iter().take(DESCRIPTION_TOP).enumerate() {
        let _ = writeln!(out, "{}. {} - {} ({} plays)", i + 1, t.artist(), t.title(), t.count);
    }
    out
}

/// Id of the playlist called `name`, creating it when absent.
pub async fn locate_or_create(provider: &dyn Provider, name: &str) -> Result<(String, bool)> {
    if let Some(id) = provider
        .find_playlist(name)
        .await
        .with_context(|| format!("locating playlist {:?}", name))?
    {
        info!(playlist = name, id = %id, "found existing playlist");
        return Ok((id, false));
    }
    let id = provider
        .create_playlist(name, PLACEHOLDER_DESCRIPTION)
        .await
        .with_context(|| format!("creating playlist {:?}", name))?;
    info!(playlist = name, id = %id, "created playlist");
    Ok((id, true))
}

/// Remove `uris` in chunks. Returns how many were removed and the ranges that failed.
pub async fn clear(
    provider: &dyn Provider,
    playlist_id: &str,
    uris: &[String],
    batch_size: usize,
) -> (usize, Vec<(usize, usize)>) {
    let size = batch_size.clamp(1, MAX_BATCH);
    let mut removed = 0;
    let mut failed = Vec::new();
    for (n, chunk) in uris.chunks(size).enumerate() {
        let range = (n * size, n * size + chunk.len());
        match provider.remove_tracks(playlist_id, chunk).await {
            Ok(()) => removed += chunk.len(),
            Err(e) => {
                warn!(playlist = playlist_id, from = range.0, to = range.1, "remove batch failed: {:#}", e);
                failed.push(range);
            }
        }
    }
    (removed, failed)
}

/// Add `uris` in chunks, in order. Returns how many were accepted and the ranges that failed.
pub async fn append(
    provider: &dyn Provider,
    playlist_id: &str,
    uris: &[CatalogUri],
    batch_size: usize,
) -> (usize, Vec<(usize, usize)>) {
    let size = batch_size.clamp(1, MAX_BATCH);
    let mut appended = 0;
    let mut failed = Vec::new();
    for (n, chunk) in uris.chunks(size).enumerate() {
        let range = (n * size, n * size + chunk.len());
        match provider.add_tracks(playlist_id, chunk).await {
            Ok(()) => {
                info!("Applied add {} tracks to {}", chunk.len(), playlist_id);
                appended += chunk.len();
            }
            Err(e) => {
                warn!(playlist = playlist_id, from = range.0, to = range.1, "add batch failed: {:#}", e);
                failed.push(range);
            }
        }
    }
    (appended, failed)
}

/// Replace the contents and description of playlist `name` with `uris`.
pub async fn materialize(
    provider: &dyn Provider,
    name: &str,
    description: &str,
    uris: &[CatalogUri],
    batch_size: usize,
) -> Result<Materialized> {
    let (playlist_id, created) = locate_or_create(provider, name).await?;

    let existing = if created {
        Vec::new()
    } else {
        provider
            .list_playlist_tracks(&playlist_id)
            .await
            .with_context(|| format!("listing tracks of playlist {}", playlist_id))?
    };

    let (removed, mut failed_batches) = if existing.is_empty() {
        (0, Vec::new())
    } else {
        clear(provider, &playlist_id, &existing, batch_size).await
    };

    if let Err(e) = provider.update_description(&playlist_id, description).await {
        warn!(playlist = %playlist_id, "description update failed: {:#}", e);
    }

    let (appended, add_failures) = append(provider, &playlist_id, uris, batch_size).await;
    failed_batches.extend(add_failures);

    info!(
        provider = provider.name(),
        playlist = %playlist_id,
        removed,
        appended,
        failed = failed_batches.len(),
        "playlist materialized"
    );
    Ok(Materialized {
        playlist_id,
        created,
        removed,
        appended,
        failed_batches,
    })
}
