use crate::api::Provider;
use crate::models::{CatalogUri, Resolution, TrackTally};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesOrdered, StreamExt};
use tracing::{info, warn};

/// Look one tally up in the catalog. Misses and search errors both come back
/// as `None`; neither aborts the run.
pub async fn resolve(provider: &dyn Provider, tally: &TrackTally) -> Option<CatalogUri> {
    match provider.search_track_uri(tally.title(), tally.artist()).await {
        Ok(Some(uri)) => Some(uri),
        Ok(None) => {
            info!(artist = tally.artist(), title = tally.title(), "no catalog match");
            None
        }
        Err(e) => {
            warn!(artist = tally.artist(), title = tally.title(), "catalog search failed: {:#}", e);
            None
        }
    }
}

/// Resolve tallies in ranking order until `limit` URIs are found.
///
/// Up to `concurrency` searches run at once; results keep ranking order. A
/// few searches past the last needed hit may run when `concurrency > 1`.
pub async fn resolve_ranking(
    provider: &dyn Provider,
    ranking: &[TrackTally],
    limit: usize,
    concurrency: usize,
) -> Vec<Resolution> {
    if limit == 0 {
        return Vec::new();
    }
    let width = concurrency.max(1);
    let mut pending = ranking.iter();
    let mut in_flight: FuturesOrdered<BoxFuture<'_, Resolution>> = FuturesOrdered::new();
    let mut resolved = 0usize;
    let mut out = Vec::new();

    loop {
        while in_flight.len() < width {
            match pending.next() {
                Some(t) => in_flight.push_back(lookup(provider, t).boxed()),
                None => break,
            }
        }
        let Some(r) = in_flight.next().await else {
            break;
        };
        if r.uri.is_some() {
            resolved += 1;
        }
        out.push(r);
        if resolved >= limit {
            break;
        }
    }
    out
}

async fn lookup<'a>(provider: &'a dyn Provider, tally: &'a TrackTally) -> Resolution {
    let uri = resolve(provider, tally).await;
    Resolution {
        tally: tally.clone(),
        uri,
    }
}

/// URIs of the resolved entries, in order.
pub fn uris(resolutions: &[Resolution]) -> Vec<CatalogUri> {
    resolutions.iter().filter_map(|r| r.uri.clone()).collect()
}
