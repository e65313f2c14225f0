use serde::{Deserialize, Serialize};

/// One observed listening event, already normalized from the scrobble feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Play {
    pub artist_name: String,
    pub track_title: String,
    pub album_name: String,
}

impl Play {
    pub fn new(artist: impl Into<String>, title: impl Into<String>, album: impl Into<String>) -> Self {
        Self {
            artist_name: artist.into(),
            track_title: title.into(),
            album_name: album.into(),
        }
    }
}

/// Aggregation identity. Comparison is exact: case and whitespace matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackKey {
    pub artist_name: String,
    pub track_title: String,
    pub album_name: String,
}

impl From<&Play> for TrackKey {
    fn from(p: &Play) -> Self {
        Self {
            artist_name: p.artist_name.clone(),
            track_title: p.track_title.clone(),
            album_name: p.album_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTally {
    pub key: TrackKey,
    pub count: u64,
}

impl TrackTally {
    pub fn artist(&self) -> &str {
        &self.key.artist_name
    }

    pub fn title(&self) -> &str {
        &self.key.track_title
    }
}

/// Tallies ordered by count descending; see `aggregate::tally` for tie-breaks.
pub type Ranking = Vec<TrackTally>;

/// Opaque catalog identifier, e.g. "spotify:track:4uLU6hMCjMI75M1A2tKUQC".
pub type CatalogUri = String;

/// A tally paired with its first search hit, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub tally: TrackTally,
    pub uri: Option<CatalogUri>,
}
