use super::ScrobbleSource;
use crate::http::HttpClient;
use crate::models::Play;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Largest page size `user.getrecenttracks` accepts.
pub const PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct RecentTracksResponse {
    pub recenttracks: RecentTracks,
}

#[derive(Debug, Deserialize)]
pub struct RecentTracks {
    #[serde(default)]
    pub track: OneOrMany,
    #[serde(rename = "@attr", default)]
    pub attr: Option<PageAttr>,
}

#[derive(Debug, Deserialize)]
pub struct PageAttr {
    #[serde(rename = "totalPages", default)]
    pub total_pages: Option<Value>,
}

/// The `track` field: an array when a page holds several plays, a bare object
/// when it holds exactly one. Arrays are tried first.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<TrackSlot>),
    One(RawTrack),
    Other(Value),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// One element of a `track` array. Only objects carry a play.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TrackSlot {
    Nested(Vec<IgnoredAny>),
    Track(RawTrack),
    Scalar(Value),
}

/// Absent and null fields both read as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawTrack {
    #[serde(deserialize_with = "null_as_default")]
    pub artist: TextField,
    #[serde(deserialize_with = "null_as_default")]
    pub album: TextField,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TextField {
    #[serde(rename = "#text", deserialize_with = "null_as_default")]
    pub text: String,
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

impl From<RawTrack> for Play {
    fn from(t: RawTrack) -> Self {
        Play {
            artist_name: t.artist.text,
            track_title: t.name,
            album_name: t.album.text,
        }
    }
}

impl OneOrMany {
    /// Flatten into plays, logging and skipping anything that is not an object.
    pub fn into_plays(self, page: u32) -> Vec<Play> {
        match self {
            OneOrMany::One(t) => vec![t.into()],
            OneOrMany::Many(slots) => slots
                .into_iter()
                .enumerate()
                .filter_map(|(i, slot)| match slot {
                    TrackSlot::Track(t) => Some(t.into()),
                    TrackSlot::Nested(_) => {
                        warn!(page, index = i, "skipping track entry: array where an object was expected");
                        None
                    }
                    TrackSlot::Scalar(v) => {
                        warn!(page, index = i, value = %v, "skipping track entry: not an object");
                        None
                    }
                })
                .collect(),
            OneOrMany::Other(v) => {
                warn!(page, value = %v, "recenttracks.track is neither an array nor an object; skipping page");
                Vec::new()
            }
        }
    }
}

impl RecentTracks {
    /// `totalPages` as reported by the page; 1 when absent or unparseable.
    pub fn total_pages(&self) -> u32 {
        let parsed = self
            .attr
            .as_ref()
            .and_then(|a| a.total_pages.as_ref())
            .and_then(|v| match v {
                Value::String(s) => s.trim().parse::<u32>().ok(),
                Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                _ => None,
            });
        match parsed {
            Some(n) if n >= 1 => n,
            _ => 1,
        }
    }
}

/// Client for the Last.fm `user.getrecenttracks` feed.
pub struct LastFmClient {
    http: HttpClient,
    api_base: String,
    api_key: String,
}

impl LastFmClient {
    pub fn new(http: HttpClient, api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    async fn fetch_page(&self, user: &str, since_unix: i64, page: u32) -> Result<RecentTracks> {
        let limit = PAGE_LIMIT.to_string();
        let from = since_unix.to_string();
        let page_s = page.to_string();
        let req = self.http.request(Method::GET, &self.api_base).query(&[
            ("method", "user.getrecenttracks"),
            ("user", user),
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
            ("limit", limit.as_str()),
            ("from", from.as_str()),
            ("page", page_s.as_str()),
        ]);
        let reply = self
            .http
            .execute::<RecentTracksResponse>(req)
            .await
            .with_context(|| format!("fetching recent tracks page {} for {}", page, user))?;
        Ok(reply.body.recenttracks)
    }
}

#[async_trait]
impl ScrobbleSource for LastFmClient {
    async fn fetch_plays(&self, user: &str, since_unix: i64) -> Result<Vec<Play>> {
        let first = self.fetch_page(user, since_unix, 1).await?;
        let total_pages = first.total_pages();
        debug!(user, total_pages, "first recent-tracks page received");

        let mut plays = first.track.into_plays(1);
        for page in 2..=total_pages {
            let rt = self.fetch_page(user, since_unix, page).await?;
            plays.extend(rt.track.into_plays(page));
        }

        info!(user, pages = total_pages, plays = plays.len(), "ingested listening history");
        Ok(plays)
    }
}
