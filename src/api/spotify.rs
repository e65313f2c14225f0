use super::Provider;
use crate::http::HttpClient;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistSummary {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    #[serde(default)]
    track: Option<TrackRef>,
}

#[derive(Debug, Deserialize)]
struct TrackRef {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Page<TrackRef>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: Option<String>,
}

/// Spotify provider backed by the Spotify Web API.
/// Holds one access token for the lifetime of a run; it never refreshes.
pub struct SpotifyProvider {
    http: HttpClient,
    api_base: String,
    access_token: String,
    user_id: tokio::sync::Mutex<Option<String>>,
}

impl SpotifyProvider {
    pub fn new(http: HttpClient, api_base: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            user_id: tokio::sync::Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authed(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.access_token)
    }

    /// List all playlists (id, name) of the authenticated user, following `next`.
    pub async fn list_user_playlists(&self) -> Result<Vec<(String, String)>> {
        let mut playlists = Vec::new();
        let mut next_url = Some(self.url("/me/playlists?limit=50"));
        while let Some(url) = next_url {
            let page: Page<PlaylistSummary> = self
                .http
                .execute(self.authed(Method::GET, &url))
                .await
                .context("list playlists failed")?
                .body;
            playlists.extend(page.items.into_iter().map(|p| (p.id, p.name)));
            next_url = page.next.filter(|n| !n.is_empty());
        }
        Ok(playlists)
    }

    async fn get_user_id(&self) -> Result<String> {
        let mut g = self.user_id.lock().await;
        if let Some(u) = g.as_ref() {
            return Ok(u.clone());
        }
        let me: IdOnly = self
            .http
            .execute(self.authed(Method::GET, &self.url("/me")))
            .await
            .context("failed to fetch /me")?
            .body;
        let id = me.id.filter(|s| !s.is_empty()).ok_or_else(|| anyhow!("no id in /me response"))?;
        *g = Some(id.clone());
        Ok(id)
    }
}

#[async_trait]
impl Provider for SpotifyProvider {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn find_playlist(&self, name: &str) -> Result<Option<String>> {
        let playlists = self.list_user_playlists().await?;
        let matches: Vec<&String> = playlists
            .iter()
            .filter(|(_, n)| n == name)
            .map(|(id, _)| id)
            .collect();
        if matches.len() > 1 {
            warn!(
                "{} playlists are named {:?}; using the first ({})",
                matches.len(),
                name,
                matches[0]
            );
        }
        Ok(matches.first().map(|id| id.to_string()))
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        let user_id = self.get_user_id().await?;
        let url = self.url(&format!("/users/{}/playlists", urlencoding::encode(&user_id)));
        let body = json!({
            "name": name,
            "description": description,
            "public": false
        });
        let created: IdOnly = self
            .http
            .execute(
                self.authed(Method::POST, &url)
                    .header(CONTENT_TYPE, "application/json")
                    .json(&body),
            )
            .await
            .context("create playlist failed")?
            .body;
        created.id.filter(|s| !s.is_empty()).ok_or_else(|| anyhow!("no id in create playlist response"))
    }

    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<String>> {
        let mut uris = Vec::new();
        let mut next: Option<String> = Some(self.url(&format!(
            "/playlists/{}/tracks?fields=items(track(uri)),next&limit=100",
            urlencoding::encode(playlist_id)
        )));
        while let Some(url) = next {
            let page: Page<PlaylistItem> = self
                .http
                .execute(self.authed(Method::GET, &url))
                .await
                .context("list playlist tracks failed")?
                .body;
            uris.extend(page.items.into_iter().filter_map(|it| it.track.and_then(|t| t.uri)));
            next = page.next.filter(|n| !n.is_empty());
        }
        debug!("playlist {} holds {} tracks", playlist_id, uris.len());
        Ok(uris)
    }

    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = self.url(&format!("/playlists/{}/tracks", urlencoding::encode(playlist_id)));
        let tracks: Vec<Value> = uris.iter().map(|u| json!({ "uri": u })).collect();
        let body = json!({ "tracks": tracks });
        self.http
            .execute::<Value>(
                self.authed(Method::DELETE, &url)
                    .header(CONTENT_TYPE, "application/json")
                    .json(&body),
            )
            .await
            .context("remove tracks failed")?;
        Ok(())
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = self.url(&format!("/playlists/{}/tracks", urlencoding::encode(playlist_id)));
        let body = json!({ "uris": uris });
        let reply = self
            .http
            .execute::<Value>(
                self.authed(Method::POST, &url)
                    .header(CONTENT_TYPE, "application/json")
                    .json(&body),
            )
            .await
            .context("add tracks failed")?;
        if reply.status != StatusCode::CREATED {
            return Err(anyhow!("add tracks failed: expected 201, got {}", reply.status));
        }
        Ok(())
    }

    async fn update_description(&self, playlist_id: &str, description: &str) -> Result<()> {
        let url = self.url(&format!("/playlists/{}", urlencoding::encode(playlist_id)));
        let body = json!({ "description": description });
        self.http
            .execute::<Value>(
                self.authed(Method::PUT, &url)
                    .header(CONTENT_TYPE, "application/json")
                    .json(&body),
            )
            .await
            .context("update playlist description failed")?;
        Ok(())
    }

    async fn search_track_uri(&self, title: &str, artist: &str) -> Result<Option<String>> {
        let q = format!("track:{} artist:{}", title, artist);
        let url = self.url(&format!(
            "/search?q={}&type=track&limit=1",
            urlencoding::encode(&q)
        ));
        let found: SearchResponse = self
            .http
            .execute(self.authed(Method::GET, &url))
            .await
            .context("search failed")?
            .body;
        Ok(found.tracks.items.into_iter().next().and_then(|t| t.uri))
    }
}
