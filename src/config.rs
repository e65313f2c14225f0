use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const LASTFM_API_KEY: &str = "LASTFM_API_KEY";
pub const LASTFM_USER: &str = "LASTFM_USER";
pub const SPOTIFY_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const SPOTIFY_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub const SPOTIFY_REFRESH_TOKEN: &str = "SPOTIFY_REFRESH_TOKEN";
pub const SPOTIFY_REDIRECT_URI: &str = "SPOTIFY_REDIRECT_URI";
pub const PORT: &str = "PORT";

pub const RECOGNIZED_KEYS: [&str; 7] = [
    LASTFM_API_KEY,
    LASTFM_USER,
    SPOTIFY_CLIENT_ID,
    SPOTIFY_CLIENT_SECRET,
    SPOTIFY_REFRESH_TOKEN,
    SPOTIFY_REDIRECT_URI,
    PORT,
];

/// Keys the sync pipeline cannot run without.
pub const PIPELINE_KEYS: [&str; 5] = [
    LASTFM_API_KEY,
    LASTFM_USER,
    SPOTIFY_CLIENT_ID,
    SPOTIFY_CLIENT_SECRET,
    SPOTIFY_REFRESH_TOKEN,
];

/// Keys the authorization ceremony cannot run without.
pub const AUTH_KEYS: [&str; 2] = [SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET];

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";

/// Upper bound Spotify accepts per add/remove request.
pub const MAX_BATCH: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Tunable parameters, optionally loaded from a TOML file.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "default_max_tracks")]
    pub max_tracks: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub endpoints: Endpoints,
}

/// Remote base URLs. Overridable so tests and proxies can stand in.
#[derive(Debug, Deserialize, Clone)]
pub struct Endpoints {
    #[serde(default = "default_lastfm_base")]
    pub lastfm_api_base: String,
    #[serde(default = "default_spotify_api_base")]
    pub spotify_api_base: String,
    #[serde(default = "default_spotify_auth_base")]
    pub spotify_auth_base: String,
}

fn default_playlist_name() -> String { "Last.fm Top 100".into() }
fn default_window_days() -> u32 { 30 }
fn default_max_tracks() -> usize { 100 }
fn default_batch_size() -> usize { MAX_BATCH }
fn default_resolve_concurrency() -> usize { 1 }
fn default_request_timeout() -> u64 { 15 }
fn default_lastfm_base() -> String { "https://ws.audioscrobbler.com/2.0/".into() }
fn default_spotify_api_base() -> String { "https://api.spotify.com/v1".into() }
fn default_spotify_auth_base() -> String { "https://accounts.spotify.com".into() }

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            lastfm_api_base: default_lastfm_base(),
            spotify_api_base: default_spotify_api_base(),
            spotify_auth_base: default_spotify_auth_base(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            playlist_name: default_playlist_name(),
            window_days: default_window_days(),
            max_tracks: default_max_tracks(),
            batch_size: default_batch_size(),
            resolve_concurrency: default_resolve_concurrency(),
            request_timeout_secs: default_request_timeout(),
            log_dir: None,
            endpoints: Endpoints::default(),
        }
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&s)?;
        Ok(settings)
    }

    /// Batch size actually used for playlist mutations, within 1..=100.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Credentials the pipeline needs, all guaranteed present.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub lastfm_api_key: String,
    pub lastfm_user: String,
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub spotify_refresh_token: String,
}

/// Immutable configuration for one process: credential values plus tunables.
#[derive(Debug, Clone)]
pub struct Config {
    values: BTreeMap<String, String>,
    pub settings: Settings,
}

impl Config {
    /// Build from any key lookup. Only recognized keys are kept; blank values
    /// are treated as absent.
    pub fn from_lookup<F>(settings: Settings, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let values = RECOGNIZED_KEYS
            .iter()
            .filter_map(|k| {
                lookup(k)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .map(|v| (k.to_string(), v))
            })
            .collect();
        Self { values, settings }
    }

    /// Read recognized keys from the process environment.
    pub fn from_env(settings: Settings) -> Self {
        Self::from_lookup(settings, |k| std::env::var(k).ok())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Fail with every missing key listed at once.
    pub fn require(&self, keys: &[&str]) -> Result<(), ConfigError> {
        let missing: Vec<String> = keys
            .iter()
            .filter(|k| self.get(k).is_none())
            .map(|k| k.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing))
        }
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        self.require(&PIPELINE_KEYS)?;
        let v = |k: &str| self.get(k).unwrap_or_default().to_string();
        Ok(Credentials {
            lastfm_api_key: v(LASTFM_API_KEY),
            lastfm_user: v(LASTFM_USER),
            spotify_client_id: v(SPOTIFY_CLIENT_ID),
            spotify_client_secret: v(SPOTIFY_CLIENT_SECRET),
            spotify_refresh_token: v(SPOTIFY_REFRESH_TOKEN),
        })
    }

    pub fn port(&self) -> Result<u16, ConfigError> {
        match self.get(PORT) {
            None => Ok(DEFAULT_PORT),
            Some(p) => p.parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: PORT.into(),
                value: p.into(),
            }),
        }
    }

    pub fn redirect_uri(&self) -> &str {
        self.get(SPOTIFY_REDIRECT_URI).unwrap_or(DEFAULT_REDIRECT_URI)
    }
}

/// Insert or replace `key=value` in a key=value file.
///
/// An existing line starting with `key=` is replaced in place; otherwise the
/// pair is appended. All other lines are kept byte for byte.
pub fn upsert_env_value(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let current = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    std::fs::write(path, upsert_env_text(&current, key, value))?;
    Ok(())
}

pub fn upsert_env_text(current: &str, key: &str, value: &str) -> String {
    let prefix = format!("{}=", key);
    let mut out = String::with_capacity(current.len() + prefix.len() + value.len() + 1);
    let mut replaced = false;

    for line in current.split_inclusive('\n') {
        if !replaced && line.starts_with(&prefix) {
            let ending = if line.ends_with("\r\n") {
                "\r\n"
            } else if line.ends_with('\n') {
                "\n"
            } else {
                ""
            };
            out.push_str(&prefix);
            out.push_str(value);
            out.push_str(ending);
            replaced = true;
        } else {
            out.push_str(line);
        }
    }

    if !replaced {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&prefix);
        out.push_str(value);
        out.push('\n');
    }
    out
}
