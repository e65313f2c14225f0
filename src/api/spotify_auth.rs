use crate::config::{self, Config};
use crate::http::HttpClient;
use anyhow::{anyhow, Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};
use url::Url;

pub const SCOPES: [&str; 4] = [
    "playlist-modify-public",
    "playlist-modify-private",
    "playlist-read-private",
    "playlist-read-collaborative",
];

/// How long the ceremony waits for the browser to come back.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Short-lived bearer credential for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_in: u64,
}

/// Exchanges the long-lived refresh credential for an access token.
pub struct TokenBroker {
    http: HttpClient,
    auth_base: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl TokenBroker {
    pub fn new(
        http: HttpClient,
        auth_base: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            auth_base: auth_base.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub async fn access_token(&self) -> Result<AccessToken> {
        let url = format!("{}/api/token", self.auth_base);
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let tr: TokenResponse = self
            .http
            .execute(self.http.request(Method::POST, &url).form(&params))
            .await
            .context("Failed to refresh token")?
            .body;
        let token = tr
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("no access_token in token response"))?;
        Ok(AccessToken {
            token,
            expires_in: tr.expires_in.unwrap_or(3600),
        })
    }
}

/// Authorization URL the user opens in a browser.
pub fn authorize_url(auth_base: &str, client_id: &str, redirect_uri: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/authorize", auth_base.trim_end_matches('/')))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &SCOPES.join(" "));
    Ok(url)
}

/// Exchange an authorization code for tokens and return the refresh token.
pub async fn exchange_code(
    http: &HttpClient,
    auth_base: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<String> {
    let url = format!("{}/api/token", auth_base.trim_end_matches('/'));
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];
    let auth_header = format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{}:{}", client_id, client_secret))
    );
    let tr: TokenResponse = http
        .execute(
            http.request(Method::POST, &url)
                .header(AUTHORIZATION, auth_header)
                .form(&params),
        )
        .await
        .context("token exchange failed")?
        .body;
    tr.refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("token exchange returned no refresh_token"))
}

type CodeSlot = Arc<Mutex<Option<oneshot::Sender<Result<String, String>>>>>;

async fn callback(
    Query(params): Query<HashMap<String, String>>,
    State(slot): State<CodeSlot>,
) -> (StatusCode, Html<&'static str>) {
    let outcome = match (params.get("code"), params.get("error")) {
        (Some(code), _) if !code.is_empty() => Ok(code.clone()),
        (_, Some(err)) => Err(err.clone()),
        _ => return (StatusCode::BAD_REQUEST, Html("<h4>No code received.</h4>")),
    };
    let sender = slot.lock().ok().and_then(|mut g| g.take());
    let Some(sender) = sender else {
        return (StatusCode::GONE, Html("<h4>Authorization already handled.</h4>"));
    };
    let ok = outcome.is_ok();
    let _ = sender.send(outcome);
    if ok {
        (
            StatusCode::OK,
            Html("<h2>Authentication successful.</h2><p>You can close this window.</p>"),
        )
    } else {
        (StatusCode::OK, Html("<h4>Authorization was denied.</h4>"))
    }
}

/// Router for the one-shot callback listener; the first code received is
/// published through `tx`.
pub fn callback_router(path: &str, tx: oneshot::Sender<Result<String, String>>) -> Router {
    let slot: CodeSlot = Arc::new(Mutex::new(Some(tx)));
    Router::new().route(path, get(callback)).with_state(slot)
}

fn callback_addr(redirect: &Url) -> Result<SocketAddr> {
    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| anyhow!("redirect URI {} has no port", redirect))?;
    let ip: IpAddr = match redirect.host_str() {
        Some("localhost") | None => [127, 0, 0, 1].into(),
        Some(h) => h
            .trim_matches(|c| c == '[' || c == ']')
            .parse()
            .with_context(|| format!("redirect host {} is not a local address", h))?,
    };
    Ok(SocketAddr::new(ip, port))
}

/// Run the authorization-code ceremony and store the refresh token in `env_path`.
pub async fn run_auth_ceremony(cfg: &Config, env_path: &Path) -> Result<()> {
    cfg.require(&config::AUTH_KEYS)?;
    let client_id = cfg.get(config::SPOTIFY_CLIENT_ID).unwrap_or_default();
    let client_secret = cfg.get(config::SPOTIFY_CLIENT_SECRET).unwrap_or_default();
    let redirect_uri = cfg.redirect_uri();
    let auth_base = &cfg.settings.endpoints.spotify_auth_base;

    let redirect = Url::parse(redirect_uri).with_context(|| format!("invalid redirect URI {}", redirect_uri))?;
    let addr = callback_addr(&redirect)?;
    let path = match redirect.path() {
        "" => "/",
        p => p,
    };

    let (tx, rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind callback listener on {}", addr))?;
    let app = callback_router(path, tx);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let url = authorize_url(auth_base, client_id, redirect_uri)?;
    info!("Waiting for Spotify authorization callback on {}", addr);
    println!("Open this URL in your browser and authorize the application:\n\n{}\n", url);

    let received = tokio::time::timeout(CALLBACK_TIMEOUT, rx).await;
    let _ = stop_tx.send(());
    match server.await {
        Ok(Err(e)) => warn!("callback listener failed: {}", e),
        Err(e) => warn!("callback listener task failed: {}", e),
        Ok(Ok(())) => {}
    }

    let code = match received {
        Err(_) => return Err(anyhow!("timed out waiting for the authorization callback")),
        Ok(Err(_)) => return Err(anyhow!("callback listener stopped before a code arrived")),
        Ok(Ok(Err(denied))) => return Err(anyhow!("authorization denied: {}", denied)),
        Ok(Ok(Ok(code))) => code,
    };

    let http = HttpClient::new(cfg.settings.request_timeout())?;
    let refresh = exchange_code(&http, auth_base, client_id, client_secret, &code, redirect_uri).await?;
    config::upsert_env_value(env_path, config::SPOTIFY_REFRESH_TOKEN, &refresh)
        .with_context(|| format!("writing refresh token to {}", env_path.display()))?;

    info!("Spotify refresh token saved to {}", env_path.display());
    println!("Saved refresh token to {}. You can now run the sync.", env_path.display());
    Ok(())
}
