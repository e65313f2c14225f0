use anyhow::{Context, Result};
use clap::Parser;
use scrobble_playlist_sync as lib;
use lib::config::{Config, Settings};
use std::path::PathBuf;
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "scrobble-playlist-sync", version, about = "Turn recent Last.fm plays into a ranked Spotify playlist")]
struct Cli {
    /// Authorize with Spotify and store the refresh token in the env file
    #[arg(long, conflicts_with = "server")]
    auth: bool,

    /// Serve POST /api/generate instead of running once
    #[arg(long)]
    server: bool,

    /// Path to a TOML file with tunables
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// key=value file with credentials
    #[arg(long, value_name = "FILE", default_value = ".env")]
    env_file: PathBuf,
}

fn init_tracing(settings: &Settings) -> Option<WorkerGuard> {
    let _ = LogTracer::init();

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let (file_layer, guard) = match &settings.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "scrobble-sync.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (Some(fmt::layer().with_ansi(false).with_writer(non_blocking)), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer);

    tracing_subscriber_global::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Existing process variables win over the file.
    if cli.env_file.exists() {
        dotenv::from_path(&cli.env_file)
            .with_context(|| format!("loading {}", cli.env_file.display()))?;
    }

    let settings = match &cli.config {
        Some(p) => Settings::from_path(p).with_context(|| format!("loading config from {}", p.display()))?,
        None => Settings::default(),
    };
    let _guard = init_tracing(&settings);
    let cfg = Config::from_env(settings);

    if cli.auth {
        lib::api::spotify_auth::run_auth_ceremony(&cfg, &cli.env_file).await?;
    } else if cli.server {
        lib::server::serve(cfg).await?;
    } else {
        let outcome = lib::pipeline::run_once(&cfg).await?;
        println!("{}", outcome.message());
    }
    Ok(())
}
