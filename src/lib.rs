//! Core library for scrobble-playlist-sync
pub mod aggregate;
pub mod api;
pub mod config;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod playlist;
pub mod resolve;
pub mod server;
