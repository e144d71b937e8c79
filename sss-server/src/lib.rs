//! # sss-server: WebSocket host for server-specific settings pages
//!
//! Wires a [`sss_core::PageStore`] to real clients:
//!
//! - [`transport`]: Per-connection outbound queues implementing `Transport`
//! - [`server`]: Accept loop and per-connection message handling

pub mod server;
pub mod transport;

pub use server::{ServerConfig, ServerError, ServerStats, SettingsServer};
pub use transport::SessionRegistry;
