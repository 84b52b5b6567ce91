//! Discord Export: streams channel and forum exports to the browser over a WebSocket.

pub mod config;
pub mod discord;
pub mod error;
pub mod export;
pub mod server;
pub mod session;
