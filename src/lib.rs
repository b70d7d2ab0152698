//! WebSocket Broadcast Relay Library
//!
//! Peers connect over WebSocket, receive an automatically assigned display
//! name, and every text message is relayed to all connected peers.
//!
//! # Features
//! - WebSocket endpoint at a fixed path, optionally over TLS
//! - Display names from a fixed base list, with `name-N` fallbacks
//! - Roster updates on every join and leave
//! - Broadcast to all peers, sender included
//! - Client-driven `ping`/`pong`
//! - Slow peers are dropped instead of stalling everyone else
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Registry` is the central actor owning sessions, names and the roster
//! - Each connection has a reader and a writer task
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use broadcast_relay::{RelayConfig, RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> broadcast_relay::Result<()> {
//!     let config = RelayConfig::default().bind("127.0.0.1", 8080);
//!     RelayServer::bind(&config).await?.run().await
//! }
//! ```

pub mod allocator;
pub mod config;
pub mod error;
pub mod handler;
pub mod listener;
pub mod message;
pub mod registry;
pub mod session;
pub mod tls;
pub mod types;

// Re-export main types for convenience
pub use allocator::UsernameAllocator;
pub use config::{Args, RelayConfig, TlsFiles};
pub use error::{AppError, Result, SendError};
pub use handler::{handle_connection, ConnectionOptions};
pub use listener::RelayServer;
pub use message::{ClientMessage, ServerMessage};
pub use registry::{Registry, RegistryCommand, RegistryHandle};
pub use session::Session;
pub use types::SessionId;
