//! HTTP/WebSocket protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound upgrade request
//!     → server.rs (Axum setup, routing, admin surface)
//!     → handshake.rs (resolve address → rate check → authenticate → lease)
//!     → admitted socket runs its session until close/error
//!     → release handle fires exactly once, metrics + log on the way out
//! ```

pub mod handshake;
pub mod server;

pub use server::{AppState, GatewayServer};
