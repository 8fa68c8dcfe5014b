//! Subscription Gateway Library
//!
//! Connection admission control for real-time subscription channels: decides
//! whether to accept each inbound WebSocket handshake, caps concurrent
//! connections per source address and per authenticated identity,
//! temporarily bans misbehaving sources, and accounts for connection
//! lifetime.

pub mod admin;
pub mod admission;
pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use admission::Gatekeeper;
pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
