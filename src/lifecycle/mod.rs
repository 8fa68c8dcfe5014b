//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup: load config → validate → init observability → bind listener → serve
//! Shutdown: SIGTERM/SIGINT → broadcast trigger → stop accepting → sessions
//!           drain, each release handle firing once → exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
