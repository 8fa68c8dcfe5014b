//! Admin API: bearer-guarded diagnostics over the admission state.

pub mod auth;
pub mod handlers;
