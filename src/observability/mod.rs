//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handshake orchestration produces:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metrics recording is a pure side-effect sink with no business rules, so
//!   the Gatekeeper stays decision-only and testable without a recorder
//! - Metric registration is idempotent (the metrics facade returns the
//!   existing instrument for a known name)
//! - Connection ids flow through all log lines for operational tracing

pub mod logging;
pub mod metrics;
