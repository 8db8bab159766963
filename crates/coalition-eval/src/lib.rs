//! Performance-evaluation scoring for the volunteer coalition dashboard.
//!
//! The crate exposes the static criteria catalog, the metric-driven auto scorer, the
//! weighted aggregator, and the evaluation session service that talks to the coalition
//! REST backend.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
