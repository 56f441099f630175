//! Everything around the traffic core that talks to the outside world.
//!
//! ## Structure
//!
//! - [`config`] - CLI, environment and JSON file configuration.
//! - [`telemetry`] - Log subscriber and optional OpenTelemetry metrics.
//! - [`http`] - [`RemoteService`] over HTTP/JSON with round-robin hosts.
//! - [`statsd`] - StatsD counters and timings over UDP.
//! - [`stats_log`] - Append-only log of subscription listings.
//! - [`sink`] - The [`MetricsSink`] handed to the traffic actions.
//!
//! [`RemoteService`]: chanload::RemoteService
//! [`MetricsSink`]: chanload::MetricsSink

pub mod config;
pub mod http;
pub mod sink;
pub mod stats_log;
pub mod statsd;
pub mod telemetry;
