//! Boundaries to the outside world.
//!
//! The traffic generator only sees the remote channel service through
//! [`RemoteService`] and reports what happened through [`MetricsSink`]. Both
//! are implemented by the runner binary (HTTP and StatsD) and by stubs in
//! tests.

use crate::Result;
use core::future::Future;
use std::sync::Arc;

/// The remote pub/sub channel API under load.
///
/// Implementations own transport, timeouts and any retry policy; the traffic
/// generator only distinguishes success from failure.
pub trait RemoteService: Send + Sync + 'static {
    /// Creates a channel named `name` and returns its identifier.
    fn create_channel(&self, name: &str) -> impl Future<Output = Result<String>> + Send;

    /// Subscribes channel `from` to channel `to`.
    fn create_subscription(&self, from: &str, to: &str)
    -> impl Future<Output = Result<()>> + Send;

    /// Lists the identifiers subscribed to `channel`.
    ///
    /// `Ok(None)` means the service answered without a list at all, which is
    /// reported separately from an empty list.
    fn list_subscriptions(
        &self,
        channel: &str,
    ) -> impl Future<Output = Result<Option<Vec<String>>>> + Send;
}

impl<S: RemoteService> RemoteService for Arc<S> {
    fn create_channel(&self, name: &str) -> impl Future<Output = Result<String>> + Send {
        (**self).create_channel(name)
    }

    fn create_subscription(
        &self,
        from: &str,
        to: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).create_subscription(from, to)
    }

    fn list_subscriptions(
        &self,
        channel: &str,
    ) -> impl Future<Output = Result<Option<Vec<String>>>> + Send {
        (**self).list_subscriptions(channel)
    }
}

/// One successful subscription listing, as recorded by the stats log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSample {
    /// Completion time in nanoseconds since the Unix epoch.
    pub completed_at_nanos: u128,
    /// Number of subscriptions returned.
    pub entries: usize,
    /// Round-trip latency of the call in milliseconds.
    pub latency_ms: u64,
}

/// Destination for counters and timings.
///
/// Names follow `<component>.<event>` and `<component>.errors.<event>`.
/// Emission must be cheap and must never fail loudly.
pub trait MetricsSink: Send + Sync + 'static {
    /// Increments the counter `name` by one.
    fn increment(&self, name: &str);

    /// Records a timing of `millis` milliseconds under `name`.
    fn timing(&self, name: &str, millis: u64);

    /// Receives every successful subscription listing.
    fn fetch_sample(&self, _sample: &FetchSample) {}
}

impl<M: MetricsSink + ?Sized> MetricsSink for Arc<M> {
    fn increment(&self, name: &str) {
        (**self).increment(name);
    }

    fn timing(&self, name: &str, millis: u64) {
        (**self).timing(name, millis);
    }

    fn fetch_sample(&self, sample: &FetchSample) {
        (**self).fetch_sample(sample);
    }
}
