//! The three task bodies the workers execute.
//!
//! Each action calls the [`RemoteService`], feeds the right [`Sampler`] on
//! success and reports exactly one success-or-error counter to the
//! [`MetricsSink`]. Actions whose preconditions are not met (nothing to draw,
//! or a channel drawn twice) are skipped silently: no remote call, no metric.

use crate::{FetchSample, IdPool, MetricsSink, RandSource, RemoteService, Sampler};
use rand::{Rng, rng};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// One of the task kinds a worker can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    CreateChannel,
    CreateSubscription,
    FetchSubscriptions,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [
        Self::CreateChannel,
        Self::CreateSubscription,
        Self::FetchSubscriptions,
    ];

    /// Picks a kind uniformly at random.
    pub fn pick<R: RandSource + ?Sized>(rng: &R) -> Self {
        Self::ALL[rng.below(Self::ALL.len()) % Self::ALL.len()]
    }

    /// Counter emitted when the remote call succeeds.
    pub const fn success_metric(self) -> &'static str {
        match self {
            Self::CreateChannel => "traffic.create_channel",
            Self::CreateSubscription => "traffic.create_subscription",
            Self::FetchSubscriptions => "traffic.fetch_subscriptions",
        }
    }

    /// Counter emitted when the remote call fails.
    pub const fn error_metric(self) -> &'static str {
        match self {
            Self::CreateChannel => "traffic.errors.create_channel",
            Self::CreateSubscription => "traffic.errors.create_subscription",
            Self::FetchSubscriptions => "traffic.errors.fetch_subscriptions",
        }
    }

    /// Timing emitted for every remote call, successful or not.
    pub const fn latency_metric(self) -> &'static str {
        match self {
            Self::CreateChannel => "traffic.create_channel.latency",
            Self::CreateSubscription => "traffic.create_subscription.latency",
            Self::FetchSubscriptions => "traffic.fetch_subscriptions.latency",
        }
    }
}

/// Fetch answered without a list.
pub const FETCH_EMPTY_METRIC: &str = "traffic.fetch_subscriptions.empty";
/// Fetch answered with a zero-length list.
pub const FETCH_ZERO_METRIC: &str = "traffic.fetch_subscriptions.zero";
/// Fetch answered with at least one subscription.
pub const FETCH_POPULATED_METRIC: &str = "traffic.fetch_subscriptions.populated";
/// Latency divided by the number of subscriptions returned.
pub const FETCH_PER_ENTRY_METRIC: &str = "traffic.fetch_subscriptions.per_entry";
/// Number of subscriptions returned.
pub const FETCH_ENTRIES_METRIC: &str = "traffic.fetch_subscriptions.entries";

/// Shape of a successful subscription listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// The service returned no list at all.
    Empty,
    /// The service returned a list with no entries.
    Zero,
    /// The service returned `entries` subscriptions.
    Populated { entries: usize },
}

/// What a single action invocation ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Preconditions were not met; nothing was called or reported.
    Skipped,
    /// The remote call failed and was reported as an error.
    Failed,
    /// A channel was created and its identifier sampled.
    ChannelCreated { id: String },
    /// A subscription was created and its source channel sampled.
    Subscribed { from: String, to: String },
    /// Subscriptions were listed.
    Listed(Listing),
}

/// Returns a fresh channel name: 128 random bits as lowercase hex.
pub fn channel_name() -> String {
    format!("chanload-{:032x}", rng().random::<u128>())
}

/// The traffic actions together with the state they share.
///
/// `channels` holds identifiers of created channels; `subscriptions` holds
/// identifiers of channels known to have at least one subscriber.
pub struct Traffic<S, M, P = IdPool> {
    service: S,
    metrics: M,
    channels: P,
    subscriptions: P,
}

impl<S, M, P> Traffic<S, M, P>
where
    S: RemoteService,
    M: MetricsSink,
    P: Sampler,
{
    pub fn new(service: S, metrics: M, channels: P, subscriptions: P) -> Self {
        Self {
            service,
            metrics,
            channels,
            subscriptions,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn channels(&self) -> &P {
        &self.channels
    }

    pub fn subscriptions(&self) -> &P {
        &self.subscriptions
    }

    /// Runs the action for `kind`.
    pub async fn run(&self, kind: TaskKind) -> Outcome {
        match kind {
            TaskKind::CreateChannel => self.create_channel().await,
            TaskKind::CreateSubscription => self.create_subscription().await,
            TaskKind::FetchSubscriptions => self.fetch_subscriptions().await,
        }
    }

    /// Creates a channel under a fresh name and samples its identifier.
    pub async fn create_channel(&self) -> Outcome {
        let kind = TaskKind::CreateChannel;
        let name = channel_name();
        tracing::debug!("Create channel with name `{name}`");

        let started = Instant::now();
        let result = self.service.create_channel(&name).await;
        let latency_ms = self.record_latency(kind, started);

        match result {
            Ok(id) => {
                tracing::debug!("Created channel `{id}` in {latency_ms}ms");
                self.metrics.increment(kind.success_metric());
                self.channels.ingest(id.clone());
                Outcome::ChannelCreated { id }
            }
            Err(e) => {
                tracing::warn!("Error when creating channel `{name}`: {e}");
                self.metrics.increment(kind.error_metric());
                Outcome::Failed
            }
        }
    }

    /// Subscribes one sampled channel to another and samples the source.
    pub async fn create_subscription(&self) -> Outcome {
        let kind = TaskKind::CreateSubscription;
        let (Some(from), Some(to)) = (self.channels.draw(), self.channels.draw()) else {
            tracing::trace!("No sampled channels yet, skipping subscription");
            return Outcome::Skipped;
        };
        if from == to {
            tracing::trace!("Drew channel `{from}` twice, skipping subscription");
            return Outcome::Skipped;
        }
        tracing::debug!("Create subscription from channel `{from}` to channel `{to}`");

        let started = Instant::now();
        let result = self.service.create_subscription(&from, &to).await;
        let latency_ms = self.record_latency(kind, started);

        match result {
            Ok(()) => {
                tracing::debug!("Subscribed `{from}` to `{to}` in {latency_ms}ms");
                self.metrics.increment(kind.success_metric());
                self.subscriptions.ingest(from.clone());
                Outcome::Subscribed { from, to }
            }
            Err(e) => {
                tracing::warn!("Error when subscribing `{from}` to `{to}`: {e}");
                self.metrics.increment(kind.error_metric());
                Outcome::Failed
            }
        }
    }

    /// Lists the subscriptions of a sampled channel.
    pub async fn fetch_subscriptions(&self) -> Outcome {
        let kind = TaskKind::FetchSubscriptions;
        let Some(channel) = self.subscriptions.draw() else {
            tracing::trace!("No sampled subscriptions yet, skipping fetch");
            return Outcome::Skipped;
        };
        tracing::debug!("Get subscriptions of channel `{channel}`");

        let started = Instant::now();
        let result = self.service.list_subscriptions(&channel).await;
        let latency_ms = self.record_latency(kind, started);

        let ids = match result {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Error when listing subscriptions of `{channel}`: {e}");
                self.metrics.increment(kind.error_metric());
                return Outcome::Failed;
            }
        };
        self.metrics.increment(kind.success_metric());

        let listing = match ids {
            None => {
                self.metrics.increment(FETCH_EMPTY_METRIC);
                Listing::Empty
            }
            Some(ids) if ids.is_empty() => {
                self.metrics.increment(FETCH_ZERO_METRIC);
                Listing::Zero
            }
            Some(ids) => {
                let entries = ids.len();
                self.metrics.increment(FETCH_POPULATED_METRIC);
                self.metrics
                    .timing(FETCH_PER_ENTRY_METRIC, latency_ms / entries as u64);
                self.metrics.timing(FETCH_ENTRIES_METRIC, entries as u64);
                Listing::Populated { entries }
            }
        };

        let entries = match listing {
            Listing::Populated { entries } => entries,
            Listing::Empty | Listing::Zero => 0,
        };
        tracing::debug!("Channel `{channel}` has {entries} subscriptions");
        self.metrics.fetch_sample(&FetchSample {
            completed_at_nanos: unix_nanos(),
            entries,
            latency_ms,
        });

        Outcome::Listed(listing)
    }

    fn record_latency(&self, kind: TaskKind, started: Instant) -> u64 {
        let latency_ms = started.elapsed().as_millis() as u64;
        self.metrics.timing(kind.latency_metric(), latency_ms);
        latency_ms
    }
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}
