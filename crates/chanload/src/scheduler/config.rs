use crate::TaskKind;
use core::time::Duration;

/// How a worker hands an action off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// Spawn the action as a detached task and go straight to the throttle
    /// sleep. In-flight remote calls are unbounded and independent of the
    /// worker count.
    #[default]
    Detached,
    /// Await the action before sleeping, so each worker has at most one call
    /// in flight.
    Inline,
}

/// Per task kind delay applied after each invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    pub create_channel: Duration,
    pub create_subscription: Duration,
    pub fetch_subscriptions: Duration,
}

impl Throttle {
    /// The same delay for every task kind.
    pub const fn uniform(delay: Duration) -> Self {
        Self {
            create_channel: delay,
            create_subscription: delay,
            fetch_subscriptions: delay,
        }
    }

    pub const fn delay(&self, kind: TaskKind) -> Duration {
        match kind {
            TaskKind::CreateChannel => self.create_channel,
            TaskKind::CreateSubscription => self.create_subscription,
            TaskKind::FetchSubscriptions => self.fetch_subscriptions,
        }
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(1))
    }
}

/// Immutable scheduler settings, validated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub throttle: Throttle,
    /// Upper bound (exclusive) of the random delay before a worker's first
    /// cycle.
    pub start_jitter: Duration,
    pub dispatch: Dispatch,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            throttle: Throttle::default(),
            start_jitter: Duration::from_secs(1),
            dispatch: Dispatch::default(),
        }
    }
}
