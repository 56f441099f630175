//! Rate-controlled concurrent worker scheduler.
//!
//! [`Scheduler`] owns a set of independent worker tasks. Each worker loops
//! forever over randomly chosen traffic actions, sleeping for the chosen
//! kind's throttle after every invocation. Workers start after a random
//! jitter so a large worker count ramps load up smoothly instead of bursting
//! at startup.
//!
//! Shutdown is cooperative: a shared [`CancellationToken`] stops the worker
//! loops, then detached actions get a grace period to drain.

mod config;
mod worker;

pub use config::*;

use crate::{IdPool, MetricsSink, RandSource, RemoteService, Sampler, ThreadRandom, Traffic};
use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use worker::{WorkerContext, worker_loop};

/// Launches and supervises traffic workers.
///
/// Must be used from within a Tokio runtime: [`Scheduler::start`] spawns.
pub struct Scheduler<S, M, P = IdPool, R = ThreadRandom> {
    traffic: Arc<Traffic<S, M, P>>,
    config: SchedulerConfig,
    rng: Arc<R>,
    shutdown_token: CancellationToken,
    workers: TaskTracker,
    actions: TaskTracker,
    launched: AtomicUsize,
}

impl<S, M, P> Scheduler<S, M, P>
where
    S: RemoteService,
    M: MetricsSink,
    P: Sampler + 'static,
{
    /// Creates a scheduler that draws task kinds and jitter from the
    /// thread-local RNG.
    pub fn new(traffic: Arc<Traffic<S, M, P>>, config: SchedulerConfig) -> Self {
        Self::with_rng(traffic, config, ThreadRandom)
    }
}

impl<S, M, P, R> Scheduler<S, M, P, R>
where
    S: RemoteService,
    M: MetricsSink,
    P: Sampler + 'static,
    R: RandSource + Send + Sync + 'static,
{
    pub fn with_rng(traffic: Arc<Traffic<S, M, P>>, config: SchedulerConfig, rng: R) -> Self {
        Self {
            traffic,
            config,
            rng: Arc::new(rng),
            shutdown_token: CancellationToken::new(),
            workers: TaskTracker::new(),
            actions: TaskTracker::new(),
            launched: AtomicUsize::new(0),
        }
    }

    pub fn traffic(&self) -> &Arc<Traffic<S, M, P>> {
        &self.traffic
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Launches `count` more workers, each delayed by an independent jitter
    /// uniformly drawn from `[0, start_jitter)`. Returns immediately.
    pub fn start(&self, count: usize) {
        tracing::info!(
            "Starting {count} workers (jitter up to {:?}, {:?} dispatch)",
            self.config.start_jitter,
            self.config.dispatch
        );

        for _ in 0..count {
            let worker_id = self.launched.fetch_add(1, Ordering::Relaxed);
            let start_delay = self.jitter();
            let ctx = WorkerContext {
                traffic: Arc::clone(&self.traffic),
                throttle: self.config.throttle,
                dispatch: self.config.dispatch,
                rng: Arc::clone(&self.rng),
                shutdown_token: self.shutdown_token.clone(),
                actions: self.actions.clone(),
            };
            self.workers.spawn(worker_loop(worker_id, start_delay, ctx));
        }
    }

    /// Number of workers launched so far.
    pub fn worker_count(&self) -> usize {
        self.launched.load(Ordering::Relaxed)
    }

    /// Number of detached actions still running.
    pub fn in_flight(&self) -> usize {
        self.actions.len()
    }

    /// Token observed by every worker; cancelling it stops the loops.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Stops all workers and waits up to `grace` for detached actions.
    ///
    /// - Cancels the shared token so no further cycles begin.
    /// - Waits for every worker loop to exit.
    /// - Waits for in-flight actions to finish, giving up after `grace`.
    pub async fn shutdown(&self, grace: Duration) {
        // === Phase 1: Stop scheduling new cycles ===
        tracing::info!("Stopping {} workers", self.worker_count());
        self.shutdown_token.cancel();
        self.workers.close();
        self.workers.wait().await;

        // === Phase 2: Drain detached actions ===
        tracing::debug!("Draining in-flight actions ({} active)", self.in_flight());
        self.actions.close();
        match tokio::time::timeout(grace, self.actions.wait()).await {
            Ok(()) => tracing::debug!("All in-flight actions drained"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} actions still active)",
                self.in_flight()
            ),
        }

        tracing::info!("Scheduler shutdown complete");
    }

    fn jitter(&self) -> Duration {
        let bound = self.config.start_jitter.as_millis() as usize;
        Duration::from_millis(self.rng.below(bound) as u64)
    }
}
