use crate::{
    Dispatch, MetricsSink, RandSource, RemoteService, Sampler, TaskKind, Throttle, Traffic,
};
use core::time::Duration;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Everything a worker task needs, cloned out of the scheduler.
pub(crate) struct WorkerContext<S, M, P, R> {
    pub(crate) traffic: Arc<Traffic<S, M, P>>,
    pub(crate) throttle: Throttle,
    pub(crate) dispatch: Dispatch,
    pub(crate) rng: Arc<R>,
    pub(crate) shutdown_token: CancellationToken,
    pub(crate) actions: TaskTracker,
}

/// Worker task that repeatedly runs a random traffic action.
///
/// After `start_delay`, each cycle picks a [`TaskKind`] uniformly, dispatches
/// it according to [`Dispatch`] and then sleeps for that kind's throttle.
/// With detached dispatch the sleep starts right after the action is spawned,
/// not after it completes.
///
/// The loop runs until the shared [`CancellationToken`] is cancelled, which is
/// observed before every cycle and during every sleep.
pub(crate) async fn worker_loop<S, M, P, R>(
    worker_id: usize,
    start_delay: Duration,
    ctx: WorkerContext<S, M, P, R>,
) where
    S: RemoteService,
    M: MetricsSink,
    P: Sampler + 'static,
    R: RandSource + Send + Sync + 'static,
{
    tracing::trace!("Worker {worker_id} starting in {start_delay:?}");

    if sleep_unless_cancelled(&ctx.shutdown_token, start_delay).await {
        while !ctx.shutdown_token.is_cancelled() {
            let kind = TaskKind::pick(&*ctx.rng);

            match ctx.dispatch {
                Dispatch::Detached => {
                    let traffic = Arc::clone(&ctx.traffic);
                    ctx.actions.spawn(async move {
                        traffic.run(kind).await;
                    });
                }
                Dispatch::Inline => {
                    ctx.traffic.run(kind).await;
                }
            }

            if !sleep_unless_cancelled(&ctx.shutdown_token, ctx.throttle.delay(kind)).await {
                break;
            }
        }
    }

    tracing::trace!("Worker {worker_id} stopped");
}

/// Sleeps for `duration`; returns `false` if cancelled first.
async fn sleep_unless_cancelled(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        () = token.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
