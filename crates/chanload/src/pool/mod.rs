//! Time-bucketed identifier sampler.
//!
//! [`IdPool`] remembers a bounded, roughly representative set of identifiers
//! the traffic generator has created, so later requests can reference
//! entities that really exist on the remote side.
//!
//! Identifiers are grouped by the minute they were observed in. The first
//! ingest of a new minute thins the previous minute's bucket once with
//! systematic downsampling, which bounds memory without a background task.
//! Draws pick a minute uniformly, then an identifier uniformly within it.
//!
//! All state lives behind a single [`RwLock`]: ingest (append plus the
//! "first entry this minute" check and any thinning) runs under the write
//! lock, so readers never observe a partially thinned bucket. Draws share the
//! read lock.

#[cfg(test)]
mod tests;

use crate::{MinuteKey, RandSource, SystemClock, ThreadRandom, TimeSource, minute_key};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A shared store that identifiers are written into and drawn out of.
///
/// Traffic actions are generic over this trait so a pool can be stubbed in
/// tests. A `None` draw is a normal, frequent outcome and never an error.
pub trait Sampler: Send + Sync {
    /// Records an identifier observed now.
    fn ingest(&self, id: String);

    /// Returns a randomly selected identifier, if one is available.
    fn draw(&self) -> Option<String>;
}

impl<S: Sampler + ?Sized> Sampler for Arc<S> {
    fn ingest(&self, id: String) {
        (**self).ingest(id);
    }

    fn draw(&self) -> Option<String> {
        (**self).draw()
    }
}

#[derive(Debug, Default)]
struct Bucket {
    ids: Vec<String>,
    thinned: bool,
}

#[derive(Debug, Default)]
struct PoolState {
    buckets: HashMap<MinuteKey, Bucket>,
    // Append-only and strictly increasing. Never pruned.
    minutes: Vec<MinuteKey>,
}

impl PoolState {
    fn thin(&mut self, minute: MinuteKey, sample_rate: f64) -> bool {
        let Some(bucket) = self.buckets.get_mut(&minute) else {
            return false;
        };
        if bucket.thinned {
            return false;
        }
        let ids = core::mem::take(&mut bucket.ids);
        let before = ids.len();
        bucket.ids = systematic_sample(ids, sample_rate);
        bucket.thinned = true;
        tracing::debug!(
            minute,
            kept = bucket.ids.len(),
            dropped = before - bucket.ids.len(),
            "Thinned minute bucket"
        );
        true
    }
}

/// Downsamples `items` to roughly `len * sample_rate` elements.
///
/// With `n = items.len()`, `k = round(n * sample_rate)` and
/// `offset = round(n / k)`, keeps every `offset`-th element counting from one
/// (indices `offset - 1`, `2 * offset - 1`, ...), at most `k` of them, in
/// their original order. When `k` rounds to zero nothing is kept, so a small
/// bucket under a low rate is dropped entirely.
///
/// The kept positions depend only on `n` and `sample_rate`.
///
/// # Example
/// ```
/// use chanload::systematic_sample;
///
/// let items: Vec<u8> = (0..10).collect();
/// assert_eq!(systematic_sample(items, 0.5), vec![1, 3, 5, 7, 9]);
/// assert!(systematic_sample(vec![1, 2, 3], 0.1).is_empty());
/// ```
pub fn systematic_sample<T>(items: Vec<T>, sample_rate: f64) -> Vec<T> {
    let len = items.len();
    let num_selects = (len as f64 * sample_rate).round();
    if num_selects < 1.0 {
        return Vec::new();
    }
    let num_selects = num_selects as usize;
    let offset = ((len as f64 / num_selects as f64).round() as usize).max(1);

    items
        .into_iter()
        .skip(offset - 1)
        .step_by(offset)
        .take(num_selects)
        .collect()
}

/// A concurrent, memory-bounded pool of identifiers bucketed by minute.
///
/// ## Features
/// - ✅ Thread-safe (`Send + Sync`), shareable through an [`Arc`]
/// - ✅ Each minute is thinned exactly once, when the next minute opens
/// - ✅ Never fails: an empty pool or an emptied minute draws `None`
///
/// ## Caveats
/// - Draws are uniform over *minutes*, not identifiers. A minute holding one
///   survivor is as likely to be picked as a minute holding a hundred.
/// - Minute keys are never removed, so the key list grows for the lifetime of
///   the process (one entry per active minute).
///
/// # Example
/// ```
/// use chanload::IdPool;
///
/// let pool = IdPool::new(0.5);
/// assert_eq!(pool.draw(), None);
///
/// pool.ingest("channel-1");
/// assert_eq!(pool.draw().as_deref(), Some("channel-1"));
/// ```
pub struct IdPool<T = SystemClock, R = ThreadRandom> {
    sample_rate: f64,
    state: RwLock<PoolState>,
    time: T,
    rng: R,
}

impl IdPool {
    /// Creates an empty pool backed by the system clock and the thread-local
    /// RNG.
    ///
    /// `sample_rate` must lie in `(0, 1]`; callers validate it beforehand.
    pub fn new(sample_rate: f64) -> Self {
        Self::with_sources(sample_rate, SystemClock, ThreadRandom)
    }
}

impl<T, R> IdPool<T, R>
where
    T: TimeSource,
    R: RandSource,
{
    /// Creates an empty pool with explicit time and random sources.
    pub fn with_sources(sample_rate: f64, time: T, rng: R) -> Self {
        Self {
            sample_rate,
            state: RwLock::new(PoolState::default()),
            time,
            rng,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Appends `id` to the current minute's bucket.
    ///
    /// If this is the first identifier of the minute, the previous minute's
    /// bucket is thinned and the new minute is recorded before the append.
    /// The check, the thinning and the append happen under one write lock, so
    /// concurrent callers can neither lose nor duplicate the thinning step.
    ///
    /// The minute never moves backwards: if the clock steps back, the
    /// identifier goes to the latest minute seen so far, which has not been
    /// thinned yet.
    pub fn ingest(&self, id: impl Into<String>) {
        let now = minute_key(&self.time);
        let mut state = self.state.write();
        let minute = state.minutes.last().map_or(now, |&latest| latest.max(now));

        if !state.buckets.contains_key(&minute) {
            if let Some(previous) = minute.checked_sub(1) {
                state.thin(previous, self.sample_rate);
            }
            state.minutes.push(minute);
        }

        state.buckets.entry(minute).or_default().ids.push(id.into());
    }

    /// Thins the bucket for `minute` in place.
    ///
    /// Does nothing if the bucket does not exist or was already thinned, so
    /// repeated calls leave the bucket exactly as the first call did. Returns
    /// `true` if this call performed the thinning.
    pub fn thin(&self, minute: MinuteKey) -> bool {
        self.state.write().thin(minute, self.sample_rate)
    }

    /// Draws one identifier: first a minute uniformly from every minute ever
    /// recorded, then an identifier uniformly from that minute's bucket.
    ///
    /// Returns `None` if nothing was ever ingested, or if the chosen minute's
    /// bucket is empty. An empty pick is not retried against another minute.
    pub fn draw(&self) -> Option<String> {
        let state = self.state.read();
        if state.minutes.is_empty() {
            return None;
        }

        let minute = state.minutes.get(self.rng.below(state.minutes.len()))?;
        let ids = &state.buckets.get(minute)?.ids;
        if ids.is_empty() {
            return None;
        }

        ids.get(self.rng.below(ids.len())).cloned()
    }

    /// Number of distinct minutes that have ever received an identifier.
    pub fn minute_count(&self) -> usize {
        self.state.read().minutes.len()
    }

    /// Snapshot of the bucket for `minute`.
    pub fn bucket(&self, minute: MinuteKey) -> Option<Vec<String>> {
        self.state
            .read()
            .buckets
            .get(&minute)
            .map(|bucket| bucket.ids.clone())
    }

    /// Total number of identifiers currently held across all buckets.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .buckets
            .values()
            .map(|bucket| bucket.ids.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, R> Sampler for IdPool<T, R>
where
    T: TimeSource + Send + Sync,
    R: RandSource + Send + Sync,
{
    fn ingest(&self, id: String) {
        IdPool::<T, R>::ingest(self, id);
    }

    fn draw(&self) -> Option<String> {
        IdPool::<T, R>::draw(self)
    }
}
