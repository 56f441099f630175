use crate::{
    IdPool, MINUTE_MILLIS, RandSource, Sampler, ThreadRandom, TimeSource, systematic_sample,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::scope;

#[derive(Default)]
struct MockTime {
    millis: AtomicU64,
}

impl MockTime {
    fn at_minute(minute: u64) -> Arc<Self> {
        let time = Arc::new(Self::default());
        time.set_minute(minute);
        time
    }

    fn set_minute(&self, minute: u64) {
        self.millis.store(minute * MINUTE_MILLIS + 1, Ordering::Relaxed);
    }
}

impl TimeSource for MockTime {
    fn current_millis(&self) -> u64 {
        self.millis.load(Ordering::Relaxed)
    }
}

struct FirstIndex;
impl RandSource for FirstIndex {
    fn below(&self, _bound: usize) -> usize {
        0
    }
}

struct LastIndex;
impl RandSource for LastIndex {
    fn below(&self, bound: usize) -> usize {
        bound.saturating_sub(1)
    }
}

fn ids(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}

#[test]
fn fresh_pool_draws_none() {
    let pool = IdPool::new(0.5);
    for _ in 0..100 {
        assert_eq!(pool.draw(), None);
    }
    assert_eq!(pool.minute_count(), 0);
    assert!(pool.is_empty());
}

#[test]
fn thinning_at_half_rate_keeps_odd_positions() {
    let pool = IdPool::with_sources(0.5, MockTime::at_minute(5), ThreadRandom);
    for id in ids("a", 10) {
        pool.ingest(id);
    }

    assert!(pool.thin(5));
    assert_eq!(
        pool.bucket(5).unwrap(),
        vec!["a1", "a3", "a5", "a7", "a9"]
    );
}

#[test]
fn thinning_small_bucket_at_low_rate_drops_everything() {
    let pool = IdPool::with_sources(0.1, MockTime::at_minute(5), ThreadRandom);
    for id in ids("a", 3) {
        pool.ingest(id);
    }

    assert!(pool.thin(5));
    assert_eq!(pool.bucket(5).unwrap(), Vec::<String>::new());
    // The minute is still recorded even though nothing survived.
    assert_eq!(pool.minute_count(), 1);
}

#[test]
fn thinning_is_idempotent_per_minute() {
    let pool = IdPool::with_sources(0.5, MockTime::at_minute(5), ThreadRandom);
    for id in ids("a", 10) {
        pool.ingest(id);
    }

    assert!(pool.thin(5));
    let once = pool.bucket(5).unwrap();
    assert!(!pool.thin(5));
    assert_eq!(pool.bucket(5).unwrap(), once);
}

#[test]
fn thinning_missing_minute_is_noop() {
    let pool = IdPool::with_sources(0.5, MockTime::at_minute(5), ThreadRandom);
    assert!(!pool.thin(42));
    assert_eq!(pool.bucket(42), None);
}

#[test]
fn first_ingest_of_new_minute_thins_previous_minute() {
    let time = MockTime::at_minute(5);
    let pool = IdPool::with_sources(0.5, time.clone(), ThreadRandom);
    for id in ids("a", 10) {
        pool.ingest(id);
    }
    assert_eq!(pool.bucket(5).unwrap().len(), 10);

    time.set_minute(6);
    pool.ingest("b0");

    assert_eq!(
        pool.bucket(5).unwrap(),
        vec!["a1", "a3", "a5", "a7", "a9"]
    );
    assert_eq!(pool.bucket(6).unwrap(), vec!["b0"]);
    assert_eq!(pool.minute_count(), 2);

    // Later ingests in the same minute neither thin again nor re-record it.
    pool.ingest("b1");
    assert_eq!(pool.bucket(5).unwrap().len(), 5);
    assert_eq!(pool.bucket(6).unwrap(), vec!["b0", "b1"]);
    assert_eq!(pool.minute_count(), 2);
}

#[test]
fn skipped_minute_leaves_older_bucket_untouched() {
    let time = MockTime::at_minute(5);
    let pool = IdPool::with_sources(0.5, time.clone(), ThreadRandom);
    for id in ids("a", 10) {
        pool.ingest(id);
    }

    // Nothing was ingested during minute 6, so minute 5 is never thinned.
    time.set_minute(7);
    pool.ingest("c0");
    assert_eq!(pool.bucket(5).unwrap().len(), 10);
    assert_eq!(pool.minute_count(), 2);
}

#[test]
fn clock_stepping_back_never_touches_thinned_minute() {
    let time = MockTime::at_minute(5);
    let pool = IdPool::with_sources(0.5, time.clone(), ThreadRandom);
    for id in ids("a", 10) {
        pool.ingest(id);
    }
    time.set_minute(6);
    pool.ingest("b0");
    let thinned = pool.bucket(5).unwrap();

    // Back into the thinned minute, then into one never seen.
    time.set_minute(5);
    pool.ingest("late0");
    time.set_minute(3);
    pool.ingest("late1");

    assert_eq!(pool.bucket(5).unwrap(), thinned);
    assert_eq!(pool.bucket(3), None);
    assert_eq!(pool.bucket(6).unwrap(), vec!["b0", "late0", "late1"]);
    assert_eq!(pool.minute_count(), 2);

    // Catching up again opens the next minute normally.
    time.set_minute(7);
    pool.ingest("c0");
    // round(3 * 0.5) = 2 selections at offset round(3 / 2) = 2.
    assert_eq!(pool.bucket(6).unwrap(), vec!["late0"]);
    assert_eq!(pool.minute_count(), 3);
}

#[test]
fn draws_within_one_minute_come_from_ingested_set() {
    let pool = IdPool::with_sources(0.5, MockTime::at_minute(9), ThreadRandom);
    let ingested: HashSet<String> = ids("x", 50).into_iter().collect();
    for id in &ingested {
        pool.ingest(id.clone());
    }

    let mut seen = HashSet::new();
    for _ in 0..1_000 {
        let id = pool.draw().expect("pool has identifiers");
        assert!(ingested.contains(&id), "drew unknown id {id}");
        seen.insert(id);
    }
    assert!(seen.len() > 1, "draws should not be constant");
}

#[test]
fn draw_from_emptied_minute_returns_none_without_retry() {
    let time = MockTime::at_minute(1);
    let first = IdPool::with_sources(0.1, time.clone(), FirstIndex);
    for id in ids("a", 3) {
        first.ingest(id);
    }
    time.set_minute(2);
    first.ingest("c");

    // Minute 1 was thinned to nothing; picking it yields `None` even though
    // minute 2 still has an identifier.
    assert_eq!(first.bucket(1).unwrap().len(), 0);
    assert_eq!(first.draw(), None);

    let time = MockTime::at_minute(1);
    let last = IdPool::with_sources(0.1, time.clone(), LastIndex);
    for id in ids("a", 3) {
        last.ingest(id);
    }
    time.set_minute(2);
    last.ingest("c");
    assert_eq!(last.draw().as_deref(), Some("c"));
}

#[test]
fn concurrent_ingest_loses_no_updates() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 500;

    let pool = IdPool::with_sources(0.5, MockTime::at_minute(3), ThreadRandom);

    scope(|s| {
        for t in 0..THREADS {
            let pool = &pool;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    pool.ingest(format!("t{t}-{i}"));
                }
            });
        }
    });

    let bucket = pool.bucket(3).unwrap();
    assert_eq!(bucket.len(), THREADS * PER_THREAD);
    let unique: HashSet<_> = bucket.into_iter().collect();
    assert_eq!(unique.len(), THREADS * PER_THREAD);
    assert_eq!(pool.minute_count(), 1);
}

#[test]
fn concurrent_rollover_thins_previous_minute_once() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let time = MockTime::at_minute(1);
    let pool = Arc::new(IdPool::with_sources(0.5, time.clone(), ThreadRandom));
    for id in ids("a", 100) {
        pool.ingest(id);
    }

    time.set_minute(2);
    scope(|s| {
        for t in 0..THREADS {
            let pool = Arc::clone(&pool);
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    Sampler::ingest(&pool, format!("t{t}-{i}"));
                }
            });
        }
    });

    assert_eq!(pool.minute_count(), 2);
    assert_eq!(pool.bucket(1).unwrap().len(), 50);
    assert_eq!(pool.bucket(2).unwrap().len(), THREADS * PER_THREAD);
}

#[test]
fn concurrent_draws_and_ingests_only_see_known_ids() {
    let pool = IdPool::with_sources(1.0, MockTime::at_minute(4), ThreadRandom);
    pool.ingest("seed");

    scope(|s| {
        s.spawn(|| {
            for i in 0..1_000 {
                pool.ingest(format!("w{i}"));
            }
        });
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..1_000 {
                    let id = pool.draw().expect("seeded pool");
                    assert!(id == "seed" || id.starts_with('w'));
                }
            });
        }
    });

    assert_eq!(pool.len(), 1_001);
}

#[test]
fn systematic_sample_full_rate_keeps_everything() {
    let items = ids("a", 7);
    assert_eq!(systematic_sample(items.clone(), 1.0), items);
}

#[test]
fn systematic_sample_never_exceeds_target_size() {
    // 10 * 0.7 = 7 selections; offset rounds to 1, so only the cap applies.
    let kept = systematic_sample(ids("a", 10), 0.7);
    assert_eq!(kept, ids("a", 7));

    // 10 * 0.3 = 3 selections at offset 3.
    let kept = systematic_sample(ids("a", 10), 0.3);
    assert_eq!(kept, vec!["a2", "a5", "a8"]);
}

#[test]
fn systematic_sample_of_empty_input_is_empty() {
    assert!(systematic_sample(Vec::<String>::new(), 0.5).is_empty());
}
