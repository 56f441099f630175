use rand::{Rng, rng};

/// A trait for random sources that return uniformly distributed indices.
///
/// This abstraction allows you to plug in a real random source or a mocked
/// random source in tests.
///
/// # Example
/// ```
/// use chanload::RandSource;
///
/// struct FirstIndex;
/// impl RandSource for FirstIndex {
///     fn below(&self, _bound: usize) -> usize {
///         0
///     }
/// }
///
/// assert_eq!(FirstIndex.below(10), 0);
/// ```
pub trait RandSource {
    /// Returns an integer uniformly distributed in `[0, bound)`, or `0` when
    /// `bound` is zero.
    fn below(&self, bound: usize) -> usize;
}

/// A `RandSource` that uses the thread-local RNG (`rand::rng()`).
///
/// Each OS thread has its own RNG instance, so calls from multiple threads are
/// contention-free. This type does **not** store the RNG itself; it accesses
/// the thread-local generator on each call, which keeps it `Send` and `Sync`
/// and safe to hold across `.await` points.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource for ThreadRandom {
    fn below(&self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        rng().random_range(0..bound)
    }
}

impl<R: RandSource + ?Sized> RandSource for std::sync::Arc<R> {
    fn below(&self, bound: usize) -> usize {
        (**self).below(bound)
    }
}
