use std::time::{SystemTime, UNIX_EPOCH};

/// Width of a sampling bucket in milliseconds.
pub const MINUTE_MILLIS: u64 = 60_000;

/// Integer bucket identifier derived from wall-clock time, one per 60-second
/// window since the Unix epoch.
pub type MinuteKey = u64;

/// A trait for time sources that return a wall-clock timestamp.
///
/// This abstraction allows you to plug in the system clock or a mocked time
/// source in tests.
///
/// # Example
///
/// ```
/// use chanload::{TimeSource, minute_key};
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         125_000
///     }
/// }
///
/// assert_eq!(minute_key(&FixedTime), 2);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn current_millis(&self) -> u64;
}

/// Returns the minute key for the time reported by `time`.
pub fn minute_key<T: TimeSource + ?Sized>(time: &T) -> MinuteKey {
    time.current_millis() / MINUTE_MILLIS
}

/// Wall-clock time source backed by [`SystemTime`].
///
/// A clock set before the Unix epoch reads as zero.
#[derive(Default, Clone, Copy, Debug)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}
