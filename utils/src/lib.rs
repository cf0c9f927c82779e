use std::{
    sync::{
        atomic::{AtomicU64, Ordering::SeqCst},
        Arc,
    },
    time::SystemTime,
};

pub fn get_epoch_time_in_ms() -> u64 {
    let start = SystemTime::now();
    let since_the_epoch = start
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    since_the_epoch.as_millis() as u64
}

/// A wall clock in milliseconds since the Unix epoch that never goes
/// backwards.
///
/// Every value returned by [`MonotonicClock::now`] is greater than or equal
/// to every value returned before it by any clone of the same clock, even if
/// the system time is stepped back in between.
#[derive(Clone, Debug, Default)]
pub struct MonotonicClock {
    last: Arc<AtomicU64>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at `value`, useful to simulate an earlier run.
    pub fn starting_at(value: u64) -> Self {
        Self {
            last: Arc::new(AtomicU64::new(value)),
        }
    }

    pub fn now(&self) -> u64 {
        let wall = get_epoch_time_in_ms();
        let previous = self.last.fetch_max(wall, SeqCst);
        previous.max(wall)
    }

    /// Advance the clock to at least `floor`, then read it.
    ///
    /// Used to order a write after a timestamp stored by an earlier run or
    /// another process.
    pub fn now_at_least(&self, floor: u64) -> u64 {
        self.last.fetch_max(floor, SeqCst);
        self.now()
    }

    /// Last value handed out, without advancing the clock.
    pub fn last(&self) -> u64 {
        self.last.load(SeqCst)
    }
}
