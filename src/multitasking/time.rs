use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ecs::EcsContext;

/// Clock used to enforce the scheduler's frame budget.
pub trait SystemTime: Send + Sync {
    /// Time since the clock's origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
pub struct MonotonicTime {
    origin: Instant,
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self { origin: Instant::now() }
    }
}

impl SystemTime for MonotonicTime {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
///
/// Kept in microseconds so sub-millisecond budgets can be exercised.
#[derive(Clone, Default)]
pub struct ManualTime(Arc<AtomicU64>);

impl ManualTime {
    pub fn set(&self, ms: u64) {
        self.0.store(ms * 1000, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.advance_micros(ms * 1000);
    }

    pub fn advance_micros(&self, us: u64) {
        self.0.fetch_add(us, Ordering::SeqCst);
    }
}

impl SystemTime for ManualTime {
    fn now(&self) -> Duration {
        Duration::from_micros(self.0.load(Ordering::SeqCst))
    }
}

/// Tracks when the current frame started on a [`SystemTime`].
pub struct FrameClock {
    time: Box<dyn SystemTime>,
    frame_start: Duration,
}

impl FrameClock {
    pub fn new(time: Box<dyn SystemTime>) -> Self {
        let frame_start = time.now();
        Self { time, frame_start }
    }

    pub fn monotonic() -> Self {
        Self::new(Box::new(MonotonicTime::default()))
    }
}

impl EcsContext for FrameClock {
    fn now(&self) -> Duration {
        self.time.now()
    }

    fn begin_frame(&mut self) {
        self.frame_start = self.time.now();
    }

    fn frame_elapsed(&self) -> Duration {
        self.time.now().saturating_sub(self.frame_start)
    }
}
