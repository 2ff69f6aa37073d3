//! Clock abstraction so liveness checks and the tick scheduler can run
//! against virtual time in tests.

use std::time::{Duration, Instant, SystemTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Wall-clock time, used for tick timestamps and artifact mtime ages.
    fn system_now(&self) -> SystemTime;

    fn sleep(&self, duration: Duration);
}

pub struct RealClock;

impl Default for RealClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RealClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock for deterministic testing.
pub struct TestClock {
    current: std::sync::Mutex<(Instant, SystemTime)>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            current: std::sync::Mutex::new((Instant::now(), SystemTime::now())),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut time = self.current.lock().unwrap();
        time.0 += duration;
        time.1 += duration;
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.current.lock().unwrap().0
    }

    fn system_now(&self) -> SystemTime {
        self.current.lock().unwrap().1
    }

    fn sleep(&self, duration: Duration) {
        // In virtual time, sleep just advances the clock
        self.advance(duration);
        std::thread::yield_now();
    }
}

pub type SharedClock = std::sync::Arc<dyn Clock + Send + Sync>;

pub fn real_clock() -> SharedClock {
    std::sync::Arc::new(RealClock::new())
}

pub fn test_clock() -> SharedClock {
    std::sync::Arc::new(TestClock::new())
}
