use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

//
// ─── SESSION CLOCK ─────────────────────────────────────────────────────────────
//

/// Tracks active (unpaused) time spent inside one practice session.
///
/// The clock never reads the system time itself; every transition takes the
/// instant from the caller so the owning service decides which `Clock` is
/// authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClock {
    accumulated: Duration,
    running_since: Option<DateTime<Utc>>,
}

impl SessionClock {
    /// Starts a running clock at `at`.
    #[must_use]
    pub fn start(at: DateTime<Utc>) -> Self {
        Self {
            accumulated: Duration::zero(),
            running_since: Some(at),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Stops accumulating time. Pausing a paused clock is a no-op.
    pub fn pause(&mut self, at: DateTime<Utc>) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += positive(at - since);
        }
    }

    /// Resumes accumulating time. Resuming a running clock is a no-op.
    pub fn resume(&mut self, at: DateTime<Utc>) {
        if self.running_since.is_none() {
            self.running_since = Some(at);
        }
    }

    /// Active time up to `at`.
    #[must_use]
    pub fn elapsed(&self, at: DateTime<Utc>) -> Duration {
        match self.running_since {
            Some(since) => self.accumulated + positive(at - since),
            None => self.accumulated,
        }
    }

    /// Active time up to `at`, in whole seconds.
    #[must_use]
    pub fn elapsed_secs(&self, at: DateTime<Utc>) -> u32 {
        u32::try_from(self.elapsed(at).num_seconds()).unwrap_or(u32::MAX)
    }
}

// Backdated instants count as zero rather than shrinking the total.
fn positive(delta: Duration) -> Duration {
    if delta < Duration::zero() {
        Duration::zero()
    } else {
        delta
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
