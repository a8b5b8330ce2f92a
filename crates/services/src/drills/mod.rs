//! Interactive drivers for the five practice modalities.
//!
//! Each drill owns one open practice session, tracks its active time with a
//! `SessionClock` and closes the session through the `SessionManager`.
//! Dropping a drill cancels its session timers.

mod flashcards;
mod lookup;
mod questions;

pub use flashcards::{FlashcardOutcome, FlashcardService};
pub use lookup::LookupBrowser;
pub use questions::{Answer, AnswerFeedback, OpenedDrill, QuestionDrill, RenderFallback};

use chrono::{DateTime, Utc};
use practice_core::Clock;
use practice_core::model::{FinishOutcome, PracticeSession};
use practice_core::time::SessionClock;

use crate::attempts::AttemptRecorder;
use crate::error::PracticeError;
use crate::sessions::{SessionManager, SessionTimers};

/// Session plumbing shared by every drill.
pub(crate) struct DrillSession {
    clock: Clock,
    manager: SessionManager,
    recorder: AttemptRecorder,
    session: PracticeSession,
    timing: SessionClock,
}

impl DrillSession {
    pub(crate) fn new(
        clock: Clock,
        manager: SessionManager,
        recorder: AttemptRecorder,
        session: PracticeSession,
    ) -> Self {
        Self {
            timing: SessionClock::start(clock.now()),
            clock,
            manager,
            recorder,
            session,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn session(&self) -> &PracticeSession {
        &self.session
    }

    fn recorder(&self) -> &AttemptRecorder {
        &self.recorder
    }

    fn timers(&self) -> SessionTimers {
        self.manager.timers(self.session.id())
    }

    fn pause(&mut self) {
        let now = self.now();
        self.timing.pause(now);
    }

    fn resume(&mut self) {
        let now = self.now();
        self.timing.resume(now);
    }

    fn is_paused(&self) -> bool {
        !self.timing.is_running()
    }

    fn elapsed_secs(&self) -> u32 {
        self.timing.elapsed_secs(self.now())
    }

    /// Seconds since `since`, saturating at both ends.
    fn secs_since(&self, since: DateTime<Utc>) -> u32 {
        let secs = (self.now() - since).num_seconds().max(0);
        u32::try_from(secs).unwrap_or(u32::MAX)
    }

    async fn finish(&mut self) -> Result<FinishOutcome, PracticeError> {
        let now = self.now();
        self.timing.pause(now);
        let secs = self.timing.elapsed_secs(now);
        self.manager.finish_session(self.session.id(), secs).await
    }

    fn leave(&self) {
        self.manager.leave_session(self.session.id());
    }

    #[cfg(test)]
    fn advance(&mut self, delta: chrono::Duration) {
        self.clock.advance(delta);
    }
}

impl Drop for DrillSession {
    // A drill dropped without `leave`/`finish` must not leave timers behind.
    fn drop(&mut self) {
        self.leave();
    }
}
