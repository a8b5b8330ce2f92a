use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use practice_core::Clock;
use practice_core::model::{
    FinishOutcome, LessonId, Modality, PracticeSession, SessionId, StudentId,
};
use storage::repository::{NewPracticeSession, PracticeSessionRepository};
use tracing::{info, warn};

use super::timers::SessionTimers;
use crate::error::PracticeError;

/// Opens and closes practice sessions for one student.
///
/// Also owns the per-session timers so that leaving or finishing a session
/// cancels every pending callback tied to it.
#[derive(Clone)]
pub struct SessionManager {
    clock: Clock,
    student_id: StudentId,
    sessions: Arc<dyn PracticeSessionRepository>,
    timers: Arc<Mutex<HashMap<SessionId, SessionTimers>>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(student_id: StudentId, sessions: Arc<dyn PracticeSessionRepository>) -> Self {
        Self {
            clock: Clock::default(),
            student_id,
            sessions,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    /// Create a new open session stamped with the current time.
    ///
    /// Overlapping sessions for the same lesson and modality are allowed.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` if the session cannot be stored.
    pub async fn start_session(
        &self,
        lesson_id: LessonId,
        modality: Modality,
    ) -> Result<PracticeSession, PracticeError> {
        let session = self
            .sessions
            .create_session(NewPracticeSession {
                student_id: self.student_id,
                lesson_id,
                modality,
                started_at: self.clock.now(),
            })
            .await?;
        info!(
            session_id = %session.id(),
            lesson_id = %lesson_id,
            %modality,
            "practice session started"
        );
        Ok(session)
    }

    /// Close a session with the given active duration.
    ///
    /// Closing an already closed session is a silent no-op that keeps the
    /// first duration.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::SessionNotFound` for unknown ids or sessions of
    /// another student.
    pub async fn finish_session(
        &self,
        session_id: SessionId,
        duration_secs: u32,
    ) -> Result<FinishOutcome, PracticeError> {
        self.owned_session(session_id).await?;
        self.leave_session(session_id);

        let outcome = self
            .sessions
            .finish_session(session_id, self.clock.now(), duration_secs)
            .await?;
        match outcome {
            FinishOutcome::Finished => {
                info!(session_id = %session_id, duration_secs, "practice session finished");
            }
            FinishOutcome::AlreadyFinished => {
                warn!(session_id = %session_id, "practice session already finished");
            }
        }
        Ok(outcome)
    }

    /// Load a session that belongs to this student.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::SessionNotFound` if it does not exist or is not
    /// owned by this student.
    pub async fn owned_session(
        &self,
        session_id: SessionId,
    ) -> Result<PracticeSession, PracticeError> {
        match self.sessions.get_session(session_id).await? {
            Some(session) if session.student_id() == self.student_id => Ok(session),
            _ => Err(PracticeError::SessionNotFound(session_id)),
        }
    }

    /// Load a session that still accepts attempts.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::SessionClosed` once the session is finished.
    pub async fn open_session(
        &self,
        session_id: SessionId,
    ) -> Result<PracticeSession, PracticeError> {
        let session = self.owned_session(session_id).await?;
        if session.is_finished() {
            return Err(PracticeError::SessionClosed(session_id));
        }
        Ok(session)
    }

    /// Timers of a session, created on first use.
    #[must_use]
    pub fn timers(&self, session_id: SessionId) -> SessionTimers {
        match self.timers.lock() {
            Ok(mut map) => map.entry(session_id).or_default().clone(),
            Err(_) => SessionTimers::new(),
        }
    }

    /// Cancel the session's timers without closing it.
    pub fn leave_session(&self, session_id: SessionId) {
        let removed = self
            .timers
            .lock()
            .ok()
            .and_then(|mut map| map.remove(&session_id));
        if let Some(timers) = removed {
            timers.cancel_all();
        }
    }
}
