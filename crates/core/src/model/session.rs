use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::attempt::Attempt;
use crate::model::ids::{LessonId, SessionId, StudentId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PracticeSessionError {
    #[error("finished_at is before started_at")]
    InvalidTimeRange,

    #[error("unknown modality: {0}")]
    UnknownModality(String),

    #[error("too many attempts for a single session: {len}")]
    TooManyAttempts { len: usize },
}

//
// ─── MODALITY ──────────────────────────────────────────────────────────────────
//

/// The five practice modes offered for a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    Lookup,
    Flashcard,
    Quiz,
    Listen,
    Write,
}

impl Modality {
    pub const ALL: [Modality; 5] = [
        Modality::Lookup,
        Modality::Flashcard,
        Modality::Quiz,
        Modality::Listen,
        Modality::Write,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Lookup => "lookup",
            Modality::Flashcard => "flashcard",
            Modality::Quiz => "quiz",
            Modality::Listen => "listen",
            Modality::Write => "write",
        }
    }

    /// Whether the modality is driven by generated questions.
    #[must_use]
    pub fn uses_questions(self) -> bool {
        matches!(self, Modality::Quiz | Modality::Listen | Modality::Write)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = PracticeSessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modality::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PracticeSessionError::UnknownModality(s.to_owned()))
    }
}

//
// ─── PRACTICE SESSION ──────────────────────────────────────────────────────────
//

/// Result of closing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    Finished,
    AlreadyFinished,
}

/// One visit of a student to one modality of a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeSession {
    id: SessionId,
    student_id: StudentId,
    lesson_id: LessonId,
    modality: Modality,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    duration_secs: u32,
}

impl PracticeSession {
    #[must_use]
    pub fn start(
        id: SessionId,
        student_id: StudentId,
        lesson_id: LessonId,
        modality: Modality,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            student_id,
            lesson_id,
            modality,
            started_at,
            finished_at: None,
            duration_secs: 0,
        }
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `PracticeSessionError::InvalidTimeRange` if `finished_at` precedes `started_at`.
    pub fn from_persisted(
        id: SessionId,
        student_id: StudentId,
        lesson_id: LessonId,
        modality: Modality,
        started_at: DateTime<Utc>,
        finished_at: Option<DateTime<Utc>>,
        duration_secs: u32,
    ) -> Result<Self, PracticeSessionError> {
        if finished_at.is_some_and(|f| f < started_at) {
            return Err(PracticeSessionError::InvalidTimeRange);
        }
        Ok(Self {
            id,
            student_id,
            lesson_id,
            modality,
            started_at,
            finished_at,
            duration_secs,
        })
    }

    /// Close the session. A second call leaves the first values in place.
    pub fn finish(&mut self, finished_at: DateTime<Utc>, duration_secs: u32) -> FinishOutcome {
        if self.is_finished() {
            return FinishOutcome::AlreadyFinished;
        }
        self.finished_at = Some(finished_at.max(self.started_at));
        self.duration_secs = duration_secs;
        FinishOutcome::Finished
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn modality(&self) -> Modality {
        self.modality
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

//
// ─── SESSION REPORT ────────────────────────────────────────────────────────────
//

/// Aggregate of the attempts recorded in one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub modality: Modality,
    pub finished: bool,
    pub duration_secs: u32,
    pub attempts: u32,
    pub correct: u32,
    pub wrong: u32,
    pub distinct_items: u32,
}

impl SessionReport {
    /// Build a report from the attempts stored for `session`.
    ///
    /// # Errors
    ///
    /// Returns `PracticeSessionError::TooManyAttempts` if the count cannot fit in `u32`.
    pub fn from_attempts(
        session: &PracticeSession,
        attempts: &[Attempt],
    ) -> Result<Self, PracticeSessionError> {
        let total = u32::try_from(attempts.len())
            .map_err(|_| PracticeSessionError::TooManyAttempts { len: attempts.len() })?;
        let correct = attempts.iter().filter(|a| a.is_correct).count();
        let correct = u32::try_from(correct).unwrap_or(total);
        let distinct: HashSet<_> = attempts.iter().map(|a| a.vocabulary_id).collect();

        Ok(Self {
            session_id: session.id(),
            modality: session.modality(),
            finished: session.is_finished(),
            duration_secs: session.duration_secs(),
            attempts: total,
            correct,
            wrong: total - correct,
            distinct_items: u32::try_from(distinct.len()).unwrap_or(total),
        })
    }

    /// Share of correct attempts in percent; 0 for an empty session.
    #[must_use]
    pub fn accuracy_percent(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            f64::from(self.correct) * 100.0 / f64::from(self.attempts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attempt::QuestionKind;
    use crate::model::ids::{AttemptKey, VocabularyId};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn session() -> PracticeSession {
        PracticeSession::start(
            SessionId::new(1),
            StudentId::new(7),
            LessonId::new(3),
            Modality::Quiz,
            fixed_now(),
        )
    }

    #[test]
    fn finish_is_idempotent() {
        let mut s = session();
        let first = s.finish(fixed_now() + Duration::seconds(90), 90);
        let second = s.finish(fixed_now() + Duration::seconds(300), 300);

        assert_eq!(first, FinishOutcome::Finished);
        assert_eq!(second, FinishOutcome::AlreadyFinished);
        assert_eq!(s.duration_secs(), 90);
        assert_eq!(s.finished_at(), Some(fixed_now() + Duration::seconds(90)));
    }

    #[test]
    fn persisted_session_rejects_inverted_range() {
        let err = PracticeSession::from_persisted(
            SessionId::new(1),
            StudentId::new(1),
            LessonId::new(1),
            Modality::Write,
            fixed_now(),
            Some(fixed_now() - Duration::seconds(1)),
            0,
        )
        .unwrap_err();
        assert_eq!(err, PracticeSessionError::InvalidTimeRange);
    }

    #[test]
    fn modality_parses_codes() {
        for modality in Modality::ALL {
            assert_eq!(modality.as_str().parse::<Modality>().unwrap(), modality);
        }
        assert!("dictation".parse::<Modality>().is_err());
        assert!(Modality::Listen.uses_questions());
        assert!(!Modality::Flashcard.uses_questions());
    }

    #[test]
    fn report_counts_attempts() {
        let s = session();
        let attempt = |vocab: u64, ok: bool| Attempt {
            key: AttemptKey::generate(),
            session_id: s.id(),
            vocabulary_id: VocabularyId::new(vocab),
            question_kind: QuestionKind::McqMeaning,
            user_answer: Some("x".into()),
            correct_answer: "y".into(),
            is_correct: ok,
            time_spent_secs: 2,
            answered_at: fixed_now(),
        };
        let attempts = vec![attempt(1, true), attempt(2, false), attempt(1, true)];

        let report = SessionReport::from_attempts(&s, &attempts).unwrap();
        assert_eq!(report.attempts, 3);
        assert_eq!(report.correct, 2);
        assert_eq!(report.wrong, 1);
        assert_eq!(report.distinct_items, 2);
        assert!((report.accuracy_percent() - 66.666).abs() < 0.01);
    }
}
