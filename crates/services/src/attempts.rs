use std::sync::Arc;

use practice_core::Clock;
use practice_core::flashcard::Judgment;
use practice_core::mastery::MasteryUpdater;
use practice_core::model::{
    Attempt, AttemptKey, ItemProgress, LessonId, QuestionKind, SessionId, StudentId,
    VocabularyId, VocabularyItem,
};
use storage::repository::{AttemptAppend, AttemptRepository, ItemProgressRepository, VocabularyCatalog};
use tracing::{debug, warn};

use crate::error::PracticeError;
use crate::sessions::SessionManager;

//
// ─── REQUESTS ──────────────────────────────────────────────────────────────────
//

/// One evaluated answer as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeAttempt {
    pub session_id: SessionId,
    pub vocabulary_id: VocabularyId,
    pub question_kind: QuestionKind,
    /// `None` when the question was skipped.
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub time_spent_secs: u32,
    /// Retry key; a fresh one is generated when absent.
    pub key: Option<AttemptKey>,
}

/// A flashcard judgment as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardAction {
    pub vocabulary_id: VocabularyId,
    pub lesson_id: LessonId,
    pub action: Judgment,
    pub session_id: SessionId,
    pub time_spent_secs: u32,
    pub key: Option<AttemptKey>,
}

/// What happened to a recorded attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Stored; carries the progress after the mastery update.
    Recorded(ItemProgress),
    /// The key was already stored; nothing moved.
    Duplicate,
}

impl RecordOutcome {
    #[must_use]
    pub fn progress(&self) -> Option<&ItemProgress> {
        match self {
            RecordOutcome::Recorded(p) => Some(p),
            RecordOutcome::Duplicate => None,
        }
    }
}

//
// ─── RECORDER ──────────────────────────────────────────────────────────────────
//

/// Appends attempts and exposures and runs the mastery updater over them.
#[derive(Clone)]
pub struct AttemptRecorder {
    clock: Clock,
    updater: MasteryUpdater,
    manager: SessionManager,
    catalog: Arc<dyn VocabularyCatalog>,
    attempts: Arc<dyn AttemptRepository>,
    progress: Arc<dyn ItemProgressRepository>,
}

impl AttemptRecorder {
    #[must_use]
    pub fn new(
        manager: SessionManager,
        catalog: Arc<dyn VocabularyCatalog>,
        attempts: Arc<dyn AttemptRepository>,
        progress: Arc<dyn ItemProgressRepository>,
    ) -> Self {
        Self {
            clock: Clock::default(),
            updater: MasteryUpdater::default(),
            manager,
            catalog,
            attempts,
            progress,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.manager = self.manager.with_clock(clock);
        self
    }

    #[must_use]
    pub fn with_updater(mut self, updater: MasteryUpdater) -> Self {
        self.updater = updater;
        self
    }

    fn student_id(&self) -> StudentId {
        self.manager.student_id()
    }

    /// Append an attempt to an open session and move the item's mastery.
    ///
    /// The attempt and the new progress are stored together. Reusing the key
    /// of a stored attempt is absorbed as `RecordOutcome::Duplicate`.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` / `SessionClosed` if the session cannot take attempts.
    /// - `UnknownVocabulary` if the item is not in the session's lesson.
    /// - `Storage` for persistence failures.
    pub async fn record_attempt(
        &self,
        request: PracticeAttempt,
    ) -> Result<RecordOutcome, PracticeError> {
        let session = self.manager.open_session(request.session_id).await?;
        self.lesson_item(session.lesson_id(), request.vocabulary_id)
            .await?;

        let now = self.clock.now();
        let attempt = Attempt {
            key: request.key.unwrap_or_else(AttemptKey::generate),
            session_id: session.id(),
            vocabulary_id: request.vocabulary_id,
            question_kind: request.question_kind,
            user_answer: request.user_answer,
            correct_answer: request.correct_answer,
            is_correct: request.is_correct,
            time_spent_secs: request.time_spent_secs,
            answered_at: now,
        };

        let prior = self.prior_progress(attempt.vocabulary_id).await?;
        let next = self.updater.apply_attempt(&prior, attempt.is_correct, now);

        match self
            .attempts
            .apply_attempt(self.student_id(), &attempt, &next)
            .await?
        {
            AttemptAppend::Appended => {
                debug!(
                    session_id = %attempt.session_id,
                    vocabulary_id = %attempt.vocabulary_id,
                    kind = %attempt.question_kind,
                    is_correct = attempt.is_correct,
                    mastery_score = next.mastery_score(),
                    status = next.status().as_str(),
                    "attempt recorded"
                );
                Ok(RecordOutcome::Recorded(next))
            }
            AttemptAppend::Duplicate => {
                warn!(key = %attempt.key, "duplicate attempt ignored");
                Ok(RecordOutcome::Duplicate)
            }
        }
    }

    /// Record a flashcard judgment as a `Flashcard` attempt.
    ///
    /// # Errors
    ///
    /// Same as `record_attempt`; additionally `UnknownVocabulary` when the
    /// session belongs to a different lesson than `action.lesson_id`.
    pub async fn record_flashcard(
        &self,
        action: FlashcardAction,
    ) -> Result<RecordOutcome, PracticeError> {
        let session = self.manager.open_session(action.session_id).await?;
        if session.lesson_id() != action.lesson_id {
            warn!(
                session_id = %session.id(),
                lesson_id = %action.lesson_id,
                "flashcard action for a lesson outside the session"
            );
            return Err(PracticeError::UnknownVocabulary {
                vocabulary_id: action.vocabulary_id,
                lesson_id: action.lesson_id,
            });
        }
        let item = self
            .lesson_item(action.lesson_id, action.vocabulary_id)
            .await?;

        self.record_attempt(PracticeAttempt {
            session_id: action.session_id,
            vocabulary_id: action.vocabulary_id,
            question_kind: QuestionKind::Flashcard,
            user_answer: Some(action.action.as_str().to_owned()),
            correct_answer: item.meaning().to_owned(),
            is_correct: action.action.is_known(),
            time_spent_secs: action.time_spent_secs,
            key: action.key,
        })
        .await
    }

    /// Record a pure exposure: `seen_count` and `last_seen_at` only.
    ///
    /// # Errors
    ///
    /// Returns `UnknownVocabulary` if the item is not in `lesson_id`, or
    /// `Storage` for persistence failures.
    pub async fn record_vocab_seen(
        &self,
        vocabulary_id: VocabularyId,
        lesson_id: LessonId,
    ) -> Result<ItemProgress, PracticeError> {
        self.lesson_item(lesson_id, vocabulary_id).await?;

        let prior = self.prior_progress(vocabulary_id).await?;
        let next = self.updater.apply_exposure(&prior, self.clock.now());
        self.progress.upsert_progress(self.student_id(), &next).await?;

        debug!(
            vocabulary_id = %vocabulary_id,
            seen_count = next.seen_count(),
            "vocabulary seen"
        );
        Ok(next)
    }

    async fn prior_progress(
        &self,
        vocabulary_id: VocabularyId,
    ) -> Result<ItemProgress, PracticeError> {
        Ok(self
            .progress
            .get_progress(self.student_id(), vocabulary_id)
            .await?
            .unwrap_or_else(|| ItemProgress::untouched(vocabulary_id)))
    }

    async fn lesson_item(
        &self,
        lesson_id: LessonId,
        vocabulary_id: VocabularyId,
    ) -> Result<VocabularyItem, PracticeError> {
        let items = self.catalog.lesson_vocabulary(lesson_id).await?;
        items
            .into_iter()
            .find(|item| item.id() == vocabulary_id)
            .ok_or_else(|| {
                warn!(
                    vocabulary_id = %vocabulary_id,
                    lesson_id = %lesson_id,
                    "rejected reference outside the lesson"
                );
                PracticeError::UnknownVocabulary {
                    vocabulary_id,
                    lesson_id,
                }
            })
    }
}
