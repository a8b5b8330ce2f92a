use std::collections::HashMap;
use std::sync::Arc;

use practice_core::model::{
    ItemProgress, LessonId, LessonProgressSummary, SessionId, SessionReport, VocabularyId,
    VocabularyItem,
};
use storage::repository::{
    AttemptRepository, ItemProgressRepository, PracticeSessionRepository, VocabularyCatalog,
};

use crate::error::PracticeError;
use crate::sessions::SessionManager;

/// Read-side roll-ups over a student's progress. Nothing here is cached.
#[derive(Clone)]
pub struct ProgressAggregator {
    manager: SessionManager,
    catalog: Arc<dyn VocabularyCatalog>,
    sessions: Arc<dyn PracticeSessionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    progress: Arc<dyn ItemProgressRepository>,
}

impl ProgressAggregator {
    #[must_use]
    pub fn new(
        manager: SessionManager,
        catalog: Arc<dyn VocabularyCatalog>,
        sessions: Arc<dyn PracticeSessionRepository>,
        attempts: Arc<dyn AttemptRepository>,
        progress: Arc<dyn ItemProgressRepository>,
    ) -> Self {
        Self {
            manager,
            catalog,
            sessions,
            attempts,
            progress,
        }
    }

    /// Recompute the lesson summary from the catalog, progress rows and
    /// finished sessions.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` on read failures.
    pub async fn lesson_progress(
        &self,
        lesson_id: LessonId,
    ) -> Result<LessonProgressSummary, PracticeError> {
        let ids = self.lesson_ids(lesson_id).await?;
        let progress = self
            .progress
            .progress_for_items(self.manager.student_id(), &ids)
            .await?;
        let sessions = self
            .sessions
            .finished_sessions_for_lesson(self.manager.student_id(), lesson_id)
            .await?;
        Ok(LessonProgressSummary::compute(&ids, &progress, &sessions))
    }

    /// Progress rows for the lesson's items; untouched items are absent.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` on read failures.
    pub async fn item_progress_map(
        &self,
        lesson_id: LessonId,
    ) -> Result<HashMap<VocabularyId, ItemProgress>, PracticeError> {
        let ids = self.lesson_ids(lesson_id).await?;
        Ok(self
            .progress
            .progress_for_items(self.manager.student_id(), &ids)
            .await?)
    }

    /// Attempt totals for one session, open or finished.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::SessionNotFound` for sessions of other students.
    pub async fn session_report(
        &self,
        session_id: SessionId,
    ) -> Result<SessionReport, PracticeError> {
        let session = self.manager.owned_session(session_id).await?;
        let attempts = self.attempts.attempts_for_session(session_id).await?;
        Ok(SessionReport::from_attempts(&session, &attempts)?)
    }

    async fn lesson_ids(&self, lesson_id: LessonId) -> Result<Vec<VocabularyId>, PracticeError> {
        let items = self.catalog.lesson_vocabulary(lesson_id).await?;
        Ok(items.iter().map(VocabularyItem::id).collect())
    }
}
