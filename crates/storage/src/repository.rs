use async_trait::async_trait;
use chrono::{DateTime, Utc};
use practice_core::model::{
    Attempt, AttemptKey, FinishOutcome, ItemProgress, LessonId, Modality, PracticeSession,
    SessionId, StudentId, VocabularyId, VocabularyItem,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Fields needed to open a session; the adapter assigns the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewPracticeSession {
    pub student_id: StudentId,
    pub lesson_id: LessonId,
    pub modality: Modality,
    pub started_at: DateTime<Utc>,
}

/// Whether an attempt was stored or absorbed as a retry of an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptAppend {
    Appended,
    Duplicate,
}

/// Read side of the external lesson catalog, plus the upsert used for seeding.
#[async_trait]
pub trait VocabularyCatalog: Send + Sync {
    /// Items of a lesson in catalog order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn lesson_vocabulary(&self, lesson_id: LessonId)
    -> Result<Vec<VocabularyItem>, StorageError>;

    /// Insert or replace an item at `position` within its lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the item cannot be stored.
    async fn upsert_vocabulary(
        &self,
        item: &VocabularyItem,
        position: u32,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait PracticeSessionRepository: Send + Sync {
    /// Persist a new open session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn create_session(
        &self,
        session: NewPracticeSession,
    ) -> Result<PracticeSession, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_session(&self, id: SessionId) -> Result<Option<PracticeSession>, StorageError>;

    /// Close a session unless it is already closed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown ids.
    async fn finish_session(
        &self,
        id: SessionId,
        finished_at: DateTime<Utc>,
        duration_secs: u32,
    ) -> Result<FinishOutcome, StorageError>;

    /// Closed sessions of a student for one lesson, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn finished_sessions_for_lesson(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<Vec<PracticeSession>, StorageError>;
}

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Atomically append `attempt` and store the progress it produced.
    ///
    /// An attempt whose key was already stored leaves both tables untouched
    /// and reports `AttemptAppend::Duplicate`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the progress row does not belong
    /// to the attempt's item, or other storage errors.
    async fn apply_attempt(
        &self,
        student_id: StudentId,
        attempt: &Attempt,
        progress: &ItemProgress,
    ) -> Result<AttemptAppend, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn attempts_for_session(&self, session_id: SessionId)
    -> Result<Vec<Attempt>, StorageError>;
}

#[async_trait]
pub trait ItemProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_progress(
        &self,
        student_id: StudentId,
        vocabulary_id: VocabularyId,
    ) -> Result<Option<ItemProgress>, StorageError>;

    /// Progress rows that exist for the given items; missing ones are omitted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn progress_for_items(
        &self,
        student_id: StudentId,
        ids: &[VocabularyId],
    ) -> Result<HashMap<VocabularyId, ItemProgress>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn upsert_progress(
        &self,
        student_id: StudentId,
        progress: &ItemProgress,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct AttemptLog {
    keys: HashSet<AttemptKey>,
    rows: Vec<Attempt>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    vocabulary: Arc<Mutex<HashMap<VocabularyId, (u32, VocabularyItem)>>>,
    sessions: Arc<Mutex<HashMap<SessionId, PracticeSession>>>,
    attempts: Arc<Mutex<AttemptLog>>,
    progress: Arc<Mutex<HashMap<(StudentId, VocabularyId), ItemProgress>>>,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    m.lock().map_err(|e| StorageError::Connection(e.to_string()))
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VocabularyCatalog for InMemoryRepository {
    async fn lesson_vocabulary(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<VocabularyItem>, StorageError> {
        let guard = lock(&self.vocabulary)?;
        let mut items: Vec<_> = guard
            .values()
            .filter(|(_, item)| item.lesson_id() == lesson_id)
            .cloned()
            .collect();
        items.sort_by_key(|(position, item)| (*position, item.id()));
        Ok(items.into_iter().map(|(_, item)| item).collect())
    }

    async fn upsert_vocabulary(
        &self,
        item: &VocabularyItem,
        position: u32,
    ) -> Result<(), StorageError> {
        lock(&self.vocabulary)?.insert(item.id(), (position, item.clone()));
        Ok(())
    }
}

#[async_trait]
impl PracticeSessionRepository for InMemoryRepository {
    async fn create_session(
        &self,
        session: NewPracticeSession,
    ) -> Result<PracticeSession, StorageError> {
        let mut guard = lock(&self.sessions)?;
        let next_id = guard.keys().map(SessionId::value).max().unwrap_or(0) + 1;
        let created = PracticeSession::start(
            SessionId::new(next_id),
            session.student_id,
            session.lesson_id,
            session.modality,
            session.started_at,
        );
        guard.insert(created.id(), created.clone());
        Ok(created)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<PracticeSession>, StorageError> {
        Ok(lock(&self.sessions)?.get(&id).cloned())
    }

    async fn finish_session(
        &self,
        id: SessionId,
        finished_at: DateTime<Utc>,
        duration_secs: u32,
    ) -> Result<FinishOutcome, StorageError> {
        let mut guard = lock(&self.sessions)?;
        let session = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        Ok(session.finish(finished_at, duration_secs))
    }

    async fn finished_sessions_for_lesson(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<Vec<PracticeSession>, StorageError> {
        let guard = lock(&self.sessions)?;
        let mut out: Vec<_> = guard
            .values()
            .filter(|s| {
                s.student_id() == student_id && s.lesson_id() == lesson_id && s.is_finished()
            })
            .cloned()
            .collect();
        out.sort_by_key(|s| (s.started_at(), s.id()));
        Ok(out)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn apply_attempt(
        &self,
        student_id: StudentId,
        attempt: &Attempt,
        progress: &ItemProgress,
    ) -> Result<AttemptAppend, StorageError> {
        if progress.vocabulary_id() != attempt.vocabulary_id {
            return Err(StorageError::Conflict);
        }
        // Lock order: attempts, then progress.
        let mut log = lock(&self.attempts)?;
        let mut rows = lock(&self.progress)?;
        if !log.keys.insert(attempt.key) {
            return Ok(AttemptAppend::Duplicate);
        }
        log.rows.push(attempt.clone());
        rows.insert((student_id, progress.vocabulary_id()), progress.clone());
        Ok(AttemptAppend::Appended)
    }

    async fn attempts_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Attempt>, StorageError> {
        let log = lock(&self.attempts)?;
        Ok(log
            .rows
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ItemProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        student_id: StudentId,
        vocabulary_id: VocabularyId,
    ) -> Result<Option<ItemProgress>, StorageError> {
        Ok(lock(&self.progress)?
            .get(&(student_id, vocabulary_id))
            .cloned())
    }

    async fn progress_for_items(
        &self,
        student_id: StudentId,
        ids: &[VocabularyId],
    ) -> Result<HashMap<VocabularyId, ItemProgress>, StorageError> {
        let guard = lock(&self.progress)?;
        Ok(ids
            .iter()
            .filter_map(|id| guard.get(&(student_id, *id)).map(|p| (*id, p.clone())))
            .collect())
    }

    async fn upsert_progress(
        &self,
        student_id: StudentId,
        progress: &ItemProgress,
    ) -> Result<(), StorageError> {
        lock(&self.progress)?.insert((student_id, progress.vocabulary_id()), progress.clone());
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub vocabulary: Arc<dyn VocabularyCatalog>,
    pub sessions: Arc<dyn PracticeSessionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub progress: Arc<dyn ItemProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Use one adapter for every repository.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: VocabularyCatalog
            + PracticeSessionRepository
            + AttemptRepository
            + ItemProgressRepository
            + Clone
            + 'static,
    {
        Self {
            vocabulary: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            progress: Arc::new(repo),
        }
    }
}
