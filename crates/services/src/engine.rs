use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use practice_core::Clock;
use practice_core::flashcard::FlashcardReview;
use practice_core::mastery::MasteryUpdater;
use practice_core::model::{
    FinishOutcome, ItemProgress, LessonId, LessonProgressSummary, Modality, SessionId,
    SessionReport, StudentId, VocabularyId, VocabularyItem,
};
use practice_core::questions::{CjkGlyphs, GlyphSupport, QuestionGenerator, QuestionSet, Readiness};
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::{Storage, VocabularyCatalog};
use tracing::info;

use crate::attempts::{AttemptRecorder, FlashcardAction, PracticeAttempt, RecordOutcome};
use crate::config::EngineConfig;
use crate::drills::{DrillSession, FlashcardService, LookupBrowser, OpenedDrill, QuestionDrill};
use crate::error::PracticeError;
use crate::progress::ProgressAggregator;
use crate::sessions::SessionManager;

/// Entry point for a host shell driving practice for one student.
#[derive(Clone)]
pub struct PracticeEngine {
    clock: Clock,
    config: EngineConfig,
    catalog: Arc<dyn VocabularyCatalog>,
    manager: SessionManager,
    recorder: AttemptRecorder,
    aggregator: ProgressAggregator,
    glyphs: Arc<dyn GlyphSupport + Send + Sync>,
    seed: Option<u64>,
    draws: Arc<AtomicU64>,
}

impl PracticeEngine {
    #[must_use]
    pub fn new(student_id: StudentId, storage: &Storage, config: EngineConfig) -> Self {
        let manager = SessionManager::new(student_id, Arc::clone(&storage.sessions));
        let recorder = AttemptRecorder::new(
            manager.clone(),
            Arc::clone(&storage.vocabulary),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.progress),
        )
        .with_updater(MasteryUpdater::new(config.mastery));
        let aggregator = ProgressAggregator::new(
            manager.clone(),
            Arc::clone(&storage.vocabulary),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.progress),
        );
        Self {
            clock: Clock::default(),
            config,
            catalog: Arc::clone(&storage.vocabulary),
            manager,
            recorder,
            aggregator,
            glyphs: Arc::new(CjkGlyphs),
            seed: None,
            draws: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Use `clock` for session stamps, attempt times and drill timing.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.manager = self.manager.with_clock(clock);
        self.recorder = self.recorder.with_clock(clock);
        self
    }

    /// Replace the renderability check of the stroke widget.
    #[must_use]
    pub fn with_glyphs(mut self, glyphs: Arc<dyn GlyphSupport + Send + Sync>) -> Self {
        self.glyphs = glyphs;
        self
    }

    /// Make every shuffle reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.manager.student_id()
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    //
    // ─── SESSIONS ──────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `PracticeError::Storage` if the session cannot be stored.
    pub async fn start_practice_session(
        &self,
        lesson_id: LessonId,
        modality: Modality,
    ) -> Result<SessionId, PracticeError> {
        Ok(self.manager.start_session(lesson_id, modality).await?.id())
    }

    /// Idempotent: a second call keeps the first duration.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::SessionNotFound` for unknown sessions.
    pub async fn finish_practice_session(
        &self,
        session_id: SessionId,
        duration_secs: u32,
    ) -> Result<FinishOutcome, PracticeError> {
        self.manager.finish_session(session_id, duration_secs).await
    }

    /// Cancel the session's timers when the host leaves the modality.
    pub fn leave_session(&self, session_id: SessionId) {
        self.manager.leave_session(session_id);
    }

    //
    // ─── QUESTIONS & RECORDING ─────────────────────────────────────────────────
    //

    /// Build a fresh, reshuffled question set. No side effects.
    #[must_use]
    pub fn generate_questions(&self, items: &[VocabularyItem], modality: Modality) -> QuestionSet {
        let mut rng = self.rng();
        QuestionGenerator::new(&*self.glyphs).generate(items, modality, &mut rng)
    }

    /// # Errors
    ///
    /// See `AttemptRecorder::record_attempt`.
    pub async fn record_practice_attempt(
        &self,
        attempt: PracticeAttempt,
    ) -> Result<RecordOutcome, PracticeError> {
        self.recorder.record_attempt(attempt).await
    }

    /// # Errors
    ///
    /// See `AttemptRecorder::record_flashcard`.
    pub async fn record_flashcard_action(
        &self,
        action: FlashcardAction,
    ) -> Result<RecordOutcome, PracticeError> {
        self.recorder.record_flashcard(action).await
    }

    /// # Errors
    ///
    /// Returns `UnknownVocabulary` for items outside `lesson_id`.
    pub async fn record_vocab_seen(
        &self,
        vocabulary_id: VocabularyId,
        lesson_id: LessonId,
    ) -> Result<ItemProgress, PracticeError> {
        self.recorder.record_vocab_seen(vocabulary_id, lesson_id).await
    }

    //
    // ─── PROGRESS ──────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `PracticeError::Storage` on read failures.
    pub async fn get_lesson_progress(
        &self,
        lesson_id: LessonId,
    ) -> Result<LessonProgressSummary, PracticeError> {
        self.aggregator.lesson_progress(lesson_id).await
    }

    /// # Errors
    ///
    /// Returns `PracticeError::Storage` on read failures.
    pub async fn get_item_progress_map(
        &self,
        lesson_id: LessonId,
    ) -> Result<HashMap<VocabularyId, ItemProgress>, PracticeError> {
        self.aggregator.item_progress_map(lesson_id).await
    }

    /// # Errors
    ///
    /// Returns `PracticeError::SessionNotFound` for unknown sessions.
    pub async fn session_report(&self, session_id: SessionId) -> Result<SessionReport, PracticeError> {
        self.aggregator.session_report(session_id).await
    }

    /// # Errors
    ///
    /// Returns `PracticeError::Storage` on read failures.
    pub async fn lesson_vocabulary(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<VocabularyItem>, PracticeError> {
        Ok(self.catalog.lesson_vocabulary(lesson_id).await?)
    }

    //
    // ─── DRILLS ────────────────────────────────────────────────────────────────
    //

    /// Start a lookup session and show the first item.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::EmptyLesson` if the lesson has no items.
    pub async fn open_lookup(&self, lesson_id: LessonId) -> Result<LookupBrowser, PracticeError> {
        let items = self.non_empty_lesson(lesson_id).await?;
        let base = self.drill_session(lesson_id, Modality::Lookup).await?;
        LookupBrowser::open(base, items).await
    }

    /// Start a flashcard session over the whole lesson.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::EmptyLesson` if the lesson has no items.
    pub async fn open_flashcards(
        &self,
        lesson_id: LessonId,
    ) -> Result<FlashcardService, PracticeError> {
        let items = self.non_empty_lesson(lesson_id).await?;
        let mut rng = self.rng();
        let review = FlashcardReview::new(
            items.iter().map(VocabularyItem::id),
            self.config.shuffle_flashcards,
            &mut rng,
        )?;
        let base = self.drill_session(lesson_id, Modality::Flashcard).await?;
        Ok(FlashcardService::new(base, review, items, rng))
    }

    /// Generate questions for `modality` and, if there are any, start a
    /// session to ask them in.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::NotADrill` for lookup and flashcard.
    pub async fn open_drill(
        &self,
        lesson_id: LessonId,
        modality: Modality,
    ) -> Result<OpenedDrill, PracticeError> {
        if !modality.uses_questions() {
            return Err(PracticeError::NotADrill { modality });
        }
        let items = self.lesson_vocabulary(lesson_id).await?;
        let questions = self.generate_questions(&items, modality);
        if let Readiness::NotEnoughVocabulary { eligible, required } = questions.readiness() {
            info!(
                lesson_id = %lesson_id,
                %modality,
                eligible,
                "not enough vocabulary for drill"
            );
            return Ok(OpenedDrill::NotEnoughVocabulary { eligible, required });
        }

        let base = self.drill_session(lesson_id, modality).await?;
        Ok(OpenedDrill::Ready(QuestionDrill::new(
            base,
            items,
            questions,
            self.config.stroke_mistake_allowance,
            self.config.auto_advance(),
        )))
    }

    async fn non_empty_lesson(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<VocabularyItem>, PracticeError> {
        let items = self.lesson_vocabulary(lesson_id).await?;
        if items.is_empty() {
            return Err(PracticeError::EmptyLesson(lesson_id));
        }
        Ok(items)
    }

    async fn drill_session(
        &self,
        lesson_id: LessonId,
        modality: Modality,
    ) -> Result<DrillSession, PracticeError> {
        let session = self.manager.start_session(lesson_id, modality).await?;
        Ok(DrillSession::new(
            self.clock,
            self.manager.clone(),
            self.recorder.clone(),
            session,
        ))
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => {
                let n = self.draws.fetch_add(1, Ordering::Relaxed);
                StdRng::seed_from_u64(seed.wrapping_add(n))
            }
            None => StdRng::from_os_rng(),
        }
    }
}
