use std::collections::HashMap;

use chrono::{DateTime, Utc};
use practice_core::flashcard::{
    FlashcardError, FlashcardPhase, FlashcardReview, FlashcardStep, Judgment, RoundTransition,
};
use practice_core::model::{FinishOutcome, SessionId, VocabularyId, VocabularyItem};
use rand::rngs::StdRng;
use tracing::{debug, info};

use super::DrillSession;
use crate::attempts::{FlashcardAction, RecordOutcome};
use crate::error::PracticeError;

/// Result of judging one card.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashcardOutcome {
    pub step: FlashcardStep,
    pub record: RecordOutcome,
}

/// Binds the flashcard review loop to a practice session.
pub struct FlashcardService {
    base: DrillSession,
    review: FlashcardReview,
    items: HashMap<VocabularyId, VocabularyItem>,
    rng: StdRng,
    card_shown_at: DateTime<Utc>,
}

impl FlashcardService {
    pub(crate) fn new(
        base: DrillSession,
        review: FlashcardReview,
        items: Vec<VocabularyItem>,
        rng: StdRng,
    ) -> Self {
        let card_shown_at = base.now();
        Self {
            base,
            review,
            items: items.into_iter().map(|item| (item.id(), item)).collect(),
            rng,
            card_shown_at,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.base.session().id()
    }

    #[must_use]
    pub fn review(&self) -> &FlashcardReview {
        &self.review
    }

    #[must_use]
    pub fn phase(&self) -> FlashcardPhase {
        self.review.phase()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.review.is_complete()
    }

    /// Card currently face-up, if the review is still running.
    #[must_use]
    pub fn current(&self) -> Option<&VocabularyItem> {
        self.review.current().and_then(|id| self.items.get(&id))
    }

    /// Record the judgment for the current card and advance.
    ///
    /// The attempt is stored before the deck moves, so a storage failure
    /// leaves the same card showing.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError::Complete` once finished, or recorder errors.
    pub async fn judge(&mut self, judgment: Judgment) -> Result<FlashcardOutcome, PracticeError> {
        let id = self.review.current().ok_or(FlashcardError::Complete)?;
        let record = self
            .base
            .recorder()
            .record_flashcard(FlashcardAction {
                vocabulary_id: id,
                lesson_id: self.base.session().lesson_id(),
                action: judgment,
                session_id: self.session_id(),
                time_spent_secs: self.base.secs_since(self.card_shown_at),
                key: None,
            })
            .await?;

        let step = self.review.judge(judgment, &mut self.rng)?;
        self.after_step(&step);
        Ok(FlashcardOutcome { step, record })
    }

    /// Move past the current card without a judgment or attempt.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError::Complete` once finished.
    pub fn skip(&mut self) -> Result<FlashcardStep, PracticeError> {
        let step = self.review.skip(&mut self.rng)?;
        self.after_step(&step);
        Ok(step)
    }

    /// Clear both piles and start a new `MAIN` pass in the same session.
    pub fn restart(&mut self) {
        self.review.restart(&mut self.rng);
        self.card_shown_at = self.base.now();
        debug!(session_id = %self.session_id(), "flashcard review restarted");
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.review.set_shuffle(shuffle);
    }

    /// Serialize the review state so the host can resume after a reload.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Snapshot` if serialization fails.
    pub fn snapshot_json(&self) -> Result<String, PracticeError> {
        Ok(serde_json::to_string(&self.review)?)
    }

    /// Replace the review state with a snapshot taken from this lesson.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Snapshot` for malformed input and
    /// `UnknownVocabulary` if it names items outside the lesson.
    pub fn restore_snapshot(&mut self, json: &str) -> Result<(), PracticeError> {
        let review: FlashcardReview = serde_json::from_str(json)?;
        let lesson_id = self.base.session().lesson_id();
        let foreign = review
            .items()
            .iter()
            .chain(review.round_items())
            .chain(review.known())
            .chain(review.unknown())
            .find(|id| !self.items.contains_key(*id));
        if let Some(&vocabulary_id) = foreign {
            return Err(PracticeError::UnknownVocabulary {
                vocabulary_id,
                lesson_id,
            });
        }
        self.review = review;
        self.card_shown_at = self.base.now();
        Ok(())
    }

    pub fn pause(&mut self) {
        self.base.pause();
    }

    pub fn resume(&mut self) {
        self.base.resume();
    }

    /// Close the flashcard session with its active time.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` if the session cannot be closed.
    pub async fn finish(&mut self) -> Result<FinishOutcome, PracticeError> {
        self.base.finish().await
    }

    fn after_step(&mut self, step: &FlashcardStep) {
        self.card_shown_at = self.base.now();
        match &step.transition {
            Some(RoundTransition::Review { round, items }) => {
                info!(
                    session_id = %self.session_id(),
                    round,
                    unknown = items.len(),
                    "flashcard review round"
                );
            }
            Some(RoundTransition::Complete) => {
                info!(
                    session_id = %self.session_id(),
                    known = self.review.known().len(),
                    unknown = self.review.unknown().len(),
                    "flashcard review complete"
                );
            }
            None => {}
        }
    }
}
