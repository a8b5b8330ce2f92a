use std::collections::HashSet;

use practice_core::model::{FinishOutcome, SessionId, VocabularyId, VocabularyItem};

use super::DrillSession;
use crate::error::PracticeError;

/// Browses a lesson's items one at a time.
///
/// The first view of each item in a browse is recorded as an exposure; going
/// back and forth does not inflate `seen_count`.
pub struct LookupBrowser {
    base: DrillSession,
    items: Vec<VocabularyItem>,
    cursor: usize,
    viewed: HashSet<VocabularyId>,
}

impl LookupBrowser {
    pub(crate) async fn open(
        base: DrillSession,
        items: Vec<VocabularyItem>,
    ) -> Result<Self, PracticeError> {
        let mut browser = Self {
            base,
            items,
            cursor: 0,
            viewed: HashSet::new(),
        };
        browser.mark_viewed().await?;
        Ok(browser)
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.base.session().id()
    }

    #[must_use]
    pub fn items(&self) -> &[VocabularyItem] {
        &self.items
    }

    #[must_use]
    pub fn current(&self) -> Option<&VocabularyItem> {
        self.items.get(self.cursor)
    }

    /// `(index of current item, items in lesson)`.
    #[must_use]
    pub fn position(&self) -> (usize, usize) {
        (self.cursor, self.items.len())
    }

    #[must_use]
    pub fn viewed_count(&self) -> usize {
        self.viewed.len()
    }

    /// Move to the next item; stays on the last one at the end.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError` if the exposure cannot be recorded.
    pub async fn next(&mut self) -> Result<Option<&VocabularyItem>, PracticeError> {
        let target = (self.cursor + 1).min(self.items.len().saturating_sub(1));
        self.show(target).await
    }

    /// # Errors
    ///
    /// Returns `PracticeError` if the exposure cannot be recorded.
    pub async fn previous(&mut self) -> Result<Option<&VocabularyItem>, PracticeError> {
        self.show(self.cursor.saturating_sub(1)).await
    }

    /// Jump to `index`; out-of-range indexes leave the cursor alone.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError` if the exposure cannot be recorded.
    pub async fn show(&mut self, index: usize) -> Result<Option<&VocabularyItem>, PracticeError> {
        if index < self.items.len() {
            self.cursor = index;
            self.mark_viewed().await?;
        }
        Ok(self.current())
    }

    pub fn pause(&mut self) {
        self.base.pause();
    }

    pub fn resume(&mut self) {
        self.base.resume();
    }

    /// Close the lookup session with its active time.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` if the session cannot be closed.
    pub async fn finish(&mut self) -> Result<FinishOutcome, PracticeError> {
        self.base.finish().await
    }

    async fn mark_viewed(&mut self) -> Result<(), PracticeError> {
        let Some(item) = self.items.get(self.cursor) else {
            return Ok(());
        };
        if self.viewed.contains(&item.id()) {
            return Ok(());
        }
        self.base
            .recorder()
            .record_vocab_seen(item.id(), item.lesson_id())
            .await?;
        self.viewed.insert(item.id());
        Ok(())
    }
}
