use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::VocabularyId;
use crate::model::session::PracticeSession;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unknown mastery status: {0}")]
    UnknownStatus(String),

    #[error("mastery score must be within [0, 1], got {0}")]
    ScoreOutOfRange(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Three-tier label shown next to every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MasteryStatus {
    #[default]
    New,
    Learning,
    Mastered,
}

impl MasteryStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MasteryStatus::New => "new",
            MasteryStatus::Learning => "learning",
            MasteryStatus::Mastered => "mastered",
        }
    }
}

impl fmt::Display for MasteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MasteryStatus {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "new" => Ok(MasteryStatus::New),
            "learning" => Ok(MasteryStatus::Learning),
            "mastered" => Ok(MasteryStatus::Mastered),
            other => Err(ProgressError::UnknownStatus(other.to_owned())),
        }
    }
}

//
// ─── ITEM PROGRESS ─────────────────────────────────────────────────────────────
//

/// Per-student progress on one vocabulary item.
///
/// Fields are only written by `mastery::MasteryUpdater`; everything else reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProgress {
    pub(crate) vocabulary_id: VocabularyId,
    pub(crate) seen_count: u32,
    pub(crate) correct_count: u32,
    pub(crate) wrong_count: u32,
    pub(crate) mastery_score: f64,
    pub(crate) status: MasteryStatus,
    pub(crate) last_seen_at: Option<DateTime<Utc>>,
}

impl ItemProgress {
    /// Pre-creation default: nothing seen, score 0, status `New`.
    #[must_use]
    pub fn untouched(vocabulary_id: VocabularyId) -> Self {
        Self {
            vocabulary_id,
            seen_count: 0,
            correct_count: 0,
            wrong_count: 0,
            mastery_score: 0.0,
            status: MasteryStatus::New,
            last_seen_at: None,
        }
    }

    /// Rehydrate progress from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ScoreOutOfRange` for scores outside `[0, 1]` or NaN.
    pub fn from_persisted(
        vocabulary_id: VocabularyId,
        seen_count: u32,
        correct_count: u32,
        wrong_count: u32,
        mastery_score: f64,
        status: MasteryStatus,
        last_seen_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ProgressError> {
        if !(0.0..=1.0).contains(&mastery_score) {
            return Err(ProgressError::ScoreOutOfRange(mastery_score.to_string()));
        }
        Ok(Self {
            vocabulary_id,
            seen_count,
            correct_count,
            wrong_count,
            mastery_score,
            status,
            last_seen_at,
        })
    }

    #[must_use]
    pub fn vocabulary_id(&self) -> VocabularyId {
        self.vocabulary_id
    }

    #[must_use]
    pub fn seen_count(&self) -> u32 {
        self.seen_count
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn wrong_count(&self) -> u32 {
        self.wrong_count
    }

    #[must_use]
    pub fn mastery_score(&self) -> f64 {
        self.mastery_score
    }

    #[must_use]
    pub fn status(&self) -> MasteryStatus {
        self.status
    }

    #[must_use]
    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_seen_at
    }
}

//
// ─── LESSON SUMMARY ────────────────────────────────────────────────────────────
//

/// Lesson-level roll-up consumed by the progress rings. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonProgressSummary {
    pub learned_count: u32,
    pub mastered_count: u32,
    pub total_time_secs: u64,
    pub mastery_percent: f64,
}

impl LessonProgressSummary {
    /// Join the lesson's item ids against the progress map and sum finished
    /// session durations. Open sessions contribute nothing; items without a
    /// progress row count as score 0.
    #[must_use]
    pub fn compute(
        lesson_items: &[VocabularyId],
        progress: &HashMap<VocabularyId, ItemProgress>,
        sessions: &[PracticeSession],
    ) -> Self {
        let mut learned = 0_u32;
        let mut mastered = 0_u32;
        let mut score_sum = 0.0_f64;

        for id in lesson_items {
            let Some(item) = progress.get(id) else {
                continue;
            };
            if item.seen_count > 0 {
                learned = learned.saturating_add(1);
            }
            if item.status == MasteryStatus::Mastered {
                mastered = mastered.saturating_add(1);
            }
            score_sum += item.mastery_score;
        }

        let total_time_secs = sessions
            .iter()
            .filter(|s| s.is_finished())
            .map(|s| u64::from(s.duration_secs()))
            .sum();

        // Lesson sizes are far below f64's exact integer range.
        #[allow(clippy::cast_precision_loss)]
        let mastery_percent = if lesson_items.is_empty() {
            0.0
        } else {
            score_sum / lesson_items.len() as f64 * 100.0
        };

        Self {
            learned_count: learned,
            mastered_count: mastered,
            total_time_secs,
            mastery_percent,
        }
    }
}
