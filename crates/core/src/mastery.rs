use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ItemProgress, MasteryStatus};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum MasteryConfigError {
    #[error("correct gain must be in (0, 1], got {provided}")]
    InvalidCorrectGain { provided: f64 },
    #[error("wrong decay must be in (0, 1], got {provided}")]
    InvalidWrongDecay { provided: f64 },
    #[error("mastered threshold must be in (0, 1], got {provided}")]
    InvalidThreshold { provided: f64 },
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Tunable constants of the mastery transition.
///
/// The defaults reproduce the percentage rings and status chips of the
/// portal; they are expected to be re-tuned against real usage data.
///
/// # Examples
///
/// ```
/// # use practice_core::mastery::MasteryConfig;
/// let config = MasteryConfig::new(0.25, 0.5, 0.85, 4)?;
/// assert_eq!(config.mastered_min_seen(), 4);
/// # Ok::<(), practice_core::mastery::MasteryConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MasteryConfig {
    correct_gain: f64,
    wrong_decay: f64,
    mastered_threshold: f64,
    mastered_min_seen: u32,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            correct_gain: 0.3,
            wrong_decay: 0.5,
            mastered_threshold: 0.8,
            mastered_min_seen: 3,
        }
    }
}

impl MasteryConfig {
    /// # Errors
    ///
    /// Returns a `MasteryConfigError` for any fraction outside `(0, 1]`.
    pub fn new(
        correct_gain: f64,
        wrong_decay: f64,
        mastered_threshold: f64,
        mastered_min_seen: u32,
    ) -> Result<Self, MasteryConfigError> {
        if !in_unit_interval(correct_gain) {
            return Err(MasteryConfigError::InvalidCorrectGain {
                provided: correct_gain,
            });
        }
        if !in_unit_interval(wrong_decay) {
            return Err(MasteryConfigError::InvalidWrongDecay {
                provided: wrong_decay,
            });
        }
        if !in_unit_interval(mastered_threshold) {
            return Err(MasteryConfigError::InvalidThreshold {
                provided: mastered_threshold,
            });
        }
        Ok(Self {
            correct_gain,
            wrong_decay,
            mastered_threshold,
            mastered_min_seen,
        })
    }

    #[must_use]
    pub fn correct_gain(&self) -> f64 {
        self.correct_gain
    }

    #[must_use]
    pub fn wrong_decay(&self) -> f64 {
        self.wrong_decay
    }

    #[must_use]
    pub fn mastered_threshold(&self) -> f64 {
        self.mastered_threshold
    }

    #[must_use]
    pub fn mastered_min_seen(&self) -> u32 {
        self.mastered_min_seen
    }

    /// Status as a function of score and exposure count.
    #[must_use]
    pub fn status_for(&self, mastery_score: f64, seen_count: u32) -> MasteryStatus {
        if seen_count == 0 {
            MasteryStatus::New
        } else if mastery_score >= self.mastered_threshold && seen_count >= self.mastered_min_seen
        {
            MasteryStatus::Mastered
        } else {
            MasteryStatus::Learning
        }
    }
}

fn in_unit_interval(v: f64) -> bool {
    v > 0.0 && v <= 1.0
}

//
// ─── UPDATER ───────────────────────────────────────────────────────────────────
//

/// Pure transition from prior item progress to the next one.
///
/// # Examples
///
/// ```
/// # use practice_core::mastery::MasteryUpdater;
/// # use practice_core::model::{ItemProgress, MasteryStatus, VocabularyId};
/// let updater = MasteryUpdater::default();
/// let now = chrono::Utc::now();
/// let prior = ItemProgress::untouched(VocabularyId::new(1));
///
/// let next = updater.apply_attempt(&prior, true, now);
/// assert!((next.mastery_score() - 0.3).abs() < 1e-9);
/// assert_eq!(next.status(), MasteryStatus::Learning);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MasteryUpdater {
    config: MasteryConfig,
}

impl MasteryUpdater {
    #[must_use]
    pub fn new(config: MasteryConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &MasteryConfig {
        &self.config
    }

    /// Apply one evaluated attempt.
    ///
    /// A correct answer closes `correct_gain` of the gap to 1; a wrong answer
    /// removes `wrong_decay` of the current score.
    #[must_use]
    pub fn apply_attempt(
        &self,
        prior: &ItemProgress,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> ItemProgress {
        let mut next = prior.clone();
        next.seen_count = next.seen_count.saturating_add(1);
        next.last_seen_at = Some(at);

        let score = prior.mastery_score.clamp(0.0, 1.0);
        next.mastery_score = if is_correct {
            next.correct_count = next.correct_count.saturating_add(1);
            let raised = score + (1.0 - score) * self.config.correct_gain;
            // Gap below f64 resolution: a correct answer must still count.
            if raised <= score && score < 1.0 {
                1.0
            } else {
                raised
            }
        } else {
            next.wrong_count = next.wrong_count.saturating_add(1);
            let lowered = score - score * self.config.wrong_decay;
            if lowered >= score && score > 0.0 {
                0.0
            } else {
                lowered
            }
        }
        .clamp(0.0, 1.0);

        next.status = self.config.status_for(next.mastery_score, next.seen_count);
        next
    }

    /// Record a pure exposure (lookup view): counts and timestamp only.
    #[must_use]
    pub fn apply_exposure(&self, prior: &ItemProgress, at: DateTime<Utc>) -> ItemProgress {
        let mut next = prior.clone();
        next.seen_count = next.seen_count.saturating_add(1);
        next.last_seen_at = Some(at);
        next.status = self.config.status_for(next.mastery_score, next.seen_count);
        next
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VocabularyId;
    use crate::time::fixed_now;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn fresh() -> ItemProgress {
        ItemProgress::untouched(VocabularyId::new(1))
    }

    fn with_score(score: f64, seen: u32) -> ItemProgress {
        ItemProgress::from_persisted(
            VocabularyId::new(1),
            seen,
            seen,
            0,
            score,
            MasteryStatus::Learning,
            None,
        )
        .unwrap()
    }

    #[test]
    fn config_rejects_out_of_range_values() {
        assert!(matches!(
            MasteryConfig::new(0.0, 0.5, 0.8, 3),
            Err(MasteryConfigError::InvalidCorrectGain { .. })
        ));
        assert!(matches!(
            MasteryConfig::new(0.3, 1.5, 0.8, 3),
            Err(MasteryConfigError::InvalidWrongDecay { .. })
        ));
        assert!(matches!(
            MasteryConfig::new(0.3, 0.5, f64::NAN, 3),
            Err(MasteryConfigError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn correct_attempt_updates_counts_and_score() {
        let next = MasteryUpdater::default().apply_attempt(&fresh(), true, fixed_now());
        assert_eq!(next.seen_count(), 1);
        assert_eq!(next.correct_count(), 1);
        assert_eq!(next.wrong_count(), 0);
        assert!((next.mastery_score() - 0.3).abs() < 1e-12);
        assert_eq!(next.last_seen_at(), Some(fixed_now()));
        assert_eq!(next.status(), MasteryStatus::Learning);
    }

    #[test]
    fn wrong_attempt_halves_score() {
        let next = MasteryUpdater::default().apply_attempt(&with_score(0.6, 2), false, fixed_now());
        assert!((next.mastery_score() - 0.3).abs() < 1e-12);
        assert_eq!(next.wrong_count(), 1);
        assert_eq!(next.seen_count(), 3);
    }

    #[test]
    fn five_correct_answers_reach_mastered() {
        let updater = MasteryUpdater::default();
        let mut p = fresh();
        for _ in 0..4 {
            p = updater.apply_attempt(&p, true, fixed_now());
        }
        // 1 - 0.7^4 = 0.7599
        assert_eq!(p.status(), MasteryStatus::Learning);
        p = updater.apply_attempt(&p, true, fixed_now());
        assert_eq!(p.status(), MasteryStatus::Mastered);
    }

    #[test]
    fn high_score_needs_minimum_exposures() {
        let updater = MasteryUpdater::new(MasteryConfig::new(1.0, 0.5, 0.8, 3).unwrap());
        let p = updater.apply_attempt(&fresh(), true, fixed_now());
        assert_eq!(p.mastery_score(), 1.0);
        assert_eq!(p.status(), MasteryStatus::Learning);
    }

    #[test]
    fn scores_move_strictly_at_the_edges() {
        let updater = MasteryUpdater::default();
        let almost_one = 1.0 - f64::EPSILON / 2.0;
        let up = updater.apply_attempt(&with_score(almost_one, 1), true, fixed_now());
        assert!(up.mastery_score() > almost_one);

        let tiny = f64::from_bits(1);
        let down = updater.apply_attempt(&with_score(tiny, 1), false, fixed_now());
        assert!(down.mastery_score() < tiny);

        let floor = updater.apply_attempt(&with_score(0.0, 1), false, fixed_now());
        assert_eq!(floor.mastery_score(), 0.0);
        let ceiling = updater.apply_attempt(&with_score(1.0, 1), true, fixed_now());
        assert_eq!(ceiling.mastery_score(), 1.0);
    }

    #[test]
    fn random_sequences_keep_invariants() {
        let updater = MasteryUpdater::default();
        let config = *updater.config();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let mut p = fresh();
            for _ in 0..40 {
                let before = p.mastery_score();
                if rng.random_bool(0.2) {
                    p = updater.apply_exposure(&p, fixed_now());
                    assert_eq!(p.mastery_score(), before);
                } else {
                    let ok = rng.random_bool(0.6);
                    p = updater.apply_attempt(&p, ok, fixed_now());
                    if ok && before < 1.0 {
                        assert!(p.mastery_score() > before);
                    }
                    if !ok && before > 0.0 {
                        assert!(p.mastery_score() < before);
                    }
                }
                assert!((0.0..=1.0).contains(&p.mastery_score()));
                assert_eq!(
                    p.status() == MasteryStatus::Mastered,
                    p.mastery_score() >= config.mastered_threshold()
                        && p.seen_count() >= config.mastered_min_seen()
                );
                assert!(p.seen_count() >= p.correct_count() + p.wrong_count());
            }
        }
    }

    #[test]
    fn exposure_leaves_evaluation_fields_alone() {
        let prior = with_score(0.42, 2);
        let next = MasteryUpdater::default().apply_exposure(&prior, fixed_now());
        assert_eq!(next.seen_count(), 3);
        assert_eq!(next.correct_count(), prior.correct_count());
        assert_eq!(next.wrong_count(), prior.wrong_count());
        assert_eq!(next.mastery_score(), prior.mastery_score());
    }
}
