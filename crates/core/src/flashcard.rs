use std::collections::{BTreeSet, HashSet};
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::VocabularyId;
use crate::shuffle::shuffled;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FlashcardError {
    #[error("no vocabulary to review")]
    Empty,
    #[error("flashcard review already complete")]
    Complete,
}

//
// ─── JUDGMENT ──────────────────────────────────────────────────────────────────
//

/// The student's verdict after flipping a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Judgment {
    /// Known.
    Easy,
    /// Unknown.
    Hard,
}

impl Judgment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Judgment::Easy => "easy",
            Judgment::Hard => "hard",
        }
    }

    #[must_use]
    pub fn is_known(self) -> bool {
        self == Judgment::Easy
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashcardPhase {
    Main,
    ReviewUnknown,
    Complete,
}

/// What happened to the round structure after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundTransition {
    /// A review round over `items` begins.
    Review { round: u32, items: Vec<VocabularyId> },
    Complete,
}

/// Outcome of judging or skipping the current card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardStep {
    pub vocabulary_id: VocabularyId,
    pub judgment: Option<Judgment>,
    pub transition: Option<RoundTransition>,
}

/// Round-based flashcard loop: one MAIN pass over the lesson, then review
/// rounds over the cards still marked unknown until none remain or a round
/// makes no progress.
///
/// All fields serialize so a host can persist and resume a deck mid-round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardReview {
    items: Vec<VocabularyId>,
    shuffle: bool,
    phase: FlashcardPhase,
    round: u32,
    round_items: Vec<VocabularyId>,
    cursor: usize,
    known: BTreeSet<VocabularyId>,
    unknown: BTreeSet<VocabularyId>,
}

impl FlashcardReview {
    /// Start in `MAIN` over `items`. Repeated ids are kept once.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError::Empty` if there is nothing to review.
    pub fn new<R: Rng + ?Sized>(
        items: impl IntoIterator<Item = VocabularyId>,
        shuffle: bool,
        rng: &mut R,
    ) -> Result<Self, FlashcardError> {
        let mut seen = HashSet::new();
        let items: Vec<_> = items.into_iter().filter(|id| seen.insert(*id)).collect();
        if items.is_empty() {
            return Err(FlashcardError::Empty);
        }

        let mut review = Self {
            items,
            shuffle,
            phase: FlashcardPhase::Main,
            round: 1,
            round_items: Vec::new(),
            cursor: 0,
            known: BTreeSet::new(),
            unknown: BTreeSet::new(),
        };
        review.enter_main(rng);
        Ok(review)
    }

    #[must_use]
    pub fn phase(&self) -> FlashcardPhase {
        self.phase
    }

    /// 1 for `MAIN`, incremented for every review round.
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == FlashcardPhase::Complete
    }

    #[must_use]
    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Takes effect on the next `MAIN` pass.
    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    #[must_use]
    pub fn current(&self) -> Option<VocabularyId> {
        if self.is_complete() {
            return None;
        }
        self.round_items.get(self.cursor).copied()
    }

    /// Items of the current round, in presentation order.
    #[must_use]
    pub fn round_items(&self) -> &[VocabularyId] {
        &self.round_items
    }

    /// `(index of current card, cards in round)`.
    #[must_use]
    pub fn position(&self) -> (usize, usize) {
        (self.cursor, self.round_items.len())
    }

    #[must_use]
    pub fn known(&self) -> &BTreeSet<VocabularyId> {
        &self.known
    }

    #[must_use]
    pub fn unknown(&self) -> &BTreeSet<VocabularyId> {
        &self.unknown
    }

    /// The whole deck, deduplicated, in MAIN order.
    #[must_use]
    pub fn items(&self) -> &[VocabularyId] {
        &self.items
    }

    #[must_use]
    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    /// Judge the current card and advance.
    ///
    /// The judgment replaces any earlier one for the same card in this deck.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError::Complete` once the review has finished.
    pub fn judge<R: Rng + ?Sized>(
        &mut self,
        judgment: Judgment,
        rng: &mut R,
    ) -> Result<FlashcardStep, FlashcardError> {
        let id = self.current().ok_or(FlashcardError::Complete)?;
        if judgment.is_known() {
            self.unknown.remove(&id);
            self.known.insert(id);
        } else {
            self.known.remove(&id);
            self.unknown.insert(id);
        }
        Ok(self.advance(id, Some(judgment), rng))
    }

    /// Move past the current card without judging it.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError::Complete` once the review has finished.
    pub fn skip<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<FlashcardStep, FlashcardError> {
        let id = self.current().ok_or(FlashcardError::Complete)?;
        Ok(self.advance(id, None, rng))
    }

    /// Forget every judgment and begin a fresh `MAIN` pass.
    pub fn restart<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.known.clear();
        self.unknown.clear();
        self.round = 1;
        self.enter_main(rng);
    }

    fn advance<R: Rng + ?Sized>(
        &mut self,
        id: VocabularyId,
        judgment: Option<Judgment>,
        rng: &mut R,
    ) -> FlashcardStep {
        self.cursor += 1;
        let transition = if self.cursor >= self.round_items.len() {
            Some(self.end_round(rng))
        } else {
            None
        };
        FlashcardStep {
            vocabulary_id: id,
            judgment,
            transition,
        }
    }

    fn end_round<R: Rng + ?Sized>(&mut self, rng: &mut R) -> RoundTransition {
        let next: BTreeSet<VocabularyId> = match self.phase {
            FlashcardPhase::Main => self.unknown.clone(),
            FlashcardPhase::ReviewUnknown => {
                let entered: BTreeSet<_> = self.round_items.iter().copied().collect();
                let still_unknown: BTreeSet<_> =
                    entered.intersection(&self.unknown).copied().collect();
                // No progress this round: stop rather than loop forever.
                if still_unknown.len() == entered.len() {
                    BTreeSet::new()
                } else {
                    still_unknown
                }
            }
            FlashcardPhase::Complete => BTreeSet::new(),
        };

        if next.is_empty() {
            self.phase = FlashcardPhase::Complete;
            self.cursor = self.round_items.len();
            return RoundTransition::Complete;
        }

        self.phase = FlashcardPhase::ReviewUnknown;
        self.round += 1;
        self.round_items = shuffled(next, rng);
        self.cursor = 0;
        RoundTransition::Review {
            round: self.round,
            items: self.round_items.clone(),
        }
    }

    fn enter_main<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.phase = FlashcardPhase::Main;
        self.cursor = 0;
        self.round_items = if self.shuffle {
            shuffled(self.items.iter().copied(), rng)
        } else {
            self.items.clone()
        };
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ids(raw: &[u64]) -> Vec<VocabularyId> {
        raw.iter().copied().map(VocabularyId::new).collect()
    }

    fn set(raw: &[u64]) -> BTreeSet<VocabularyId> {
        ids(raw).into_iter().collect()
    }

    fn judge_round(
        review: &mut FlashcardReview,
        easy: &[u64],
        rng: &mut StdRng,
    ) -> Option<RoundTransition> {
        let easy = set(easy);
        loop {
            let id = review.current().expect("round in progress");
            let judgment = if easy.contains(&id) {
                Judgment::Easy
            } else {
                Judgment::Hard
            };
            let step = review.judge(judgment, rng).unwrap();
            if step.transition.is_some() {
                return step.transition;
            }
        }
    }

    #[test]
    fn empty_deck_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = FlashcardReview::new(Vec::new(), false, &mut rng).unwrap_err();
        assert_eq!(err, FlashcardError::Empty);
    }

    #[test]
    fn main_keeps_catalog_order_without_shuffle() {
        let mut rng = StdRng::seed_from_u64(1);
        let review = FlashcardReview::new(ids(&[5, 3, 9, 3]), false, &mut rng).unwrap();
        assert_eq!(review.round_items(), ids(&[5, 3, 9]).as_slice());
        assert_eq!(review.phase(), FlashcardPhase::Main);
        assert_eq!(review.current(), Some(VocabularyId::new(5)));
    }

    #[test]
    fn review_rounds_shrink_to_the_remaining_unknowns() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut review = FlashcardReview::new(ids(&[1, 2, 3, 4, 5]), false, &mut rng).unwrap();

        let t = judge_round(&mut review, &[1, 2], &mut rng);
        assert!(matches!(t, Some(RoundTransition::Review { round: 2, .. })));
        assert_eq!(review.phase(), FlashcardPhase::ReviewUnknown);
        let entering: BTreeSet<_> = review.round_items().iter().copied().collect();
        assert_eq!(entering, set(&[3, 4, 5]));
        assert_eq!(review.known(), &set(&[1, 2]));

        judge_round(&mut review, &[3, 4], &mut rng);
        let entering: BTreeSet<_> = review.round_items().iter().copied().collect();
        assert_eq!(entering, set(&[5]));
        assert_eq!(review.round(), 3);

        let t = judge_round(&mut review, &[5], &mut rng);
        assert_eq!(t, Some(RoundTransition::Complete));
        assert!(review.is_complete());
        assert_eq!(review.current(), None);
        assert_eq!(review.judge(Judgment::Easy, &mut rng), Err(FlashcardError::Complete));
    }

    #[test]
    fn all_known_in_main_completes_immediately() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut review = FlashcardReview::new(ids(&[1, 2]), true, &mut rng).unwrap();
        let t = judge_round(&mut review, &[1, 2], &mut rng);
        assert_eq!(t, Some(RoundTransition::Complete));
        assert_eq!(review.round(), 1);
    }

    #[test]
    fn round_without_progress_completes() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut review = FlashcardReview::new(ids(&[1, 2, 3]), false, &mut rng).unwrap();
        judge_round(&mut review, &[1], &mut rng);
        let t = judge_round(&mut review, &[], &mut rng);
        assert_eq!(t, Some(RoundTransition::Complete));
        assert_eq!(review.unknown(), &set(&[2, 3]));
    }

    #[test]
    fn later_judgment_overwrites_earlier_one() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut review = FlashcardReview::new(ids(&[1, 2]), false, &mut rng).unwrap();
        judge_round(&mut review, &[], &mut rng);
        // Review round: mark 1 as known now.
        judge_round(&mut review, &[1], &mut rng);
        assert!(review.known().contains(&VocabularyId::new(1)));
        assert!(!review.unknown().contains(&VocabularyId::new(1)));
    }

    #[test]
    fn skipped_cards_in_main_are_not_reviewed() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut review = FlashcardReview::new(ids(&[1, 2, 3]), false, &mut rng).unwrap();
        review.judge(Judgment::Hard, &mut rng).unwrap();
        review.skip(&mut rng).unwrap();
        let step = review.judge(Judgment::Easy, &mut rng).unwrap();
        assert!(matches!(step.transition, Some(RoundTransition::Review { .. })));
        assert_eq!(review.round_items(), ids(&[1]).as_slice());
    }

    #[test]
    fn restart_clears_sets_and_reenters_main() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut review = FlashcardReview::new(ids(&[1, 2, 3]), false, &mut rng).unwrap();
        judge_round(&mut review, &[2], &mut rng);
        review.restart(&mut rng);

        assert_eq!(review.phase(), FlashcardPhase::Main);
        assert_eq!(review.round(), 1);
        assert!(review.known().is_empty());
        assert!(review.unknown().is_empty());
        assert_eq!(review.position(), (0, 3));
    }

    #[test]
    fn any_judgment_sequence_terminates_within_bound() {
        let mut rng = StdRng::seed_from_u64(2024);
        for size in 1..=12_u64 {
            for _ in 0..25 {
                let items: Vec<u64> = (1..=size).collect();
                let mut review = FlashcardReview::new(ids(&items), true, &mut rng).unwrap();
                let mut steps = 0;
                let mut unknown_after_main = None;
                while !review.is_complete() {
                    let judgment = if rng.random_bool(0.5) {
                        Judgment::Easy
                    } else {
                        Judgment::Hard
                    };
                    if review.phase() == FlashcardPhase::ReviewUnknown && unknown_after_main.is_none() {
                        unknown_after_main = Some(review.round_items().len());
                    }
                    review.judge(judgment, &mut rng).unwrap();
                    steps += 1;
                    assert!(steps < 10_000, "review did not terminate");
                }
                let bound = 1 + unknown_after_main.unwrap_or(0) as u32;
                assert!(review.round() <= bound, "round {} > {bound}", review.round());
            }
        }
    }

    #[test]
    fn state_survives_json_round_trip() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut review = FlashcardReview::new(ids(&[1, 2, 3]), false, &mut rng).unwrap();
        review.judge(Judgment::Hard, &mut rng).unwrap();

        let json = serde_json::to_string(&review).unwrap();
        let mut restored: FlashcardReview = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, review);
        assert_eq!(restored.current(), Some(VocabularyId::new(2)));
        restored.judge(Judgment::Easy, &mut rng).unwrap();
        assert_eq!(restored.position(), (2, 3));
    }
}
