//! Question generation for the quiz, listening and writing modalities.
//!
//! Generation is pure apart from the injected random source: the same items,
//! modality and seeded RNG always produce the same `QuestionSet`.

use std::collections::{HashSet, VecDeque};

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::model::{AudioSource, Modality, QuestionKind, VocabularyId, VocabularyItem};
use crate::shuffle::shuffled;

/// Minimum number of eligible items a kind needs before it can be asked.
pub const MIN_ELIGIBLE_ITEMS: usize = 2;

/// Options per multiple-choice question, correct answer included.
pub const MAX_OPTIONS: usize = 4;

//
// ─── GLYPHS ────────────────────────────────────────────────────────────────────
//

/// Whether the stroke-input widget can draw a character.
pub trait GlyphSupport {
    fn can_render(&self, ch: char) -> bool;
}

/// Accepts the CJK unified ideograph blocks the stroke data covers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CjkGlyphs;

impl GlyphSupport for CjkGlyphs {
    fn can_render(&self, ch: char) -> bool {
        matches!(
            u32::from(ch),
            0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF
        )
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prompt {
    Text(String),
    Audio(AudioSource),
    Character(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub kind: QuestionKind,
    pub vocabulary_id: VocabularyId,
    pub prompt: Prompt,
    pub correct_answer: String,
    /// Shuffled choices for multiple-choice kinds, empty for typed kinds.
    pub options: Vec<String>,
}

impl Question {
    /// Typed-pinyin question for `item`, used when a stroke drill cannot be shown.
    #[must_use]
    pub fn typed_pinyin(item: &VocabularyItem) -> Option<Self> {
        let pinyin = item.pinyin()?;
        Some(Self {
            kind: QuestionKind::TypePinyin,
            vocabulary_id: item.id(),
            prompt: Prompt::Text(item.word().to_owned()),
            correct_answer: pinyin.to_owned(),
            options: Vec::new(),
        })
    }

    #[must_use]
    pub fn accepts_choice(&self, choice: &str) -> bool {
        choice == self.correct_answer
    }

    /// Trimmed, case-insensitive comparison used for typed answers.
    #[must_use]
    pub fn accepts_typed(&self, typed: &str) -> bool {
        typed.trim().to_lowercase() == self.correct_answer.trim().to_lowercase()
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// Why a set is empty, or that it is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Readiness {
    Ready,
    /// The modality does not use generated questions.
    NotApplicable,
    NotEnoughVocabulary { eligible: usize, required: usize },
}

/// Finite, consume-once sequence of questions. Regenerate to start over.
#[derive(Debug, Clone)]
pub struct QuestionSet {
    readiness: Readiness,
    total: usize,
    questions: VecDeque<Question>,
}

impl QuestionSet {
    fn ready(questions: Vec<Question>) -> Self {
        if questions.is_empty() {
            return Self::insufficient(0);
        }
        Self {
            readiness: Readiness::Ready,
            total: questions.len(),
            questions: questions.into(),
        }
    }

    fn insufficient(eligible: usize) -> Self {
        Self::empty(Readiness::NotEnoughVocabulary {
            eligible,
            required: MIN_ELIGIBLE_ITEMS,
        })
    }

    fn empty(readiness: Readiness) -> Self {
        Self {
            readiness,
            total: 0,
            questions: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// Number of questions the set was generated with.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn peek(&self) -> Option<&Question> {
        self.questions.front()
    }

    /// Put a replacement question at the front of the queue.
    pub fn push_front(&mut self, question: Question) {
        self.questions.push_front(question);
    }
}

impl Iterator for QuestionSet {
    type Item = Question;

    fn next(&mut self) -> Option<Self::Item> {
        self.questions.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.questions.len(), Some(self.questions.len()))
    }
}

impl ExactSizeIterator for QuestionSet {}

//
// ─── GENERATOR ─────────────────────────────────────────────────────────────────
//

/// Builds randomized question sets from a lesson's items.
pub struct QuestionGenerator<'g> {
    glyphs: &'g dyn GlyphSupport,
}

impl<'g> QuestionGenerator<'g> {
    #[must_use]
    pub fn new(glyphs: &'g dyn GlyphSupport) -> Self {
        Self { glyphs }
    }

    /// Generate the question set for a whole modality.
    ///
    /// - `Quiz` mixes the multiple-choice kinds the lesson can support.
    /// - `Listen` asks `ListenMcq` for items with audio.
    /// - `Write` asks for strokes where the glyph can be drawn, pinyin otherwise.
    /// - `Lookup` and `Flashcard` have no questions.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        items: &[VocabularyItem],
        modality: Modality,
        rng: &mut R,
    ) -> QuestionSet {
        match modality {
            Modality::Lookup | Modality::Flashcard => QuestionSet::empty(Readiness::NotApplicable),
            Modality::Listen => self.generate_kind(items, QuestionKind::ListenMcq, rng),
            Modality::Quiz => self.generate_mixed(items, &QuestionKind::MULTIPLE_CHOICE, rng),
            Modality::Write => {
                self.generate_mixed(items, &[QuestionKind::TypeHanzi, QuestionKind::TypePinyin], rng)
            }
        }
    }

    /// Generate one question of `kind` per eligible item.
    pub fn generate_kind<R: Rng + ?Sized>(
        &self,
        items: &[VocabularyItem],
        kind: QuestionKind,
        rng: &mut R,
    ) -> QuestionSet {
        let items = distinct(items);
        let pool = self.eligible(&items, kind);
        if pool.len() < MIN_ELIGIBLE_ITEMS {
            return QuestionSet::insufficient(pool.len());
        }

        let order = shuffled(pool.iter().copied(), rng);
        let questions = order
            .into_iter()
            .filter_map(|item| self.build(item, kind, &pool, rng))
            .collect();
        QuestionSet::ready(questions)
    }

    /// Generates per-item questions choosing among `kinds`.
    ///
    /// For multiple-choice kinds the choice is uniform over the kinds the item
    /// qualifies for. For the writing pair the first listed kind wins.
    fn generate_mixed<R: Rng + ?Sized>(
        &self,
        items: &[VocabularyItem],
        kinds: &[QuestionKind],
        rng: &mut R,
    ) -> QuestionSet {
        let items = distinct(items);
        let pools: Vec<(QuestionKind, Vec<&VocabularyItem>)> = kinds
            .iter()
            .map(|&kind| (kind, self.eligible(&items, kind)))
            .filter(|(_, pool)| pool.len() >= MIN_ELIGIBLE_ITEMS)
            .collect();

        if pools.is_empty() {
            let best = kinds
                .iter()
                .map(|&kind| self.eligible(&items, kind).len())
                .max()
                .unwrap_or(0);
            return QuestionSet::insufficient(best);
        }

        let prefer_first = kinds.iter().all(|k| !k.has_options());
        let mut questions = Vec::new();
        for item in shuffled(items.iter().copied(), rng) {
            let candidates: Vec<&(QuestionKind, Vec<&VocabularyItem>)> = pools
                .iter()
                .filter(|(_, pool)| pool.iter().any(|p| p.id() == item.id()))
                .collect();
            let picked = if prefer_first {
                candidates.first().copied()
            } else {
                candidates.choose(rng).copied()
            };
            if let Some((kind, pool)) = picked {
                if let Some(q) = self.build(item, *kind, pool, rng) {
                    questions.push(q);
                }
            }
        }
        QuestionSet::ready(questions)
    }

    fn eligible<'i>(&self, items: &[&'i VocabularyItem], kind: QuestionKind) -> Vec<&'i VocabularyItem> {
        items
            .iter()
            .copied()
            .filter(|item| self.answer_for(item, kind).is_some())
            .collect()
    }

    fn answer_for(&self, item: &VocabularyItem, kind: QuestionKind) -> Option<String> {
        match kind {
            QuestionKind::McqMeaning => Some(item.meaning().to_owned()),
            QuestionKind::McqHanzi => Some(item.word().to_owned()),
            QuestionKind::McqPinyin | QuestionKind::TypePinyin => item.pinyin().map(str::to_owned),
            QuestionKind::ListenMcq => item.audio().map(|_| item.meaning().to_owned()),
            QuestionKind::TypeHanzi => item
                .first_char()
                .filter(|c| self.glyphs.can_render(*c))
                .map(String::from),
            QuestionKind::Flashcard => None,
        }
    }

    fn build<R: Rng + ?Sized>(
        &self,
        item: &VocabularyItem,
        kind: QuestionKind,
        pool: &[&VocabularyItem],
        rng: &mut R,
    ) -> Option<Question> {
        let correct_answer = self.answer_for(item, kind)?;
        let prompt = match kind {
            QuestionKind::McqHanzi => Prompt::Text(item.meaning().to_owned()),
            QuestionKind::ListenMcq => Prompt::Audio(item.audio()?.clone()),
            QuestionKind::TypeHanzi => Prompt::Character(item.first_char()?),
            _ => Prompt::Text(item.word().to_owned()),
        };

        let options = if kind.has_options() {
            let mut options = self.distractors(item, kind, &correct_answer, pool, rng);
            options.push(correct_answer.clone());
            shuffled(options, rng)
        } else {
            Vec::new()
        };

        Some(Question {
            kind,
            vocabulary_id: item.id(),
            prompt,
            correct_answer,
            options,
        })
    }

    fn distractors<R: Rng + ?Sized>(
        &self,
        item: &VocabularyItem,
        kind: QuestionKind,
        correct: &str,
        pool: &[&VocabularyItem],
        rng: &mut R,
    ) -> Vec<String> {
        let siblings = pool.iter().filter(|other| other.id() != item.id()).copied();
        let mut chosen: Vec<String> = Vec::with_capacity(MAX_OPTIONS - 1);
        for other in shuffled(siblings, rng) {
            if chosen.len() == MAX_OPTIONS - 1 {
                break;
            }
            let Some(value) = self.answer_for(other, kind) else {
                continue;
            };
            if value != correct && !chosen.contains(&value) {
                chosen.push(value);
            }
        }
        chosen
    }
}

// First occurrence wins when the catalog lists an id twice.
fn distinct(items: &[VocabularyItem]) -> Vec<&VocabularyItem> {
    let mut seen = HashSet::new();
    items.iter().filter(|item| seen.insert(item.id())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LessonId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const LESSON: [(&str, &str, &str); 6] = [
        ("你好", "nǐ hǎo", "hello"),
        ("谢谢", "xiè xie", "thank you"),
        ("再见", "zài jiàn", "goodbye"),
        ("老师", "lǎo shī", "teacher"),
        ("学生", "xué sheng", "student"),
        ("朋友", "péng you", "friend"),
    ];

    fn lesson(n: usize) -> Vec<VocabularyItem> {
        LESSON
            .iter()
            .take(n)
            .enumerate()
            .map(|(i, (word, pinyin, meaning))| {
                VocabularyItem::new(VocabularyId::new(i as u64 + 1), LessonId::new(1), *word, *meaning)
                    .unwrap()
                    .with_pinyin(*pinyin)
            })
            .collect()
    }

    fn with_audio(item: VocabularyItem) -> VocabularyItem {
        let path = format!("audio/{}.mp3", item.id());
        item.with_audio(AudioSource::parse(path).unwrap())
    }

    fn assert_option_integrity(q: &Question, eligible: usize) {
        let unique: HashSet<_> = q.options.iter().collect();
        assert_eq!(unique.len(), q.options.len(), "duplicate options in {q:?}");
        assert_eq!(q.options.iter().filter(|o| **o == q.correct_answer).count(), 1);
        assert_eq!(q.options.len(), eligible.min(MAX_OPTIONS));
    }

    #[test]
    fn options_are_unique_and_sized() {
        let glyphs = CjkGlyphs;
        let generator = QuestionGenerator::new(&glyphs);
        let mut rng = StdRng::seed_from_u64(42);

        for n in 2..=6 {
            let items = lesson(n);
            for kind in QuestionKind::MULTIPLE_CHOICE {
                let set = generator.generate_kind(&items, kind, &mut rng);
                assert_eq!(set.readiness(), Readiness::Ready);
                assert_eq!(set.total(), n);
                for q in set {
                    assert_eq!(q.kind, kind);
                    assert_option_integrity(&q, n);
                }
            }
        }
    }

    #[test]
    fn each_item_appears_once() {
        let glyphs = CjkGlyphs;
        let generator = QuestionGenerator::new(&glyphs);
        let mut rng = StdRng::seed_from_u64(1);
        let mut items = lesson(5);
        items.push(items[0].clone());

        let ids: Vec<_> = generator
            .generate(&items, Modality::Quiz, &mut rng)
            .map(|q| q.vocabulary_id)
            .collect();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn single_item_lesson_is_not_enough() {
        let glyphs = CjkGlyphs;
        let generator = QuestionGenerator::new(&glyphs);
        let mut rng = StdRng::seed_from_u64(1);

        let mut set = generator.generate(&lesson(1), Modality::Quiz, &mut rng);
        assert_eq!(
            set.readiness(),
            Readiness::NotEnoughVocabulary {
                eligible: 1,
                required: 2
            }
        );
        assert!(set.next().is_none());
    }

    #[test]
    fn listen_uses_only_items_with_audio() {
        let glyphs = CjkGlyphs;
        let generator = QuestionGenerator::new(&glyphs);
        let mut rng = StdRng::seed_from_u64(9);

        let none = generator.generate(&lesson(4), Modality::Listen, &mut rng);
        assert_eq!(
            none.readiness(),
            Readiness::NotEnoughVocabulary {
                eligible: 0,
                required: 2
            }
        );

        let items: Vec<_> = lesson(5)
            .into_iter()
            .enumerate()
            .map(|(i, item)| if i < 3 { with_audio(item) } else { item })
            .collect();
        let set = generator.generate(&items, Modality::Listen, &mut rng);
        assert_eq!(set.total(), 3);
        for q in set {
            assert!(matches!(q.prompt, Prompt::Audio(_)));
            assert!(q.vocabulary_id.value() <= 3);
            assert_option_integrity(&q, 3);
        }
    }

    #[test]
    fn pinyin_kinds_skip_items_without_pinyin() {
        let glyphs = CjkGlyphs;
        let generator = QuestionGenerator::new(&glyphs);
        let mut rng = StdRng::seed_from_u64(5);
        let mut items = lesson(3);
        items.push(
            VocabularyItem::new(VocabularyId::new(10), LessonId::new(1), "好", "good").unwrap(),
        );

        let set = generator.generate_kind(&items, QuestionKind::McqPinyin, &mut rng);
        assert_eq!(set.total(), 3);
        assert!(set.into_iter().all(|q| q.vocabulary_id != VocabularyId::new(10)));
    }

    #[test]
    fn duplicate_field_values_never_repeat_in_options() {
        let glyphs = CjkGlyphs;
        let generator = QuestionGenerator::new(&glyphs);
        let mut rng = StdRng::seed_from_u64(77);
        let items = vec![
            VocabularyItem::new(VocabularyId::new(1), LessonId::new(1), "再见", "goodbye").unwrap(),
            VocabularyItem::new(VocabularyId::new(2), LessonId::new(1), "拜拜", "goodbye").unwrap(),
            VocabularyItem::new(VocabularyId::new(3), LessonId::new(1), "你好", "hello").unwrap(),
        ];

        for _ in 0..10 {
            for q in generator.generate_kind(&items, QuestionKind::McqMeaning, &mut rng) {
                let unique: HashSet<_> = q.options.iter().collect();
                assert_eq!(unique.len(), q.options.len());
                assert!(q.options.contains(&q.correct_answer));
            }
        }
    }

    #[test]
    fn write_prefers_strokes_and_falls_back_to_pinyin() {
        struct OnlyNi;
        impl GlyphSupport for OnlyNi {
            fn can_render(&self, ch: char) -> bool {
                ch == '你' || ch == '谢'
            }
        }
        let glyphs = OnlyNi;
        let generator = QuestionGenerator::new(&glyphs);
        let mut rng = StdRng::seed_from_u64(2);

        let set = generator.generate(&lesson(4), Modality::Write, &mut rng);
        assert_eq!(set.total(), 4);
        for q in set {
            match q.vocabulary_id.value() {
                1 => assert_eq!(q.prompt, Prompt::Character('你')),
                2 => assert_eq!(q.correct_answer, "谢"),
                _ => assert_eq!(q.kind, QuestionKind::TypePinyin),
            }
            assert!(q.options.is_empty());
        }
    }

    #[test]
    fn flashcard_and_lookup_have_no_questions() {
        let glyphs = CjkGlyphs;
        let generator = QuestionGenerator::new(&glyphs);
        let mut rng = StdRng::seed_from_u64(2);
        for modality in [Modality::Lookup, Modality::Flashcard] {
            let set = generator.generate(&lesson(5), modality, &mut rng);
            assert_eq!(set.readiness(), Readiness::NotApplicable);
            assert_eq!(set.total(), 0);
        }
    }

    #[test]
    fn typed_answers_ignore_case_and_padding() {
        let item = lesson(1).remove(0);
        let q = Question::typed_pinyin(&item).unwrap();
        assert!(q.accepts_typed("  NǏ HǍO "));
        assert!(!q.accepts_typed("ni hao"));
    }

    #[test]
    fn cjk_glyphs_reject_latin() {
        assert!(CjkGlyphs.can_render('学'));
        assert!(!CjkGlyphs.can_render('a'));
    }
}
