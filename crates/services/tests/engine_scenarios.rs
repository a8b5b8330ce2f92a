use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use practice_core::flashcard::{Judgment, RoundTransition};
use practice_core::model::{
    AttemptKey, AudioSource, FinishOutcome, LessonId, MasteryStatus, Modality, PracticeSession,
    QuestionKind, SessionId, StudentId, VocabularyId, VocabularyItem,
};
use practice_core::time::fixed_now;
use services::{
    Answer, Clock, EngineConfig, FlashcardAction, OpenedDrill, PracticeAttempt, PracticeEngine,
    PracticeError, RecordOutcome,
};
use storage::repository::{
    InMemoryRepository, NewPracticeSession, PracticeSessionRepository, Storage, StorageError,
    VocabularyCatalog,
};

const LESSON_ID: u64 = 7;

fn lesson() -> LessonId {
    LessonId::new(LESSON_ID)
}

fn student() -> StudentId {
    StudentId::new(1)
}

fn vocab(id: u64, word: &str, pinyin: &str, meaning: &str) -> VocabularyItem {
    VocabularyItem::new(VocabularyId::new(id), lesson(), word, meaning)
        .unwrap()
        .with_pinyin(pinyin)
}

async fn seeded_repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    let items = [
        vocab(1, "你好", "nǐ hǎo", "hello"),
        vocab(2, "谢谢", "xiè xie", "thank you"),
        vocab(3, "学生", "xué sheng", "student"),
        vocab(4, "老师", "lǎo shī", "teacher"),
        vocab(5, "朋友", "péng you", "friend"),
    ];
    for (position, item) in (0_u32..).zip(items) {
        repo.upsert_vocabulary(&item, position).await.unwrap();
    }
    repo
}

fn engine(repo: &InMemoryRepository) -> PracticeEngine {
    PracticeEngine::new(
        student(),
        &Storage::from_repository(repo.clone()),
        EngineConfig::default().with_shuffle_flashcards(false),
    )
    .with_clock(Clock::fixed(fixed_now()))
    .with_seed(42)
}

fn meaning_attempt(session_id: SessionId, id: u64, correct: bool) -> PracticeAttempt {
    PracticeAttempt {
        session_id,
        vocabulary_id: VocabularyId::new(id),
        question_kind: QuestionKind::McqMeaning,
        user_answer: Some(if correct { "right" } else { "wrong" }.to_owned()),
        correct_answer: "right".to_owned(),
        is_correct: correct,
        time_spent_secs: 3,
        key: None,
    }
}

#[tokio::test]
async fn quiz_with_all_correct_answers_marks_every_item_learned() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);

    let session_id = engine
        .start_practice_session(lesson(), Modality::Quiz)
        .await
        .unwrap();
    for id in 1..=5 {
        let outcome = engine
            .record_practice_attempt(meaning_attempt(session_id, id, true))
            .await
            .unwrap();
        let progress = outcome.progress().unwrap();
        assert_eq!(progress.seen_count(), 1);
        assert_eq!(progress.status(), MasteryStatus::Learning);
    }
    engine.finish_practice_session(session_id, 40).await.unwrap();

    let summary = engine.get_lesson_progress(lesson()).await.unwrap();
    assert_eq!(summary.learned_count, 5);
    assert_eq!(summary.mastered_count, 0);
    assert_eq!(summary.total_time_secs, 40);
    assert!((summary.mastery_percent - 30.0).abs() < 1e-9);

    let report = engine.session_report(session_id).await.unwrap();
    assert_eq!(report.attempts, 5);
    assert_eq!(report.correct, 5);
    assert_eq!(report.distinct_items, 5);
}

#[tokio::test]
async fn repeated_correct_answers_reach_mastered() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);
    let session_id = engine
        .start_practice_session(lesson(), Modality::Quiz)
        .await
        .unwrap();

    let mut last = None;
    for _ in 0..5 {
        last = engine
            .record_practice_attempt(meaning_attempt(session_id, 1, true))
            .await
            .unwrap()
            .progress()
            .cloned();
    }
    let progress = last.unwrap();
    assert!(progress.mastery_score() >= 0.8);
    assert_eq!(progress.status(), MasteryStatus::Mastered);

    let wrong = engine
        .record_practice_attempt(meaning_attempt(session_id, 1, false))
        .await
        .unwrap();
    let progress = wrong.progress().unwrap();
    assert_eq!(progress.wrong_count(), 1);
    assert!(progress.mastery_score() < 0.8);
}

fn review_items(transition: Option<RoundTransition>) -> Option<(u32, Vec<u64>)> {
    match transition? {
        RoundTransition::Review { round, items } => {
            let mut raw: Vec<u64> = items.iter().map(VocabularyId::value).collect();
            raw.sort_unstable();
            Some((round, raw))
        }
        RoundTransition::Complete => None,
    }
}

#[tokio::test]
async fn flashcard_review_rounds_follow_unknown_items() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);
    let mut cards = engine.open_flashcards(lesson()).await.unwrap();

    let plan = [
        Judgment::Easy,
        Judgment::Easy,
        Judgment::Hard,
        Judgment::Hard,
        Judgment::Hard,
    ];
    let mut transition = None;
    for judgment in plan {
        let outcome = cards.judge(judgment).await.unwrap();
        assert!(matches!(outcome.record, RecordOutcome::Recorded(_)));
        transition = outcome.step.transition;
    }
    assert_eq!(review_items(transition), Some((2, vec![3, 4, 5])));

    // Review order is shuffled: only item 5 stays unknown.
    let mut transition = None;
    while transition.is_none() {
        let current = cards.current().unwrap().id();
        let judgment = if current == VocabularyId::new(5) {
            Judgment::Hard
        } else {
            Judgment::Easy
        };
        transition = cards.judge(judgment).await.unwrap().step.transition;
    }
    assert_eq!(review_items(transition), Some((3, vec![5])));

    let outcome = cards.judge(Judgment::Easy).await.unwrap();
    assert_eq!(outcome.step.transition, Some(RoundTransition::Complete));
    assert!(cards.is_complete());
    assert!(cards.review().unknown().is_empty());

    let session_id = cards.session_id();
    cards.finish().await.unwrap();
    let report = engine.session_report(session_id).await.unwrap();
    assert_eq!(report.attempts, 9);
    assert_eq!(report.correct, 5);
    assert_eq!(report.wrong, 4);
}

#[tokio::test]
async fn finishing_twice_keeps_the_first_duration() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);
    let session_id = engine
        .start_practice_session(lesson(), Modality::Lookup)
        .await
        .unwrap();

    let first = engine.finish_practice_session(session_id, 30).await.unwrap();
    let second = engine.finish_practice_session(session_id, 90).await.unwrap();
    assert!(matches!(first, FinishOutcome::Finished));
    assert!(matches!(second, FinishOutcome::AlreadyFinished));

    let summary = engine.get_lesson_progress(lesson()).await.unwrap();
    assert_eq!(summary.total_time_secs, 30);
}

#[tokio::test]
async fn attempts_after_finish_are_rejected() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);
    let session_id = engine
        .start_practice_session(lesson(), Modality::Quiz)
        .await
        .unwrap();
    engine.finish_practice_session(session_id, 10).await.unwrap();

    let err = engine
        .record_practice_attempt(meaning_attempt(session_id, 1, true))
        .await
        .unwrap_err();
    assert!(matches!(err, PracticeError::SessionClosed(id) if id == session_id));
}

#[tokio::test]
async fn unknown_vocabulary_leaves_no_rows_behind() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);
    let session_id = engine
        .start_practice_session(lesson(), Modality::Quiz)
        .await
        .unwrap();

    let err = engine
        .record_practice_attempt(meaning_attempt(session_id, 99, true))
        .await
        .unwrap_err();
    assert!(matches!(err, PracticeError::UnknownVocabulary { .. }));

    let report = engine.session_report(session_id).await.unwrap();
    assert_eq!(report.attempts, 0);
    assert!(engine.get_item_progress_map(lesson()).await.unwrap().is_empty());
}

#[tokio::test]
async fn retried_attempt_key_is_recorded_once() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);
    let session_id = engine
        .start_practice_session(lesson(), Modality::Quiz)
        .await
        .unwrap();

    let key = AttemptKey::generate();
    let attempt = PracticeAttempt {
        key: Some(key),
        ..meaning_attempt(session_id, 2, true)
    };
    let first = engine.record_practice_attempt(attempt.clone()).await.unwrap();
    let retry = engine.record_practice_attempt(attempt).await.unwrap();
    assert!(matches!(first, RecordOutcome::Recorded(_)));
    assert_eq!(retry, RecordOutcome::Duplicate);

    let map = engine.get_item_progress_map(lesson()).await.unwrap();
    assert_eq!(map[&VocabularyId::new(2)].seen_count(), 1);
    assert_eq!(engine.session_report(session_id).await.unwrap().attempts, 1);
}

#[tokio::test]
async fn flashcard_action_for_another_lesson_is_rejected() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);
    let session_id = engine
        .start_practice_session(lesson(), Modality::Flashcard)
        .await
        .unwrap();

    let err = engine
        .record_flashcard_action(FlashcardAction {
            vocabulary_id: VocabularyId::new(1),
            lesson_id: LessonId::new(8),
            action: Judgment::Easy,
            session_id,
            time_spent_secs: 2,
            key: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PracticeError::UnknownVocabulary { .. }));
}

#[tokio::test]
async fn lookup_counts_views_without_touching_scores() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);
    let mut browser = engine.open_lookup(lesson()).await.unwrap();

    browser.next().await.unwrap();
    browser.previous().await.unwrap();
    browser.next().await.unwrap();
    assert_eq!(browser.viewed_count(), 2);
    browser.finish().await.unwrap();

    let map = engine.get_item_progress_map(lesson()).await.unwrap();
    assert_eq!(map.len(), 2);
    for progress in map.values() {
        assert_eq!(progress.seen_count(), 1);
        assert_eq!(progress.correct_count(), 0);
        assert!(progress.mastery_score().abs() < f64::EPSILON);
        assert_eq!(progress.status(), MasteryStatus::Learning);
    }

    let summary = engine.get_lesson_progress(lesson()).await.unwrap();
    assert_eq!(summary.learned_count, 2);
    assert!(summary.mastery_percent.abs() < f64::EPSILON);
}

#[tokio::test]
async fn listen_drill_needs_items_with_audio() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);

    let opened = engine.open_drill(lesson(), Modality::Listen).await.unwrap();
    assert!(matches!(
        opened,
        OpenedDrill::NotEnoughVocabulary {
            eligible: 0,
            required: 2
        }
    ));
    assert_eq!(engine.get_lesson_progress(lesson()).await.unwrap().learned_count, 0);

    let with_audio = [
        vocab(1, "你好", "nǐ hǎo", "hello").with_audio(AudioSource::parse("audio/1.mp3").unwrap()),
        vocab(2, "谢谢", "xiè xie", "thank you")
            .with_audio(AudioSource::parse("https://cdn.example.com/2.mp3").unwrap()),
    ];
    for (position, item) in (0_u32..).zip(with_audio) {
        repo.upsert_vocabulary(&item, position).await.unwrap();
    }
    let OpenedDrill::Ready(drill) = engine.open_drill(lesson(), Modality::Listen).await.unwrap()
    else {
        panic!("listen drill should open with two audio items");
    };
    assert_eq!(drill.total(), 2);
    assert!(
        drill
            .current()
            .is_some_and(|q| q.kind == QuestionKind::ListenMcq)
    );
}

#[tokio::test]
async fn quiz_drill_runs_to_the_end() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);
    let OpenedDrill::Ready(mut drill) = engine.open_drill(lesson(), Modality::Quiz).await.unwrap()
    else {
        panic!("quiz should open");
    };
    assert_eq!(drill.total(), 5);

    while let Some(question) = drill.current().cloned() {
        let feedback = drill
            .answer(Answer::Choice(question.correct_answer.clone()))
            .await
            .unwrap();
        assert!(feedback.is_correct);
    }
    assert!(drill.is_done());
    let session_id = drill.session_id();
    drill.finish().await.unwrap();

    let report = engine.session_report(session_id).await.unwrap();
    assert!(report.finished);
    assert_eq!(report.correct, 5);
    assert!((report.accuracy_percent() - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn lookup_and_flashcard_are_not_question_drills() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);
    for modality in [Modality::Lookup, Modality::Flashcard] {
        let err = engine.open_drill(lesson(), modality).await.err().unwrap();
        assert!(matches!(err, PracticeError::NotADrill { .. }));
    }
}

#[tokio::test]
async fn empty_lesson_cannot_be_browsed() {
    let repo = InMemoryRepository::new();
    let engine = engine(&repo);
    let err = engine.open_lookup(lesson()).await.err().unwrap();
    assert!(matches!(err, PracticeError::EmptyLesson(got) if got == lesson()));
}

#[tokio::test]
async fn progress_is_kept_per_student() {
    let repo = seeded_repo().await;
    let storage = Storage::from_repository(repo.clone());
    let alice = engine(&repo);
    let bob = PracticeEngine::new(StudentId::new(2), &storage, EngineConfig::default());

    let session_id = alice
        .start_practice_session(lesson(), Modality::Quiz)
        .await
        .unwrap();
    alice
        .record_practice_attempt(meaning_attempt(session_id, 1, true))
        .await
        .unwrap();

    let err = bob
        .record_practice_attempt(meaning_attempt(session_id, 1, true))
        .await
        .unwrap_err();
    assert!(matches!(err, PracticeError::SessionNotFound(_)));
    assert!(bob.get_item_progress_map(lesson()).await.unwrap().is_empty());
    assert_eq!(alice.get_item_progress_map(lesson()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_backed_engine_records_progress() {
    let storage = Storage::sqlite("sqlite:file:engine_smoke?mode=memory&cache=shared")
        .await
        .unwrap();
    for (position, item) in (0_u32..).zip([
        vocab(1, "你好", "nǐ hǎo", "hello"),
        vocab(2, "谢谢", "xiè xie", "thank you"),
    ]) {
        storage
            .vocabulary
            .upsert_vocabulary(&item, position)
            .await
            .unwrap();
    }
    let engine = PracticeEngine::new(student(), &storage, EngineConfig::default())
        .with_clock(Clock::fixed(fixed_now()));

    let session_id = engine
        .start_practice_session(lesson(), Modality::Quiz)
        .await
        .unwrap();
    engine
        .record_practice_attempt(meaning_attempt(session_id, 1, true))
        .await
        .unwrap();
    engine.finish_practice_session(session_id, 12).await.unwrap();

    let summary = engine.get_lesson_progress(lesson()).await.unwrap();
    assert_eq!(summary.learned_count, 1);
    assert_eq!(summary.total_time_secs, 12);
    assert!((summary.mastery_percent - 15.0).abs() < 1e-9);
}

//
// ─── STORAGE FAILURES ──────────────────────────────────────────────────────────
//

#[derive(Clone)]
struct BrokenSessions;

#[async_trait]
impl PracticeSessionRepository for BrokenSessions {
    async fn create_session(
        &self,
        _session: NewPracticeSession,
    ) -> Result<PracticeSession, StorageError> {
        Err(StorageError::Connection("disk unplugged".into()))
    }

    async fn get_session(&self, _id: SessionId) -> Result<Option<PracticeSession>, StorageError> {
        Err(StorageError::Connection("disk unplugged".into()))
    }

    async fn finish_session(
        &self,
        _id: SessionId,
        _finished_at: DateTime<Utc>,
        _duration_secs: u32,
    ) -> Result<FinishOutcome, StorageError> {
        Err(StorageError::Connection("disk unplugged".into()))
    }

    async fn finished_sessions_for_lesson(
        &self,
        _student_id: StudentId,
        _lesson_id: LessonId,
    ) -> Result<Vec<PracticeSession>, StorageError> {
        Err(StorageError::Connection("disk unplugged".into()))
    }
}

#[tokio::test]
async fn storage_failures_surface_as_errors() {
    let repo = seeded_repo().await;
    let mut storage = Storage::from_repository(repo);
    storage.sessions = Arc::new(BrokenSessions);
    let engine = PracticeEngine::new(student(), &storage, EngineConfig::default());

    let err = engine
        .start_practice_session(lesson(), Modality::Quiz)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PracticeError::Storage(StorageError::Connection(_))
    ));
    assert!(engine.get_lesson_progress(lesson()).await.is_err());
}

#[tokio::test]
async fn seeded_engines_generate_identical_question_orders() {
    let repo = seeded_repo().await;
    let items = repo.lesson_vocabulary(lesson()).await.unwrap();
    let order = |engine: &PracticeEngine| {
        engine
            .generate_questions(&items, Modality::Quiz)
            .map(|q| (q.vocabulary_id, q.kind, q.options))
            .collect::<Vec<_>>()
    };
    assert_eq!(order(&engine(&repo)), order(&engine(&repo)));
}

#[tokio::test]
async fn flashcard_snapshot_with_a_foreign_deck_item_is_rejected() {
    let repo = seeded_repo().await;
    let engine = engine(&repo);
    let mut cards = engine.open_flashcards(lesson()).await.unwrap();
    cards.judge(Judgment::Easy).await.unwrap();

    let snapshot = cards.snapshot_json().unwrap();
    let mut tampered: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    tampered["items"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!(99));
    let err = cards.restore_snapshot(&tampered.to_string()).unwrap_err();
    assert!(matches!(
        err,
        PracticeError::UnknownVocabulary { vocabulary_id, .. } if vocabulary_id == VocabularyId::new(99)
    ));

    // the live review is untouched and a clean snapshot still restores
    assert_eq!(cards.review().position(), (1, 5));
    assert_eq!(cards.review().items().len(), 5);
    cards.restore_snapshot(&snapshot).unwrap();
    assert_eq!(cards.current().map(VocabularyItem::id), Some(VocabularyId::new(2)));
}
