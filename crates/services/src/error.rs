//! Shared error types for the services crate.

use thiserror::Error;

use practice_core::flashcard::FlashcardError;
use practice_core::mastery::MasteryConfigError;
use practice_core::model::{
    LessonId, Modality, PracticeSessionError, QuestionKind, SessionId, VocabularyId,
};
use storage::repository::StorageError;

/// Errors emitted by `QuestionDrill`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DrillError {
    #[error("no question is waiting for an answer")]
    NoCurrentQuestion,
    #[error("answer form does not fit a {kind} question")]
    AnswerForm { kind: QuestionKind },
    #[error("only stroke questions can fall back, current question is {kind}")]
    NotAStrokeQuestion { kind: QuestionKind },
}

/// Errors emitted by the practice services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("practice session {0} not found")]
    SessionNotFound(SessionId),
    #[error("practice session {0} is already finished")]
    SessionClosed(SessionId),
    #[error("vocabulary item {vocabulary_id} is not part of lesson {lesson_id}")]
    UnknownVocabulary {
        vocabulary_id: VocabularyId,
        lesson_id: LessonId,
    },
    #[error("lesson {0} has no vocabulary")]
    EmptyLesson(LessonId),
    #[error("{modality} does not run as a question drill")]
    NotADrill { modality: Modality },
    #[error("flashcard snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error(transparent)]
    Session(#[from] PracticeSessionError),
    #[error(transparent)]
    Flashcard(#[from] FlashcardError),
    #[error(transparent)]
    Drill(#[from] DrillError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised while reading `EngineConfig`.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error(transparent)]
    Mastery(#[from] MasteryConfigError),
}
