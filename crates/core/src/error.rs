use thiserror::Error;

use crate::flashcard::FlashcardError;
use crate::mastery::MasteryConfigError;
use crate::model::{
    ParseIdError, PracticeSessionError, ProgressError, UnknownQuestionKind, VocabularyError,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),
    #[error(transparent)]
    Session(#[from] PracticeSessionError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    MasteryConfig(#[from] MasteryConfigError),
    #[error(transparent)]
    Flashcard(#[from] FlashcardError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    QuestionKind(#[from] UnknownQuestionKind),
}
