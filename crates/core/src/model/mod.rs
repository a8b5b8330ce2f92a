mod attempt;
mod ids;
mod progress;
mod session;
mod vocabulary;

pub use attempt::{Attempt, QuestionKind, UnknownQuestionKind};
pub use ids::{AttemptKey, LessonId, ParseIdError, SessionId, StudentId, VocabularyId};
pub use progress::{ItemProgress, LessonProgressSummary, MasteryStatus, ProgressError};
pub use session::{FinishOutcome, Modality, PracticeSession, PracticeSessionError, SessionReport};
pub use vocabulary::{AudioSource, ExampleSentence, VocabularyError, VocabularyItem};
