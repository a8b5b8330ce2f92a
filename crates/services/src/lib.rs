#![forbid(unsafe_code)]

pub mod attempts;
pub mod config;
pub mod drills;
pub mod engine;
pub mod error;
pub mod progress;
pub mod sessions;

pub use practice_core::Clock;

pub use attempts::{AttemptRecorder, FlashcardAction, PracticeAttempt, RecordOutcome};
pub use config::EngineConfig;
pub use drills::{
    Answer, AnswerFeedback, FlashcardOutcome, FlashcardService, LookupBrowser, OpenedDrill,
    QuestionDrill, RenderFallback,
};
pub use engine::PracticeEngine;
pub use error::{ConfigError, DrillError, PracticeError};
pub use progress::ProgressAggregator;
pub use sessions::{SessionManager, SessionTimers};
