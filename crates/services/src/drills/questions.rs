use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use practice_core::model::{FinishOutcome, QuestionKind, SessionId, VocabularyId, VocabularyItem};
use practice_core::questions::{Prompt, Question, QuestionSet, Readiness};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::DrillSession;
use crate::attempts::{PracticeAttempt, RecordOutcome};
use crate::error::{DrillError, PracticeError};

/// What the student handed in for the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// One of the offered options.
    Choice(String),
    /// Free text for typed kinds.
    Typed(String),
    /// Result reported by the stroke-input widget.
    Strokes { mistakes: u32 },
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerFeedback {
    pub question: Question,
    pub user_answer: Option<String>,
    pub is_correct: bool,
    pub record: RecordOutcome,
    /// Questions still waiting after this one.
    pub remaining: usize,
}

/// Shown instead of a stroke question the widget cannot draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFallback {
    pub vocabulary_id: VocabularyId,
    pub character: Option<char>,
    /// Kind asked instead, or `None` if the item was dropped.
    pub replacement: Option<QuestionKind>,
    pub message: String,
}

/// Result of opening a question drill.
pub enum OpenedDrill {
    Ready(QuestionDrill),
    /// Not enough eligible items; no session was started.
    NotEnoughVocabulary { eligible: usize, required: usize },
}

/// Walks a generated question set for the quiz, listen and write modalities.
pub struct QuestionDrill {
    base: DrillSession,
    items: HashMap<VocabularyId, VocabularyItem>,
    questions: QuestionSet,
    current: Option<Question>,
    presented_at: DateTime<Utc>,
    presented: u64,
    stroke_allowance: u32,
    auto_advance: Option<Duration>,
}

impl QuestionDrill {
    pub(crate) fn new(
        base: DrillSession,
        items: Vec<VocabularyItem>,
        questions: QuestionSet,
        stroke_allowance: u32,
        auto_advance: Option<Duration>,
    ) -> Self {
        let mut drill = Self {
            presented_at: base.now(),
            base,
            items: items.into_iter().map(|item| (item.id(), item)).collect(),
            questions,
            current: None,
            presented: 0,
            stroke_allowance,
            auto_advance,
        };
        drill.present_next();
        drill
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.base.session().id()
    }

    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.questions.readiness()
    }

    /// Questions the set was generated with.
    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.total()
    }

    /// Questions not yet answered, the current one included.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.questions.remaining() + usize::from(self.current.is_some())
    }

    #[must_use]
    pub fn current(&self) -> Option<&Question> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn item(&self, id: VocabularyId) -> Option<&VocabularyItem> {
        self.items.get(&id)
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.current.is_none()
    }

    /// Evaluate and record an answer to the current question, then move on.
    ///
    /// # Errors
    ///
    /// Returns `DrillError` for a missing question or an answer form the
    /// question does not take, or recorder errors. On error the current
    /// question stays in place.
    pub async fn answer(&mut self, answer: Answer) -> Result<AnswerFeedback, PracticeError> {
        let question = self.current.clone().ok_or(DrillError::NoCurrentQuestion)?;
        let (user_answer, is_correct) = self.evaluate(&question, answer)?;

        let record = self
            .base
            .recorder()
            .record_attempt(PracticeAttempt {
                session_id: self.session_id(),
                vocabulary_id: question.vocabulary_id,
                question_kind: question.kind,
                user_answer: user_answer.clone(),
                correct_answer: question.correct_answer.clone(),
                is_correct,
                time_spent_secs: self.base.secs_since(self.presented_at),
                key: None,
            })
            .await?;

        self.present_next();
        Ok(AnswerFeedback {
            question,
            user_answer,
            is_correct,
            record,
            remaining: self.remaining(),
        })
    }

    /// The stroke widget could not draw the current character.
    ///
    /// The question becomes a typed-pinyin question for the same item, or is
    /// dropped when the item has no pinyin. The drill keeps going either way.
    ///
    /// # Errors
    ///
    /// Returns `DrillError` if there is no current stroke question.
    pub fn report_unrenderable(&mut self) -> Result<RenderFallback, PracticeError> {
        let question = self.current.as_ref().ok_or(DrillError::NoCurrentQuestion)?;
        if question.kind != QuestionKind::TypeHanzi {
            return Err(DrillError::NotAStrokeQuestion {
                kind: question.kind,
            }
            .into());
        }

        let vocabulary_id = question.vocabulary_id;
        let character = match question.prompt {
            Prompt::Character(ch) => Some(ch),
            _ => None,
        };
        let glyph = character.map_or_else(|| "this character".to_owned(), |ch| format!("'{ch}'"));
        let replacement = self.items.get(&vocabulary_id).and_then(Question::typed_pinyin);

        let fallback = match replacement {
            Some(q) => {
                let kind = q.kind;
                self.current = Some(q);
                RenderFallback {
                    vocabulary_id,
                    character,
                    replacement: Some(kind),
                    message: format!("Cannot draw {glyph}; type its pinyin instead."),
                }
            }
            None => {
                self.present_next();
                RenderFallback {
                    vocabulary_id,
                    character,
                    replacement: None,
                    message: format!("Cannot draw {glyph}; skipping it."),
                }
            }
        };
        warn!(vocabulary_id = %vocabulary_id, "stroke question fell back");
        Ok(fallback)
    }

    /// Arm the auto-advance timer for the current question.
    ///
    /// The receiver yields a token for `time_out` once the delay passes.
    /// Returns `None` when auto-advance is off or nothing is being asked.
    #[must_use]
    pub fn arm_timeout(&self) -> Option<oneshot::Receiver<u64>> {
        let delay = self.auto_advance?;
        self.current.as_ref()?;
        let (tx, rx) = oneshot::channel();
        let token = self.presented;
        self.base.timers().after(delay, move || {
            let _ = tx.send(token);
        });
        Some(rx)
    }

    /// Skip the question that was current when `token` was armed.
    ///
    /// Stale tokens are ignored and return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns recorder errors from storing the skip.
    pub async fn time_out(&mut self, token: u64) -> Result<Option<AnswerFeedback>, PracticeError> {
        if token != self.presented || self.current.is_none() {
            return Ok(None);
        }
        debug!(session_id = %self.session_id(), "question timed out");
        self.answer(Answer::Skip).await.map(Some)
    }

    pub fn pause(&mut self) {
        self.base.pause();
    }

    pub fn resume(&mut self) {
        self.base.resume();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.base.is_paused()
    }

    /// Active seconds so far, pauses excluded.
    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.base.elapsed_secs()
    }

    /// Cancel pending timers without closing the session.
    pub fn leave(&self) {
        self.base.leave();
    }

    /// Close the drill's session with its active time.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` if the session cannot be closed.
    pub async fn finish(&mut self) -> Result<FinishOutcome, PracticeError> {
        self.base.finish().await
    }

    fn present_next(&mut self) {
        self.current = self.questions.next();
        self.presented += 1;
        self.presented_at = self.base.now();
    }

    fn evaluate(
        &self,
        question: &Question,
        answer: Answer,
    ) -> Result<(Option<String>, bool), DrillError> {
        let form = DrillError::AnswerForm {
            kind: question.kind,
        };
        match answer {
            Answer::Skip => Ok((None, false)),
            Answer::Choice(choice) if question.kind.has_options() => {
                let ok = question.accepts_choice(&choice);
                Ok((Some(choice), ok))
            }
            Answer::Typed(text)
                if matches!(
                    question.kind,
                    QuestionKind::TypePinyin | QuestionKind::TypeHanzi
                ) =>
            {
                let ok = question.accepts_typed(&text);
                Ok((Some(text), ok))
            }
            Answer::Strokes { mistakes } if question.kind == QuestionKind::TypeHanzi => {
                let ok = mistakes <= self.stroke_allowance;
                let shown = if ok {
                    question.correct_answer.clone()
                } else {
                    format!("{mistakes} stroke mistakes")
                };
                Ok((Some(shown), ok))
            }
            _ => Err(form),
        }
    }
}
