use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AttemptKey, SessionId, VocabularyId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown question kind: {0}")]
pub struct UnknownQuestionKind(pub String);

//
// ─── QUESTION KIND ─────────────────────────────────────────────────────────────
//

/// What was asked when an attempt was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionKind {
    /// Word shown, pick the meaning.
    McqMeaning,
    /// Meaning shown, pick the word.
    McqHanzi,
    /// Word shown, pick the pinyin.
    McqPinyin,
    /// Audio played, pick the meaning.
    ListenMcq,
    /// Word shown, type the pinyin.
    TypePinyin,
    /// Character shown, write it stroke by stroke.
    TypeHanzi,
    /// Flashcard self-judgment.
    Flashcard,
}

impl QuestionKind {
    pub const MULTIPLE_CHOICE: [QuestionKind; 3] = [
        QuestionKind::McqMeaning,
        QuestionKind::McqHanzi,
        QuestionKind::McqPinyin,
    ];

    const ALL: [QuestionKind; 7] = [
        QuestionKind::McqMeaning,
        QuestionKind::McqHanzi,
        QuestionKind::McqPinyin,
        QuestionKind::ListenMcq,
        QuestionKind::TypePinyin,
        QuestionKind::TypeHanzi,
        QuestionKind::Flashcard,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::McqMeaning => "mcq_meaning",
            QuestionKind::McqHanzi => "mcq_hanzi",
            QuestionKind::McqPinyin => "mcq_pinyin",
            QuestionKind::ListenMcq => "listen_mcq",
            QuestionKind::TypePinyin => "type_pinyin",
            QuestionKind::TypeHanzi => "type_hanzi",
            QuestionKind::Flashcard => "flashcard",
        }
    }

    #[must_use]
    pub fn has_options(self) -> bool {
        matches!(
            self,
            QuestionKind::McqMeaning
                | QuestionKind::McqHanzi
                | QuestionKind::McqPinyin
                | QuestionKind::ListenMcq
        )
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = UnknownQuestionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuestionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| UnknownQuestionKind(s.to_owned()))
    }
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// One evaluated answer. Append-only once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub key: AttemptKey,
    pub session_id: SessionId,
    pub vocabulary_id: VocabularyId,
    pub question_kind: QuestionKind,
    /// `None` when the question was skipped.
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub time_spent_secs: u32,
    pub answered_at: DateTime<Utc>,
}

impl Attempt {
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.user_answer.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_kind_codes_parse_back() {
        for kind in QuestionKind::ALL {
            assert_eq!(kind.as_str().parse::<QuestionKind>().unwrap(), kind);
        }
        assert_eq!(
            "essay".parse::<QuestionKind>().unwrap_err(),
            UnknownQuestionKind("essay".into())
        );
    }

    #[test]
    fn only_choice_kinds_have_options() {
        assert!(QuestionKind::ListenMcq.has_options());
        assert!(!QuestionKind::TypePinyin.has_options());
        assert!(!QuestionKind::Flashcard.has_options());
    }
}
