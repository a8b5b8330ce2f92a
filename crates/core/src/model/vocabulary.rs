use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::{LessonId, VocabularyId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VocabularyError {
    #[error("vocabulary word cannot be empty")]
    EmptyWord,

    #[error("vocabulary meaning cannot be empty")]
    EmptyMeaning,

    #[error("audio source cannot be empty")]
    EmptyAudioSource,

    #[error("invalid audio url: {0}")]
    InvalidAudioUrl(String),

    #[error("example sentence cannot be empty")]
    EmptyExample,
}

//
// ─── AUDIO ─────────────────────────────────────────────────────────────────────
//

/// Where the pronunciation clip of an item lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioSource {
    FilePath(PathBuf),
    Url(Url),
}

impl AudioSource {
    /// Parses a stored audio reference.
    ///
    /// Values with a URL scheme become `Url`, anything else is treated as a
    /// path relative to the media root.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError::EmptyAudioSource` for blank input and
    /// `VocabularyError::InvalidAudioUrl` for malformed URLs.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, VocabularyError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(VocabularyError::EmptyAudioSource);
        }
        if s.contains("://") {
            let url = Url::parse(s).map_err(|e| VocabularyError::InvalidAudioUrl(e.to_string()))?;
            return Ok(AudioSource::Url(url));
        }
        Ok(AudioSource::FilePath(PathBuf::from(s)))
    }

    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            AudioSource::FilePath(p) => Some(p.as_path()),
            AudioSource::Url(_) => None,
        }
    }

    #[must_use]
    pub fn as_url(&self) -> Option<&Url> {
        match self {
            AudioSource::Url(u) => Some(u),
            AudioSource::FilePath(_) => None,
        }
    }

    /// Serialized form used by storage adapters.
    #[must_use]
    pub fn to_storage_string(&self) -> String {
        match self {
            AudioSource::FilePath(p) => p.display().to_string(),
            AudioSource::Url(u) => u.to_string(),
        }
    }
}

//
// ─── EXAMPLE SENTENCE ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSentence {
    pub sentence: String,
    pub pinyin: String,
    pub meaning: String,
}

impl ExampleSentence {
    /// # Errors
    ///
    /// Returns `VocabularyError::EmptyExample` if the sentence is blank.
    pub fn new(
        sentence: impl Into<String>,
        pinyin: impl Into<String>,
        meaning: impl Into<String>,
    ) -> Result<Self, VocabularyError> {
        let sentence = sentence.into();
        if sentence.trim().is_empty() {
            return Err(VocabularyError::EmptyExample);
        }
        Ok(Self {
            sentence,
            pinyin: pinyin.into(),
            meaning: meaning.into(),
        })
    }
}

//
// ─── VOCABULARY ITEM ───────────────────────────────────────────────────────────
//

/// One catalog entry of a lesson. Read-only to the practice engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyItem {
    id: VocabularyId,
    lesson_id: LessonId,
    word: String,
    pinyin: Option<String>,
    meaning: String,
    secondary_meaning: Option<String>,
    word_type: String,
    audio: Option<AudioSource>,
    example: Option<ExampleSentence>,
}

impl VocabularyItem {
    /// Creates an item with the required fields; optional ones are added with
    /// the `with_*` builders.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError::EmptyWord` or `VocabularyError::EmptyMeaning`
    /// when the respective field is blank.
    pub fn new(
        id: VocabularyId,
        lesson_id: LessonId,
        word: impl Into<String>,
        meaning: impl Into<String>,
    ) -> Result<Self, VocabularyError> {
        let word = word.into().trim().to_owned();
        let meaning = meaning.into().trim().to_owned();
        if word.is_empty() {
            return Err(VocabularyError::EmptyWord);
        }
        if meaning.is_empty() {
            return Err(VocabularyError::EmptyMeaning);
        }
        Ok(Self {
            id,
            lesson_id,
            word,
            pinyin: None,
            meaning,
            secondary_meaning: None,
            word_type: String::new(),
            audio: None,
            example: None,
        })
    }

    /// Blank pinyin is stored as absent.
    #[must_use]
    pub fn with_pinyin(mut self, pinyin: impl Into<String>) -> Self {
        self.pinyin = non_blank(pinyin.into());
        self
    }

    #[must_use]
    pub fn with_secondary_meaning(mut self, meaning: impl Into<String>) -> Self {
        self.secondary_meaning = non_blank(meaning.into());
        self
    }

    #[must_use]
    pub fn with_word_type(mut self, word_type: impl Into<String>) -> Self {
        self.word_type = word_type.into().trim().to_owned();
        self
    }

    #[must_use]
    pub fn with_audio(mut self, audio: AudioSource) -> Self {
        self.audio = Some(audio);
        self
    }

    #[must_use]
    pub fn with_example(mut self, example: ExampleSentence) -> Self {
        self.example = Some(example);
        self
    }

    #[must_use]
    pub fn id(&self) -> VocabularyId {
        self.id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn word(&self) -> &str {
        &self.word
    }

    /// First character of the word, the target of stroke drills.
    #[must_use]
    pub fn first_char(&self) -> Option<char> {
        self.word.chars().next()
    }

    #[must_use]
    pub fn pinyin(&self) -> Option<&str> {
        self.pinyin.as_deref()
    }

    #[must_use]
    pub fn meaning(&self) -> &str {
        &self.meaning
    }

    #[must_use]
    pub fn secondary_meaning(&self) -> Option<&str> {
        self.secondary_meaning.as_deref()
    }

    #[must_use]
    pub fn word_type(&self) -> &str {
        &self.word_type
    }

    #[must_use]
    pub fn audio(&self) -> Option<&AudioSource> {
        self.audio.as_ref()
    }

    #[must_use]
    pub fn example(&self) -> Option<&ExampleSentence> {
        self.example.as_ref()
    }
}

fn non_blank(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
