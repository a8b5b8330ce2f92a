use std::str::FromStr;
use std::time::Duration;

use practice_core::mastery::MasteryConfig;

use crate::error::ConfigError;

pub const ENV_CORRECT_GAIN: &str = "PRACTICE_CORRECT_GAIN";
pub const ENV_WRONG_DECAY: &str = "PRACTICE_WRONG_DECAY";
pub const ENV_MASTERED_THRESHOLD: &str = "PRACTICE_MASTERED_THRESHOLD";
pub const ENV_MASTERED_MIN_SEEN: &str = "PRACTICE_MASTERED_MIN_SEEN";
pub const ENV_STROKE_MISTAKES: &str = "PRACTICE_STROKE_MISTAKES";
pub const ENV_SHUFFLE_FLASHCARDS: &str = "PRACTICE_SHUFFLE_FLASHCARDS";
pub const ENV_AUTO_ADVANCE_SECS: &str = "PRACTICE_AUTO_ADVANCE_SECS";

/// Tunables of the practice engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub mastery: MasteryConfig,
    /// Shuffle the `MAIN` pass of flashcard decks.
    pub shuffle_flashcards: bool,
    /// Stroke mistakes still accepted as a correct write answer.
    pub stroke_mistake_allowance: u32,
    /// Seconds before an unanswered drill question is skipped.
    pub auto_advance_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mastery: MasteryConfig::default(),
            shuffle_flashcards: false,
            stroke_mistake_allowance: 2,
            auto_advance_secs: None,
        }
    }
}

impl EngineConfig {
    /// Read overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable or out-of-range values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable or out-of-range values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let m = defaults.mastery;

        let mastery = MasteryConfig::new(
            parse_or(&lookup, ENV_CORRECT_GAIN, m.correct_gain())?,
            parse_or(&lookup, ENV_WRONG_DECAY, m.wrong_decay())?,
            parse_or(&lookup, ENV_MASTERED_THRESHOLD, m.mastered_threshold())?,
            parse_or(&lookup, ENV_MASTERED_MIN_SEEN, m.mastered_min_seen())?,
        )?;

        let shuffle_flashcards = match lookup(ENV_SHUFFLE_FLASHCARDS) {
            Some(raw) => parse_flag(ENV_SHUFFLE_FLASHCARDS, &raw)?,
            None => defaults.shuffle_flashcards,
        };

        let auto_advance_secs = match lookup(ENV_AUTO_ADVANCE_SECS) {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => match parse_value::<u64>(ENV_AUTO_ADVANCE_SECS, &raw)? {
                0 => None,
                secs => Some(secs),
            },
            None => defaults.auto_advance_secs,
        };

        Ok(Self {
            mastery,
            shuffle_flashcards,
            stroke_mistake_allowance: parse_or(
                &lookup,
                ENV_STROKE_MISTAKES,
                defaults.stroke_mistake_allowance,
            )?,
            auto_advance_secs,
        })
    }

    #[must_use]
    pub fn with_shuffle_flashcards(mut self, shuffle: bool) -> Self {
        self.shuffle_flashcards = shuffle;
        self
    }

    #[must_use]
    pub fn with_auto_advance_secs(mut self, secs: Option<u64>) -> Self {
        self.auto_advance_secs = secs.filter(|s| *s > 0);
        self
    }

    #[must_use]
    pub fn auto_advance(&self) -> Option<Duration> {
        self.auto_advance_secs.map(Duration::from_secs)
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_owned(),
    })
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::mastery::MasteryConfigError;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.stroke_mistake_allowance, 2);
        assert!(config.auto_advance().is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_CORRECT_GAIN, "0.25"),
            (ENV_MASTERED_MIN_SEEN, "5"),
            (ENV_SHUFFLE_FLASHCARDS, "yes"),
            (ENV_STROKE_MISTAKES, " 0 "),
            (ENV_AUTO_ADVANCE_SECS, "8"),
        ]))
        .unwrap();
        assert!((config.mastery.correct_gain() - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.mastery.mastered_min_seen(), 5);
        assert!(config.shuffle_flashcards);
        assert_eq!(config.stroke_mistake_allowance, 0);
        assert_eq!(config.auto_advance(), Some(Duration::from_secs(8)));
    }

    #[test]
    fn zero_auto_advance_disables_it() {
        let config = EngineConfig::from_lookup(lookup(&[(ENV_AUTO_ADVANCE_SECS, "0")])).unwrap();
        assert_eq!(config.auto_advance_secs, None);
    }

    #[test]
    fn bad_values_are_reported() {
        let err = EngineConfig::from_lookup(lookup(&[(ENV_WRONG_DECAY, "half")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: ENV_WRONG_DECAY,
                value: "half".into()
            }
        );

        let err = EngineConfig::from_lookup(lookup(&[(ENV_MASTERED_THRESHOLD, "1.5")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Mastery(MasteryConfigError::InvalidThreshold { .. })
        ));

        assert!(EngineConfig::from_lookup(lookup(&[(ENV_SHUFFLE_FLASHCARDS, "maybe")])).is_err());
    }
}
