use std::fmt;

use chrono::{DateTime, Duration, Utc};
use practice_core::model::{
    AudioSource, ExampleSentence, LessonId, Modality, StudentId, VocabularyId, VocabularyItem,
};
use storage::repository::{NewPracticeSession, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    lesson_id: LessonId,
    student_id: StudentId,
    sessions: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLessonId { raw: String },
    InvalidStudentId { raw: String },
    InvalidSessions { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLessonId { raw } => write!(f, "invalid --lesson-id value: {raw}"),
            ArgsError::InvalidStudentId { raw } => write!(f, "invalid --student-id value: {raw}"),
            ArgsError::InvalidSessions { raw } => write!(f, "invalid --sessions value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("PRACTICE_DB_URL").unwrap_or_else(|_| "sqlite:practice.sqlite3".into());
        let mut lesson_id = LessonId::new(env_u64("PRACTICE_LESSON_ID", 1));
        let mut student_id = StudentId::new(env_u64("PRACTICE_STUDENT_ID", 1));
        let mut sessions = 0;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--lesson-id" => {
                    let value = require_value(&mut args, "--lesson-id")?;
                    lesson_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLessonId { raw: value.clone() })?;
                }
                "--student-id" => {
                    let value = require_value(&mut args, "--student-id")?;
                    student_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidStudentId { raw: value.clone() })?;
                }
                "--sessions" => {
                    let value = require_value(&mut args, "--sessions")?;
                    sessions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidSessions { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            lesson_id,
            student_id,
            sessions,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Fill a lesson with sample vocabulary and practice history.");
    eprintln!();
    eprintln!("Usage: seed [--db <url>] [--lesson-id <id>] [--student-id <id>]");
    eprintln!("            [--sessions <n>] [--now <rfc3339>]");
    eprintln!();
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:practice.sqlite3)");
    eprintln!("  --lesson-id <id>          Lesson to fill with sample vocabulary (default: 1)");
    eprintln!("  --student-id <id>         Owner of the sample sessions (default: 1)");
    eprintln!("  --sessions <n>            Number of finished sample sessions (default: 0)");
    eprintln!("  --now <rfc3339>           Pin the clock so sample history is reproducible");
    eprintln!("  -h, --help                Print this message");
    eprintln!();
    eprintln!("Also read from PRACTICE_DB_URL, PRACTICE_LESSON_ID and PRACTICE_STUDENT_ID.");
}

struct Sample {
    word: &'static str,
    pinyin: &'static str,
    meaning: &'static str,
    word_type: &'static str,
    audio: Option<&'static str>,
    example: Option<(&'static str, &'static str, &'static str)>,
}

const SAMPLES: &[Sample] = &[
    Sample {
        word: "你好",
        pinyin: "nǐ hǎo",
        meaning: "hello",
        word_type: "phrase",
        audio: Some("audio/ni_hao.mp3"),
        example: Some(("你好，老师！", "nǐ hǎo, lǎo shī!", "Hello, teacher!")),
    },
    Sample {
        word: "谢谢",
        pinyin: "xiè xie",
        meaning: "thank you",
        word_type: "verb",
        audio: Some("audio/xie_xie.mp3"),
        example: None,
    },
    Sample {
        word: "学生",
        pinyin: "xué sheng",
        meaning: "student",
        word_type: "noun",
        audio: Some("audio/xue_sheng.mp3"),
        example: Some(("我是学生。", "wǒ shì xué sheng.", "I am a student.")),
    },
    Sample {
        word: "老师",
        pinyin: "lǎo shī",
        meaning: "teacher",
        word_type: "noun",
        audio: None,
        example: None,
    },
    Sample {
        word: "朋友",
        pinyin: "péng you",
        meaning: "friend",
        word_type: "noun",
        audio: Some("https://cdn.example.com/audio/peng_you.mp3"),
        example: None,
    },
    Sample {
        word: "喝",
        pinyin: "hē",
        meaning: "to drink",
        word_type: "verb",
        audio: None,
        example: Some(("我喝茶。", "wǒ hē chá.", "I drink tea.")),
    },
];

fn sample_item(
    sample: &Sample,
    id: VocabularyId,
    lesson_id: LessonId,
) -> Result<VocabularyItem, practice_core::Error> {
    let mut item = VocabularyItem::new(id, lesson_id, sample.word, sample.meaning)?
        .with_pinyin(sample.pinyin)
        .with_word_type(sample.word_type);
    if let Some(audio) = sample.audio {
        item = item.with_audio(AudioSource::parse(audio)?);
    }
    if let Some((sentence, pinyin, meaning)) = sample.example {
        item = item.with_example(ExampleSentence::new(sentence, pinyin, meaning)?);
    }
    Ok(item)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);
    let base_id = args.lesson_id.value() * 1000;

    for (position, (sample, id)) in SAMPLES.iter().zip(base_id + 1..).enumerate() {
        let item = sample_item(sample, VocabularyId::new(id), args.lesson_id)?;
        storage
            .vocabulary
            .upsert_vocabulary(&item, u32::try_from(position)?)
            .await?;
    }

    for i in 0..args.sessions {
        let started_at = now - Duration::days(i64::from(i)) - Duration::minutes(10);
        let modality = Modality::ALL[i as usize % Modality::ALL.len()];
        let session = storage
            .sessions
            .create_session(NewPracticeSession {
                student_id: args.student_id,
                lesson_id: args.lesson_id,
                modality,
                started_at,
            })
            .await?;
        storage
            .sessions
            .finish_session(session.id(), started_at + Duration::minutes(5), 300)
            .await?;
    }

    println!(
        "Seeded lesson {} with {} items and {} sessions into {}",
        args.lesson_id,
        SAMPLES.len(),
        args.sessions,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
