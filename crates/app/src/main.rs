mod logging;
mod shell;

use std::fmt;

use practice_core::model::{LessonId, Modality, StudentId};
use services::{EngineConfig, PracticeEngine};
use storage::repository::Storage;
use tracing::info;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLessonId { raw: String },
    InvalidStudentId { raw: String },
    InvalidSeed { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLessonId { raw } => write!(f, "invalid --lesson-id value: {raw}"),
            ArgsError::InvalidStudentId { raw } => write!(f, "invalid --student-id value: {raw}"),
            ArgsError::InvalidSeed { raw } => write!(f, "invalid --seed value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- <command> [--db <sqlite_url>] [--lesson-id <id>]");
    eprintln!("                    [--student-id <id>] [--seed <n>] [--no-shuffle]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  progress    lesson summary and per-item mastery (default)");
    eprintln!("  lookup      browse the lesson");
    eprintln!("  flashcards  easy/hard review with unknown-item rounds");
    eprintln!("  quiz        multiple choice on meaning, characters and pinyin");
    eprintln!("  listen      pick the meaning of an audio clip");
    eprintln!("  write       type pinyin or characters");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:practice.sqlite3");
    eprintln!("  --lesson-id 1");
    eprintln!("  --student-id 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PRACTICE_DB_URL, PRACTICE_LESSON_ID, PRACTICE_STUDENT_ID, PRACTICE_LOG");
    eprintln!("  PRACTICE_CORRECT_GAIN, PRACTICE_WRONG_DECAY, PRACTICE_MASTERED_THRESHOLD,");
    eprintln!("  PRACTICE_MASTERED_MIN_SEEN, PRACTICE_STROKE_MISTAKES,");
    eprintln!("  PRACTICE_SHUFFLE_FLASHCARDS, PRACTICE_AUTO_ADVANCE_SECS");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Progress,
    Practice(Modality),
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "progress" => Some(Self::Progress),
            "lookup" => Some(Self::Practice(Modality::Lookup)),
            "flashcards" | "flashcard" => Some(Self::Practice(Modality::Flashcard)),
            "quiz" => Some(Self::Practice(Modality::Quiz)),
            "listen" => Some(Self::Practice(Modality::Listen)),
            "write" => Some(Self::Practice(Modality::Write)),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    lesson_id: LessonId,
    student_id: StudentId,
    seed: Option<u64>,
    shuffle: Option<bool>,
}

fn env_id(key: &str) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(1)
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("PRACTICE_DB_URL").unwrap_or_else(|_| "sqlite:practice.sqlite3".into());
        let mut lesson_id = LessonId::new(env_id("PRACTICE_LESSON_ID"));
        let mut student_id = StudentId::new(env_id("PRACTICE_STUDENT_ID"));
        let mut seed = None;
        let mut shuffle = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--lesson-id" => {
                    let value = require_value(args, "--lesson-id")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLessonId { raw: value.clone() })?;
                    lesson_id = LessonId::new(parsed);
                }
                "--student-id" => {
                    let value = require_value(args, "--student-id")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidStudentId { raw: value.clone() })?;
                    student_id = StudentId::new(parsed);
                }
                "--seed" => {
                    let value = require_value(args, "--seed")?;
                    seed = Some(
                        value
                            .parse()
                            .map_err(|_| ArgsError::InvalidSeed { raw: value.clone() })?,
                    );
                }
                "--no-shuffle" => shuffle = Some(false),
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
            seed,
            shuffle,
        })
    }
}

/// Create the directory of a file-backed database so `SQLite` can create the
/// file itself.
fn ensure_db_dir(db_url: &str) -> std::io::Result<()> {
    let Some(rest) = db_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = rest.trim_start_matches("//");
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path == ":memory:" || path.starts_with("file:") {
        return Ok(());
    }
    match std::path::Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Progress,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Progress,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if argv.first().is_some_and(|first| !first.starts_with("--")) {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    logging::init_tracing("warn");

    let mut config = EngineConfig::from_env()?;
    if let Some(shuffle) = parsed.shuffle {
        config = config.with_shuffle_flashcards(shuffle);
    }

    ensure_db_dir(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    info!(db = %parsed.db_url, student_id = %parsed.student_id, "storage ready");

    let mut engine = PracticeEngine::new(parsed.student_id, &storage, config);
    if let Some(seed) = parsed.seed {
        engine = engine.with_seed(seed);
    }

    let mut console = shell::Console::new();
    match cmd {
        Command::Progress => shell::show_progress(&engine, parsed.lesson_id).await?,
        Command::Practice(Modality::Lookup) => {
            shell::browse(&engine, &mut console, parsed.lesson_id).await?;
        }
        Command::Practice(Modality::Flashcard) => {
            shell::flashcards(&engine, &mut console, parsed.lesson_id).await?;
        }
        Command::Practice(modality) => {
            shell::drill(&engine, &mut console, parsed.lesson_id, modality).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
