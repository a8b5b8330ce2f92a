use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS vocabulary_items (
            id INTEGER PRIMARY KEY,
            lesson_id INTEGER NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            word TEXT NOT NULL,
            pinyin TEXT,
            meaning TEXT NOT NULL,
            secondary_meaning TEXT,
            word_type TEXT NOT NULL DEFAULT '',
            audio TEXT,
            example_sentence TEXT,
            example_pinyin TEXT,
            example_meaning TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS practice_sessions (
            id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL,
            lesson_id INTEGER NOT NULL,
            modality TEXT NOT NULL
                CHECK (modality IN ('lookup', 'flashcard', 'quiz', 'listen', 'write')),
            started_at TEXT NOT NULL,
            finished_at TEXT,
            duration_secs INTEGER NOT NULL DEFAULT 0 CHECK (duration_secs >= 0)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS practice_attempts (
            id INTEGER PRIMARY KEY,
            attempt_key TEXT NOT NULL UNIQUE,
            session_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            vocabulary_id INTEGER NOT NULL,
            question_kind TEXT NOT NULL,
            user_answer TEXT,
            correct_answer TEXT NOT NULL,
            is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
            time_spent_secs INTEGER NOT NULL CHECK (time_spent_secs >= 0),
            answered_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES practice_sessions(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS item_progress (
            student_id INTEGER NOT NULL,
            vocabulary_id INTEGER NOT NULL,
            seen_count INTEGER NOT NULL CHECK (seen_count >= 0),
            correct_count INTEGER NOT NULL CHECK (correct_count >= 0),
            wrong_count INTEGER NOT NULL CHECK (wrong_count >= 0),
            mastery_score REAL NOT NULL CHECK (mastery_score BETWEEN 0.0 AND 1.0),
            status TEXT NOT NULL CHECK (status IN ('new', 'learning', 'mastered')),
            last_seen_at TEXT,
            PRIMARY KEY (student_id, vocabulary_id)
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_vocabulary_lesson_position
            ON vocabulary_items (lesson_id, position, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_sessions_student_lesson
            ON practice_sessions (student_id, lesson_id, started_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_attempts_session
            ON practice_attempts (session_id, answered_at);
    ",
];

/// Applies versioned schema migrations, each inside its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    for (version, statements) in [(1_i64, SCHEMA_V1)] {
        if is_applied(pool, version).await? {
            continue;
        }
        let mut tx = pool.begin().await?;
        for statement in statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
    }

    Ok(())
}
