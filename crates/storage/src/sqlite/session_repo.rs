use chrono::{DateTime, Utc};
use practice_core::model::{FinishOutcome, LessonId, PracticeSession, SessionId, StudentId};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_session_row, session_id_from_i64},
};
use crate::repository::{NewPracticeSession, PracticeSessionRepository, StorageError};

const SESSION_COLUMNS: &str =
    "id, student_id, lesson_id, modality, started_at, finished_at, duration_secs";

#[async_trait::async_trait]
impl PracticeSessionRepository for SqliteRepository {
    async fn create_session(
        &self,
        session: NewPracticeSession,
    ) -> Result<PracticeSession, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO practice_sessions (student_id, lesson_id, modality, started_at)
                VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("student_id", session.student_id.value())?)
        .bind(id_i64("lesson_id", session.lesson_id.value())?)
        .bind(session.modality.as_str())
        .bind(session.started_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(PracticeSession::start(
            session_id_from_i64(res.last_insert_rowid())?,
            session.student_id,
            session.lesson_id,
            session.modality,
            session.started_at,
        ))
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<PracticeSession>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM practice_sessions WHERE id = ?1"
        ))
        .bind(id_i64("session_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn finish_session(
        &self,
        id: SessionId,
        finished_at: DateTime<Utc>,
        duration_secs: u32,
    ) -> Result<FinishOutcome, StorageError> {
        let sid = id_i64("session_id", id.value())?;

        // Autocommit only; the guarded UPDATE decides which finisher wins.
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM practice_sessions WHERE id = ?1"
        ))
        .bind(sid)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let mut session = map_session_row(&row)?;
        if session.finish(finished_at, duration_secs) == FinishOutcome::AlreadyFinished {
            return Ok(FinishOutcome::AlreadyFinished);
        }

        let res = sqlx::query(
            r"
                UPDATE practice_sessions
                SET finished_at = ?2, duration_secs = ?3
                WHERE id = ?1 AND finished_at IS NULL
            ",
        )
        .bind(sid)
        .bind(session.finished_at())
        .bind(i64::from(session.duration_secs()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(if res.rows_affected() == 1 {
            FinishOutcome::Finished
        } else {
            FinishOutcome::AlreadyFinished
        })
    }

    async fn finished_sessions_for_lesson(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<Vec<PracticeSession>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
                SELECT {SESSION_COLUMNS}
                FROM practice_sessions
                WHERE student_id = ?1 AND lesson_id = ?2 AND finished_at IS NOT NULL
                ORDER BY started_at ASC, id ASC
            "
        ))
        .bind(id_i64("student_id", student_id.value())?)
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }
}
