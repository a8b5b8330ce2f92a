use practice_core::model::{Attempt, ItemProgress, SessionId, StudentId};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_attempt_row},
    progress_repo::UPSERT_PROGRESS,
};
use crate::repository::{AttemptAppend, AttemptRepository, StorageError};

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn apply_attempt(
        &self,
        student_id: StudentId,
        attempt: &Attempt,
        progress: &ItemProgress,
    ) -> Result<AttemptAppend, StorageError> {
        if progress.vocabulary_id() != attempt.vocabulary_id {
            return Err(StorageError::Conflict);
        }

        let student = id_i64("student_id", student_id.value())?;
        let vocabulary = id_i64("vocabulary_id", attempt.vocabulary_id.value())?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
                INSERT INTO practice_attempts (
                    attempt_key, session_id, student_id, vocabulary_id, question_kind,
                    user_answer, correct_answer, is_correct, time_spent_secs, answered_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(attempt_key) DO NOTHING
            ",
        )
        .bind(attempt.key.to_string())
        .bind(id_i64("session_id", attempt.session_id.value())?)
        .bind(student)
        .bind(vocabulary)
        .bind(attempt.question_kind.as_str())
        .bind(attempt.user_answer.clone())
        .bind(attempt.correct_answer.clone())
        .bind(attempt.is_correct)
        .bind(i64::from(attempt.time_spent_secs))
        .bind(attempt.answered_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            tx.rollback().await.map_err(conn)?;
            return Ok(AttemptAppend::Duplicate);
        }

        sqlx::query(UPSERT_PROGRESS)
            .bind(student)
            .bind(vocabulary)
            .bind(i64::from(progress.seen_count()))
            .bind(i64::from(progress.correct_count()))
            .bind(i64::from(progress.wrong_count()))
            .bind(progress.mastery_score())
            .bind(progress.status().as_str())
            .bind(progress.last_seen_at())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(AttemptAppend::Appended)
    }

    async fn attempts_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Attempt>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    attempt_key, session_id, vocabulary_id, question_kind, user_answer,
                    correct_answer, is_correct, time_spent_secs, answered_at
                FROM practice_attempts
                WHERE session_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(id_i64("session_id", session_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_attempt_row).collect()
    }
}
