use std::collections::HashMap;

use practice_core::model::{ItemProgress, StudentId, VocabularyId};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_progress_row},
};
use crate::repository::{ItemProgressRepository, StorageError};

pub(super) const UPSERT_PROGRESS: &str = r"
    INSERT INTO item_progress (
        student_id, vocabulary_id, seen_count, correct_count, wrong_count,
        mastery_score, status, last_seen_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(student_id, vocabulary_id) DO UPDATE SET
        seen_count = excluded.seen_count,
        correct_count = excluded.correct_count,
        wrong_count = excluded.wrong_count,
        mastery_score = excluded.mastery_score,
        status = excluded.status,
        last_seen_at = excluded.last_seen_at
";

#[async_trait::async_trait]
impl ItemProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        student_id: StudentId,
        vocabulary_id: VocabularyId,
    ) -> Result<Option<ItemProgress>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    vocabulary_id, seen_count, correct_count, wrong_count,
                    mastery_score, status, last_seen_at
                FROM item_progress
                WHERE student_id = ?1 AND vocabulary_id = ?2
            ",
        )
        .bind(id_i64("student_id", student_id.value())?)
        .bind(id_i64("vocabulary_id", vocabulary_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn progress_for_items(
        &self,
        student_id: StudentId,
        ids: &[VocabularyId],
    ) -> Result<HashMap<VocabularyId, ItemProgress>, StorageError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = (0..ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r"
                SELECT
                    vocabulary_id, seen_count, correct_count, wrong_count,
                    mastery_score, status, last_seen_at
                FROM item_progress
                WHERE student_id = ?1 AND vocabulary_id IN ({placeholders})
            "
        );

        let mut query = sqlx::query(&sql).bind(id_i64("student_id", student_id.value())?);
        for id in ids {
            query = query.bind(id_i64("vocabulary_id", id.value())?);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in &rows {
            let progress = map_progress_row(row)?;
            out.insert(progress.vocabulary_id(), progress);
        }
        Ok(out)
    }

    async fn upsert_progress(
        &self,
        student_id: StudentId,
        progress: &ItemProgress,
    ) -> Result<(), StorageError> {
        sqlx::query(UPSERT_PROGRESS)
            .bind(id_i64("student_id", student_id.value())?)
            .bind(id_i64("vocabulary_id", progress.vocabulary_id().value())?)
            .bind(i64::from(progress.seen_count()))
            .bind(i64::from(progress.correct_count()))
            .bind(i64::from(progress.wrong_count()))
            .bind(progress.mastery_score())
            .bind(progress.status().as_str())
            .bind(progress.last_seen_at())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
