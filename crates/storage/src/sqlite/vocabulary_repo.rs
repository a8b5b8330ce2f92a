use practice_core::model::{LessonId, VocabularyItem};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_vocabulary_row},
};
use crate::repository::{StorageError, VocabularyCatalog};

#[async_trait::async_trait]
impl VocabularyCatalog for SqliteRepository {
    async fn lesson_vocabulary(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<VocabularyItem>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, lesson_id, word, pinyin, meaning, secondary_meaning, word_type,
                    audio, example_sentence, example_pinyin, example_meaning
                FROM vocabulary_items
                WHERE lesson_id = ?1
                ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_vocabulary_row).collect()
    }

    async fn upsert_vocabulary(
        &self,
        item: &VocabularyItem,
        position: u32,
    ) -> Result<(), StorageError> {
        let example = item.example();
        sqlx::query(
            r"
                INSERT INTO vocabulary_items (
                    id, lesson_id, position, word, pinyin, meaning, secondary_meaning,
                    word_type, audio, example_sentence, example_pinyin, example_meaning
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(id) DO UPDATE SET
                    lesson_id = excluded.lesson_id,
                    position = excluded.position,
                    word = excluded.word,
                    pinyin = excluded.pinyin,
                    meaning = excluded.meaning,
                    secondary_meaning = excluded.secondary_meaning,
                    word_type = excluded.word_type,
                    audio = excluded.audio,
                    example_sentence = excluded.example_sentence,
                    example_pinyin = excluded.example_pinyin,
                    example_meaning = excluded.example_meaning
            ",
        )
        .bind(id_i64("vocabulary_id", item.id().value())?)
        .bind(id_i64("lesson_id", item.lesson_id().value())?)
        .bind(i64::from(position))
        .bind(item.word().to_owned())
        .bind(item.pinyin().map(str::to_owned))
        .bind(item.meaning().to_owned())
        .bind(item.secondary_meaning().map(str::to_owned))
        .bind(item.word_type().to_owned())
        .bind(item.audio().map(|a| a.to_storage_string()))
        .bind(example.map(|e| e.sentence.clone()))
        .bind(example.map(|e| e.pinyin.clone()))
        .bind(example.map(|e| e.meaning.clone()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
