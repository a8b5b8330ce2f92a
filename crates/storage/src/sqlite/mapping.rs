use practice_core::model::{
    Attempt, AttemptKey, AudioSource, ExampleSentence, ItemProgress, LessonId, MasteryStatus,
    Modality, PracticeSession, QuestionKind, SessionId, StudentId, VocabularyId, VocabularyItem,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn get_u32(row: &sqlx::sqlite::SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    u32_from_i64(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<SessionId, StorageError> {
    Ok(SessionId::new(i64_to_u64("session_id", v)?))
}

fn vocabulary_id_from_i64(v: i64) -> Result<VocabularyId, StorageError> {
    Ok(VocabularyId::new(i64_to_u64("vocabulary_id", v)?))
}

pub(crate) fn map_vocabulary_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<VocabularyItem, StorageError> {
    let id = vocabulary_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let lesson_id = LessonId::new(i64_to_u64(
        "lesson_id",
        row.try_get::<i64, _>("lesson_id").map_err(ser)?,
    )?);
    let word: String = row.try_get("word").map_err(ser)?;
    let meaning: String = row.try_get("meaning").map_err(ser)?;

    let mut item = VocabularyItem::new(id, lesson_id, word, meaning)
        .map_err(ser)?
        .with_word_type(row.try_get::<String, _>("word_type").map_err(ser)?);

    if let Some(pinyin) = row.try_get::<Option<String>, _>("pinyin").map_err(ser)? {
        item = item.with_pinyin(pinyin);
    }
    if let Some(secondary) = row
        .try_get::<Option<String>, _>("secondary_meaning")
        .map_err(ser)?
    {
        item = item.with_secondary_meaning(secondary);
    }
    if let Some(audio) = row.try_get::<Option<String>, _>("audio").map_err(ser)? {
        item = item.with_audio(AudioSource::parse(audio).map_err(ser)?);
    }
    if let Some(sentence) = row
        .try_get::<Option<String>, _>("example_sentence")
        .map_err(ser)?
    {
        let example = ExampleSentence::new(
            sentence,
            row.try_get::<Option<String>, _>("example_pinyin")
                .map_err(ser)?
                .unwrap_or_default(),
            row.try_get::<Option<String>, _>("example_meaning")
                .map_err(ser)?
                .unwrap_or_default(),
        )
        .map_err(ser)?;
        item = item.with_example(example);
    }
    Ok(item)
}

pub(crate) fn map_session_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<PracticeSession, StorageError> {
    let modality: Modality = row
        .try_get::<String, _>("modality")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    PracticeSession::from_persisted(
        session_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        StudentId::new(i64_to_u64(
            "student_id",
            row.try_get::<i64, _>("student_id").map_err(ser)?,
        )?),
        LessonId::new(i64_to_u64(
            "lesson_id",
            row.try_get::<i64, _>("lesson_id").map_err(ser)?,
        )?),
        modality,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("finished_at").map_err(ser)?,
        get_u32(row, "duration_secs")?,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<Attempt, StorageError> {
    let key: AttemptKey = row
        .try_get::<String, _>("attempt_key")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let question_kind: QuestionKind = row
        .try_get::<String, _>("question_kind")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    Ok(Attempt {
        key,
        session_id: session_id_from_i64(row.try_get::<i64, _>("session_id").map_err(ser)?)?,
        vocabulary_id: vocabulary_id_from_i64(
            row.try_get::<i64, _>("vocabulary_id").map_err(ser)?,
        )?,
        question_kind,
        user_answer: row.try_get("user_answer").map_err(ser)?,
        correct_answer: row.try_get("correct_answer").map_err(ser)?,
        is_correct: row.try_get("is_correct").map_err(ser)?,
        time_spent_secs: get_u32(row, "time_spent_secs")?,
        answered_at: row.try_get("answered_at").map_err(ser)?,
    })
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ItemProgress, StorageError> {
    let status: MasteryStatus = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    ItemProgress::from_persisted(
        vocabulary_id_from_i64(row.try_get::<i64, _>("vocabulary_id").map_err(ser)?)?,
        get_u32(row, "seen_count")?,
        get_u32(row, "correct_count")?,
        get_u32(row, "wrong_count")?,
        row.try_get("mastery_score").map_err(ser)?,
        status,
        row.try_get("last_seen_at").map_err(ser)?,
    )
    .map_err(ser)
}
