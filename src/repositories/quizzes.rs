use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::models::Quiz;
use crate::db::types::DifficultyLevel;

pub(crate) const COLUMNS: &str = "\
    id, title, description, difficulty, time_limit, created_by, source_filename, created_at";

pub(crate) struct CreateQuiz<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: &'a str,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) time_limit: Option<i32>,
    pub(crate) created_by: &'a str,
    pub(crate) source_filename: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, FromRow)]
pub(crate) struct QuizSummaryRow {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) time_limit: Option<i32>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) question_count: i64,
    pub(crate) attempt_count: i64,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuiz<'_>,
) -> Result<String, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "INSERT INTO quizzes (
            id, title, description, difficulty, time_limit, created_by, source_filename, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
         RETURNING id",
    )
    .bind(params.id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.difficulty)
    .bind(params.time_limit)
    .bind(params.created_by)
    .bind(params.source_filename)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE id = $1"))
        .bind(quiz_id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_by_owner(
    executor: impl sqlx::PgExecutor<'_>,
    owner_id: &str,
    limit: i64,
) -> Result<Vec<QuizSummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, QuizSummaryRow>(
        "SELECT q.id, q.title, q.description, q.difficulty, q.time_limit, q.created_at,
                (SELECT COUNT(*) FROM quiz_questions qq WHERE qq.quiz_id = q.id) AS question_count,
                (SELECT COUNT(*) FROM quiz_attempts qa WHERE qa.quiz_id = q.id) AS attempt_count
         FROM quizzes q
         WHERE q.created_by = $1
         ORDER BY q.created_at DESC, q.id
         LIMIT $2",
    )
    .bind(owner_id)
    .bind(limit.clamp(1, 500))
    .fetch_all(executor)
    .await
}
