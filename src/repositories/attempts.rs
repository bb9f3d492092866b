use sqlx::{Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::{AttemptAnswer, QuizAttempt};

pub(crate) const COLUMNS: &str =
    "id, quiz_id, user_id, score, total_questions, submitted_at, is_completed";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) is_completed: bool,
}

pub(crate) async fn exists_for(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM quiz_attempts WHERE quiz_id = $1 AND user_id = $2)",
    )
    .bind(quiz_id)
    .bind(user_id)
    .fetch_one(executor)
    .await
}

/// Fails with a unique violation when the user already has an attempt for the quiz.
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAttempt<'_>,
) -> Result<QuizAttempt, sqlx::Error> {
    sqlx::query_as::<_, QuizAttempt>(&format!(
        "INSERT INTO quiz_attempts (
            id, quiz_id, user_id, score, total_questions, submitted_at, is_completed
         ) VALUES ($1,$2,$3,$4,$5,$6,$7)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.quiz_id)
    .bind(params.user_id)
    .bind(params.score)
    .bind(params.total_questions)
    .bind(params.submitted_at)
    .bind(params.is_completed)
    .fetch_one(executor)
    .await
}

pub(crate) async fn insert_answers(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    answers: &[(String, String)],
) -> Result<u64, sqlx::Error> {
    if answers.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO attempt_answers (attempt_id, question_id, selected_option_id) ",
    );
    builder.push_values(answers, |mut row, (question_id, option_id)| {
        row.push_bind(attempt_id).push_bind(question_id.as_str()).push_bind(option_id.as_str());
    });

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Option<QuizAttempt>, sqlx::Error> {
    sqlx::query_as::<_, QuizAttempt>(&format!("SELECT {COLUMNS} FROM quiz_attempts WHERE id = $1"))
        .bind(attempt_id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_for_user(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    quiz_id: Option<&str>,
    limit: i64,
) -> Result<Vec<QuizAttempt>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM quiz_attempts WHERE user_id = "));
    builder.push_bind(user_id);

    if let Some(quiz_id) = quiz_id {
        builder.push(" AND quiz_id = ");
        builder.push_bind(quiz_id);
    }

    builder.push(" ORDER BY submitted_at DESC, id LIMIT ");
    builder.push_bind(limit);

    builder.build_query_as::<QuizAttempt>().fetch_all(executor).await
}

pub(crate) async fn list_answers(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<AttemptAnswer>, sqlx::Error> {
    sqlx::query_as::<_, AttemptAnswer>(
        "SELECT attempt_id, question_id, selected_option_id
         FROM attempt_answers
         WHERE attempt_id = $1",
    )
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}
