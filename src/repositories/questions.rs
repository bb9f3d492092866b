use sqlx::{Postgres, QueryBuilder};

use crate::db::models::QuizQuestion;

pub(crate) const COLUMNS: &str = "id, quiz_id, position, question_text, explanation";

pub(crate) struct NewQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) position: i32,
    pub(crate) question_text: &'a str,
    pub(crate) explanation: &'a str,
}

/// Inserts all questions in one statement and returns the stored ids.
pub(crate) async fn insert_bulk(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    questions: &[NewQuestion<'_>],
) -> Result<Vec<String>, sqlx::Error> {
    if questions.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO quiz_questions (id, quiz_id, position, question_text, explanation) ",
    );
    builder.push_values(questions, |mut row, question| {
        row.push_bind(question.id)
            .push_bind(quiz_id)
            .push_bind(question.position)
            .push_bind(question.question_text)
            .push_bind(question.explanation);
    });
    builder.push(" RETURNING id");

    builder.build_query_scalar::<String>().fetch_all(executor).await
}

pub(crate) async fn list_by_quiz(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
) -> Result<Vec<QuizQuestion>, sqlx::Error> {
    sqlx::query_as::<_, QuizQuestion>(&format!(
        "SELECT {COLUMNS} FROM quiz_questions WHERE quiz_id = $1 ORDER BY position, id"
    ))
    .bind(quiz_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn count_by_quiz(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM quiz_questions WHERE quiz_id = $1")
        .bind(quiz_id)
        .fetch_one(executor)
        .await
}
