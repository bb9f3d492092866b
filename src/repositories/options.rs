use sqlx::{Postgres, QueryBuilder};

use crate::db::models::QuizOption;

pub(crate) struct NewOption<'a> {
    pub(crate) id: String,
    pub(crate) question_id: &'a str,
    pub(crate) position: i32,
    pub(crate) content: &'a str,
    pub(crate) is_correct: bool,
}

pub(crate) async fn insert_bulk(
    executor: impl sqlx::PgExecutor<'_>,
    options: &[NewOption<'_>],
) -> Result<u64, sqlx::Error> {
    if options.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO quiz_options (id, question_id, position, content, is_correct) ",
    );
    builder.push_values(options, |mut row, option| {
        row.push_bind(option.id.as_str())
            .push_bind(option.question_id)
            .push_bind(option.position)
            .push_bind(option.content)
            .push_bind(option.is_correct);
    });

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

/// Every option of a quiz, in question order then option order.
pub(crate) async fn list_by_quiz(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
) -> Result<Vec<QuizOption>, sqlx::Error> {
    sqlx::query_as::<_, QuizOption>(
        "SELECT o.id, o.question_id, o.position, o.content, o.is_correct
         FROM quiz_options o
         JOIN quiz_questions q ON q.id = o.question_id
         WHERE q.quiz_id = $1
         ORDER BY q.position, o.position, o.id",
    )
    .bind(quiz_id)
    .fetch_all(executor)
    .await
}
