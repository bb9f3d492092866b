use std::collections::{BTreeMap, HashMap};

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::auth::AuthContext;
use crate::core::errors::{is_unique_violation, QuizError, QuizResult};
use crate::core::time::primitive_now_utc;
use crate::db::models::{QuizAttempt, QuizOption};
use crate::repositories;

/// Question id to selected option id.
pub(crate) type AnswerSheet = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GradeOutcome {
    pub(crate) score: i32,
    /// Accepted `(question_id, option_id)` pairs, in question-id order.
    pub(crate) recorded: Vec<(String, String)>,
}

/// Scores an answer sheet against the quiz's options.
///
/// An answer only counts when the option exists in this quiz and belongs to the
/// question it was submitted for; anything else is neither scored nor recorded.
pub(crate) fn grade(answers: &AnswerSheet, options: &[QuizOption]) -> GradeOutcome {
    let by_id: HashMap<&str, &QuizOption> =
        options.iter().map(|option| (option.id.as_str(), option)).collect();

    let mut score = 0;
    let mut recorded = Vec::with_capacity(answers.len());
    for (question_id, option_id) in answers {
        let Some(option) = by_id.get(option_id.as_str()) else {
            continue;
        };
        if option.question_id != *question_id {
            continue;
        }
        if option.is_correct {
            score += 1;
        }
        recorded.push((question_id.clone(), option_id.clone()));
    }

    GradeOutcome { score, recorded }
}

#[derive(Clone)]
pub(crate) struct AttemptGradingEngine {
    pool: PgPool,
}

impl AttemptGradingEngine {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One attempt per (quiz, user). The unique index on `quiz_attempts` settles races
    /// between the pre-check and the insert.
    pub(crate) async fn submit_attempt(
        &self,
        auth: &AuthContext,
        quiz_id: &str,
        answers: &AnswerSheet,
    ) -> QuizResult<QuizAttempt> {
        let user_id = auth.user_id();
        let result = self.submit(quiz_id, &user_id, answers).await;

        let status = match &result {
            Ok(_) => "accepted",
            Err(QuizError::Conflict(_)) => "duplicate",
            Err(QuizError::NotFound(_)) => "not_found",
            Err(_) => "error",
        };
        metrics::counter!("quiz_attempts_total", "status" => status).increment(1);

        match &result {
            Ok(attempt) => tracing::info!(
                attempt_id = %attempt.id,
                quiz_id = %quiz_id,
                user_id = %user_id,
                score = attempt.score,
                total_questions = attempt.total_questions,
                "Attempt graded"
            ),
            Err(err) => tracing::info!(
                quiz_id = %quiz_id,
                user_id = %user_id,
                status,
                error = %err,
                "Attempt rejected"
            ),
        }

        result
    }

    async fn submit(
        &self,
        quiz_id: &str,
        user_id: &str,
        answers: &AnswerSheet,
    ) -> QuizResult<QuizAttempt> {
        if repositories::quizzes::find_by_id(&self.pool, quiz_id).await?.is_none() {
            return Err(QuizError::NotFound(format!("quiz {quiz_id}")));
        }

        if repositories::attempts::exists_for(&self.pool, quiz_id, user_id).await? {
            return Err(already_attempted());
        }

        let options = repositories::options::list_by_quiz(&self.pool, quiz_id).await?;
        let total_questions = repositories::questions::count_by_quiz(&self.pool, quiz_id).await?;
        let total_questions = i32::try_from(total_questions)
            .map_err(|err| QuizError::internal(err, "question count out of range"))?;
        let outcome = grade(answers, &options);

        let mut tx = self.pool.begin().await?;
        let attempt_id = Uuid::new_v4().to_string();
        let attempt = repositories::attempts::create(
            &mut *tx,
            repositories::attempts::CreateAttempt {
                id: &attempt_id,
                quiz_id,
                user_id,
                score: outcome.score,
                total_questions,
                submitted_at: primitive_now_utc(),
                is_completed: true,
            },
        )
        .await
        .map_err(|err| if is_unique_violation(&err) { already_attempted() } else { err.into() })?;

        repositories::attempts::insert_answers(&mut *tx, &attempt.id, &outcome.recorded).await?;
        tx.commit().await?;

        Ok(attempt)
    }
}

fn already_attempted() -> QuizError {
    QuizError::Conflict("quiz already attempted by this user".to_string())
}
