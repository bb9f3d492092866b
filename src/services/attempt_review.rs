use std::collections::HashMap;

use sqlx::PgPool;

use crate::core::auth::AuthContext;
use crate::core::errors::{QuizError, QuizResult};
use crate::db::models::{AttemptAnswer, QuizOption, QuizQuestion};
use crate::repositories;
use crate::schemas::quiz::{AttemptDetail, AttemptQuestionReview, AttemptView};

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

#[derive(Clone)]
pub(crate) struct AttemptReview {
    pool: PgPool,
}

impl AttemptReview {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The caller's own attempts, newest first.
    pub(crate) async fn attempt_history(
        &self,
        auth: &AuthContext,
        quiz_id: Option<&str>,
        limit: Option<i64>,
    ) -> QuizResult<Vec<AttemptView>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        let attempts =
            repositories::attempts::list_for_user(&self.pool, &auth.user_id(), quiz_id, limit)
                .await?;

        Ok(attempts.into_iter().map(AttemptView::from).collect())
    }

    pub(crate) async fn attempt_detail(
        &self,
        auth: &AuthContext,
        attempt_id: &str,
    ) -> QuizResult<AttemptDetail> {
        let attempt = repositories::attempts::find_by_id(&self.pool, attempt_id)
            .await?
            .ok_or_else(|| QuizError::NotFound(format!("attempt {attempt_id}")))?;

        if !auth.can_read_owned_by(&attempt.user_id) {
            tracing::warn!(attempt_id = %attempt_id, caller = %auth, "Attempt read denied");
            return Err(QuizError::Forbidden("attempt belongs to another user".to_string()));
        }

        let quiz = repositories::quizzes::find_by_id(&self.pool, &attempt.quiz_id)
            .await?
            .ok_or_else(|| QuizError::NotFound(format!("quiz {}", attempt.quiz_id)))?;
        let questions = repositories::questions::list_by_quiz(&self.pool, &quiz.id).await?;
        let options = repositories::options::list_by_quiz(&self.pool, &quiz.id).await?;
        let answers = repositories::attempts::list_answers(&self.pool, &attempt.id).await?;

        let reviews = review_questions(questions, &options, &answers);
        let total_correct = reviews.iter().filter(|review| review.is_correct).count();

        Ok(AttemptDetail {
            quiz_id: quiz.id,
            title: quiz.title,
            time_limit: quiz.time_limit,
            total_correct,
            total_questions: attempt.total_questions,
            attempt: AttemptView::from(attempt),
            questions: reviews,
        })
    }
}

fn review_questions(
    questions: Vec<QuizQuestion>,
    options: &[QuizOption],
    answers: &[AttemptAnswer],
) -> Vec<AttemptQuestionReview> {
    let chosen: HashMap<&str, &str> = answers
        .iter()
        .map(|answer| (answer.question_id.as_str(), answer.selected_option_id.as_str()))
        .collect();

    questions
        .into_iter()
        .map(|question| {
            let chosen_id = chosen.get(question.id.as_str()).copied();
            let mut selected = None;
            let mut correct = None;
            for option in options.iter().filter(|option| option.question_id == question.id) {
                if Some(option.id.as_str()) == chosen_id {
                    selected = Some(option);
                }
                if option.is_correct && correct.is_none() {
                    correct = Some(option);
                }
            }

            AttemptQuestionReview {
                my_answer: selected.map(|option| option.content.clone()),
                correct_answer: correct.map(|option| option.content.clone()),
                is_correct: selected.map(|option| option.is_correct).unwrap_or(false),
                id: question.id,
                question_text: question.question_text,
                explanation: question.explanation,
            }
        })
        .collect()
}
