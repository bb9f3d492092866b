use sqlx::PgPool;

use crate::core::errors::QuizResult;
use crate::repositories;
use crate::schemas::quiz::{quiz_to_view, QuizSummary, QuizView};

const DEFAULT_OWNER_LIMIT: i64 = 100;

/// Read side for persisted quizzes.
#[derive(Clone)]
pub(crate) struct QuizCatalog {
    pool: PgPool,
}

impl QuizCatalog {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn fetch_quiz(&self, quiz_id: &str) -> QuizResult<Option<QuizView>> {
        let Some(quiz) = repositories::quizzes::find_by_id(&self.pool, quiz_id).await? else {
            return Ok(None);
        };
        let questions = repositories::questions::list_by_quiz(&self.pool, quiz_id).await?;
        let options = repositories::options::list_by_quiz(&self.pool, quiz_id).await?;

        Ok(Some(quiz_to_view(quiz, questions, options)))
    }

    pub(crate) async fn list_owned(
        &self,
        owner_id: &str,
        limit: Option<i64>,
    ) -> QuizResult<Vec<QuizSummary>> {
        let rows = repositories::quizzes::list_by_owner(
            &self.pool,
            owner_id,
            limit.unwrap_or(DEFAULT_OWNER_LIMIT),
        )
        .await?;

        Ok(rows.into_iter().map(QuizSummary::from).collect())
    }
}
