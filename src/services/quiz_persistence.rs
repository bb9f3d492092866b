use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::errors::{QuizError, QuizResult};
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::quiz::{QuizDraft, SourceUpload};
use crate::services::file_archive::FileArchive;

pub(crate) struct PersistQuiz<'a> {
    pub(crate) draft: &'a QuizDraft,
    pub(crate) owner_id: &'a str,
    pub(crate) description: &'a str,
    /// Minutes.
    pub(crate) time_limit: Option<i32>,
    pub(crate) source: &'a SourceUpload,
}

/// Writes a parsed quiz and archives its source in one transaction.
#[derive(Clone)]
pub(crate) struct QuizPersistenceCoordinator {
    pool: PgPool,
    archive: Arc<dyn FileArchive>,
}

impl QuizPersistenceCoordinator {
    pub(crate) fn new(pool: PgPool, archive: Arc<dyn FileArchive>) -> Self {
        Self { pool, archive }
    }

    /// Returns the new quiz id. On any failure, archival included, nothing is committed.
    pub(crate) async fn persist(&self, params: PersistQuiz<'_>) -> QuizResult<String> {
        check_draft(params.draft)?;
        if matches!(params.time_limit, Some(minutes) if minutes < 1) {
            return Err(QuizError::Input("time_limit must be at least one minute".to_string()));
        }

        let quiz_id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        if let Err(err) = self.write_quiz(&mut tx, &quiz_id, &params).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(quiz_id = %quiz_id, error = %rollback_err, "Rollback failed");
            }
            tracing::warn!(quiz_id = %quiz_id, error = %err, "Quiz persistence rolled back");
            return Err(err);
        }

        if let Err(err) = tx.commit().await {
            tracing::error!(quiz_id = %quiz_id, error = %err, "Commit failed after archiving");
            discard_orphaned_source(self.archive.as_ref(), &quiz_id).await;
            return Err(err.into());
        }

        metrics::counter!("quizzes_persisted_total").increment(1);
        tracing::info!(
            quiz_id = %quiz_id,
            owner_id = %params.owner_id,
            question_count = params.draft.questions.len(),
            option_count = params.draft.option_count(),
            "Quiz persisted"
        );

        Ok(quiz_id)
    }

    async fn write_quiz(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        quiz_id: &str,
        params: &PersistQuiz<'_>,
    ) -> QuizResult<()> {
        let draft = params.draft;

        let stored_id = repositories::quizzes::create(
            &mut **tx,
            repositories::quizzes::CreateQuiz {
                id: quiz_id,
                title: &draft.title,
                description: params.description,
                difficulty: draft.difficulty,
                time_limit: params.time_limit,
                created_by: params.owner_id,
                source_filename: &params.source.filename,
                created_at: primitive_now_utc(),
            },
        )
        .await?;
        if stored_id != quiz_id {
            return Err(QuizError::internal(
                format!("expected {quiz_id}, store returned {stored_id}"),
                "quiz id mismatch on insert",
            ));
        }

        let question_ids: Vec<String> =
            draft.questions.iter().map(|_| Uuid::new_v4().to_string()).collect();
        let new_questions: Vec<repositories::questions::NewQuestion<'_>> = draft
            .questions
            .iter()
            .zip(&question_ids)
            .enumerate()
            .map(|(position, (question, id))| repositories::questions::NewQuestion {
                id,
                position: position as i32,
                question_text: &question.text,
                explanation: &question.explanation,
            })
            .collect();

        let returned_ids =
            repositories::questions::insert_bulk(&mut **tx, quiz_id, &new_questions).await?;
        if returned_ids != question_ids {
            return Err(QuizError::internal(
                format!("inserted {} questions, store returned {} ids", question_ids.len(), returned_ids.len()),
                "question ids mismatch after bulk insert",
            ));
        }

        let new_options = attach_options(draft, &returned_ids)?;
        let inserted = repositories::options::insert_bulk(&mut **tx, &new_options).await?;
        if inserted != new_options.len() as u64 {
            return Err(QuizError::internal(
                format!("inserted {inserted} of {} options", new_options.len()),
                "option count mismatch after bulk insert",
            ));
        }

        self.archive.store(quiz_id, &params.source.filename, &params.source.bytes).await
    }
}

/// Best effort: a source whose quiz never committed is removed, or counted in
/// `quiz_archive_orphans_total` when removal fails too.
async fn discard_orphaned_source(archive: &dyn FileArchive, quiz_id: &str) {
    match archive.remove(quiz_id).await {
        Ok(()) => tracing::info!(quiz_id = %quiz_id, "Orphaned source removed"),
        Err(err) => {
            metrics::counter!("quiz_archive_orphans_total").increment(1);
            tracing::error!(quiz_id = %quiz_id, error = %err, "Orphaned source left in archive");
        }
    }
}

/// Pairs each draft question with the id stored at the same position.
fn attach_options<'a>(
    draft: &'a QuizDraft,
    question_ids: &'a [String],
) -> QuizResult<Vec<repositories::options::NewOption<'a>>> {
    if draft.questions.len() != question_ids.len() {
        return Err(QuizError::internal(
            format!("{} questions, {} ids", draft.questions.len(), question_ids.len()),
            "question ids do not line up with draft questions",
        ));
    }

    Ok(draft
        .questions
        .iter()
        .zip(question_ids)
        .flat_map(|(question, question_id)| {
            question.options.iter().enumerate().map(move |(position, option)| {
                repositories::options::NewOption {
                    id: Uuid::new_v4().to_string(),
                    question_id: question_id.as_str(),
                    position: position as i32,
                    content: option.content.as_str(),
                    is_correct: option.is_correct,
                }
            })
        })
        .collect())
}

fn check_draft(draft: &QuizDraft) -> QuizResult<()> {
    if draft.questions.is_empty() {
        return Err(QuizError::Input("generated quiz has no questions to save".to_string()));
    }

    for (index, question) in draft.questions.iter().enumerate() {
        let correct = question.options.iter().filter(|option| option.is_correct).count();
        if question.options.is_empty() || correct != 1 {
            return Err(QuizError::internal(
                format!("question {} has {} options, {correct} correct", index + 1, question.options.len()),
                "draft violates the one-correct-option invariant",
            ));
        }
    }

    Ok(())
}
