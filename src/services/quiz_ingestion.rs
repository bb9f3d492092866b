use std::time::Instant;

use serde::Serialize;
use validator::Validate;

use crate::core::auth::AuthContext;
use crate::core::errors::{QuizError, QuizResult};
use crate::db::types::DifficultyLevel;
use crate::schemas::quiz::{GenerateQuizRequest, SourceUpload};
use crate::services::content_extraction::{detect_mime_type, is_unsupported_container, ContentExtractor};
use crate::services::quiz_generation::{GenerationPayload, QuizGenerationClient};
use crate::services::quiz_parsing;
use crate::services::quiz_persistence::{PersistQuiz, QuizPersistenceCoordinator};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct IngestedQuiz {
    pub(crate) quiz_id: String,
    pub(crate) title: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) question_count: usize,
}

/// One document in, one persisted quiz out.
#[derive(Clone)]
pub(crate) struct QuizIngestion {
    extractor: ContentExtractor,
    generation: QuizGenerationClient,
    persistence: QuizPersistenceCoordinator,
    max_upload_bytes: usize,
    send_raw_file: bool,
}

impl QuizIngestion {
    pub(crate) fn new(
        extractor: ContentExtractor,
        generation: QuizGenerationClient,
        persistence: QuizPersistenceCoordinator,
        max_upload_bytes: usize,
        send_raw_file: bool,
    ) -> Self {
        Self { extractor, generation, persistence, max_upload_bytes, send_raw_file }
    }

    pub(crate) async fn ingest(
        &self,
        auth: &AuthContext,
        upload: SourceUpload,
        request: GenerateQuizRequest,
    ) -> QuizResult<IngestedQuiz> {
        request.validate().map_err(|err| QuizError::Input(err.to_string()))?;
        let difficulty: DifficultyLevel = request.difficulty.parse()?;
        self.check_upload(&upload)?;

        let timer = Instant::now();
        let owner_id = auth.user_id();
        tracing::info!(
            user_id = %owner_id,
            filename = %upload.filename,
            size = upload.bytes.len(),
            question_count = request.question_count,
            difficulty = %difficulty,
            "Quiz ingestion started"
        );

        let payload = self.build_payload(&upload).await?;
        let raw = self.generation.generate(&payload, request.question_count, difficulty).await?;
        let draft = quiz_parsing::parse(&raw, difficulty)?;

        if draft.questions.len() != request.question_count as usize {
            tracing::warn!(
                requested = request.question_count,
                generated = draft.questions.len(),
                "Generated question count differs from request"
            );
        }

        let quiz_id = self
            .persistence
            .persist(PersistQuiz {
                draft: &draft,
                owner_id: &owner_id,
                description: request.description.as_deref().unwrap_or_default().trim(),
                time_limit: request.time_limit,
                source: &upload,
            })
            .await?;

        tracing::info!(
            quiz_id = %quiz_id,
            user_id = %owner_id,
            question_count = draft.questions.len(),
            duration_seconds = timer.elapsed().as_secs_f64(),
            "Quiz ingestion completed"
        );

        Ok(IngestedQuiz {
            quiz_id,
            title: draft.title,
            difficulty: draft.difficulty,
            question_count: draft.questions.len(),
        })
    }

    fn check_upload(&self, upload: &SourceUpload) -> QuizResult<()> {
        if upload.filename.trim().is_empty() {
            return Err(QuizError::Input("uploaded file has no name".to_string()));
        }
        if upload.bytes.is_empty() {
            return Err(QuizError::Input("uploaded file is empty".to_string()));
        }
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(QuizError::Input(format!(
                "uploaded file is {} bytes; the limit is {} bytes",
                upload.bytes.len(),
                self.max_upload_bytes
            )));
        }

        let mime_type = detect_mime_type(&upload.bytes, &upload.filename);
        if is_unsupported_container(mime_type) {
            return Err(QuizError::Input(format!(
                "{mime_type} files are not supported; upload a PDF, HTML, JSON or plain-text document"
            )));
        }

        Ok(())
    }

    async fn build_payload(&self, upload: &SourceUpload) -> QuizResult<GenerationPayload> {
        if self.send_raw_file {
            return Ok(GenerationPayload::File {
                bytes: upload.bytes.clone(),
                mime_type: detect_mime_type(&upload.bytes, &upload.filename).to_string(),
            });
        }

        let extractor = self.extractor.clone();
        let bytes = upload.bytes.clone();
        let filename = upload.filename.clone();
        let text = tokio::task::spawn_blocking(move || extractor.extract_reader(&bytes[..], &filename))
            .await
            .map_err(|err| QuizError::internal(err, "content extraction task failed"))?
            .map_err(|err| QuizError::Input(err.to_string()))?;

        if text.trim().is_empty() {
            return Err(QuizError::Input("no readable text found in the uploaded file".to_string()));
        }

        Ok(GenerationPayload::Text(text))
    }
}
