use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::services::attempt_grading::AttemptGradingEngine;
use crate::services::attempt_review::AttemptReview;
use crate::services::content_extraction::ContentExtractor;
use crate::services::file_archive::FileArchive;
use crate::services::quiz_catalog::QuizCatalog;
use crate::services::quiz_generation::QuizGenerationClient;
use crate::services::quiz_ingestion::QuizIngestion;
use crate::services::quiz_persistence::QuizPersistenceCoordinator;

/// Process-wide collaborators, built once by the caller and handed to each component.
#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    generation: QuizGenerationClient,
    archive: Arc<dyn FileArchive>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        generation: QuizGenerationClient,
        archive: Arc<dyn FileArchive>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, generation, archive }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn archive(&self) -> Arc<dyn FileArchive> {
        self.inner.archive.clone()
    }

    pub(crate) fn persistence(&self) -> QuizPersistenceCoordinator {
        QuizPersistenceCoordinator::new(self.inner.db.clone(), self.archive())
    }

    pub(crate) fn grading(&self) -> AttemptGradingEngine {
        AttemptGradingEngine::new(self.inner.db.clone())
    }

    pub(crate) fn catalog(&self) -> QuizCatalog {
        QuizCatalog::new(self.inner.db.clone())
    }

    pub(crate) fn review(&self) -> AttemptReview {
        AttemptReview::new(self.inner.db.clone())
    }

    pub(crate) fn ingestion(&self) -> QuizIngestion {
        let settings = self.settings();
        QuizIngestion::new(
            ContentExtractor::from_settings(settings),
            self.inner.generation.clone(),
            self.persistence(),
            settings.extraction().max_upload_bytes(),
            settings.generation().send_raw_file,
        )
    }
}
