pub(crate) mod attempt_grading;
pub(crate) mod attempt_review;
pub(crate) mod content_extraction;
pub(crate) mod file_archive;
pub(crate) mod quiz_catalog;
pub(crate) mod quiz_generation;
pub(crate) mod quiz_ingestion;
pub(crate) mod quiz_parsing;
pub(crate) mod quiz_persistence;
pub(crate) mod storage;
