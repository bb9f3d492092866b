pub(crate) mod attempts;
pub(crate) mod options;
pub(crate) mod questions;
pub(crate) mod quizzes;
