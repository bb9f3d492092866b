use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{Quiz, QuizAttempt, QuizOption, QuizQuestion};
use crate::db::types::DifficultyLevel;
use crate::repositories::quizzes::QuizSummaryRow;

/// Shape the generation service is instructed to answer with. Explicit `null`s
/// read as empty values.
#[derive(Debug, Deserialize)]
pub(crate) struct GeneratedQuizPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) questions: Vec<GeneratedQuestionPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeneratedQuestionPayload {
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) options: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) correct_answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) explanation: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parsed quiz that has not been committed yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct QuizDraft {
    pub(crate) title: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) questions: Vec<DraftQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct DraftQuestion {
    pub(crate) text: String,
    pub(crate) explanation: String,
    pub(crate) options: Vec<DraftOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct DraftOption {
    pub(crate) label: Option<char>,
    pub(crate) content: String,
    pub(crate) is_correct: bool,
}

/// An uploaded source document.
#[derive(Debug, Clone)]
pub(crate) struct SourceUpload {
    pub(crate) filename: String,
    pub(crate) bytes: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub(crate) struct GenerateQuizRequest {
    #[validate(range(min = 1, max = 50, message = "question_count must be between 1 and 50"))]
    pub(crate) question_count: u32,
    #[validate(length(min = 1, message = "difficulty is required"))]
    pub(crate) difficulty: String,
    #[serde(default)]
    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, message = "time_limit must be at least one minute"))]
    pub(crate) time_limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct OptionView {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) content: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuestionView {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) question_text: String,
    pub(crate) explanation: String,
    pub(crate) options: Vec<OptionView>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuizView {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) time_limit: Option<i32>,
    pub(crate) created_by: String,
    pub(crate) source_filename: String,
    pub(crate) created_at: String,
    pub(crate) questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuizSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) time_limit: Option<i32>,
    pub(crate) created_at: String,
    pub(crate) total_questions: i64,
    pub(crate) attempts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct AttemptView {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) user_id: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) submitted_at: String,
    pub(crate) is_completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AttemptQuestionReview {
    pub(crate) id: String,
    pub(crate) question_text: String,
    pub(crate) my_answer: Option<String>,
    pub(crate) correct_answer: Option<String>,
    pub(crate) is_correct: bool,
    pub(crate) explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AttemptDetail {
    pub(crate) attempt: AttemptView,
    pub(crate) quiz_id: String,
    pub(crate) title: String,
    pub(crate) time_limit: Option<i32>,
    pub(crate) total_correct: usize,
    pub(crate) total_questions: i32,
    pub(crate) questions: Vec<AttemptQuestionReview>,
}

impl QuizDraft {
    pub(crate) fn option_count(&self) -> usize {
        self.questions.iter().map(|question| question.options.len()).sum()
    }
}

pub(crate) fn quiz_to_view(
    quiz: Quiz,
    questions: Vec<QuizQuestion>,
    options: Vec<QuizOption>,
) -> QuizView {
    let mut question_views: Vec<QuestionView> = questions
        .into_iter()
        .map(|question| QuestionView {
            id: question.id,
            quiz_id: question.quiz_id,
            question_text: question.question_text,
            explanation: question.explanation,
            options: Vec::new(),
        })
        .collect();

    for option in options {
        if let Some(question) = question_views.iter_mut().find(|view| view.id == option.question_id)
        {
            question.options.push(OptionView {
                id: option.id,
                question_id: option.question_id,
                content: option.content,
                is_correct: option.is_correct,
            });
        }
    }

    QuizView {
        id: quiz.id,
        title: quiz.title,
        description: quiz.description,
        difficulty: quiz.difficulty,
        time_limit: quiz.time_limit,
        created_by: quiz.created_by,
        source_filename: quiz.source_filename,
        created_at: format_primitive(quiz.created_at),
        questions: question_views,
    }
}

impl From<QuizSummaryRow> for QuizSummary {
    fn from(row: QuizSummaryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            difficulty: row.difficulty,
            time_limit: row.time_limit,
            created_at: format_primitive(row.created_at),
            total_questions: row.question_count,
            attempts: row.attempt_count,
        }
    }
}

impl From<QuizAttempt> for AttemptView {
    fn from(attempt: QuizAttempt) -> Self {
        Self {
            id: attempt.id,
            quiz_id: attempt.quiz_id,
            user_id: attempt.user_id,
            score: attempt.score,
            total_questions: attempt.total_questions,
            submitted_at: format_primitive(attempt.submitted_at),
            is_completed: attempt.is_completed,
        }
    }
}
