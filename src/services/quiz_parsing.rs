use crate::core::errors::{QuestionIssue, QuestionIssueKind, QuizError, QuizResult, ValidationFailure};
use crate::db::types::DifficultyLevel;
use crate::schemas::quiz::{
    DraftOption, DraftQuestion, GeneratedQuestionPayload, GeneratedQuizPayload, QuizDraft,
};

const FALLBACK_TITLE: &str = "Generated quiz";

/// How an option was tied to the question's `correct_answer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnswerMatch {
    Label,
    Content,
    Unmatched,
}

/// Parses raw generation output into a draft.
///
/// Every question must resolve to exactly one correct option. Anything else is
/// rejected with the raw text attached; nothing is guessed.
pub(crate) fn parse(raw: &str, fallback_difficulty: DifficultyLevel) -> QuizResult<QuizDraft> {
    let body = strip_code_fences(raw);

    let payload: GeneratedQuizPayload = serde_json::from_str(body).map_err(|err| {
        tracing::warn!(error = %err, raw_len = raw.len(), "Generated quiz is not valid JSON");
        QuizError::Validation(ValidationFailure {
            reason: format!("generation service returned malformed JSON: {err}"),
            issues: Vec::new(),
            raw_response: raw.to_string(),
        })
    })?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    let mut issues = Vec::new();

    for (index, question) in payload.questions.into_iter().enumerate() {
        match resolve_question(question) {
            Ok(parsed) => questions.push(parsed),
            Err((question, kind)) => issues.push(QuestionIssue { index, question, kind }),
        }
    }

    if !issues.is_empty() {
        tracing::warn!(rejected = issues.len(), "Generated quiz has unresolvable questions");
        return Err(QuizError::Validation(ValidationFailure {
            reason: "generated quiz failed correctness resolution".to_string(),
            issues,
            raw_response: raw.to_string(),
        }));
    }

    let title = payload.title.trim();
    Ok(QuizDraft {
        title: if title.is_empty() { FALLBACK_TITLE.to_string() } else { title.to_string() },
        difficulty: fallback_difficulty,
        questions,
    })
}

fn strip_code_fences(raw: &str) -> &str {
    let mut body = raw.trim();
    if let Some(rest) = body.strip_prefix("```json").or_else(|| body.strip_prefix("```JSON")) {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

fn resolve_question(
    payload: GeneratedQuestionPayload,
) -> Result<DraftQuestion, (String, QuestionIssueKind)> {
    let text = payload.question.trim().to_string();
    if payload.options.is_empty() {
        return Err((text, QuestionIssueKind::NoOptions));
    }

    let correct_answer = payload.correct_answer.trim();
    let options: Vec<DraftOption> = payload
        .options
        .iter()
        .map(|raw_option| {
            let (label, content) = split_label(raw_option);
            let matched = match_answer(label, content, correct_answer);
            DraftOption {
                label,
                content: content.to_string(),
                is_correct: matched != AnswerMatch::Unmatched,
            }
        })
        .collect();

    match options.iter().filter(|option| option.is_correct).count() {
        1 => Ok(DraftQuestion {
            text,
            explanation: payload.explanation.trim().to_string(),
            options,
        }),
        0 => Err((text, QuestionIssueKind::NoCorrectOption)),
        count => Err((text, QuestionIssueKind::MultipleCorrect(count))),
    }
}

/// Splits `"A. Paris"` or `"b) Rome"` into an uppercase label and the content.
fn split_label(raw: &str) -> (Option<char>, &str) {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    if let (Some(letter), Some(separator)) = (chars.next(), chars.next()) {
        if letter.is_ascii_alphabetic() && (separator == '.' || separator == ')') {
            return (Some(letter.to_ascii_uppercase()), trimmed[2..].trim());
        }
    }
    (None, trimmed)
}

fn match_answer(label: Option<char>, content: &str, correct_answer: &str) -> AnswerMatch {
    if correct_answer.is_empty() {
        return AnswerMatch::Unmatched;
    }

    if let (Some(label), Some((named, claimed))) = (label, answer_label(correct_answer)) {
        // "A. Rome" names label A only when option A actually reads "Rome".
        if named == label && (claimed.is_empty() || claimed.to_lowercase() == content.to_lowercase()) {
            return AnswerMatch::Label;
        }
    }

    if content.to_lowercase() == correct_answer.to_lowercase() {
        return AnswerMatch::Content;
    }

    AnswerMatch::Unmatched
}

/// `"A"`, `"a."`, `"A)"` and `"A. Paris"` all name label `A`; the last one also
/// carries the content it claims for that label.
fn answer_label(correct_answer: &str) -> Option<(char, &str)> {
    let mut chars = correct_answer.chars();
    let letter = chars.next().filter(char::is_ascii_alphabetic)?.to_ascii_uppercase();
    match chars.next() {
        None => Some((letter, "")),
        Some('.') | Some(')') => Some((letter, correct_answer[2..].trim())),
        _ => None,
    }
}
