use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::{GenerationSettings, Settings};
use crate::core::errors::{QuizError, QuizResult, ValidationFailure};
use crate::db::types::DifficultyLevel;
use crate::services::content_extraction::is_unsupported_container;

const SERVICE: &str = "generation service";

/// What the generation service reads the quiz from.
#[derive(Debug, Clone)]
pub(crate) enum GenerationPayload {
    Text(String),
    File { bytes: Vec<u8>, mime_type: String },
}

#[derive(Debug, Clone)]
pub(crate) struct QuizGenerationClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    max_output_tokens: u32,
}

impl QuizGenerationClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.generation())
    }

    pub(crate) fn new(config: &GenerationSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// Single request, no retries. Returns the model's text exactly as received.
    pub(crate) async fn generate(
        &self,
        payload: &GenerationPayload,
        question_count: u32,
        difficulty: DifficultyLevel,
    ) -> QuizResult<String> {
        if self.api_key.is_empty() {
            return Err(QuizError::MissingCredential("GEMINI_API_KEY"));
        }

        let request_body = self.build_request(payload, question_count, difficulty)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let timer = Instant::now();

        tracing::info!(
            model = %self.model,
            question_count,
            difficulty = %difficulty,
            inline_file = matches!(payload, GenerationPayload::File { .. }),
            "Sending quiz generation request"
        );

        let result = self.send(&url, &request_body).await;
        let elapsed = timer.elapsed().as_secs_f64();
        let status = match &result {
            Ok(_) => "success",
            Err(QuizError::Validation(_)) => "invalid_envelope",
            Err(_) => "error",
        };

        metrics::counter!("quiz_generation_requests_total", "status" => status).increment(1);
        metrics::histogram!("quiz_generation_duration_seconds").record(elapsed);

        match &result {
            Ok(text) => tracing::info!(
                duration_seconds = elapsed,
                response_chars = text.chars().count(),
                "Quiz generation completed"
            ),
            Err(err) => tracing::warn!(
                duration_seconds = elapsed,
                error = %err,
                retryable = err.is_retryable(),
                "Quiz generation failed"
            ),
        }

        result
    }

    fn build_request(
        &self,
        payload: &GenerationPayload,
        question_count: u32,
        difficulty: DifficultyLevel,
    ) -> QuizResult<Value> {
        let instructions = build_prompt(question_count, difficulty);

        let parts = match payload {
            GenerationPayload::Text(text) => {
                vec![json!({ "text": format!("{instructions}\nSource material:\n{text}") })]
            }
            GenerationPayload::File { bytes, mime_type } => {
                if is_unsupported_container(mime_type) {
                    return Err(QuizError::Input(format!(
                        "file type {mime_type} cannot be read by the generation service; \
                         upload a PDF, HTML, JSON or plain-text document instead"
                    )));
                }
                vec![
                    json!({ "text": instructions }),
                    json!({
                        "inline_data": {
                            "mime_type": mime_type,
                            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
                        }
                    }),
                ]
            }
        };

        Ok(json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        }))
    }

    async fn send(&self, url: &str, body: &Value) -> QuizResult<String> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| QuizError::upstream_transport(SERVICE, err))?;

        let status = response.status();
        let raw = response.text().await.map_err(|err| QuizError::upstream_transport(SERVICE, err))?;

        if !status.is_success() {
            return Err(QuizError::upstream_status(SERVICE, status.as_u16(), &raw));
        }

        candidate_text(&raw).ok_or_else(|| {
            QuizError::Validation(ValidationFailure {
                reason: "generation response carried no candidate text".to_string(),
                issues: Vec::new(),
                raw_response: raw.clone(),
            })
        })
    }
}

fn build_prompt(question_count: u32, difficulty: DifficultyLevel) -> String {
    format!(
        r#"Return ONLY a raw JSON object built from the attached material.

Rules:
- Write {question_count} multiple-choice questions at {difficulty} difficulty.
- Give every question an "explanation" that briefly justifies the correct answer.
- Derive the "title" from the material itself.
- Do NOT add any introduction, commentary or markdown code fences.
- Use exactly this structure:
{{
  "title": "Title that fits the material",
  "questions": [
    {{
      "question": "Question text",
      "options": ["A. Option 1", "B. Option 2", "C. Option 3", "D. Option 4"],
      "correct_answer": "A",
      "explanation": "Why the answer is correct"
    }}
  ]
}}
"#
    )
}

/// `candidates[0].content.parts[..].text`, first non-empty part.
fn candidate_text(raw: &str) -> Option<String> {
    let envelope: Value = serde_json::from_str(raw).ok()?;
    envelope
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
}
