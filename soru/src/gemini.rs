use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::prompt;
use crate::solution::{AnswerChoice, ImageHandle, Solution, Subject};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API Hatası ({status})")]
    Status { status: u16, body: String },
    #[error("yanıtta metin bulunamadı")]
    MissingText,
    #[error("çözüm okunamadı: {0}")]
    Malformed(String),
}

impl GeminiError {
    /// Message shown in place of a solution.
    pub fn user_message(&self) -> String {
        format!("Bir hata oluştu: {self}")
    }

    /// Message appended to the chat transcript in place of a reply.
    pub fn chat_message(&self) -> String {
        format!("Üzgünüm, bir hata oluştu: {self}")
    }

    /// Service-provided error detail, when the body carried one.
    pub fn service_detail(&self) -> Option<String> {
        match self {
            GeminiError::Status { body, .. } => service_error_message(body),
            _ => None,
        }
    }
}

/// Everything needed to solve one question.
#[derive(Clone, Debug)]
pub struct SolveRequest {
    pub image: ImageHandle,
    pub subject: Subject,
    pub answer: AnswerChoice,
    pub correction: Option<String>,
}

impl SolveRequest {
    pub fn prompt(&self) -> String {
        prompt::solve_prompt(self.subject, self.answer, self.correction.as_deref())
    }
}

/// A follow-up question about an existing solution.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub image: ImageHandle,
    pub solution: Solution,
    pub message: String,
}

impl ChatRequest {
    pub fn prompt(&self) -> String {
        prompt::chat_prompt(&self.solution, &self.message)
    }
}

/// The remote tutor. Implemented over HTTP by [`GeminiClient`]; tests plug
/// in scripted backends.
#[async_trait]
pub trait SolverBackend: Send + Sync {
    async fn solve(&self, request: &SolveRequest) -> Result<Solution, GeminiError>;
    async fn ask(&self, request: &ChatRequest) -> Result<String, GeminiError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    async fn generate(&self, body: &GenerateContentRequest) -> Result<String, GeminiError> {
        let resp = self.client.post(self.endpoint()).json(body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                detail = %service_error_message(&body).unwrap_or_default(),
                "generateContent failed"
            );
            return Err(GeminiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| GeminiError::Malformed(e.to_string()))?;
        extract_text(parsed)
    }
}

#[async_trait]
impl SolverBackend for GeminiClient {
    async fn solve(&self, request: &SolveRequest) -> Result<Solution, GeminiError> {
        tracing::debug!(
            subject = %request.subject,
            image_bytes = request.image.len(),
            corrected = request.correction.is_some(),
            "solve request"
        );
        let body = GenerateContentRequest::solve(&request.prompt(), &request.image);
        let text = self.generate(&body).await?;
        parse_solution(&text)
    }

    async fn ask(&self, request: &ChatRequest) -> Result<String, GeminiError> {
        tracing::debug!(message_len = request.message.len(), "chat request");
        let body = GenerateContentRequest::chat(&request.prompt(), &request.image);
        self.generate(&body).await
    }
}

/// Decode the structured solve reply. Any missing field rejects the whole
/// payload.
pub fn parse_solution(text: &str) -> Result<Solution, GeminiError> {
    serde_json::from_str(text.trim()).map_err(|e| GeminiError::Malformed(e.to_string()))
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<serde_json::Value>,
}

impl GenerateContentRequest {
    fn solve(prompt: &str, image: &ImageHandle) -> Self {
        Self {
            contents: vec![Content::user(prompt, image)],
            generation_config: Some(json!({
                "responseMimeType": "application/json",
                "responseSchema": solution_schema(),
            })),
        }
    }

    fn chat(prompt: &str, image: &ImageHandle) -> Self {
        Self {
            contents: vec![Content::user(prompt, image)],
            generation_config: None,
        }
    }
}

fn solution_schema() -> serde_json::Value {
    let properties: serde_json::Map<String, serde_json::Value> = prompt::SOLUTION_FIELDS
        .iter()
        .map(|field| (field.to_string(), json!({ "type": "STRING" })))
        .collect();
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": prompt::SOLUTION_FIELDS,
    })
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn user(prompt: &str, image: &ImageHandle) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![
                Part::Text {
                    text: prompt.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineDataPayload {
                        mime_type: image.mime_type().to_string(),
                        data: base64::engine::general_purpose::STANDARD.encode(image.bytes()),
                    },
                },
            ],
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// The reply text lives at `candidates[0].content.parts[0].text`.
fn extract_text(response: GenerateContentResponse) -> Result<String, GeminiError> {
    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or(GeminiError::MissingText)
}

fn service_error_message(body: &str) -> Option<String> {
    let wrapper = serde_json::from_str::<ErrorWrapper>(body).ok()?;
    let message = wrapper.error.message?;
    Some(match wrapper.error.status {
        Some(status) if !status.is_empty() => format!("{status}: {message}"),
        _ => message,
    })
}
