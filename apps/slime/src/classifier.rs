//! # Classification Client
//!
//! The external model that reads a chat turn, answers in character and picks
//! the trait to grow. Its output is untrusted: [`RawClassification`] is
//! whatever came over the wire, [`Classification`] is what survived
//! validation.
//!
//! ```text
//! Conversation ──ClassificationRequest──► Classifier ──RawClassification──►
//!      ▲                                                      │ validate()
//!      └──────────────── Classification ◄─────────────────────┘
//! ```

use crate::prompts::{SlimeProfile, system_instruction, turn_prompt};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slime_core::catalog::TraitId;
use slime_core::conversation::{Message, Role};
use std::time::Duration;
use thiserror::Error;

/// Default public endpoint for generateContent.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// How many earlier messages travel with each turn.
pub const HISTORY_WINDOW: usize = 10;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors from the classification round trip.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// No API key configured.
    #[error("API key not set (use --api-key, SLIME_API_KEY or GEMINI_API_KEY)")]
    MissingApiKey,

    /// Transport failure. The URL is stripped before it gets here.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The service answered with a non-success status.
    #[error("classifier returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The answer could not be parsed into the expected shape.
    #[error("malformed classifier response: {0}")]
    Malformed(String),

    /// JSON payload did not parse.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The reply text was missing or blank.
    #[error("classifier returned no reply text")]
    EmptyReply,
}

impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        ClassifierError::Http(e.without_url())
    }
}

// =============================================================================
// REQUEST / RESULT TYPES
// =============================================================================

/// Everything the classifier sees for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    /// Earlier messages, oldest first (at most [`HISTORY_WINDOW`]).
    pub history: Vec<Message>,
    pub profile: SlimeProfile,
    /// The message being answered.
    pub user_text: String,
}

/// Structured output exactly as the model produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawClassification {
    #[serde(default)]
    pub r#trait: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default, rename = "detectedName")]
    pub detected_name: Option<String>,
}

/// Validated classifier output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Sanitized trait; unknown identifiers became the fallback trait.
    pub trait_id: TraitId,
    /// `true` when the model's identifier was not recognized.
    pub trait_was_unknown: bool,
    pub reply: String,
    pub detected_name: Option<String>,
}

impl RawClassification {
    /// Validate untrusted output.
    ///
    /// The trait is never an error (unknown → fallback). A missing or blank
    /// reply fails the whole turn.
    pub fn validate(self) -> Result<Classification, ClassifierError> {
        let raw_trait = self.r#trait.unwrap_or_default();
        let parsed = TraitId::parse(&raw_trait);

        let reply = self
            .response
            .filter(|r| !r.trim().is_empty())
            .ok_or(ClassifierError::EmptyReply)?;

        let detected_name = self
            .detected_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(Classification {
            trait_id: parsed.unwrap_or_else(|| TraitId::sanitize(&raw_trait)),
            trait_was_unknown: parsed.is_none(),
            reply,
            detected_name,
        })
    }
}

// =============================================================================
// CLASSIFIER TRAIT
// =============================================================================

/// The external classification collaborator.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// One round trip. Implementations must not retry.
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<RawClassification, ClassifierError>;
}

// =============================================================================
// GEMINI CLIENT
// =============================================================================

/// Settings for [`GeminiClassifier`].
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_base: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// generateContent client returning JSON-mode structured output.
#[derive(Debug, Clone)]
pub struct GeminiClassifier {
    settings: GeminiSettings,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClassifier {
    pub fn new(settings: GeminiSettings) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.model
        )
    }

    /// Request body: condensed history, the turn prompt, and a response
    /// schema requiring `trait` and `response`.
    pub fn build_request_body(request: &ClassificationRequest) -> serde_json::Value {
        let mut contents: Vec<serde_json::Value> = request
            .history
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Model | Role::System => "model",
                };
                serde_json::json!({ "role": role, "parts": [{ "text": m.text }] })
            })
            .collect();
        contents.push(serde_json::json!({
            "role": "user",
            "parts": [{ "text": turn_prompt(&request.profile, &request.user_text) }]
        }));

        serde_json::json!({
            "contents": contents,
            "systemInstruction": {
                "parts": [{ "text": system_instruction(&request.profile) }]
            },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "trait": { "type": "STRING" },
                        "response": { "type": "STRING" },
                        "detectedName": { "type": "STRING" }
                    },
                    "required": ["trait", "response"]
                }
            }
        })
    }

    /// Pull the JSON text out of a generateContent response and decode it.
    pub fn parse_response(body: &str) -> Result<RawClassification, ClassifierError> {
        let response: GenerateResponse = serde_json::from_str(body)?;
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ClassifierError::Malformed("no candidates".to_string()))?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ClassifierError::Malformed("empty candidate text".to_string()));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<RawClassification, ClassifierError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(ClassifierError::MissingApiKey)?;

        tracing::debug!(
            model = %self.settings.model,
            history = request.history.len(),
            "sending classification request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&Self::build_request_body(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Self::parse_response(&body)
    }
}

// =============================================================================
// TESTS
// =============================================================================
