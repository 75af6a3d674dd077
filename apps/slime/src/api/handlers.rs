//! Route handlers.

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::config::local_offset;
use crate::orchestrator::TurnOutcome;
use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use slime_core::catalog::{TRAIT_COUNT, TraitId};
use slime_core::conversation::Message;
use slime_core::progression::ProgressionState;
use slime_core::system::{Appearance, Threshold, gain_popup};
use slime_core::transcript::{render_transcript, transcript_file_name};
use std::sync::Arc;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateResponse {
    pub state: ProgressionState,
    pub dominant: TraitId,
    pub ranking: [TraitId; TRAIT_COUNT],
    pub appearance: Appearance,
    pub messages: usize,
    pub busy: bool,
}

impl StateResponse {
    fn of(state: &ProgressionState, messages: usize, busy: bool) -> Self {
        Self {
            state: state.clone(),
            dominant: state.dominant_trait(),
            ranking: state.ranking(),
            appearance: Appearance::of(state),
            messages,
            busy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalkRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TalkResponse {
    pub reply: String,
    pub system_message: String,
    #[serde(rename = "trait")]
    pub trait_id: TraitId,
    /// Short popup such as "論理 UP!"; absent when the trait was capped.
    pub popup: Option<String>,
    pub leveled_up: bool,
    pub evolution: Option<Threshold>,
    pub state: ProgressionState,
    pub appearance: Appearance,
}

// =============================================================================
// HANDLERS
// =============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn get_state(State(state): State<AppState>) -> Json<StateResponse> {
    let conversation = state.conversation.lock().await;
    Json(StateResponse::of(
        conversation.state(),
        conversation.messages().len(),
        conversation.is_busy(),
    ))
}

pub async fn get_messages(State(state): State<AppState>) -> Json<Vec<Message>> {
    let conversation = state.conversation.lock().await;
    Json(conversation.messages().to_vec())
}

/// One chat turn.
///
/// The lock is released while the classifier runs. The round trip runs in its
/// own task so a dropped client cannot leave the conversation busy; if that
/// task dies the turn is aborted.
pub async fn talk(
    State(state): State<AppState>,
    Json(request): Json<TalkRequest>,
) -> Result<Json<TalkResponse>, ApiError> {
    let (pending, classifier) = {
        let mut conversation = state.conversation.lock().await;
        (conversation.begin_turn(&request.text)?, conversation.classifier())
    };

    let shared = Arc::clone(&state.conversation);
    let task = tokio::spawn(async move {
        let result = classifier.classify(pending.request()).await;
        shared.lock().await.complete_turn(pending, result)
    });
    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            state.conversation.lock().await.abort_turn();
            return Err(ApiError::Internal(e.to_string()));
        }
    };

    match outcome {
        TurnOutcome::Applied(applied) => Ok(Json(TalkResponse {
            reply: applied.reply,
            system_message: applied.system_message,
            trait_id: applied.trait_id,
            popup: (!applied.outcome.capped).then(|| gain_popup(applied.trait_id)),
            leveled_up: applied.outcome.leveled_up(),
            evolution: applied.outcome.evolution,
            appearance: Appearance::of(&applied.state),
            state: applied.state,
        })),
        TurnOutcome::Failed { .. } => Err(ApiError::Upstream),
    }
}

pub async fn save(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.conversation.lock().await.save()?;
    Ok(Json(serde_json::json!({ "saved": true })))
}

pub async fn reset(State(state): State<AppState>) -> Result<Json<StateResponse>, ApiError> {
    let mut conversation = state.conversation.lock().await;
    conversation.reset()?;
    Ok(Json(StateResponse::of(
        conversation.state(),
        conversation.messages().len(),
        conversation.is_busy(),
    )))
}

pub async fn export_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let offset = local_offset();
    let text = {
        let conversation = state.conversation.lock().await;
        render_transcript(conversation.messages(), offset)
    };
    let today = chrono::Utc::now().with_timezone(&offset).date_naive();
    let disposition = format!("attachment; filename=\"{}\"", transcript_file_name(today));
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        text,
    )
}
