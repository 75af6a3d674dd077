//! # Conversation Orchestrator
//!
//! One chat turn = one user message, one classifier round trip, at most one
//! trait increment.
//!
//! A turn is split in two halves so the network call can run without holding
//! the conversation:
//!
//! 1. [`Conversation::begin_turn`] validates input, records the user message
//!    and marks the conversation busy.
//! 2. [`Conversation::complete_turn`] consumes the classifier result, applies
//!    the increment (or the apology on failure) and clears the busy flag.
//!
//! [`Conversation::send`] chains both for sequential callers such as the CLI.

use crate::classifier::{
    ClassificationRequest, Classifier, ClassifierError, HISTORY_WINDOW, RawClassification,
};
use crate::prompts::SlimeProfile;
use slime_core::catalog::TraitId;
use slime_core::conversation::{APOLOGY, ConversationLog, Message, Role};
use slime_core::progression::{IncrementOutcome, ProgressionState};
use slime_core::storage::{KeyValueStore, LoadSource, Persistence};
use slime_core::system::level_up_message;
use slime_core::{CoreError, Snapshot};
use std::sync::Arc;
use thiserror::Error;

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// ERRORS AND OUTCOMES
// =============================================================================

/// Why a turn (or a state-changing command) was not started.
#[derive(Debug, Error)]
pub enum TurnError {
    /// Another turn is awaiting its classification.
    #[error("a turn is already in flight")]
    Busy,

    /// Whitespace-only input.
    #[error("message is empty")]
    EmptyInput,

    /// Writing to the store failed.
    #[error(transparent)]
    Storage(#[from] CoreError),
}

/// A successfully applied turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedTurn {
    pub trait_id: TraitId,
    /// The classifier named a trait we do not know; the fallback was raised.
    pub trait_was_unknown: bool,
    pub reply: String,
    /// The system line appended after the reply.
    pub system_message: String,
    pub outcome: IncrementOutcome,
    pub previous: ProgressionState,
    pub state: ProgressionState,
}

/// How a started turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Applied(Box<AppliedTurn>),
    /// Classification failed. State is unchanged; the apology was appended.
    Failed { reason: String },
}

/// A started turn. Deliberately not `Clone`: it can be completed once.
#[derive(Debug)]
pub struct PendingTurn {
    request: ClassificationRequest,
}

impl PendingTurn {
    pub fn request(&self) -> &ClassificationRequest {
        &self.request
    }
}

// =============================================================================
// CONVERSATION
// =============================================================================

/// The live conversation: progression state, message log, store, classifier.
pub struct Conversation<S: KeyValueStore> {
    state: ProgressionState,
    log: ConversationLog,
    persistence: Persistence<S>,
    classifier: Arc<dyn Classifier>,
    in_flight: bool,
}

impl<S: KeyValueStore> std::fmt::Debug for Conversation<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("level", &self.state.level())
            .field("messages", &self.log.len())
            .field("classifier", &self.classifier.name())
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> Conversation<S> {
    /// Restore from `store`, falling back to defaults for missing or corrupt
    /// keys.
    pub fn open(store: S, classifier: Arc<dyn Classifier>) -> Self {
        let persistence = Persistence::new(store);

        let state = persistence.load_state();
        log_load("state", &state.source);
        let log = persistence.load_messages(now_ms());
        log_load("messages", &log.source);

        Self {
            state: state.value,
            log: log.value,
            persistence,
            classifier,
            in_flight: false,
        }
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn classifier(&self) -> Arc<dyn Classifier> {
        Arc::clone(&self.classifier)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.state.clone(), self.log.clone())
    }

    /// Start a turn.
    ///
    /// The history sent to the classifier is captured before the new user
    /// message is appended. The text is kept as typed; only the emptiness
    /// check ignores surrounding whitespace.
    pub fn begin_turn(&mut self, text: &str) -> Result<PendingTurn, TurnError> {
        if self.in_flight {
            return Err(TurnError::Busy);
        }
        if text.trim().is_empty() {
            return Err(TurnError::EmptyInput);
        }

        let request = ClassificationRequest {
            history: self.log.recent(HISTORY_WINDOW).to_vec(),
            profile: SlimeProfile::of(&self.state),
            user_text: text.to_string(),
        };

        self.log.push(Message::new(Role::User, text, now_ms()));
        self.persist_messages();
        self.in_flight = true;

        tracing::debug!(chars = text.chars().count(), "turn started");
        Ok(PendingTurn { request })
    }

    /// Finish a turn with the classifier's answer.
    pub fn complete_turn(
        &mut self,
        _pending: PendingTurn,
        result: Result<RawClassification, ClassifierError>,
    ) -> TurnOutcome {
        self.in_flight = false;

        let classification = match result.and_then(RawClassification::validate) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "classification failed");
                self.log.push(Message::new(Role::Model, APOLOGY, now_ms()));
                self.persist_messages();
                return TurnOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        if classification.trait_was_unknown {
            tracing::warn!(fallback = %classification.trait_id, "unknown trait from classifier");
        }

        let previous = self.state.clone();
        let outcome = self
            .state
            .apply_increment(classification.trait_id, classification.detected_name.as_deref());
        let system_message = level_up_message(&outcome);

        let now = now_ms();
        self.log
            .push(Message::new(Role::Model, classification.reply.clone(), now));
        self.log
            .push(Message::new(Role::System, system_message.clone(), now));

        if let Err(e) = self.persistence.save_state(&self.state) {
            tracing::warn!(error = %e, "failed to persist state");
        }
        self.persist_messages();

        tracing::info!(
            trait_id = %outcome.trait_id,
            level = outcome.new_level,
            capped = outcome.capped,
            evolution = ?outcome.evolution,
            "turn applied"
        );

        TurnOutcome::Applied(Box::new(AppliedTurn {
            trait_id: classification.trait_id,
            trait_was_unknown: classification.trait_was_unknown,
            reply: classification.reply,
            system_message,
            outcome,
            previous,
            state: self.state.clone(),
        }))
    }

    /// Give up on the turn in flight without a classifier result.
    ///
    /// Used when the task awaiting the classifier died. Logs the apology and
    /// clears the busy flag; a no-op when nothing is in flight.
    pub fn abort_turn(&mut self) {
        if !self.in_flight {
            return;
        }
        self.in_flight = false;
        tracing::warn!("turn aborted before classification finished");
        self.log.push(Message::new(Role::Model, APOLOGY, now_ms()));
        self.persist_messages();
    }

    /// Run a whole turn in place.
    pub async fn send(&mut self, text: &str) -> Result<TurnOutcome, TurnError> {
        let pending = self.begin_turn(text)?;
        let classifier = self.classifier();
        let result = classifier.classify(pending.request()).await;
        Ok(self.complete_turn(pending, result))
    }

    /// Write both keys now.
    pub fn save(&mut self) -> Result<(), TurnError> {
        self.persistence.save_snapshot(&self.snapshot())?;
        Ok(())
    }

    /// Back to a fresh slime and a greeting-only log.
    ///
    /// The fresh snapshot is written first; memory only changes once the
    /// write succeeded, so a failed reset leaves the conversation as it was.
    pub fn reset(&mut self) -> Result<(), TurnError> {
        if self.in_flight {
            return Err(TurnError::Busy);
        }
        let fresh = Snapshot::new(
            ProgressionState::default(),
            ConversationLog::with_greeting(now_ms()),
        );
        self.persistence.save_snapshot(&fresh)?;
        self.state = fresh.state;
        self.log = fresh.messages;
        tracing::info!("conversation reset");
        Ok(())
    }

    fn persist_messages(&mut self) {
        if let Err(e) = self.persistence.save_messages(&self.log) {
            tracing::warn!(error = %e, "failed to persist messages");
        }
    }
}

fn log_load(what: &str, source: &LoadSource) {
    match source {
        LoadSource::Stored => tracing::debug!(what, "restored from store"),
        LoadSource::Missing => tracing::info!(what, "nothing stored, starting fresh"),
        LoadSource::Corrupt(reason) => {
            tracing::warn!(what, %reason, "stored value unreadable, starting fresh");
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
