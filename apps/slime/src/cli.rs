//! # CLI Module
//!
//! Command-line interface for the slime companion.
//!
//! Commands:
//! - `init`: create a fresh slime in the data store
//! - `status`: show level, stage and trait values
//! - `talk`: one chat turn
//! - `chat`: interactive session with evolution animations
//! - `history`: print the message log
//! - `export` / `import`: transcript, JSON and canonical snapshots
//! - `reset`: start over
//! - `serve`: HTTP API

use crate::api;
use crate::classifier::{Classifier, ClassifierError, GeminiClassifier, GeminiSettings};
use crate::config::{AppConfig, Backend, ConfigError, DynStore, ServerConfig, local_offset};
use crate::orchestrator::{AppliedTurn, Conversation, TurnError, TurnOutcome, now_ms};
use clap::{Parser, Subcommand};
use slime_core::catalog::{TRAIT_MAX_VALUE, TRAIT_START_VALUE};
use slime_core::conversation::ConversationLog;
use slime_core::formats::{decode_snapshot, encode_canonical, snapshot_to_json};
use slime_core::progression::ProgressionState;
use slime_core::storage::{MemoryStore, Persistence};
use slime_core::system::{
    Appearance, DisplayController, EvolutionStage, TimerRequest, gain_popup, growth_percent,
    level_badge,
};
use slime_core::transcript::{render_transcript, transcript_file_name};
use slime_core::{CoreError, Snapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("unknown export format '{0}' (expected transcript, json or canonical)")]
    UnknownFormat(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Turn(#[from] TurnError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "slime", version, about = "A slime companion that grows as you talk to it")]
pub struct Cli {
    /// Data location: a directory (file backend) or a database file (redb).
    #[arg(short, long, env = "SLIME_DATA", default_value = "slime_data", global = true)]
    pub data: PathBuf,

    /// Storage backend: file or redb.
    #[arg(short, long, env = "SLIME_BACKEND", default_value = "file", global = true)]
    pub backend: String,

    /// Classifier API key (falls back to GEMINI_API_KEY).
    #[arg(long, env = "SLIME_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "SLIME_MODEL", global = true)]
    pub model: Option<String>,

    /// Base URL of the generateContent API.
    #[arg(long, env = "SLIME_API_BASE", global = true)]
    pub api_base: Option<String>,

    /// Classifier request timeout in seconds.
    #[arg(long, env = "SLIME_TIMEOUT_SECS", default_value_t = 60, global = true)]
    pub timeout_secs: u64,

    /// Debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a fresh slime.
    Init {
        /// Overwrite existing data.
        #[arg(long)]
        force: bool,
    },
    /// Show the slime's current state.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Send one message.
    Talk {
        /// Message text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Interactive chat.
    Chat,
    /// Print the conversation.
    History {
        /// Only the last N messages.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Export the conversation or a full snapshot.
    Export {
        /// Output file, or a directory for an auto-named transcript.
        #[arg(short, long)]
        output: PathBuf,
        /// transcript, json or canonical.
        #[arg(short, long, default_value = "transcript")]
        format: String,
    },
    /// Replace the stored slime with a JSON or canonical snapshot.
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Discard progress and start over.
    Reset,
    /// Run the HTTP API.
    Serve {
        #[arg(long, env = "SLIME_BIND", default_value = "127.0.0.1:8080")]
        bind: String,
        /// Bearer key required by every route except /health.
        #[arg(long, env = "SLIME_SERVER_KEY", hide_env_values = true)]
        server_key: Option<String>,
        /// Global request budget per second.
        #[arg(long, default_value_t = 10)]
        rate_limit: u32,
    },
}

impl Cli {
    pub fn app_config(&self) -> Result<AppConfig, ConfigError> {
        AppConfig::new(
            self.data.clone(),
            &self.backend,
            self.api_key.clone(),
            self.model.clone(),
            self.api_base.clone(),
            self.timeout_secs,
        )
    }
}

/// Run the parsed command line.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.app_config()?;
    let path = config.data.as_path();
    let backend = config.backend.to_string();
    let backend = backend.as_str();

    match cli.command {
        Command::Init { force } => cmd_init(path, backend, force),
        Command::Status { json } => cmd_status(path, backend, json),
        Command::Talk { text } => {
            let classifier = build_classifier(&config.classifier)?;
            cmd_talk(path, backend, classifier, &text.join(" ")).await?;
            Ok(())
        }
        Command::Chat => {
            let classifier = build_classifier(&config.classifier)?;
            cmd_chat(path, backend, classifier).await
        }
        Command::History { limit } => cmd_history(path, backend, limit),
        Command::Export { output, format } => cmd_export(path, backend, &output, &format),
        Command::Import { input } => cmd_import(path, backend, &input),
        Command::Reset => cmd_reset(path, backend),
        Command::Serve {
            bind,
            server_key,
            rate_limit,
        } => {
            let server = ServerConfig::new(&bind, server_key, rate_limit)?;
            let classifier = build_classifier(&config.classifier)?;
            cmd_serve(path, backend, classifier, server).await
        }
    }
}

/// Build the network classifier. A missing key is reported here, before any
/// turn is attempted.
pub fn build_classifier(settings: &GeminiSettings) -> Result<Arc<dyn Classifier>, CliError> {
    if settings.api_key.is_none() {
        return Err(ClassifierError::MissingApiKey.into());
    }
    Ok(Arc::new(GeminiClassifier::new(settings.clone())?))
}

// =============================================================================
// STORE HELPERS
// =============================================================================

fn open(path: &Path, backend: &str) -> Result<DynStore, CliError> {
    let backend: Backend = backend.parse()?;
    Ok(crate::config::open_store(path, backend)?)
}

/// Open for reading and chatting. An unreadable store behaves like an empty
/// one held in memory; writes go nowhere until `init --force` replaces it.
fn open_or_memory(path: &Path, backend: &str) -> Result<DynStore, CliError> {
    let parsed: Backend = backend.parse()?;
    match crate::config::open_store(path, parsed) {
        Ok(store) => Ok(store),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                backend = %parsed,
                error = %e,
                "store unreadable, continuing in memory"
            );
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

/// Load the stored snapshot, or defaults when nothing usable is stored.
pub fn load_or_create_snapshot(path: &Path, backend: &str) -> Result<Snapshot, CliError> {
    let persistence = Persistence::new(open_or_memory(path, backend)?);
    let state = persistence.load_state();
    let messages = persistence.load_messages(now_ms());
    if let slime_core::storage::LoadSource::Corrupt(reason) = &state.source {
        tracing::warn!(%reason, "stored state unreadable, using defaults");
    }
    Ok(Snapshot::new(state.value, messages.value))
}

/// Write both keys.
pub fn save_snapshot(path: &Path, backend: &str, snapshot: &Snapshot) -> Result<(), CliError> {
    let mut persistence = Persistence::new(open(path, backend)?);
    persistence.save_snapshot(snapshot)?;
    Ok(())
}

fn fresh_snapshot() -> Snapshot {
    Snapshot::new(
        ProgressionState::default(),
        ConversationLog::with_greeting(now_ms()),
    )
}

/// Open a live conversation on the store.
pub fn open_conversation(
    path: &Path,
    backend: &str,
    classifier: Arc<dyn Classifier>,
) -> Result<Conversation<DynStore>, CliError> {
    Ok(Conversation::open(open_or_memory(path, backend)?, classifier))
}

// =============================================================================
// INIT / RESET
// =============================================================================

/// Create a fresh slime at `path`.
pub fn cmd_init(path: &Path, backend: &str, force: bool) -> Result<(), CliError> {
    let parsed: Backend = backend.parse()?;
    if path.exists() {
        if !force {
            return Err(CliError::AlreadyExists(path.to_path_buf()));
        }
        if parsed == Backend::Redb {
            std::fs::remove_file(path)?;
        }
    }

    save_snapshot(path, backend, &fresh_snapshot())?;
    tracing::info!(path = %path.display(), %parsed, "initialized");
    println!("Initialized a new slime at {}", path.display());
    Ok(())
}

/// Discard all progress and messages.
pub fn cmd_reset(path: &Path, backend: &str) -> Result<(), CliError> {
    save_snapshot(path, backend, &fresh_snapshot())?;
    println!("The slime has been reset.");
    Ok(())
}

// =============================================================================
// STATUS / HISTORY
// =============================================================================

/// Show the slime's state.
pub fn cmd_status(path: &Path, backend: &str, json: bool) -> Result<(), CliError> {
    let snapshot = load_or_create_snapshot(path, backend)?;

    if json {
        let value = serde_json::json!({
            "state": snapshot.state,
            "dominant": snapshot.state.dominant_trait(),
            "ranking": snapshot.state.ranking(),
            "appearance": Appearance::of(&snapshot.state),
            "messages": snapshot.messages.len(),
        });
        println!("{}", serde_json::to_string_pretty(&value).map_err(CoreError::from)?);
    } else {
        print!("{}", render_status(&snapshot.state));
    }
    Ok(())
}

/// Human-readable status block.
pub fn render_status(state: &ProgressionState) -> String {
    let dominant = state.dominant_trait();
    let stage = EvolutionStage::from_level(state.level());
    let mut out = format!(
        "{} {} ({})\n",
        level_badge(state.level()),
        stage.name(dominant),
        stage.badge_job(dominant)
    );
    out.push_str(&format!("Growth: {}%\n", growth_percent(state.level())));
    if let Some(name) = state.user_name() {
        out.push_str(&format!("Partner: {name}\n"));
    }
    out.push('\n');

    for id in state.ranking() {
        let value = state.stats().get(id);
        let filled = (value - TRAIT_START_VALUE) as usize;
        let empty = (TRAIT_MAX_VALUE - value) as usize;
        out.push_str(&format!(
            "{:<8} {:<4} {:>2} [{}{}] x{}\n",
            id.as_str(),
            id.def().sub,
            value,
            "#".repeat(filled),
            ".".repeat(empty),
            state.history().get(id)
        ));
    }
    out
}

/// Print the message log.
pub fn cmd_history(path: &Path, backend: &str, limit: Option<usize>) -> Result<(), CliError> {
    let snapshot = load_or_create_snapshot(path, backend)?;
    let messages = match limit {
        Some(n) => snapshot.messages.recent(n),
        None => snapshot.messages.messages(),
    };
    print!("{}", render_transcript(messages, local_offset()));
    println!();
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// Export to `output` in `format`.
///
/// For transcripts `output` may be a directory; the file is then named after
/// today's date.
pub fn cmd_export(path: &Path, backend: &str, output: &Path, format: &str) -> Result<(), CliError> {
    let snapshot = load_or_create_snapshot(path, backend)?;

    let (target, bytes) = match format {
        "transcript" => {
            let offset = local_offset();
            let target = if output.is_dir() {
                let today = chrono::Utc::now().with_timezone(&offset).date_naive();
                output.join(transcript_file_name(today))
            } else {
                output.to_path_buf()
            };
            let text = render_transcript(snapshot.messages.messages(), offset);
            (target, text.into_bytes())
        }
        "json" => (
            output.to_path_buf(),
            snapshot_to_json(&snapshot)?.into_bytes(),
        ),
        "canonical" => (output.to_path_buf(), encode_canonical(&snapshot)?),
        other => return Err(CliError::UnknownFormat(other.to_string())),
    };

    std::fs::write(&target, &bytes)?;
    tracing::info!(format, path = %target.display(), bytes = bytes.len(), "exported");
    println!("Exported {} bytes to {}", bytes.len(), target.display());
    Ok(())
}

/// Replace the stored slime with a snapshot file (JSON or canonical).
pub fn cmd_import(path: &Path, backend: &str, input: &Path) -> Result<(), CliError> {
    let bytes = std::fs::read(input)?;
    let snapshot = decode_snapshot(&bytes)?;
    save_snapshot(path, backend, &snapshot)?;
    println!(
        "Imported level {} slime with {} messages",
        snapshot.state.level(),
        snapshot.messages.len()
    );
    Ok(())
}

// =============================================================================
// TALK / CHAT
// =============================================================================

/// One turn, printed.
pub async fn cmd_talk(
    path: &Path,
    backend: &str,
    classifier: Arc<dyn Classifier>,
    text: &str,
) -> Result<TurnOutcome, CliError> {
    let mut conversation = open_conversation(path, backend, classifier)?;
    let outcome = conversation.send(text).await?;
    print_outcome(&outcome);
    Ok(outcome)
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Applied(applied) => print_applied(applied),
        TurnOutcome::Failed { reason } => {
            println!("スライム: {}", slime_core::conversation::APOLOGY);
            tracing::debug!(%reason, "turn failed");
        }
    }
}

fn print_applied(applied: &AppliedTurn) {
    println!("スライム: {}", applied.reply);
    if applied.outcome.capped {
        println!("  ({} は最大値です)", applied.trait_id.def().label);
    } else {
        println!("  [{}]", gain_popup(applied.trait_id));
    }
    println!("システム: {}", applied.system_message);
}

/// Interactive session. `/status`, `/save` and `/quit` are local commands.
pub async fn cmd_chat(
    path: &Path,
    backend: &str,
    classifier: Arc<dyn Classifier>,
) -> Result<(), CliError> {
    let mut conversation = open_conversation(path, backend, classifier)?;
    let mut display = DisplayController::new(conversation.state().clone());

    if let Some(last) = conversation.log().last() {
        println!("{}: {}", last.role.label(), last.text);
    }
    println!("(/status, /save, /quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/status" => {
                print!("{}", render_status(display.shown()));
                continue;
            }
            "/save" => {
                conversation.save()?;
                println!("保存しました。");
                continue;
            }
            _ => {}
        }

        match conversation.send(&line).await {
            Ok(outcome) => {
                print_outcome(&outcome);
                if let TurnOutcome::Applied(applied) = &outcome {
                    let timer = display.on_state_change(
                        &applied.previous,
                        &applied.state,
                        applied.outcome.evolution,
                    );
                    play_evolution(&mut display, timer).await;
                }
            }
            Err(TurnError::EmptyInput) => {}
            Err(e) => return Err(e.into()),
        }
    }

    conversation.save()?;
    Ok(())
}

/// Drive the display controller through its timers until idle.
async fn play_evolution(display: &mut DisplayController, mut timer: Option<TimerRequest>) {
    while let Some(request) = timer {
        match request {
            TimerRequest::Reveal { after_ms } => {
                if let Some(event) = display.playing() {
                    let from = EvolutionStage::from_level(event.from.level());
                    println!(
                        "……おや？ {} の様子が……！",
                        from.name(event.from.dominant_trait())
                    );
                }
                tokio::time::sleep(Duration::from_millis(after_ms)).await;
                timer = display.on_reveal();
                let shown = display.shown();
                let stage = EvolutionStage::from_level(shown.level());
                println!(
                    "✨ {} に進化した！ {}",
                    stage.name(shown.dominant_trait()),
                    level_badge(shown.level())
                );
            }
            TimerRequest::Finish { after_ms } => {
                tokio::time::sleep(Duration::from_millis(after_ms)).await;
                timer = display.on_finish();
            }
        }
    }
}

// =============================================================================
// SERVE
// =============================================================================

pub async fn cmd_serve(
    path: &Path,
    backend: &str,
    classifier: Arc<dyn Classifier>,
    server: ServerConfig,
) -> Result<(), CliError> {
    let conversation = open_conversation(path, backend, classifier)?;
    api::serve(conversation, server)
        .await
        .map_err(|e| CliError::Server(e.to_string()))
}
