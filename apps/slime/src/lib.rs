//! # Slime Library
//!
//! This library exposes the slime app modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod orchestrator;
pub mod prompts;

// Re-export slime_core for convenience
pub use slime_core;
