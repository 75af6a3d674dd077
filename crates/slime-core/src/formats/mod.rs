//! # Formats Module
//!
//! Serialization of slime snapshots.
//!
//! This module contains:
//! - The persisted JSON shapes (state and message log, one key each)
//! - The canonical binary export (magic header + postcard payload)
//!
//! File I/O stays in [`crate::storage`] and in the app layer; everything here
//! is a pure transformation between values and bytes.

mod persistence;

pub use persistence::*;
