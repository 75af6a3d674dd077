//! # System Module
//!
//! Evolution stages, thresholds and the presentation-side state machine.
//!
//! Stage assessment is a pure function of the level, so it lives in the core
//! next to the progression engine. Nothing here renders; it only decides what
//! should be shown and which narrative lines go with it.

mod appearance;
mod display;
mod evolution;

pub use appearance::*;
pub use display::*;
pub use evolution::*;
