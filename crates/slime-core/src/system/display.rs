//! Display state machine for evolution animations.
//!
//! The authoritative [`ProgressionState`] changes instantly. What a front-end
//! *shows* lags behind during an evolution: the old form first, the new form
//! after a reveal delay, then back to idle. Evolutions that arrive while one
//! is playing are queued and played in order, so overlapping animations can
//! never leave the display on an inconsistent state.
//!
//! The controller does not own timers. Each transition returns the next
//! [`TimerRequest`] for the caller to schedule, and the caller reports back
//! with [`DisplayController::on_reveal`] / [`DisplayController::on_finish`].

use crate::progression::ProgressionState;
use crate::system::evolution::Threshold;
use std::collections::VecDeque;

/// Delay between the start of an evolution and revealing the new form.
pub const REVEAL_DELAY_MS: u64 = 1_800;

/// Delay between the start of an evolution and returning to idle.
pub const FINISH_DELAY_MS: u64 = 4_500;

/// Phase of the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPhase {
    Idle,
    /// Playing an evolution. `revealed` flips once the new form is shown.
    Evolving { revealed: bool },
}

/// A timer the caller must schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    /// Call [`DisplayController::on_reveal`] after `after_ms`.
    Reveal { after_ms: u64 },
    /// Call [`DisplayController::on_finish`] after `after_ms`.
    Finish { after_ms: u64 },
}

/// One queued evolution animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvolutionEvent {
    pub from: ProgressionState,
    pub to: ProgressionState,
    pub threshold: Threshold,
}

/// Finite state machine `{Idle -> Evolving -> Idle}` with a FIFO of pending
/// evolutions.
#[derive(Debug, Clone)]
pub struct DisplayController {
    phase: DisplayPhase,
    shown: ProgressionState,
    latest: ProgressionState,
    playing: Option<EvolutionEvent>,
    queue: VecDeque<EvolutionEvent>,
}

impl DisplayController {
    #[must_use]
    pub fn new(initial: ProgressionState) -> Self {
        Self {
            phase: DisplayPhase::Idle,
            shown: initial.clone(),
            latest: initial,
            playing: None,
            queue: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> DisplayPhase {
        self.phase
    }

    /// The state that should currently be drawn.
    #[must_use]
    pub fn shown(&self) -> &ProgressionState {
        &self.shown
    }

    /// The evolution currently playing, if any.
    #[must_use]
    pub fn playing(&self) -> Option<&EvolutionEvent> {
        self.playing.as_ref()
    }

    #[must_use]
    pub fn is_evolving(&self) -> bool {
        matches!(self.phase, DisplayPhase::Evolving { .. })
    }

    /// Evolutions waiting behind the one currently playing.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Report an authoritative state change.
    ///
    /// `threshold` is the evolution crossed by this change, if any. Returns
    /// the timer to schedule when an animation starts.
    pub fn on_state_change(
        &mut self,
        previous: &ProgressionState,
        current: &ProgressionState,
        threshold: Option<Threshold>,
    ) -> Option<TimerRequest> {
        self.latest = current.clone();

        if let Some(threshold) = threshold {
            self.queue.push_back(EvolutionEvent {
                from: previous.clone(),
                to: current.clone(),
                threshold,
            });
            if self.phase == DisplayPhase::Idle {
                return self.start_next();
            }
            return None;
        }

        if self.phase == DisplayPhase::Idle {
            self.shown = current.clone();
        }
        None
    }

    /// The reveal timer fired: show the evolved form.
    pub fn on_reveal(&mut self) -> Option<TimerRequest> {
        if self.phase != (DisplayPhase::Evolving { revealed: false }) {
            return None;
        }
        if let Some(event) = &self.playing {
            self.shown = event.to.clone();
        }
        self.phase = DisplayPhase::Evolving { revealed: true };
        Some(TimerRequest::Finish {
            after_ms: FINISH_DELAY_MS - REVEAL_DELAY_MS,
        })
    }

    /// The finish timer fired: play the next queued evolution or go idle.
    pub fn on_finish(&mut self) -> Option<TimerRequest> {
        if self.phase != (DisplayPhase::Evolving { revealed: true }) {
            return None;
        }
        self.playing = None;
        if let Some(next) = self.start_next() {
            return Some(next);
        }
        self.phase = DisplayPhase::Idle;
        self.shown = self.latest.clone();
        None
    }

    fn start_next(&mut self) -> Option<TimerRequest> {
        let event = self.queue.pop_front()?;
        self.shown = event.from.clone();
        self.playing = Some(event);
        self.phase = DisplayPhase::Evolving { revealed: false };
        Some(TimerRequest::Reveal {
            after_ms: REVEAL_DELAY_MS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TraitId;

    /// Advance `state` by `n` LOGIC increments, returning (before, after, threshold)
    /// for the last one.
    fn step(
        state: &mut ProgressionState,
        n: usize,
    ) -> (ProgressionState, ProgressionState, Option<Threshold>) {
        let mut before = state.clone();
        let mut threshold = None;
        for _ in 0..n {
            before = state.clone();
            threshold = state.apply_increment(TraitId::Logic, None).evolution;
        }
        (before, state.clone(), threshold)
    }

    #[test]
    fn plain_level_up_updates_display_immediately() {
        let mut state = ProgressionState::default();
        let mut display = DisplayController::new(state.clone());
        let (prev, cur, threshold) = step(&mut state, 1);
        assert_eq!(display.on_state_change(&prev, &cur, threshold), None);
        assert_eq!(display.shown().level(), 11);
        assert_eq!(display.phase(), DisplayPhase::Idle);
    }

    #[test]
    fn evolution_runs_idle_evolving_idle() {
        let mut state = ProgressionState::default();
        let (_, cur, _) = step(&mut state, 9);
        let mut display = DisplayController::new(cur);

        let (prev, cur, threshold) = step(&mut state, 1);
        let timer = display.on_state_change(&prev, &cur, threshold);
        assert_eq!(timer, Some(TimerRequest::Reveal { after_ms: REVEAL_DELAY_MS }));
        assert_eq!(display.shown().level(), 19);
        assert!(display.is_evolving());

        let timer = display.on_reveal();
        assert_eq!(timer, Some(TimerRequest::Finish { after_ms: 2_700 }));
        assert_eq!(display.shown().level(), 20);

        assert_eq!(display.on_finish(), None);
        assert_eq!(display.phase(), DisplayPhase::Idle);
        assert_eq!(display.shown().level(), 20);
    }

    #[test]
    fn level_ups_during_animation_land_after_it() {
        let mut state = ProgressionState::default();
        let (_, cur, _) = step(&mut state, 9);
        let mut display = DisplayController::new(cur);

        let (prev, cur, threshold) = step(&mut state, 1);
        display.on_state_change(&prev, &cur, threshold);
        let (prev, cur, threshold) = step(&mut state, 1);
        assert_eq!(display.on_state_change(&prev, &cur, threshold), None);
        assert_eq!(display.shown().level(), 19);

        display.on_reveal();
        assert_eq!(display.shown().level(), 20);
        display.on_finish();
        assert_eq!(display.shown().level(), 21);
    }

    #[test]
    fn overlapping_evolutions_are_queued() {
        let mut state = ProgressionState::default();
        let (_, cur, _) = step(&mut state, 9);
        let mut display = DisplayController::new(cur);

        let (prev, cur, threshold) = step(&mut state, 1);
        display.on_state_change(&prev, &cur, threshold);

        // Jump straight to the next band while the first animation plays.
        let (_, mid, _) = step(&mut state, 9);
        let (prev, cur, threshold) = step(&mut state, 1);
        assert_eq!(mid.level(), 29);
        assert_eq!(display.on_state_change(&prev, &cur, threshold), None);
        assert_eq!(display.pending(), 1);

        display.on_reveal();
        let next = display.on_finish();
        assert_eq!(next, Some(TimerRequest::Reveal { after_ms: REVEAL_DELAY_MS }));
        assert_eq!(display.shown().level(), 29);
        assert_eq!(
            display.playing().map(|e| e.threshold),
            Some(Threshold::Advancement)
        );

        display.on_reveal();
        assert_eq!(display.shown().level(), 30);
        assert_eq!(display.on_finish(), None);
        assert_eq!(display.phase(), DisplayPhase::Idle);
    }

    #[test]
    fn stray_timers_are_ignored() {
        let mut display = DisplayController::new(ProgressionState::default());
        assert_eq!(display.on_reveal(), None);
        assert_eq!(display.on_finish(), None);
        assert_eq!(display.phase(), DisplayPhase::Idle);
    }
}
