//! # Progression Engine
//!
//! Pure, deterministic derivation of game state from trait counters.
//!
//! - [`compute_level`] turns trait totals into a level in [10, 50]
//! - [`dominant_trait`] picks the single trait that drives visuals and lore
//! - [`ProgressionState::apply_increment`] is the only mutation there is
//!
//! All containers are fixed-size arrays indexed by [`TraitId`], so "all seven
//! keys present" holds by construction.

use crate::catalog::{
    BASE_LEVEL, MAX_LEVEL, TRAIT_COUNT, TRAIT_MAX_VALUE, TRAIT_START_VALUE, TraitId,
};
use crate::system::{Threshold, crossed_threshold};
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;

// =============================================================================
// TRAIT TABLE
// =============================================================================

/// Seven `u32` slots, one per trait.
///
/// Serialized as a map keyed by trait identifier in declaration order, which
/// matches the snapshot format the browser client always wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<TraitId, u32>",
    into = "BTreeMap<TraitId, u32>"
)]
pub struct TraitTable([u32; TRAIT_COUNT]);

impl TraitTable {
    const fn filled(value: u32) -> Self {
        Self([value; TRAIT_COUNT])
    }

    fn get(&self, id: TraitId) -> u32 {
        self.0[id.index()]
    }

    fn slot_mut(&mut self, id: TraitId) -> &mut u32 {
        &mut self.0[id.index()]
    }

    fn total(&self) -> u32 {
        self.0.iter().fold(0u32, |acc, v| acc.saturating_add(*v))
    }

    fn iter(&self) -> impl Iterator<Item = (TraitId, u32)> + '_ {
        TraitId::ALL.into_iter().map(|id| (id, self.get(id)))
    }
}

impl TryFrom<BTreeMap<TraitId, u32>> for TraitTable {
    type Error = CoreError;

    fn try_from(map: BTreeMap<TraitId, u32>) -> Result<Self, Self::Error> {
        if map.len() != TRAIT_COUNT {
            return Err(CoreError::IncompleteTraitTable { found: map.len() });
        }
        let mut table = Self::filled(0);
        for (id, value) in map {
            *table.slot_mut(id) = value;
        }
        Ok(table)
    }
}

impl From<TraitTable> for BTreeMap<TraitId, u32> {
    fn from(table: TraitTable) -> Self {
        table.iter().collect()
    }
}

// =============================================================================
// TRAIT SET
// =============================================================================

/// Current trait values. Every value lies in [10, 50].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TraitTable", into = "TraitTable")]
pub struct TraitSet(TraitTable);

impl Default for TraitSet {
    fn default() -> Self {
        Self(TraitTable::filled(TRAIT_START_VALUE))
    }
}

impl TraitSet {
    /// Build a trait set from values in declaration order.
    ///
    /// Fails if any value lies outside [10, 50].
    pub fn from_values(values: [u32; TRAIT_COUNT]) -> Result<Self, CoreError> {
        Self::try_from(TraitTable(values))
    }

    /// Value of one trait.
    #[must_use]
    pub fn get(&self, id: TraitId) -> u32 {
        self.0.get(id)
    }

    /// Sum of all seven values.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.total()
    }

    /// Values in declaration order.
    #[must_use]
    pub fn values(&self) -> [u32; TRAIT_COUNT] {
        self.0.0
    }

    /// `(trait, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (TraitId, u32)> + '_ {
        self.0.iter()
    }

    /// Raise one trait by 1, absorbing anything past the cap.
    ///
    /// Returns `true` if the value actually moved.
    fn bump(&mut self, id: TraitId) -> bool {
        let slot = self.0.slot_mut(id);
        if *slot >= TRAIT_MAX_VALUE {
            return false;
        }
        *slot += 1;
        true
    }
}

impl TryFrom<TraitTable> for TraitSet {
    type Error = CoreError;

    fn try_from(table: TraitTable) -> Result<Self, Self::Error> {
        for (trait_id, value) in table.iter() {
            if !(TRAIT_START_VALUE..=TRAIT_MAX_VALUE).contains(&value) {
                return Err(CoreError::TraitOutOfRange {
                    trait_id,
                    value,
                    min: TRAIT_START_VALUE,
                    max: TRAIT_MAX_VALUE,
                });
            }
        }
        Ok(Self(table))
    }
}

impl From<TraitSet> for TraitTable {
    fn from(set: TraitSet) -> Self {
        set.0
    }
}

// =============================================================================
// HISTORY SET
// =============================================================================

/// Cumulative increments ever applied per trait, uncapped.
///
/// Used only for tie-breaking in [`dominant_trait`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistorySet(TraitTable);

impl Default for TraitTable {
    fn default() -> Self {
        Self::filled(0)
    }
}

impl HistorySet {
    /// Build a history set from counts in declaration order.
    #[must_use]
    pub fn from_counts(counts: [u32; TRAIT_COUNT]) -> Self {
        Self(TraitTable(counts))
    }

    /// Increments recorded for one trait.
    #[must_use]
    pub fn get(&self, id: TraitId) -> u32 {
        self.0.get(id)
    }

    /// Total increments across all traits (the number of applied turns).
    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.total()
    }

    /// Counts in declaration order.
    #[must_use]
    pub fn counts(&self) -> [u32; TRAIT_COUNT] {
        self.0.0
    }

    /// `(trait, count)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (TraitId, u32)> + '_ {
        self.0.iter()
    }

    fn record(&mut self, id: TraitId) {
        let slot = self.0.slot_mut(id);
        *slot = slot.saturating_add(1);
    }
}

// =============================================================================
// PURE DERIVATIONS
// =============================================================================

/// Level from trait totals.
///
/// `BASE_LEVEL + max(0, sum - 7 * TRAIT_START_VALUE)`, capped at `MAX_LEVEL`.
#[must_use]
pub fn compute_level(traits: &TraitSet) -> u32 {
    let floor_total = TRAIT_START_VALUE * TRAIT_COUNT as u32;
    let gained = traits.total().saturating_sub(floor_total);
    BASE_LEVEL.saturating_add(gained).min(MAX_LEVEL)
}

/// Total order used for ranking: value desc, history desc, declaration asc.
fn rank_order(traits: &TraitSet, history: &HistorySet, a: TraitId, b: TraitId) -> Ordering {
    let key = |id: TraitId| (Reverse(traits.get(id)), Reverse(history.get(id)), id.index());
    key(a).cmp(&key(b))
}

/// All seven traits, strongest first.
///
/// The ordering is total, so two calls with the same inputs always agree.
#[must_use]
pub fn trait_ranking(traits: &TraitSet, history: &HistorySet) -> [TraitId; TRAIT_COUNT] {
    let mut ranking = TraitId::ALL;
    ranking.sort_by(|a, b| rank_order(traits, history, *a, *b));
    ranking
}

/// The single trait that decides accessories and lore.
#[must_use]
pub fn dominant_trait(traits: &TraitSet, history: &HistorySet) -> TraitId {
    TraitId::ALL.into_iter().fold(TraitId::ALL[0], |best, id| {
        if rank_order(traits, history, id, best) == Ordering::Less {
            id
        } else {
            best
        }
    })
}

// =============================================================================
// PROGRESSION STATE
// =============================================================================

/// The sole durable record of a slime's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StateRecord", rename_all = "camelCase")]
pub struct ProgressionState {
    stats: TraitSet,
    history: HistorySet,
    level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_name: Option<String>,
}

/// Wire shape of a persisted state. A stored `level` is ignored on restore.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateRecord {
    stats: TraitSet,
    history: HistorySet,
    #[serde(default)]
    user_name: Option<String>,
}

impl From<StateRecord> for ProgressionState {
    fn from(record: StateRecord) -> Self {
        Self::from_parts(record.stats, record.history, record.user_name)
    }
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self::from_parts(TraitSet::default(), HistorySet::default(), None)
    }
}

/// What a single increment did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementOutcome {
    /// The trait that was raised (after sanitizing).
    pub trait_id: TraitId,
    /// `true` when the trait was already at the cap and the value stayed put.
    pub capped: bool,
    pub old_level: u32,
    pub new_level: u32,
    /// Highest evolution threshold crossed by this increment.
    pub evolution: Option<Threshold>,
    pub old_dominant: TraitId,
    pub new_dominant: TraitId,
}

impl IncrementOutcome {
    #[must_use]
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.old_level
    }
}

impl ProgressionState {
    /// Assemble a state, deriving the level from the traits.
    #[must_use]
    pub fn from_parts(stats: TraitSet, history: HistorySet, user_name: Option<String>) -> Self {
        let level = compute_level(&stats);
        Self {
            stats,
            history,
            level,
            user_name: normalize_name(user_name.as_deref()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &TraitSet {
        &self.stats
    }

    #[must_use]
    pub fn history(&self) -> &HistorySet {
        &self.history
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    #[must_use]
    pub fn dominant_trait(&self) -> TraitId {
        dominant_trait(&self.stats, &self.history)
    }

    #[must_use]
    pub fn ranking(&self) -> [TraitId; TRAIT_COUNT] {
        trait_ranking(&self.stats, &self.history)
    }

    /// Raise one trait by exactly one step.
    ///
    /// The value is capped at 50 (excess is absorbed), the history counter
    /// always grows, and the level is recomputed. The user name changes only
    /// when a non-empty `detected_name` is supplied. This never fails.
    pub fn apply_increment(
        &mut self,
        trait_id: TraitId,
        detected_name: Option<&str>,
    ) -> IncrementOutcome {
        let old_level = self.level;
        let old_dominant = self.dominant_trait();

        let moved = self.stats.bump(trait_id);
        self.history.record(trait_id);
        self.level = compute_level(&self.stats);
        if let Some(name) = normalize_name(detected_name) {
            self.user_name = Some(name);
        }

        IncrementOutcome {
            trait_id,
            capped: !moved,
            old_level,
            new_level: self.level,
            evolution: crossed_threshold(old_level, self.level),
            old_dominant,
            new_dominant: self.dominant_trait(),
        }
    }

    /// Sanitize-then-apply for free-form identifiers.
    ///
    /// Unknown identifiers raise the fallback trait instead of failing.
    pub fn apply_raw_increment(
        &mut self,
        raw_trait: &str,
        detected_name: Option<&str>,
    ) -> IncrementOutcome {
        self.apply_increment(TraitId::sanitize(raw_trait), detected_name)
    }
}

fn normalize_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(values: [u32; TRAIT_COUNT]) -> TraitSet {
        TraitSet::from_values(values).unwrap()
    }

    #[test]
    fn fresh_state_matches_documented_defaults() {
        let state = ProgressionState::default();
        assert_eq!(state.level(), BASE_LEVEL);
        assert!(state.stats().iter().all(|(_, v)| v == TRAIT_START_VALUE));
        assert_eq!(state.history().total(), 0);
        assert_eq!(state.user_name(), None);
    }

    #[test]
    fn level_counts_points_above_floor() {
        assert_eq!(compute_level(&TraitSet::default()), 10);
        assert_eq!(compute_level(&set([11, 10, 10, 10, 10, 10, 10])), 11);
        assert_eq!(compute_level(&set([20, 15, 10, 10, 10, 10, 10])), 25);
        assert_eq!(compute_level(&set([50; TRAIT_COUNT])), MAX_LEVEL);
    }

    #[test]
    fn from_values_rejects_out_of_range() {
        assert!(TraitSet::from_values([9, 10, 10, 10, 10, 10, 10]).is_err());
        assert!(TraitSet::from_values([10, 10, 10, 10, 10, 10, 51]).is_err());
    }

    #[test]
    fn dominant_prefers_value_then_history_then_declaration() {
        let history = HistorySet::default();
        assert_eq!(
            dominant_trait(&set([10, 12, 10, 10, 10, 10, 10]), &history),
            TraitId::Logic
        );

        let tied = set([10, 12, 10, 12, 10, 10, 10]);
        let spark_history = HistorySet::from_counts([0, 1, 0, 3, 0, 0, 0]);
        assert_eq!(dominant_trait(&tied, &spark_history), TraitId::Spark);

        let even_history = HistorySet::from_counts([0, 2, 0, 2, 0, 0, 0]);
        assert_eq!(dominant_trait(&tied, &even_history), TraitId::Logic);
    }

    #[test]
    fn dominant_of_all_equal_is_first_declared() {
        assert_eq!(
            dominant_trait(&TraitSet::default(), &HistorySet::default()),
            TraitId::Passion
        );
    }

    #[test]
    fn ranking_starts_with_dominant() {
        let stats = set([10, 14, 12, 10, 13, 10, 10]);
        let history = HistorySet::from_counts([0, 4, 2, 0, 3, 0, 0]);
        let ranking = trait_ranking(&stats, &history);
        assert_eq!(ranking[0], dominant_trait(&stats, &history));
        assert_eq!(&ranking[..3], &[TraitId::Logic, TraitId::Will, TraitId::Heart]);
    }

    #[test]
    fn single_increment_on_logic() {
        let mut state = ProgressionState::default();
        let outcome = state.apply_increment(TraitId::Logic, None);

        assert_eq!(state.stats().get(TraitId::Logic), 11);
        assert!(
            state
                .stats()
                .iter()
                .filter(|(id, _)| *id != TraitId::Logic)
                .all(|(_, v)| v == 10)
        );
        assert_eq!(state.level(), 11);
        assert_eq!(outcome.old_level, 10);
        assert_eq!(outcome.new_level, 11);
        assert!(!outcome.capped);
        assert_eq!(outcome.evolution, None);
        assert_eq!(outcome.new_dominant, TraitId::Logic);
    }

    #[test]
    fn forty_increments_on_logic_hit_both_caps() {
        let mut state = ProgressionState::default();
        for _ in 0..40 {
            state.apply_increment(TraitId::Logic, None);
        }
        assert_eq!(state.stats().get(TraitId::Logic), TRAIT_MAX_VALUE);
        assert_eq!(state.level(), MAX_LEVEL);
        assert_eq!(state.history().get(TraitId::Logic), 40);
    }

    #[test]
    fn increments_past_cap_are_absorbed_but_recorded() {
        let mut state = ProgressionState::from_parts(
            set([10, 50, 10, 10, 10, 10, 10]),
            HistorySet::from_counts([0, 40, 0, 0, 0, 0, 0]),
            None,
        );
        let outcome = state.apply_increment(TraitId::Logic, None);
        assert!(outcome.capped);
        assert_eq!(state.stats().get(TraitId::Logic), 50);
        assert_eq!(state.history().get(TraitId::Logic), 41);
        assert_eq!(outcome.old_level, outcome.new_level);
    }

    #[test]
    fn unknown_trait_raises_fallback() {
        let mut state = ProgressionState::default();
        let outcome = state.apply_raw_increment("UNKNOWN_TRAIT", None);
        assert_eq!(outcome.trait_id, TraitId::Adapt);
        assert_eq!(state.stats().get(TraitId::Adapt), 11);
        assert_eq!(state.history().get(TraitId::Adapt), 1);
        assert_eq!(state.stats().total(), 71);
    }

    #[test]
    fn name_only_replaced_by_non_empty_detection() {
        let mut state = ProgressionState::default();
        state.apply_increment(TraitId::Heart, Some("  みどり "));
        assert_eq!(state.user_name(), Some("みどり"));

        state.apply_increment(TraitId::Heart, Some(""));
        assert_eq!(state.user_name(), Some("みどり"));

        state.apply_increment(TraitId::Heart, None);
        assert_eq!(state.user_name(), Some("みどり"));

        state.apply_increment(TraitId::Heart, Some("Aoi"));
        assert_eq!(state.user_name(), Some("Aoi"));
    }

    #[test]
    fn json_shape_uses_trait_keys() {
        let mut state = ProgressionState::default();
        state.apply_increment(TraitId::Spark, Some("Mika"));
        let json: serde_json::Value = serde_json::to_value(&state).unwrap();
        assert_eq!(json["stats"]["SPARK"], 11);
        assert_eq!(json["history"]["SPARK"], 1);
        assert_eq!(json["level"], 11);
        assert_eq!(json["userName"], "Mika");
    }

    #[test]
    fn restore_recomputes_level_and_drops_empty_name() {
        let raw = r#"{
            "stats": {"PASSION":12,"LOGIC":10,"HEART":10,"SPARK":10,"WILL":10,"ADAPT":10,"INSIGHT":10},
            "history": {"PASSION":2,"LOGIC":0,"HEART":0,"SPARK":0,"WILL":0,"ADAPT":0,"INSIGHT":0},
            "level": 48,
            "userName": ""
        }"#;
        let state: ProgressionState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.level(), 12);
        assert_eq!(state.user_name(), None);
    }

    #[test]
    fn restore_rejects_missing_trait() {
        let raw = r#"{
            "stats": {"PASSION":12,"LOGIC":10},
            "history": {"PASSION":2,"LOGIC":0,"HEART":0,"SPARK":0,"WILL":0,"ADAPT":0,"INSIGHT":0}
        }"#;
        assert!(serde_json::from_str::<ProgressionState>(raw).is_err());
    }

    fn trait_values() -> impl Strategy<Value = [u32; TRAIT_COUNT]> {
        prop::array::uniform7(TRAIT_START_VALUE..=TRAIT_MAX_VALUE)
    }

    fn trait_id() -> impl Strategy<Value = TraitId> {
        (0..TRAIT_COUNT).prop_map(|i| TraitId::ALL[i])
    }

    proptest! {
        #[test]
        fn level_always_within_bounds(values in trait_values()) {
            let level = compute_level(&set(values));
            prop_assert!((BASE_LEVEL..=MAX_LEVEL).contains(&level));
        }

        #[test]
        fn level_monotonic_under_increment(values in trait_values(), id in trait_id()) {
            let mut state = ProgressionState::from_parts(set(values), HistorySet::default(), None);
            let before = state.level();
            state.apply_increment(id, None);
            prop_assert!(state.level() >= before);
        }

        #[test]
        fn dominant_is_deterministic_and_maximal(
            values in trait_values(),
            counts in prop::array::uniform7(0u32..100),
        ) {
            let stats = set(values);
            let history = HistorySet::from_counts(counts);
            let first = dominant_trait(&stats, &history);
            prop_assert_eq!(first, dominant_trait(&stats, &history));
            prop_assert!(stats.iter().all(|(_, v)| v <= stats.get(first)));
            prop_assert_eq!(first, trait_ranking(&stats, &history)[0]);
        }

        #[test]
        fn increment_touches_exactly_one_trait(values in trait_values(), raw in "[A-Za-z_]{0,12}") {
            let mut state = ProgressionState::from_parts(set(values), HistorySet::default(), None);
            let before = *state.stats();
            let outcome = state.apply_raw_increment(&raw, None);
            for (id, v) in state.stats().iter() {
                if id == outcome.trait_id {
                    prop_assert_eq!(v, (before.get(id) + 1).min(TRAIT_MAX_VALUE));
                } else {
                    prop_assert_eq!(v, before.get(id));
                }
            }
            prop_assert_eq!(state.history().total(), 1);
            prop_assert_eq!(state.history().get(outcome.trait_id), 1);
        }
    }
}
