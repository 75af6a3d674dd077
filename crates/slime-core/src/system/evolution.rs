//! Evolution stages, thresholds and the narrative lines attached to them.

use crate::catalog::{BASE_LEVEL, MAX_LEVEL, TraitId};
use crate::progression::{IncrementOutcome, ProgressionState};
use serde::{Deserialize, Serialize};

// =============================================================================
// THRESHOLDS
// =============================================================================

/// A level at which the slime visibly evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// Level 20: the job awakens.
    Awakening,
    /// Level 30: the job advances.
    Advancement,
    /// Level 50: partner form.
    Partner,
}

impl Threshold {
    /// All thresholds, lowest first.
    pub const ALL: [Threshold; 3] = [Threshold::Awakening, Threshold::Advancement, Threshold::Partner];

    #[must_use]
    pub const fn level(self) -> u32 {
        match self {
            Threshold::Awakening => 20,
            Threshold::Advancement => 30,
            Threshold::Partner => MAX_LEVEL,
        }
    }

    /// Congratulation line, naming the job of the trait that now dominates.
    #[must_use]
    pub fn note(self, dominant: TraitId) -> String {
        let job = dominant.def().job;
        match self {
            Threshold::Awakening => {
                format!("おめでとう！{job}の姿に第１進化（職業覚醒）したぷる！(≧▽≦)")
            }
            Threshold::Advancement => {
                format!("おめでとう！{job}の姿に第２進化（上級職への進化）したぷる！(*'▽'*)")
            }
            Threshold::Partner => {
                "おめでとう！最強のパートナーの姿に最終進化（パートナー覚醒）したぷる！✨(≧▽≦)✨"
                    .to_string()
            }
        }
    }
}

/// The highest threshold `t` with `old < t <= new`, if any.
///
/// A single increment moves the level by at most one, but larger jumps are
/// handled the same way: only the highest crossed threshold is reported.
#[must_use]
pub fn crossed_threshold(old_level: u32, new_level: u32) -> Option<Threshold> {
    Threshold::ALL
        .into_iter()
        .rev()
        .find(|t| old_level < t.level() && t.level() <= new_level)
}

// =============================================================================
// STAGES
// =============================================================================

/// Visual stage derived from the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionStage {
    /// Below 20: translucent, no accessory.
    Baby,
    /// 20..30: job accessory appears.
    Awakened,
    /// 30..50: accessory upgraded.
    Advanced,
    /// 50: glowing partner form.
    Partner,
}

impl EvolutionStage {
    #[must_use]
    pub fn from_level(level: u32) -> Self {
        if level >= Threshold::Partner.level() {
            EvolutionStage::Partner
        } else if level >= Threshold::Advancement.level() {
            EvolutionStage::Advanced
        } else if level >= Threshold::Awakening.level() {
            EvolutionStage::Awakened
        } else {
            EvolutionStage::Baby
        }
    }

    /// Stage name as used in the visual description.
    #[must_use]
    pub fn name(self, dominant: TraitId) -> String {
        let job = dominant.def().job;
        match self {
            EvolutionStage::Baby => "ベビースライム".to_string(),
            EvolutionStage::Awakened => job.to_string(),
            EvolutionStage::Advanced => format!("上級{job}"),
            EvolutionStage::Partner => "究極のパートナー形態".to_string(),
        }
    }

    /// Job shown on the level badge. Babies are still apprentices.
    #[must_use]
    pub fn badge_job(self, dominant: TraitId) -> &'static str {
        match self {
            EvolutionStage::Baby => "見習い",
            _ => dominant.def().job,
        }
    }

    /// How the slime refers to itself in the system instruction.
    #[must_use]
    pub fn self_image(self) -> &'static str {
        match self {
            EvolutionStage::Baby => "初期状態（進化前）",
            _ => "進化した姿",
        }
    }
}

/// `"<stage> (レベル: n, 特徴: label(desc))"`.
#[must_use]
pub fn visual_description(state: &ProgressionState) -> String {
    let dominant = state.dominant_trait();
    let def = dominant.def();
    let stage = EvolutionStage::from_level(state.level());
    format!(
        "{} (レベル: {}, 特徴: {}({}))",
        stage.name(dominant),
        state.level(),
        def.label,
        def.desc
    )
}

/// Growth towards the level cap as an integer percentage (0..=100).
#[must_use]
pub fn growth_percent(level: u32) -> u32 {
    let span = MAX_LEVEL - BASE_LEVEL;
    let gained = level.clamp(BASE_LEVEL, MAX_LEVEL) - BASE_LEVEL;
    gained * 100 / span
}

/// `"Lv.n"`, or `"Lv.∞"` once the cap is reached.
#[must_use]
pub fn level_badge(level: u32) -> String {
    if level >= MAX_LEVEL {
        "Lv.∞".to_string()
    } else {
        format!("Lv.{level}")
    }
}

// =============================================================================
// NARRATIVE LINES
// =============================================================================

/// Short popup shown when a trait grows, e.g. `"論理 UP!"`.
#[must_use]
pub fn gain_popup(trait_id: TraitId) -> String {
    format!("{} UP!", trait_id.def().sub)
}

/// System message appended after a successful turn.
#[must_use]
pub fn level_up_message(outcome: &IncrementOutcome) -> String {
    let mut text = format!("✨ {}が ＋１ 上がった！", outcome.trait_id.def().label);
    if outcome.leveled_up() {
        text.push_str("\nレベルアップした！ぷる(・ω・)ノ");
    }
    if let Some(threshold) = outcome.evolution {
        text.push('\n');
        text.push_str(&threshold.note(outcome.new_dominant));
    }
    text
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_detected_when_crossed() {
        assert_eq!(crossed_threshold(19, 20), Some(Threshold::Awakening));
        assert_eq!(crossed_threshold(29, 30), Some(Threshold::Advancement));
        assert_eq!(crossed_threshold(49, 50), Some(Threshold::Partner));
    }

    #[test]
    fn no_threshold_inside_a_band() {
        assert_eq!(crossed_threshold(10, 11), None);
        assert_eq!(crossed_threshold(20, 21), None);
        assert_eq!(crossed_threshold(50, 50), None);
        assert_eq!(crossed_threshold(30, 30), None);
    }

    #[test]
    fn highest_threshold_wins_on_jump() {
        assert_eq!(crossed_threshold(10, 35), Some(Threshold::Advancement));
        assert_eq!(crossed_threshold(15, 50), Some(Threshold::Partner));
        assert_eq!(crossed_threshold(25, 50), Some(Threshold::Partner));
    }

    #[test]
    fn no_threshold_when_level_drops() {
        assert_eq!(crossed_threshold(30, 20), None);
    }

    #[test]
    fn stages_follow_level_bands() {
        assert_eq!(EvolutionStage::from_level(10), EvolutionStage::Baby);
        assert_eq!(EvolutionStage::from_level(19), EvolutionStage::Baby);
        assert_eq!(EvolutionStage::from_level(20), EvolutionStage::Awakened);
        assert_eq!(EvolutionStage::from_level(29), EvolutionStage::Awakened);
        assert_eq!(EvolutionStage::from_level(30), EvolutionStage::Advanced);
        assert_eq!(EvolutionStage::from_level(49), EvolutionStage::Advanced);
        assert_eq!(EvolutionStage::from_level(50), EvolutionStage::Partner);
    }

    #[test]
    fn stage_names_use_dominant_job() {
        assert_eq!(EvolutionStage::Baby.name(TraitId::Logic), "ベビースライム");
        assert_eq!(EvolutionStage::Awakened.name(TraitId::Logic), "魔法使い");
        assert_eq!(EvolutionStage::Advanced.name(TraitId::Logic), "上級魔法使い");
        assert_eq!(EvolutionStage::Baby.badge_job(TraitId::Logic), "見習い");
        assert_eq!(EvolutionStage::Advanced.badge_job(TraitId::Will), "王様");
    }

    #[test]
    fn visual_description_of_fresh_slime() {
        let state = ProgressionState::default();
        assert_eq!(
            visual_description(&state),
            "ベビースライム (レベル: 10, 特徴: パッション(エネルギー、熱意))"
        );
    }

    #[test]
    fn growth_and_badge() {
        assert_eq!(growth_percent(10), 0);
        assert_eq!(growth_percent(30), 50);
        assert_eq!(growth_percent(50), 100);
        assert_eq!(level_badge(42), "Lv.42");
        assert_eq!(level_badge(50), "Lv.∞");
    }

    #[test]
    fn level_up_message_carries_evolution_note() {
        let mut state = ProgressionState::default();
        for _ in 0..9 {
            state.apply_increment(TraitId::Insight, None);
        }
        let outcome = state.apply_increment(TraitId::Insight, None);
        assert_eq!(outcome.evolution, Some(Threshold::Awakening));

        let message = level_up_message(&outcome);
        assert!(message.starts_with("✨ インサイトが ＋１ 上がった！"));
        assert!(message.contains("レベルアップした！"));
        assert!(message.contains("賢者の姿に第１進化"));
    }

    /// Raise Insight until the level reaches `target`, returning the final outcome.
    fn grow_insight_to(target: u32) -> IncrementOutcome {
        let mut state = ProgressionState::default();
        let mut outcome = state.apply_increment(TraitId::Insight, None);
        while outcome.new_level < target {
            outcome = state.apply_increment(TraitId::Insight, None);
        }
        outcome
    }

    #[test]
    fn level_thirty_message_has_second_evolution_only() {
        let outcome = grow_insight_to(30);
        assert_eq!(outcome.old_level, 29);
        assert_eq!(outcome.evolution, Some(Threshold::Advancement));

        let message = level_up_message(&outcome);
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], Threshold::Advancement.note(TraitId::Insight));
        assert!(lines[2].contains("賢者の姿に第２進化"));
        assert_eq!(message.matches("おめでとう").count(), 1);
    }

    #[test]
    fn level_fifty_message_has_final_evolution_only() {
        let outcome = grow_insight_to(50);
        assert_eq!(outcome.old_level, 49);
        assert!(!outcome.capped);
        assert_eq!(outcome.evolution, Some(Threshold::Partner));

        let message = level_up_message(&outcome);
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("レベルアップした！"));
        assert!(lines[2].contains("最終進化"));
        assert_eq!(message.matches("進化").count(), 1);
    }

    #[test]
    fn capped_increment_has_no_level_up_line() {
        let mut state = ProgressionState::default();
        for _ in 0..40 {
            state.apply_increment(TraitId::Spark, None);
        }
        let outcome = state.apply_increment(TraitId::Spark, None);
        let message = level_up_message(&outcome);
        assert_eq!(message, "✨ スパークが ＋１ 上がった！");
    }

    #[test]
    fn popup_uses_short_meaning() {
        assert_eq!(gain_popup(TraitId::Logic), "論理 UP!");
    }
}
