//! Derived appearance data for whatever front-end draws the slime.
//!
//! Colours are blended with integer arithmetic in per-mille steps.

use crate::catalog::TraitId;
use crate::progression::ProgressionState;
use crate::system::evolution::{EvolutionStage, growth_percent, level_badge};
use serde::Serialize;

const CORE_BASE: &str = "#E2E8F0";
const BODY_BASE_LIGHT: &str = "#EBF8FF";
const BODY_BASE_DEEP: &str = "#BEE3F8";

/// Everything a renderer needs to draw the current slime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Appearance {
    pub stage: EvolutionStage,
    pub dominant: TraitId,
    pub level: u32,
    /// `"Lv.n"` / `"Lv.∞"`.
    pub badge: String,
    /// Job shown next to the badge.
    pub badge_job: &'static str,
    /// Core colour, grey tinted towards the dominant trait colour.
    pub core_color: String,
    pub body_colors: (String, String),
    /// Accessory worn at this stage, if any.
    pub accessory: Option<&'static str>,
    /// Partner form glows.
    pub aura: bool,
}

impl Appearance {
    #[must_use]
    pub fn of(state: &ProgressionState) -> Self {
        let dominant = state.dominant_trait();
        let level = state.level();
        let stage = EvolutionStage::from_level(level);
        let target = dominant.def().color;
        let progress = growth_percent(level) * 10;

        Self {
            stage,
            dominant,
            level,
            badge: level_badge(level),
            badge_job: stage.badge_job(dominant),
            core_color: blend_hex(CORE_BASE, target, progress),
            body_colors: (
                blend_hex(BODY_BASE_LIGHT, target, progress / 4),
                blend_hex(BODY_BASE_DEEP, target, progress * 45 / 100),
            ),
            accessory: accessory(dominant, stage),
            aura: stage == EvolutionStage::Partner,
        }
    }
}

/// The accessory each job wears once awakened, and its upgraded form.
#[must_use]
pub fn accessory(trait_id: TraitId, stage: EvolutionStage) -> Option<&'static str> {
    let advanced = match stage {
        EvolutionStage::Baby => return None,
        EvolutionStage::Awakened => false,
        EvolutionStage::Advanced | EvolutionStage::Partner => true,
    };
    let (basic, upgraded) = match trait_id {
        TraitId::Passion => ("ハチマキ", "立派なツノ飾り兜"),
        TraitId::Logic => ("三角帽子", "濃い青色の大きな魔法使い帽子"),
        TraitId::Heart => ("天使の輪", "天使の輪＋背中の羽"),
        TraitId::Spark => ("星飾り", "ダンスする2つの星"),
        TraitId::Will => ("金色の王冠", "威厳の増した金色の王冠"),
        TraitId::Adapt => ("葉っぱの帽子", "自然と一体化した大きな飾り"),
        TraitId::Insight => ("額の赤い印", "輝く第三の目"),
    };
    Some(if advanced { upgraded } else { basic })
}

/// Linear blend of two `#RRGGBB` colours; `per_mille` of 1000 yields `to`.
///
/// Unparsable input falls back to `from` unchanged.
#[must_use]
pub fn blend_hex(from: &str, to: &str, per_mille: u32) -> String {
    let (Some(a), Some(b)) = (parse_hex(from), parse_hex(to)) else {
        return from.to_string();
    };
    let amount = per_mille.min(1000) as i64;
    let mix = |x: u8, y: u8| -> u8 {
        let x = x as i64;
        let y = y as i64;
        // Round half away from zero.
        let delta = (y - x) * amount;
        let step = if delta >= 0 { (delta + 500) / 1000 } else { (delta - 500) / 1000 };
        (x + step).clamp(0, 255) as u8
    };
    format!(
        "#{:02x}{:02x}{:02x}",
        mix(a[0], b[0]),
        mix(a[1], b[1]),
        mix(a[2], b[2])
    )
}

fn parse_hex(color: &str) -> Option<[u8; 3]> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    Some([(value >> 16) as u8, (value >> 8) as u8, value as u8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend_hex("#000000", "#ffffff", 0), "#000000");
        assert_eq!(blend_hex("#000000", "#ffffff", 1000), "#ffffff");
        assert_eq!(blend_hex("#000000", "#ffffff", 500), "#808080");
        assert_eq!(blend_hex("#FFB3BA", "#000000", 2000), "#000000");
    }

    #[test]
    fn blend_rejects_garbage() {
        assert_eq!(blend_hex("nope", "#ffffff", 500), "nope");
    }

    #[test]
    fn baby_has_no_accessory_and_grey_core() {
        let look = Appearance::of(&ProgressionState::default());
        assert_eq!(look.stage, EvolutionStage::Baby);
        assert_eq!(look.accessory, None);
        assert_eq!(look.core_color, "#e2e8f0");
        assert_eq!(look.badge, "Lv.10");
        assert_eq!(look.badge_job, "見習い");
        assert!(!look.aura);
    }

    #[test]
    fn awakened_wears_basic_accessory() {
        let mut state = ProgressionState::default();
        for _ in 0..12 {
            state.apply_increment(TraitId::Passion, None);
        }
        let look = Appearance::of(&state);
        assert_eq!(look.stage, EvolutionStage::Awakened);
        assert_eq!(look.accessory, Some("ハチマキ"));
        assert_eq!(look.badge_job, "勇者");
    }

    #[test]
    fn partner_form_glows_in_full_colour() {
        let mut state = ProgressionState::default();
        for _ in 0..40 {
            state.apply_increment(TraitId::Will, None);
        }
        let look = Appearance::of(&state);
        assert!(look.aura);
        assert_eq!(look.core_color, "#e0bbe4");
        assert_eq!(look.accessory, Some("威厳の増した金色の王冠"));
    }
}
