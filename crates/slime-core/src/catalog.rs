//! # Trait Catalog
//!
//! The seven fixed personality axes and their display metadata.
//!
//! The declaration order of [`TraitId`] is significant: it is the final
//! tie-breaker when ranking traits, and the order in which trait sets are
//! serialized.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Number of traits. Every trait set always holds exactly this many values.
pub const TRAIT_COUNT: usize = 7;

/// Value every trait starts at (the floor).
pub const TRAIT_START_VALUE: u32 = 10;

/// Value no trait may exceed.
pub const TRAIT_MAX_VALUE: u32 = 50;

/// Level of a freshly created slime.
pub const BASE_LEVEL: u32 = 10;

/// Level cap.
pub const MAX_LEVEL: u32 = 50;

/// Trait used when the classifier returns an identifier we do not know.
pub const FALLBACK_TRAIT: TraitId = TraitId::Adapt;

// =============================================================================
// TRAIT IDENTIFIER
// =============================================================================

/// One of the seven personality axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraitId {
    Passion,
    Logic,
    Heart,
    Spark,
    Will,
    Adapt,
    Insight,
}

impl TraitId {
    /// All traits in declaration order.
    pub const ALL: [TraitId; TRAIT_COUNT] = [
        TraitId::Passion,
        TraitId::Logic,
        TraitId::Heart,
        TraitId::Spark,
        TraitId::Will,
        TraitId::Adapt,
        TraitId::Insight,
    ];

    /// Position in declaration order (0..7).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Wire identifier, e.g. `"PASSION"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TraitId::Passion => "PASSION",
            TraitId::Logic => "LOGIC",
            TraitId::Heart => "HEART",
            TraitId::Spark => "SPARK",
            TraitId::Will => "WILL",
            TraitId::Adapt => "ADAPT",
            TraitId::Insight => "INSIGHT",
        }
    }

    /// Strict parse. Case-insensitive, surrounding whitespace ignored.
    ///
    /// Returns `None` for anything that is not one of the seven identifiers.
    #[must_use]
    pub fn parse(raw: &str) -> Option<TraitId> {
        let wanted = raw.trim();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(wanted))
    }

    /// Lenient parse for untrusted input.
    ///
    /// Unknown identifiers map to [`FALLBACK_TRAIT`]. This never fails.
    #[must_use]
    pub fn sanitize(raw: &str) -> TraitId {
        Self::parse(raw).unwrap_or(FALLBACK_TRAIT)
    }

    /// Static display metadata for this trait.
    #[must_use]
    pub fn def(self) -> &'static TraitDef {
        &TRAIT_DEFS[self.index()]
    }
}

impl fmt::Display for TraitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TRAIT DEFINITIONS
// =============================================================================

/// Display metadata for one trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraitDef {
    pub id: TraitId,
    /// Katakana display label.
    pub label: &'static str,
    /// Short meaning, used in the "UP!" popup and in prompts.
    pub sub: &'static str,
    /// Hex colour the slime tints towards.
    pub color: &'static str,
    /// Job title unlocked at the first evolution.
    pub job: &'static str,
    pub desc: &'static str,
}

/// The catalog, indexed by [`TraitId::index`].
pub static TRAIT_DEFS: [TraitDef; TRAIT_COUNT] = [
    TraitDef {
        id: TraitId::Passion,
        label: "パッション",
        sub: "情熱",
        color: "#FFB3BA",
        job: "勇者",
        desc: "エネルギー、熱意",
    },
    TraitDef {
        id: TraitId::Logic,
        label: "ロジック",
        sub: "論理",
        color: "#BAE1FF",
        job: "魔法使い",
        desc: "理性、分析",
    },
    TraitDef {
        id: TraitId::Heart,
        label: "ハート",
        sub: "心情",
        color: "#FFC4E1",
        job: "僧侶",
        desc: "優しさ、共感",
    },
    TraitDef {
        id: TraitId::Spark,
        label: "スパーク",
        sub: "好奇心",
        color: "#FFFFBA",
        job: "遊び人",
        desc: "アイデア、創造",
    },
    TraitDef {
        id: TraitId::Will,
        label: "ウィル",
        sub: "決断",
        color: "#E0BBE4",
        job: "王様",
        desc: "意志、統率",
    },
    TraitDef {
        id: TraitId::Adapt,
        label: "アダプト",
        sub: "柔軟",
        color: "#B9FBC0",
        job: "狩人",
        desc: "適応、自然",
    },
    TraitDef {
        id: TraitId::Insight,
        label: "インサイト",
        sub: "内省",
        color: "#CFD8DC",
        job: "賢者",
        desc: "洞察、哲学",
    },
];

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_indexed_by_declaration_order() {
        for (i, id) in TraitId::ALL.into_iter().enumerate() {
            assert_eq!(id.index(), i);
            assert_eq!(TRAIT_DEFS[i].id, id);
            assert_eq!(id.def().id, id);
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_trimmed() {
        assert_eq!(TraitId::parse("LOGIC"), Some(TraitId::Logic));
        assert_eq!(TraitId::parse("logic"), Some(TraitId::Logic));
        assert_eq!(TraitId::parse("  Insight \n"), Some(TraitId::Insight));
        assert_eq!(TraitId::parse("UNKNOWN_TRAIT"), None);
        assert_eq!(TraitId::parse(""), None);
    }

    #[test]
    fn sanitize_falls_back_to_adapt() {
        assert_eq!(TraitId::sanitize("UNKNOWN_TRAIT"), TraitId::Adapt);
        assert_eq!(TraitId::sanitize(""), FALLBACK_TRAIT);
        assert_eq!(TraitId::sanitize("will"), TraitId::Will);
    }

    #[test]
    fn serde_uses_wire_identifiers() {
        let json = serde_json::to_string(&TraitId::Passion).unwrap_or_default();
        assert_eq!(json, "\"PASSION\"");
        let back: Result<TraitId, _> = serde_json::from_str("\"INSIGHT\"");
        assert_eq!(back.ok(), Some(TraitId::Insight));
    }

    #[test]
    fn display_matches_wire_identifier() {
        for id in TraitId::ALL {
            assert_eq!(id.to_string(), id.as_str());
        }
    }
}
