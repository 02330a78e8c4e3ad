use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of achievement types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardSlug {
    QuickPick,
    PerfectWeek,
    InYourFace,
    WonTheWeek,
}

impl AwardSlug {
    pub fn as_str(&self) -> &'static str {
        match self {
            AwardSlug::QuickPick => "quick_pick",
            AwardSlug::PerfectWeek => "perfect_week",
            AwardSlug::InYourFace => "in_your_face",
            AwardSlug::WonTheWeek => "won_the_week",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "quick_pick" => Some(AwardSlug::QuickPick),
            "perfect_week" => Some(AwardSlug::PerfectWeek),
            "in_your_face" => Some(AwardSlug::InYourFace),
            "won_the_week" => Some(AwardSlug::WonTheWeek),
            _ => None,
        }
    }
}

impl std::fmt::Display for AwardSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Catalog row for one achievement type; unique on slug
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Award {
    pub id: Option<i32>,
    pub slug: AwardSlug,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub point_value: i32,
}

/// Static catalog definition, upserted once at startup
#[derive(Debug, Clone, Copy)]
pub struct AwardDefinition {
    pub slug: AwardSlug,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub point_value: i32,
}

pub const AWARD_CATALOG: [AwardDefinition; 4] = [
    AwardDefinition {
        slug: AwardSlug::QuickPick,
        name: "Quick Pick",
        description: "First picks in for the week",
        icon: "quick-pick",
        point_value: 0,
    },
    AwardDefinition {
        slug: AwardSlug::PerfectWeek,
        name: "Perfect Week",
        description: "No losses for the week",
        icon: "perfect-week",
        point_value: 0,
    },
    AwardDefinition {
        slug: AwardSlug::InYourFace,
        name: "In Your Face",
        description: "Only player to call a game right",
        icon: "in-your-face",
        point_value: 0,
    },
    AwardDefinition {
        slug: AwardSlug::WonTheWeek,
        name: "Won The Week",
        description: "Outscored everyone for the week",
        icon: "won-the-week",
        point_value: 0,
    },
];

/// A granted achievement. Unique on (player, award, season, week, game);
/// the guarded insert is the only write path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerAward {
    pub id: Option<i32>,
    pub player_id: i32,
    pub award_id: i32,
    pub season: i32,
    pub week_no: i32,
    pub game_id: Option<i32>,
    pub notified_at: Option<DateTime<Utc>>,
}

/// A grant the award rules decided on, before resolution to catalog ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardGrant {
    pub player_id: i32,
    pub slug: AwardSlug,
    /// Set only for per-game awards
    pub game_id: Option<i32>,
}
