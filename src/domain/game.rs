use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weeks in the regular season; season-relative week numbers above this
/// fall into the postseason.
pub const REGULAR_SEASON_WEEKS: i32 = 18;

/// Phase of the league calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonType {
    Preseason,
    Regular,
    Postseason,
}

impl SeasonType {
    /// Numeric code used by the data source
    pub fn code(&self) -> i32 {
        match self {
            SeasonType::Preseason => 1,
            SeasonType::Regular => 2,
            SeasonType::Postseason => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(SeasonType::Preseason),
            2 => Some(SeasonType::Regular),
            3 => Some(SeasonType::Postseason),
            _ => None,
        }
    }

    /// The source publishes no postseason standings; postseason queries
    /// fall back to the regular-season table.
    pub fn standings_code(&self) -> i32 {
        match self {
            SeasonType::Postseason => SeasonType::Regular.code(),
            other => other.code(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonType::Preseason => "preseason",
            SeasonType::Regular => "regular",
            SeasonType::Postseason => "postseason",
        }
    }
}

impl std::fmt::Display for SeasonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One (season, season_type, week) coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekInfo {
    pub season: i32,
    pub season_type: SeasonType,
    pub week_no: i32,
}

impl WeekInfo {
    pub fn new(season: i32, season_type: SeasonType, week_no: i32) -> Self {
        Self {
            season,
            season_type,
            week_no,
        }
    }

    /// Map a season-relative week number onto the source's numbering: the
    /// postseason restarts at week 1 after the regular-season span.
    pub fn normalized(season: i32, week_no: i32) -> Self {
        if week_no > REGULAR_SEASON_WEEKS {
            Self {
                season,
                season_type: SeasonType::Postseason,
                week_no: week_no - REGULAR_SEASON_WEEKS,
            }
        } else {
            Self {
                season,
                season_type: SeasonType::Regular,
                week_no,
            }
        }
    }
}

impl std::fmt::Display for WeekInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} week {}",
            self.season, self.season_type, self.week_no
        )
    }
}

/// Lifecycle of a fixture; Final is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Final,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::InProgress => "in_progress",
            GameStatus::Final => "final",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(GameStatus::Scheduled),
            "in_progress" => Some(GameStatus::InProgress),
            "final" => Some(GameStatus::Final),
            _ => None,
        }
    }

    /// Map a raw source status name. Anything between kickoff and final
    /// (halftime, delays, overtime) counts as in progress.
    pub fn from_source(value: &str) -> Self {
        match value {
            "STATUS_SCHEDULED" => GameStatus::Scheduled,
            "STATUS_FINAL" => GameStatus::Final,
            _ => GameStatus::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GameStatus::Final)
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One scheduled match between two teams. Fixture identity is immutable;
/// scores and status are mutated only by the score synchronizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: Option<i32>,
    pub external_id: String,
    pub season: i32,
    pub season_type: SeasonType,
    pub week_no: i32,
    pub home_team_id: i32,
    pub road_team_id: i32,
    pub favorite_team_id: i32,
    pub home_score: i32,
    pub road_score: i32,
    pub status: GameStatus,
    pub kickoff_at: DateTime<Utc>,
    pub spread: f64,
}

impl Game {
    pub fn is_final(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn week(&self) -> WeekInfo {
        WeekInfo::new(self.season, self.season_type, self.week_no)
    }

    /// Winner of a finished game; a tied final has no winner.
    pub fn winning_team_id(&self) -> Option<i32> {
        if !self.is_final() {
            return None;
        }
        match self.home_score.cmp(&self.road_score) {
            std::cmp::Ordering::Greater => Some(self.home_team_id),
            std::cmp::Ordering::Less => Some(self.road_team_id),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn underdog_team_id(&self) -> i32 {
        if self.favorite_team_id == self.home_team_id {
            self.road_team_id
        } else {
            self.home_team_id
        }
    }
}

/// A league team with its cumulative record. Records are refreshed from
/// the standings feed on a separate cadence, never by the synchronizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Option<i32>,
    pub external_id: String,
    pub city: String,
    pub nickname: String,
    pub short_name: String,
    pub full_name: String,
    pub logo_url: String,
    pub wins: i32,
    pub losses: i32,
    pub ties: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn game(home_score: i32, road_score: i32, status: GameStatus) -> Game {
        Game {
            id: Some(1),
            external_id: "s:20~l:28~e:1".to_string(),
            season: 2025,
            season_type: SeasonType::Regular,
            week_no: 3,
            home_team_id: 10,
            road_team_id: 20,
            favorite_team_id: 10,
            home_score,
            road_score,
            status,
            kickoff_at: Utc.with_ymd_and_hms(2025, 9, 21, 17, 0, 0).unwrap(),
            spread: -3.5,
        }
    }

    #[test]
    fn test_winner_requires_final_status() {
        assert_eq!(game(21, 14, GameStatus::InProgress).winning_team_id(), None);
        assert_eq!(game(21, 14, GameStatus::Final).winning_team_id(), Some(10));
        assert_eq!(game(14, 21, GameStatus::Final).winning_team_id(), Some(20));
    }

    #[test]
    fn test_tied_final_has_no_winner() {
        assert_eq!(game(17, 17, GameStatus::Final).winning_team_id(), None);
    }

    #[test]
    fn test_week_normalization_rolls_into_postseason() {
        let wildcard = WeekInfo::normalized(2025, 19);
        assert_eq!(wildcard.season_type, SeasonType::Postseason);
        assert_eq!(wildcard.week_no, 1);

        let regular = WeekInfo::normalized(2025, 18);
        assert_eq!(regular.season_type, SeasonType::Regular);
        assert_eq!(regular.week_no, 18);
    }

    #[test]
    fn test_postseason_standings_use_regular_table() {
        assert_eq!(SeasonType::Postseason.standings_code(), 2);
        assert_eq!(SeasonType::Regular.standings_code(), 2);
        assert_eq!(SeasonType::Preseason.standings_code(), 1);
    }

    #[test]
    fn test_status_from_source_names() {
        assert_eq!(
            GameStatus::from_source("STATUS_SCHEDULED"),
            GameStatus::Scheduled
        );
        assert_eq!(GameStatus::from_source("STATUS_FINAL"), GameStatus::Final);
        assert_eq!(
            GameStatus::from_source("STATUS_HALFTIME"),
            GameStatus::InProgress
        );
    }
}
