use serde::{Deserialize, Serialize};

use super::game::WeekInfo;

/// Closed set of background job kinds, dispatched by exhaustive match.
///
/// A job's identity is derived purely from its logical parameters, never
/// from wall-clock time at creation, so re-planning a week always lands
/// on the same ids and `schedule_or_reschedule` can replace triggers in
/// place instead of duplicating jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// Poll one fixture's score inside its kickoff window
    PollGame { game_id: i32, week: WeekInfo },
    /// Remind late players some minutes before the week's first kickoff
    KickoffReminder { week: WeekInfo, offset_mins: i64 },
    /// Weekly singleton: create the coming week's games from the source
    CreateWeek,
    /// Weekly singleton: refresh team win/loss/tie records
    RefreshTeamRecords,
    /// Weekly singleton: reconcile the current week's job set
    WeeklyPlanner,
}

impl JobKind {
    /// Deterministic job id: same logical job, same id.
    pub fn job_id(&self) -> String {
        match self {
            JobKind::PollGame { game_id, week } => {
                format!("s{}:w{}:g{}", week.season, week.week_no, game_id)
            }
            JobKind::KickoffReminder { week, offset_mins } => {
                format!("s{}:w{}:d{}", week.season, week.week_no, offset_mins)
            }
            JobKind::CreateWeek => "create-week".to_string(),
            JobKind::RefreshTeamRecords => "refresh-team-records".to_string(),
            JobKind::WeeklyPlanner => "weekly-planner".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::game::SeasonType;

    fn week() -> WeekInfo {
        WeekInfo::new(2025, SeasonType::Regular, 4)
    }

    #[test]
    fn test_job_ids_are_deterministic() {
        let poll = JobKind::PollGame {
            game_id: 17,
            week: week(),
        };
        assert_eq!(poll.job_id(), "s2025:w4:g17");
        assert_eq!(poll.job_id(), poll.clone().job_id());

        let reminder = JobKind::KickoffReminder {
            week: week(),
            offset_mins: 20,
        };
        assert_eq!(reminder.job_id(), "s2025:w4:d20");
    }

    #[test]
    fn test_singleton_ids_are_fixed_names() {
        assert_eq!(JobKind::CreateWeek.job_id(), "create-week");
        assert_eq!(JobKind::RefreshTeamRecords.job_id(), "refresh-team-records");
        assert_eq!(JobKind::WeeklyPlanner.job_id(), "weekly-planner");
    }

    #[test]
    fn test_kind_round_trips_through_json() {
        let kind = JobKind::PollGame {
            game_id: 3,
            week: week(),
        };
        let value = serde_json::to_value(&kind).unwrap();
        let back: JobKind = serde_json::from_value(value).unwrap();
        assert_eq!(back, kind);
    }
}
