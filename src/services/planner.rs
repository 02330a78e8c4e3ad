//! Week planner
//!
//! Turns a week's fixture list into the job set that keeps it current:
//! one bounded polling window per fixture, a reminder cascade before the
//! first kickoff, and the weekly singleton jobs. Planning is idempotent;
//! every registration goes through `schedule_or_reschedule`.

use chrono::{DateTime, Duration, Utc, Weekday};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::adapters::{fetch_current_week, LeagueClient, PickemStore, SourceGame};
use crate::config::{SchedulerConfig, SourceConfig};
use crate::domain::{Game, GameStatus, JobKind, WeekInfo};
use crate::error::{PickemError, Result};
use crate::scheduler::{JobScheduler, Trigger};

/// Compute a fixture's polling window.
///
/// Start is the kickoff while it is still ahead; a late-discovered,
/// not-yet-final fixture starts after a short delay so there is always a
/// next run. The window spans a fixed horizon from its start. A final
/// fixture, or a degenerate window, yields no schedule at all.
pub fn polling_window(
    kickoff_at: DateTime<Utc>,
    status: GameStatus,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if status.is_terminal() {
        return None;
    }
    let start = if kickoff_at > now {
        kickoff_at
    } else {
        now + Duration::seconds(config.late_start_delay_secs)
    };
    let end = start + Duration::hours(config.poll_window_hours);
    (end > start).then_some((start, end))
}

/// Absolute reminder instants still ahead of `now`; offsets already in
/// the past are dropped, never scheduled.
pub fn reminder_instants(
    first_kickoff: DateTime<Utc>,
    offsets_mins: &[i64],
    now: DateTime<Utc>,
) -> Vec<(i64, DateTime<Utc>)> {
    offsets_mins
        .iter()
        .filter_map(|&offset| {
            let at = first_kickoff - Duration::minutes(offset);
            (at > now).then_some((offset, at))
        })
        .collect()
}

#[derive(Clone)]
pub struct WeekPlanner {
    store: PickemStore,
    scheduler: JobScheduler,
    source: SourceConfig,
    config: SchedulerConfig,
}

impl WeekPlanner {
    pub fn new(
        store: PickemStore,
        scheduler: JobScheduler,
        source: SourceConfig,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            scheduler,
            source,
            config,
        }
    }

    /// Reconcile the full job set for a week. Idempotent: repeated calls
    /// land on the same deterministic ids and replace triggers in place.
    pub async fn schedule_week(&self, week: WeekInfo) -> Result<()> {
        self.schedule_game_polling(week).await?;
        self.schedule_reminders(week).await?;
        self.schedule_singletons().await?;
        Ok(())
    }

    /// Ask the source which week it is and reconcile that week's jobs.
    pub async fn plan_current_week(&self) -> Result<WeekInfo> {
        let week = fetch_current_week(&self.source).await?;
        info!(%week, "planning current week");
        self.schedule_week(week).await?;
        Ok(week)
    }

    /// Create the current week's games from the source.
    pub async fn create_current_week(&self) -> Result<WeekInfo> {
        let week = fetch_current_week(&self.source).await?;
        let created = self.create_week(week).await?;
        info!(%week, created, "week created");
        Ok(week)
    }

    /// Materialize a week's fixtures as internal games. Re-running only
    /// refreshes pre-kickoff attributes; fixture identity and scores are
    /// untouched.
    pub async fn create_week(&self, week: WeekInfo) -> Result<usize> {
        let client = LeagueClient::new(&self.source, week)?;
        let fixtures = client.games().await?;
        if fixtures.is_empty() {
            return Err(PickemError::DomainInvariant(format!(
                "source lists no fixtures for {week}"
            )));
        }

        let teams_by_external_id: HashMap<String, i32> = self
            .store
            .all_teams()
            .await?
            .into_iter()
            .filter_map(|team| team.id.map(|id| (team.external_id, id)))
            .collect();
        let team_id = |external_id: &str| -> Result<i32> {
            teams_by_external_id.get(external_id).copied().ok_or_else(|| {
                PickemError::DomainInvariant(format!("no team with external id {external_id}"))
            })
        };

        let mut created = 0;
        for fixture in fixtures {
            let home_team_id = team_id(&fixture.home_team_external_id)?;
            let road_team_id = team_id(&fixture.road_team_external_id)?;
            let favorite_team_id = match self.favorite_external_id(&client, fixture).await? {
                Some(external_id) => team_id(&external_id)?,
                None => home_team_id,
            };

            let game = Game {
                id: None,
                external_id: fixture.external_id.clone(),
                season: week.season,
                season_type: week.season_type,
                week_no: week.week_no,
                home_team_id,
                road_team_id,
                favorite_team_id,
                home_score: 0,
                road_score: 0,
                status: fixture.status,
                kickoff_at: fixture.kickoff_at,
                spread: fixture.odds.as_ref().map(|odds| odds.spread).unwrap_or(0.0),
            };
            self.store.upsert_game(&game).await?;
            created += 1;
        }
        Ok(created)
    }

    /// Overwrite team records from the standings feed. This runs on its
    /// own cadence, never inside score sync.
    pub async fn refresh_team_records(&self) -> Result<()> {
        let week = fetch_current_week(&self.source).await?;
        let client = LeagueClient::new(&self.source, week)?;
        for team in self.store.all_teams().await? {
            let Some(team_id) = team.id else { continue };
            match client.find_team(&team.external_id).await? {
                Some(source_team) => {
                    self.store
                        .update_team_record(
                            team_id,
                            source_team.wins,
                            source_team.losses,
                            source_team.ties,
                        )
                        .await?;
                }
                None => warn!(
                    external_id = %team.external_id,
                    "team absent from source roster; record not refreshed"
                ),
            }
        }
        Ok(())
    }

    async fn schedule_game_polling(&self, week: WeekInfo) -> Result<()> {
        let games = self.store.games_for_week(week).await?;
        let now = Utc::now();
        for game in games {
            let Some(game_id) = game.id else { continue };
            let Some((start, end)) = polling_window(game.kickoff_at, game.status, now, &self.config)
            else {
                continue;
            };
            self.scheduler
                .schedule_or_reschedule(
                    JobKind::PollGame { game_id, week },
                    Trigger::Interval {
                        start,
                        end,
                        every_secs: self.config.poll_interval_mins * 60,
                        jitter_secs: self.config.poll_jitter_secs,
                    },
                )
                .await?;
        }
        Ok(())
    }

    async fn schedule_reminders(&self, week: WeekInfo) -> Result<()> {
        let Some(first_kickoff) = self.store.first_kickoff_of_week(week).await? else {
            return Ok(());
        };
        for (offset_mins, at) in
            reminder_instants(first_kickoff, &self.config.reminder_offsets_mins, Utc::now())
        {
            self.scheduler
                .schedule_or_reschedule(
                    JobKind::KickoffReminder { week, offset_mins },
                    Trigger::Once { at },
                )
                .await?;
        }
        Ok(())
    }

    async fn schedule_singletons(&self) -> Result<()> {
        let plan_weekday = self.parse_weekday(&self.config.plan_weekday)?;
        let records_weekday = self.parse_weekday(&self.config.records_weekday)?;
        let tz = self.config.plan_timezone.clone();

        self.scheduler
            .schedule_or_reschedule(
                JobKind::CreateWeek,
                Trigger::Weekly {
                    weekday: plan_weekday,
                    hour: self.config.plan_hour,
                    minute: self.config.plan_minute,
                    tz: tz.clone(),
                },
            )
            .await?;
        // Planning runs an hour behind creation so fresh games get their
        // polling windows the same morning.
        self.scheduler
            .schedule_or_reschedule(
                JobKind::WeeklyPlanner,
                Trigger::Weekly {
                    weekday: plan_weekday,
                    hour: (self.config.plan_hour + 1) % 24,
                    minute: self.config.plan_minute,
                    tz: tz.clone(),
                },
            )
            .await?;
        self.scheduler
            .schedule_or_reschedule(
                JobKind::RefreshTeamRecords,
                Trigger::Weekly {
                    weekday: records_weekday,
                    hour: self.config.plan_hour,
                    minute: self.config.plan_minute,
                    tz,
                },
            )
            .await?;
        Ok(())
    }

    fn parse_weekday(&self, raw: &str) -> Result<Weekday> {
        raw.parse::<Weekday>()
            .map_err(|_| PickemError::Scheduling(format!("not a weekday: {raw}")))
    }

    async fn favorite_external_id(
        &self,
        client: &LeagueClient,
        fixture: &SourceGame,
    ) -> Result<Option<String>> {
        let Some(odds) = &fixture.odds else {
            return Ok(None);
        };
        let Some(short_name) = &odds.favorite_short_name else {
            // An even line has no favorite; the caller falls back to the
            // home team.
            return Ok(None);
        };
        match client.find_team_by_short_name(short_name).await? {
            Some(team) => Ok(Some(team.external_id.clone())),
            None => {
                warn!(
                    fixture = %fixture.external_id,
                    short_name,
                    "favored team not in roster; falling back to home team"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> SchedulerConfig {
        SchedulerConfig::default()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_future_kickoff_polls_from_kickoff() {
        let kickoff = utc(2025, 9, 21, 17, 0, 0);
        let now = utc(2025, 9, 21, 10, 0, 0);
        let (start, end) =
            polling_window(kickoff, GameStatus::Scheduled, now, &config()).unwrap();
        assert_eq!(start, kickoff);
        assert_eq!(end, kickoff + Duration::hours(8));
    }

    #[test]
    fn test_late_discovered_fixture_polls_immediately() {
        let kickoff = utc(2025, 9, 21, 17, 0, 0);
        let now = utc(2025, 9, 21, 18, 30, 0);
        let (start, end) =
            polling_window(kickoff, GameStatus::InProgress, now, &config()).unwrap();
        assert_eq!(start, now + Duration::seconds(5));
        assert_eq!(end, start + Duration::hours(8));
    }

    #[test]
    fn test_final_fixture_is_never_scheduled() {
        let kickoff = utc(2025, 9, 21, 17, 0, 0);
        let now = utc(2025, 9, 21, 10, 0, 0);
        assert_eq!(polling_window(kickoff, GameStatus::Final, now, &config()), None);
    }

    #[test]
    fn test_reminder_offsets_in_the_past_are_dropped() {
        let first_kickoff = utc(2025, 9, 21, 17, 0, 0);
        // 16:30: the 60-minute offset has already passed.
        let now = utc(2025, 9, 21, 16, 30, 0);
        let instants = reminder_instants(first_kickoff, &[60, 20, 7], now);
        assert_eq!(
            instants,
            vec![
                (20, utc(2025, 9, 21, 16, 40, 0)),
                (7, utc(2025, 9, 21, 16, 53, 0)),
            ]
        );
    }

    #[test]
    fn test_all_reminders_kept_before_the_cascade_starts() {
        let first_kickoff = utc(2025, 9, 21, 17, 0, 0);
        let now = utc(2025, 9, 21, 12, 0, 0);
        assert_eq!(reminder_instants(first_kickoff, &[60, 20, 7], now).len(), 3);
    }
}
