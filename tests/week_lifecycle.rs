//! Pure end-to-end checks over one week's lifecycle: the job set a
//! planning pass computes, the polling triggers it registers, and the
//! award grants a finished week produces.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pickem::adapters::parse_odds;
use pickem::config::SchedulerConfig;
use pickem::domain::{
    AwardSlug, Game, GameStatus, JobKind, Player, PlayerGamePick, SeasonType, WeekInfo,
};
use pickem::scheduler::Trigger;
use pickem::services::{evaluate_week, polling_window, reminder_instants, WeekSlate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn week() -> WeekInfo {
    WeekInfo::new(2025, SeasonType::Regular, 7)
}

fn game(id: i32, kickoff_at: DateTime<Utc>, status: GameStatus) -> Game {
    Game {
        id: Some(id),
        external_id: format!("s:20~l:28~e:{id}"),
        season: 2025,
        season_type: SeasonType::Regular,
        week_no: 7,
        home_team_id: id * 10,
        road_team_id: id * 10 + 1,
        favorite_team_id: id * 10,
        home_score: 0,
        road_score: 0,
        status,
        kickoff_at,
        spread: -3.5,
    }
}

fn player(id: i32) -> Player {
    Player {
        id: Some(id),
        first_name: format!("Player{id}"),
        last_name: "Test".to_string(),
        nick_name: format!("p{id}"),
        email: format!("p{id}@example.test"),
        discord_id: 5000 + id as i64,
        active: true,
    }
}

fn pick(player_id: i32, game_id: i32, picked_team_id: i32, minute: i64) -> PlayerGamePick {
    PlayerGamePick {
        id: Some(player_id * 1000 + game_id),
        player_id,
        game_id,
        picked_team_id,
        season: 2025,
        week_no: 7,
        is_lock: false,
        is_upset: false,
        created_at: utc(2025, 10, 15, 9, 0) + Duration::minutes(minute),
    }
}

/// The job-id set a planning pass computes for a week. Deterministic ids
/// mean planning twice lands on exactly the same set.
fn planned_job_ids(games: &[Game], now: DateTime<Utc>, config: &SchedulerConfig) -> Vec<String> {
    let week = week();
    let mut ids = Vec::new();
    for game in games {
        let Some(game_id) = game.id else { continue };
        if polling_window(game.kickoff_at, game.status, now, config).is_some() {
            ids.push(JobKind::PollGame { game_id, week }.job_id());
        }
    }
    if let Some(first_kickoff) = games.iter().map(|game| game.kickoff_at).min() {
        for (offset_mins, _) in reminder_instants(first_kickoff, &config.reminder_offsets_mins, now)
        {
            ids.push(JobKind::KickoffReminder { week, offset_mins }.job_id());
        }
    }
    ids.push(JobKind::CreateWeek.job_id());
    ids.push(JobKind::RefreshTeamRecords.job_id());
    ids.push(JobKind::WeeklyPlanner.job_id());
    ids
}

#[test]
fn planning_twice_yields_identical_job_id_set_with_no_duplicates() {
    let config = SchedulerConfig::default();
    let sunday = utc(2025, 10, 19, 17, 0);
    let games = vec![
        game(1, sunday, GameStatus::Scheduled),
        game(2, sunday + Duration::hours(3), GameStatus::Scheduled),
        game(3, utc(2025, 10, 20, 0, 15), GameStatus::Scheduled),
    ];
    let now = utc(2025, 10, 15, 12, 0);

    let first = planned_job_ids(&games, now, &config);
    let second = planned_job_ids(&games, now, &config);

    assert_eq!(first, second);
    let unique: HashSet<&String> = first.iter().collect();
    assert_eq!(unique.len(), first.len(), "job ids must not collide");
    // 3 polls + 3 reminders + 3 singletons.
    assert_eq!(first.len(), 9);
    assert!(first.contains(&"s2025:w7:g1".to_string()));
    assert!(first.contains(&"s2025:w7:d60".to_string()));
    assert!(first.contains(&"weekly-planner".to_string()));
}

#[test]
fn final_fixtures_drop_out_of_the_planned_set() {
    let config = SchedulerConfig::default();
    let sunday = utc(2025, 10, 19, 17, 0);
    let games = vec![
        game(1, sunday, GameStatus::Final),
        game(2, sunday + Duration::hours(3), GameStatus::Scheduled),
    ];
    let now = utc(2025, 10, 20, 12, 0);

    let ids = planned_job_ids(&games, now, &config);
    assert!(!ids.contains(&"s2025:w7:g1".to_string()));
    assert!(ids.contains(&"s2025:w7:g2".to_string()));
}

#[test]
fn poll_trigger_covers_the_window_and_then_exhausts() {
    let config = SchedulerConfig::default();
    let kickoff = utc(2025, 10, 19, 17, 0);
    let now = utc(2025, 10, 19, 12, 0);
    let (start, end) = polling_window(kickoff, GameStatus::Scheduled, now, &config).unwrap();
    let trigger = Trigger::Interval {
        start,
        end,
        every_secs: config.poll_interval_mins * 60,
        jitter_secs: 0,
    };

    let mut rng = StdRng::seed_from_u64(7);
    let mut fires = 0;
    let mut cursor = now;
    while let Some(next) = trigger.next_fire_after(cursor, &mut rng) {
        assert!(next >= start && next < end);
        cursor = next;
        fires += 1;
    }
    // An 8-hour window polled every 5 minutes: start plus 95 interior marks.
    assert_eq!(fires, 96);
    assert_eq!(trigger.next_fire_after(cursor, &mut rng), None);
}

#[test]
fn finished_week_grants_are_stable_across_reruns() {
    let sunday = utc(2025, 10, 19, 17, 0);
    let mut games = vec![
        game(1, sunday, GameStatus::Final),
        game(2, sunday, GameStatus::Final),
        game(3, sunday, GameStatus::Final),
    ];
    for g in &mut games {
        g.home_score = 27;
        g.road_score = 13;
    }

    // Player 1 is the sole correct picker on game 2 and sweeps the week.
    let picks = vec![
        pick(1, 1, 10, 0),
        pick(2, 1, 10, 5),
        pick(1, 2, 20, 1),
        pick(2, 2, 21, 6),
        pick(1, 3, 30, 2),
        pick(2, 3, 30, 7),
    ];
    let slate = WeekSlate {
        week: week(),
        games,
        picks,
        players: vec![player(1), player(2)],
    };
    assert!(slate.all_final());

    let first = evaluate_week(&slate).unwrap();
    let second = evaluate_week(&slate).unwrap();
    assert_eq!(first, second);

    let in_your_face: Vec<_> = first
        .iter()
        .filter(|grant| grant.slug == AwardSlug::InYourFace)
        .collect();
    assert_eq!(in_your_face.len(), 1);
    assert_eq!(in_your_face[0].player_id, 1);
    assert_eq!(in_your_face[0].game_id, Some(2));

    assert!(first
        .iter()
        .any(|grant| grant.slug == AwardSlug::WonTheWeek && grant.player_id == 1));
    assert!(first
        .iter()
        .any(|grant| grant.slug == AwardSlug::QuickPick && grant.player_id == 1));
}

#[test]
fn odds_text_parses_per_published_line() {
    let favored = parse_odds("DAL -3.5").unwrap();
    assert_eq!(favored.favorite_short_name.as_deref(), Some("dal"));
    assert_eq!(favored.spread, -3.5);

    let even = parse_odds("EVEN").unwrap();
    assert_eq!(even.favorite_short_name, None);
    assert_eq!(even.spread, 0.5);
}
