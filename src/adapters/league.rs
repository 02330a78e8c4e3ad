//! League data source client
//!
//! One client instance is one immutable snapshot of one (week, season
//! type): games, teams, and standings are each fetched lazily once and
//! memoized for the instance's lifetime, never refreshed mid-flight.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use tokio::sync::OnceCell;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::config::SourceConfig;
use crate::domain::{GameStatus, SeasonType, WeekInfo};
use crate::error::{PickemError, Result};

/// Server statuses the source emits during maintenance windows; worth
/// retrying with backoff.
const TRANSIENT_STATUSES: [u16; 3] = [501, 502, 503];

/// A published point-spread line
#[derive(Debug, Clone, PartialEq)]
pub struct OddsLine {
    /// Lower-cased short name of the favored team; None for a pick'em
    pub favorite_short_name: Option<String>,
    pub spread: f64,
}

/// Parse odds text of the form `"DAL -3.5"` or `"EVEN"`.
///
/// An even line carries a half-point spread so no pick against it can
/// ever push.
pub fn parse_odds(details: &str) -> Option<OddsLine> {
    let mut tokens = details.split_whitespace();
    let first = tokens.next()?;
    if first.eq_ignore_ascii_case("even") {
        return Some(OddsLine {
            favorite_short_name: None,
            spread: 0.5,
        });
    }
    let spread = tokens.next()?.parse::<f64>().ok()?;
    Some(OddsLine {
        favorite_short_name: Some(first.to_lowercase()),
        spread,
    })
}

/// One fixture as the source currently reports it
#[derive(Debug, Clone)]
pub struct SourceGame {
    pub external_id: String,
    pub kickoff_at: DateTime<Utc>,
    pub status: GameStatus,
    pub home_team_external_id: String,
    pub road_team_external_id: String,
    pub home_score: i32,
    pub road_score: i32,
    pub odds: Option<OddsLine>,
}

/// One team from the roster feed, with its record attached from the
/// standings feed
#[derive(Debug, Clone)]
pub struct SourceTeam {
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

/// One team's win/loss/tie line from the standings feed
#[derive(Debug, Clone)]
pub struct SourceStanding {
    pub team_external_id: String,
    pub wins: i32,
    pub losses: i32,
    pub ties: i32,
}

// ==================== wire payloads ====================

#[derive(Debug, Deserialize)]
struct ScoreboardPayload {
    #[serde(default)]
    events: Vec<EventData>,
    week: Option<WeekNumber>,
    season: Option<SeasonData>,
}

#[derive(Debug, Deserialize)]
struct WeekNumber {
    number: i32,
}

#[derive(Debug, Deserialize)]
struct SeasonData {
    year: i32,
    #[serde(rename = "type")]
    season_type: i32,
}

#[derive(Debug, Deserialize)]
struct EventData {
    uid: String,
    date: String,
    status: EventStatus,
    #[serde(default)]
    competitions: Vec<CompetitionData>,
}

#[derive(Debug, Deserialize)]
struct EventStatus {
    #[serde(rename = "type")]
    status_type: StatusType,
}

#[derive(Debug, Deserialize)]
struct StatusType {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CompetitionData {
    #[serde(default)]
    competitors: Vec<CompetitorData>,
    #[serde(default)]
    odds: Vec<OddsData>,
}

#[derive(Debug, Deserialize)]
struct CompetitorData {
    uid: String,
    #[serde(rename = "homeAway")]
    home_away: String,
    #[serde(default)]
    score: String,
}

#[derive(Debug, Deserialize)]
struct OddsData {
    #[serde(default)]
    details: String,
}

#[derive(Debug, Deserialize)]
struct TeamsPayload {
    #[serde(default)]
    sports: Vec<SportData>,
}

#[derive(Debug, Deserialize)]
struct SportData {
    #[serde(default)]
    leagues: Vec<LeagueData>,
}

#[derive(Debug, Deserialize)]
struct LeagueData {
    #[serde(default)]
    teams: Vec<TeamEntry>,
}

#[derive(Debug, Deserialize)]
struct TeamEntry {
    team: TeamData,
}

#[derive(Debug, Deserialize)]
struct TeamData {
    uid: String,
    #[serde(default)]
    location: String,
    #[serde(rename = "shortDisplayName", default)]
    short_display_name: String,
    #[serde(default)]
    abbreviation: String,
    #[serde(rename = "displayName", default)]
    display_name: String,
    #[serde(default)]
    logos: Vec<LogoData>,
}

#[derive(Debug, Deserialize)]
struct LogoData {
    href: String,
}

#[derive(Debug, Deserialize)]
struct StandingsPayload {
    #[serde(default)]
    children: Vec<ConferenceData>,
}

#[derive(Debug, Deserialize)]
struct ConferenceData {
    standings: ConferenceStandings,
}

#[derive(Debug, Deserialize)]
struct ConferenceStandings {
    #[serde(default)]
    entries: Vec<StandingEntry>,
}

#[derive(Debug, Deserialize)]
struct StandingEntry {
    team: StandingTeam,
    #[serde(default)]
    stats: Vec<StandingStat>,
}

#[derive(Debug, Deserialize)]
struct StandingTeam {
    uid: String,
}

#[derive(Debug, Deserialize)]
struct StandingStat {
    #[serde(rename = "type", default)]
    stat_type: String,
    #[serde(default)]
    value: f64,
}

// ==================== client ====================

/// Snapshot client for one (week, season_type) view of the source
pub struct LeagueClient {
    http: Client,
    base_url: String,
    week: WeekInfo,
    max_retries: u32,
    retry_base_delay: Duration,
    games: OnceCell<Vec<SourceGame>>,
    teams: OnceCell<Vec<SourceTeam>>,
    standings: OnceCell<Vec<SourceStanding>>,
}

impl LeagueClient {
    pub fn new(config: &SourceConfig, week: WeekInfo) -> Result<Self> {
        // Callers may hand in season-relative week numbers; the source
        // restarts postseason numbering at 1.
        let week = if week.season_type == SeasonType::Regular
            && week.week_no > crate::domain::REGULAR_SEASON_WEEKS
        {
            WeekInfo::normalized(week.season, week.week_no)
        } else {
            week
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            week,
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            games: OnceCell::new(),
            teams: OnceCell::new(),
            standings: OnceCell::new(),
        })
    }

    pub fn week(&self) -> WeekInfo {
        self.week
    }

    /// All fixtures in this snapshot's week
    pub async fn games(&self) -> Result<&[SourceGame]> {
        let games = self
            .games
            .get_or_try_init(|| self.fetch_games())
            .await?;
        Ok(games)
    }

    /// All teams, with records joined in from the standings feed
    pub async fn teams(&self) -> Result<&[SourceTeam]> {
        let teams = self
            .teams
            .get_or_try_init(|| self.fetch_teams())
            .await?;
        Ok(teams)
    }

    /// All team records from the standings feed
    pub async fn standings(&self) -> Result<&[SourceStanding]> {
        let standings = self
            .standings
            .get_or_try_init(|| self.fetch_standings())
            .await?;
        Ok(standings)
    }

    /// Linear search for a fixture. Absence is a normal outcome (source
    /// maintenance windows), not an error.
    pub async fn find_game(&self, external_id: &str) -> Result<Option<&SourceGame>> {
        Ok(self
            .games()
            .await?
            .iter()
            .find(|game| game.external_id == external_id))
    }

    pub async fn find_team(&self, external_id: &str) -> Result<Option<&SourceTeam>> {
        Ok(self
            .teams()
            .await?
            .iter()
            .find(|team| team.external_id == external_id))
    }

    pub async fn find_team_by_short_name(&self, short_name: &str) -> Result<Option<&SourceTeam>> {
        Ok(self
            .teams()
            .await?
            .iter()
            .find(|team| team.short_name == short_name))
    }

    async fn fetch_games(&self) -> Result<Vec<SourceGame>> {
        let url = format!(
            "{}/scoreboard?seasontype={}&week={}",
            self.base_url,
            self.week.season_type.code(),
            self.week.week_no
        );
        let payload: ScoreboardPayload = self.get_json(&url).await?;
        payload
            .events
            .into_iter()
            .map(SourceGame::from_event)
            .collect()
    }

    async fn fetch_teams(&self) -> Result<Vec<SourceTeam>> {
        let standings = self.standings().await?;
        let url = format!("{}/teams", self.base_url);
        let payload: TeamsPayload = self.get_json(&url).await?;
        let entries = payload
            .sports
            .into_iter()
            .flat_map(|sport| sport.leagues)
            .flat_map(|league| league.teams);

        let mut teams = Vec::new();
        for entry in entries {
            let team = entry.team;
            let standing = standings
                .iter()
                .find(|standing| standing.team_external_id == team.uid);
            if standing.is_none() {
                debug!(team = %team.uid, "no standing for team; record defaults to zero");
            }
            teams.push(SourceTeam {
                external_id: team.uid,
                city: team.location,
                nickname: team.short_display_name,
                short_name: team.abbreviation.to_lowercase(),
                full_name: team.display_name,
                logo_url: team
                    .logos
                    .into_iter()
                    .next()
                    .map(|logo| logo.href)
                    .unwrap_or_default(),
                wins: standing.map(|s| s.wins).unwrap_or(0),
                losses: standing.map(|s| s.losses).unwrap_or(0),
                ties: standing.map(|s| s.ties).unwrap_or(0),
            });
        }
        Ok(teams)
    }

    async fn fetch_standings(&self) -> Result<Vec<SourceStanding>> {
        let url = format!(
            "{}/standings?seasontype={}",
            self.base_url,
            self.week.season_type.standings_code()
        );
        let payload: StandingsPayload = self.get_json(&url).await?;
        // Both conference tables, concatenated.
        Ok(payload
            .children
            .into_iter()
            .flat_map(|conference| conference.standings.entries)
            .map(SourceStanding::from_entry)
            .collect())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        with_retry(self.max_retries, self.retry_base_delay, || {
            get_json_once::<T>(&self.http, url)
        })
        .await
    }
}

impl SourceGame {
    fn from_event(event: EventData) -> Result<Self> {
        let status = GameStatus::from_source(&event.status.status_type.name);
        let kickoff_at = parse_kickoff(&event.date)?;
        let competition = event.competitions.into_iter().next().ok_or_else(|| {
            PickemError::InvalidSourceData(format!("fixture {} has no competition", event.uid))
        })?;

        let mut home = None;
        let mut road = None;
        for competitor in competition.competitors {
            let score = competitor.score.trim().parse::<i32>().unwrap_or(0);
            if competitor.home_away == "home" {
                home = Some((competitor.uid, score));
            } else {
                road = Some((competitor.uid, score));
            }
        }
        let (home_id, home_score) = home.ok_or_else(|| {
            PickemError::InvalidSourceData(format!("fixture {} has no home team", event.uid))
        })?;
        let (road_id, road_score) = road.ok_or_else(|| {
            PickemError::InvalidSourceData(format!("fixture {} has no road team", event.uid))
        })?;

        Ok(SourceGame {
            external_id: event.uid,
            kickoff_at,
            status,
            home_team_external_id: home_id,
            road_team_external_id: road_id,
            home_score,
            road_score,
            // First published line only; later books are ignored.
            odds: competition.odds.first().and_then(|o| parse_odds(&o.details)),
        })
    }
}

impl SourceStanding {
    fn from_entry(entry: StandingEntry) -> Self {
        let mut standing = SourceStanding {
            team_external_id: entry.team.uid,
            wins: 0,
            losses: 0,
            ties: 0,
        };
        for stat in entry.stats {
            match stat.stat_type.as_str() {
                "wins" => standing.wins = stat.value as i32,
                "losses" => standing.losses = stat.value as i32,
                "ties" => standing.ties = stat.value as i32,
                _ => {}
            }
        }
        standing
    }
}

/// Ask the scoreboard (no week parameters) which week the season is on.
pub async fn fetch_current_week(config: &SourceConfig) -> Result<WeekInfo> {
    let http = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;
    let url = format!("{}/scoreboard", config.base_url.trim_end_matches('/'));
    let payload: ScoreboardPayload = with_retry(
        config.max_retries,
        Duration::from_millis(config.retry_base_delay_ms),
        || get_json_once(&http, &url),
    )
    .await?;

    let season = payload.season.ok_or_else(|| {
        PickemError::InvalidSourceData("scoreboard payload has no season block".to_string())
    })?;
    let week = payload.week.ok_or_else(|| {
        PickemError::InvalidSourceData("scoreboard payload has no week block".to_string())
    })?;
    let season_type = SeasonType::from_code(season.season_type).ok_or_else(|| {
        PickemError::InvalidSourceData(format!("unknown season type {}", season.season_type))
    })?;
    Ok(WeekInfo::new(season.year, season_type, week.number))
}

async fn get_json_once<T: DeserializeOwned>(http: &Client, url: &str) -> Result<T> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if TRANSIENT_STATUSES.contains(&status.as_u16()) {
        return Err(PickemError::SourceUnavailable(format!(
            "transient {status} from {url}"
        )));
    }
    if !status.is_success() {
        return Err(PickemError::InvalidSourceData(format!(
            "unexpected status {status} from {url}"
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| PickemError::InvalidSourceData(format!("decoding {url}: {e}")))
}

/// Retry transient failures with exponential backoff; the bound is
/// `max_retries` beyond the first attempt, and exhaustion surfaces the
/// last error to the caller.
pub(crate) async fn with_retry<T, F, Fut>(
    max_retries: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = base_delay;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!(
                    "source request failed ({err}); retry {attempt}/{max_retries} in {delay:?}"
                );
                sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

fn parse_kickoff(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    // The scoreboard feed abbreviates to minute precision ("2025-09-21T17:00Z").
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(PickemError::InvalidSourceData(format!(
        "unparseable kickoff time: {raw}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_parse_odds_with_favorite() {
        let line = parse_odds("DAL -3.5").unwrap();
        assert_eq!(line.favorite_short_name.as_deref(), Some("dal"));
        assert_eq!(line.spread, -3.5);
    }

    #[test]
    fn test_parse_odds_even_is_half_point_no_favorite() {
        let line = parse_odds("EVEN").unwrap();
        assert_eq!(line.favorite_short_name, None);
        assert_eq!(line.spread, 0.5);
    }

    #[test]
    fn test_parse_odds_rejects_garbage() {
        assert_eq!(parse_odds(""), None);
        assert_eq!(parse_odds("DAL"), None);
        assert_eq!(parse_odds("DAL three"), None);
    }

    #[test]
    fn test_parse_kickoff_accepts_both_precisions() {
        let minute = parse_kickoff("2025-09-21T17:00Z").unwrap();
        assert_eq!(minute.to_rfc3339(), "2025-09-21T17:00:00+00:00");

        let full = parse_kickoff("2025-09-21T17:00:00+00:00").unwrap();
        assert_eq!(full, minute);

        assert!(parse_kickoff("next sunday").is_err());
    }

    #[test]
    fn test_source_game_from_event() {
        let event: EventData = serde_json::from_value(serde_json::json!({
            "uid": "s:20~l:28~e:401547000",
            "date": "2025-09-21T17:00Z",
            "status": { "type": { "name": "STATUS_FINAL" } },
            "competitions": [{
                "competitors": [
                    { "uid": "s:20~l:28~t:6", "homeAway": "home", "score": "24" },
                    { "uid": "s:20~l:28~t:8", "homeAway": "away", "score": "17" }
                ],
                "odds": [{ "details": "DAL -3.5" }]
            }]
        }))
        .unwrap();

        let game = SourceGame::from_event(event).unwrap();
        assert_eq!(game.external_id, "s:20~l:28~e:401547000");
        assert_eq!(game.status, GameStatus::Final);
        assert_eq!(game.home_team_external_id, "s:20~l:28~t:6");
        assert_eq!(game.road_team_external_id, "s:20~l:28~t:8");
        assert_eq!(game.home_score, 24);
        assert_eq!(game.road_score, 17);
        assert_eq!(
            game.odds.unwrap().favorite_short_name.as_deref(),
            Some("dal")
        );
    }

    #[test]
    fn test_standing_from_entry_reads_stat_lines() {
        let entry: StandingEntry = serde_json::from_value(serde_json::json!({
            "team": { "uid": "s:20~l:28~t:6" },
            "stats": [
                { "type": "wins", "value": 11.0 },
                { "type": "losses", "value": 5.0 },
                { "type": "ties", "value": 1.0 },
                { "type": "streak", "value": 3.0 }
            ]
        }))
        .unwrap();

        let standing = SourceStanding::from_entry(entry);
        assert_eq!(standing.wins, 11);
        assert_eq!(standing.losses, 5);
        assert_eq!(standing.ties, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_recovers_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(2, Duration::from_millis(100), || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(PickemError::SourceUnavailable("503".to_string()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_exhaustion_surfaces_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(2, Duration::from_millis(100), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(PickemError::SourceUnavailable("502".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_does_not_retry_permanent_errors() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(2, Duration::from_millis(100), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(PickemError::InvalidSourceData("bad payload".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
