//! Awards engine
//!
//! Evaluates one (season, season_type, week) at a time and is fully
//! idempotent: every rule writes through the store's guarded insert, so
//! re-running an already-evaluated week produces zero new rows. The
//! rules themselves are pure functions over a loaded week slate.

use tracing::info;

use crate::adapters::PickemStore;
use crate::domain::{
    AwardGrant, AwardSlug, Game, PickResult, Player, PlayerGamePick, SeasonType, WeekInfo,
    AWARD_CATALOG,
};
use crate::error::{PickemError, Result};

/// Everything needed to evaluate one week's awards, loaded in one shot
#[derive(Debug, Clone)]
pub struct WeekSlate {
    pub week: WeekInfo,
    pub games: Vec<Game>,
    pub picks: Vec<PlayerGamePick>,
    /// Active players only; inactive players never receive awards
    pub players: Vec<Player>,
}

impl WeekSlate {
    pub fn all_final(&self) -> bool {
        self.games.iter().all(Game::is_final)
    }

    fn game(&self, game_id: i32) -> Option<&Game> {
        self.games.iter().find(|game| game.id == Some(game_id))
    }

    fn is_active(&self, player_id: i32) -> bool {
        self.players.iter().any(|player| player.id == Some(player_id))
    }

    fn pick_result(&self, pick: &PlayerGamePick) -> PickResult {
        match self.game(pick.game_id) {
            Some(game) => pick.result(game),
            None => PickResult::Undecided,
        }
    }

    fn player_picks(&self, player_id: i32) -> impl Iterator<Item = &PlayerGamePick> {
        self.picks
            .iter()
            .filter(move |pick| pick.player_id == player_id)
    }

    pub fn wins(&self, player_id: i32) -> i32 {
        self.player_picks(player_id)
            .filter(|pick| self.pick_result(pick) == PickResult::Win)
            .count() as i32
    }

    pub fn losses(&self, player_id: i32) -> i32 {
        self.player_picks(player_id)
            .filter(|pick| self.pick_result(pick) == PickResult::Loss)
            .count() as i32
    }

    pub fn bonus(&self, player_id: i32) -> i32 {
        self.player_picks(player_id)
            .filter_map(|pick| self.game(pick.game_id).map(|game| pick.bonus_points(game)))
            .sum()
    }

    /// Weekly total: wins plus bonus
    pub fn total_points(&self, player_id: i32) -> i32 {
        self.wins(player_id) + self.bonus(player_id)
    }
}

fn ensure_enough_players(slate: &WeekSlate) -> Result<()> {
    if slate.players.len() < 2 {
        return Err(PickemError::DomainInvariant(format!(
            "fewer than two active players for {}",
            slate.week
        )));
    }
    Ok(())
}

/// Quick Pick: the earliest pick timestamp of the week wins. Identical
/// timestamps tie-break to the lowest player id.
pub fn quick_pick_winner(slate: &WeekSlate) -> Option<AwardGrant> {
    slate
        .picks
        .iter()
        .filter(|pick| slate.is_active(pick.player_id))
        .min_by_key(|pick| (pick.created_at, pick.player_id))
        .map(|pick| AwardGrant {
            player_id: pick.player_id,
            slug: AwardSlug::QuickPick,
            game_id: None,
        })
}

/// Perfect Week: zero losses and at least one win. Zero, one, or many
/// winners.
pub fn perfect_week_winners(slate: &WeekSlate) -> Result<Vec<AwardGrant>> {
    ensure_enough_players(slate)?;
    Ok(slate
        .players
        .iter()
        .filter_map(|player| {
            let player_id = player.id?;
            (slate.losses(player_id) == 0 && slate.wins(player_id) >= 1).then_some(AwardGrant {
                player_id,
                slug: AwardSlug::PerfectWeek,
                game_id: None,
            })
        })
        .collect())
}

/// In Your Face: for each completed fixture with exactly one correct
/// active picker, one award scoped to that fixture.
pub fn in_your_face_winners(slate: &WeekSlate) -> Vec<AwardGrant> {
    let mut grants = Vec::new();
    for game in &slate.games {
        let Some(game_id) = game.id else { continue };
        let Some(winner) = game.winning_team_id() else {
            continue;
        };
        let correct: Vec<i32> = slate
            .picks
            .iter()
            .filter(|pick| {
                pick.game_id == game_id
                    && slate.is_active(pick.player_id)
                    && pick.picked_team_id == winner
            })
            .map(|pick| pick.player_id)
            .collect();
        if let [sole_picker] = correct[..] {
            grants.push(AwardGrant {
                player_id: sole_picker,
                slug: AwardSlug::InYourFace,
                game_id: Some(game_id),
            });
        }
    }
    grants
}

/// Won The Week: the strictly highest weekly total. A tie at the top
/// grants nothing.
pub fn won_the_week_winner(slate: &WeekSlate) -> Result<Option<AwardGrant>> {
    ensure_enough_players(slate)?;
    let mut totals: Vec<(i32, i32)> = slate
        .players
        .iter()
        .filter_map(|player| player.id)
        .map(|player_id| (slate.total_points(player_id), player_id))
        .collect();
    totals.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    match totals[..] {
        [(top, player_id), (runner_up, _), ..] if top > runner_up => Ok(Some(AwardGrant {
            player_id,
            slug: AwardSlug::WonTheWeek,
            game_id: None,
        })),
        _ => Ok(None),
    }
}

/// All four rules over one slate
pub fn evaluate_week(slate: &WeekSlate) -> Result<Vec<AwardGrant>> {
    let mut grants = Vec::new();
    grants.extend(quick_pick_winner(slate));
    grants.extend(perfect_week_winners(slate)?);
    grants.extend(in_your_face_winners(slate));
    grants.extend(won_the_week_winner(slate)?);
    Ok(grants)
}

#[derive(Clone)]
pub struct AwardsEngine {
    store: PickemStore,
}

impl AwardsEngine {
    pub fn new(store: PickemStore) -> Self {
        Self { store }
    }

    /// Upsert the static award catalog; runs once at startup.
    pub async fn init_catalog(&self) -> Result<()> {
        self.store.upsert_award_catalog(&AWARD_CATALOG).await
    }

    pub async fn load_slate(&self, week: WeekInfo) -> Result<WeekSlate> {
        Ok(WeekSlate {
            week,
            games: self.store.games_for_week(week).await?,
            picks: self.store.picks_for_week(week).await?,
            players: self.store.active_players().await?,
        })
    }

    /// Evaluate one week and write any new grants. Safe to re-run at any
    /// time.
    pub async fn run_awards_pass(&self, week: WeekInfo) -> Result<u64> {
        let slate = self.load_slate(week).await?;
        let grants = evaluate_week(&slate)?;
        let granted = self.store.grant_awards(week, &grants).await?;
        if granted > 0 {
            info!(%week, granted, "awards pass granted new awards");
        }
        Ok(granted)
    }

    /// Multi-week pass from week 1: a week is only evaluated once every
    /// fixture in it is terminal, and the first incomplete week halts the
    /// pass for all later weeks.
    pub async fn run_awards_catchup(&self, season: i32, season_type: SeasonType) -> Result<u64> {
        let Some(last_week) = self.store.most_recent_week(season, season_type).await? else {
            return Ok(0);
        };
        let mut granted = 0;
        for week_no in 1..=last_week {
            let week = WeekInfo::new(season, season_type, week_no);
            let slate = self.load_slate(week).await?;
            if !slate.all_final() {
                info!(%week, "week not fully final; halting catchup");
                break;
            }
            granted += self.store.grant_awards(week, &evaluate_week(&slate)?).await?;
        }
        Ok(granted)
    }
}
