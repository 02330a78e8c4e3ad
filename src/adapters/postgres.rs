use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument};

use crate::domain::{
    Award, AwardDefinition, AwardGrant, AwardSlug, Game, GameStatus, JobKind, Player,
    PlayerGamePick, SeasonType, Team, WeekInfo,
};
use crate::error::{PickemError, Result};
use crate::scheduler::{ScheduledJob, Trigger};

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PickemStore {
    pool: PgPool,
}

/// A granted award joined with what notification delivery needs
#[derive(Debug, Clone)]
pub struct PendingAwardNotice {
    pub player_award_id: i32,
    pub player_discord_id: i64,
    pub player_nick_name: String,
    pub award_name: String,
    pub season: i32,
    pub week_no: i32,
}

impl PickemStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ==================== Games ====================

    /// Insert a game or, when the fixture already exists, refresh its
    /// pre-kickoff attributes. Fixture identity never changes.
    #[instrument(skip(self, game))]
    pub async fn upsert_game(&self, game: &Game) -> Result<i32> {
        let row = sqlx::query(
            r#"
            INSERT INTO games
                (external_id, season, season_type, week_no, home_team_id, road_team_id,
                 favorite_team_id, home_score, road_score, status, kickoff_at, spread)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (external_id) DO UPDATE SET
                favorite_team_id = EXCLUDED.favorite_team_id,
                kickoff_at = EXCLUDED.kickoff_at,
                spread = EXCLUDED.spread
            RETURNING id
            "#,
        )
        .bind(&game.external_id)
        .bind(game.season)
        .bind(game.season_type.code())
        .bind(game.week_no)
        .bind(game.home_team_id)
        .bind(game.road_team_id)
        .bind(game.favorite_team_id)
        .bind(game.home_score)
        .bind(game.road_score)
        .bind(game.status.as_str())
        .bind(game.kickoff_at)
        .bind(game.spread)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    pub async fn get_game(&self, game_id: i32) -> Result<Option<Game>> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id, season, season_type, week_no, home_team_id, road_team_id,
                   favorite_team_id, home_score, road_score, status, kickoff_at, spread
            FROM games WHERE id = $1
            "#,
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(game_from_row).transpose()
    }

    pub async fn games_for_week(&self, week: WeekInfo) -> Result<Vec<Game>> {
        let rows = sqlx::query(
            r#"
            SELECT id, external_id, season, season_type, week_no, home_team_id, road_team_id,
                   favorite_team_id, home_score, road_score, status, kickoff_at, spread
            FROM games
            WHERE season = $1 AND season_type = $2 AND week_no = $3
            ORDER BY kickoff_at, id
            "#,
        )
        .bind(week.season)
        .bind(week.season_type.code())
        .bind(week.week_no)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(game_from_row).collect()
    }

    /// The synchronizer's only write: overwrite scores and status.
    #[instrument(skip(self))]
    pub async fn update_game_score(
        &self,
        game_id: i32,
        home_score: i32,
        road_score: i32,
        status: GameStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE games SET home_score = $2, road_score = $3, status = $4
            WHERE id = $1
            "#,
        )
        .bind(game_id)
        .bind(home_score)
        .bind(road_score)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn first_kickoff_of_week(&self, week: WeekInfo) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            r#"
            SELECT MIN(kickoff_at) AS first_kickoff
            FROM games
            WHERE season = $1 AND season_type = $2 AND week_no = $3
            "#,
        )
        .bind(week.season)
        .bind(week.season_type.code())
        .bind(week.week_no)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("first_kickoff"))
    }

    pub async fn most_recent_week(&self, season: i32, season_type: SeasonType) -> Result<Option<i32>> {
        let row = sqlx::query(
            r#"
            SELECT MAX(week_no) AS last_week
            FROM games WHERE season = $1 AND season_type = $2
            "#,
        )
        .bind(season)
        .bind(season_type.code())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("last_week"))
    }

    // ==================== Teams ====================

    pub async fn all_teams(&self) -> Result<Vec<Team>> {
        let rows = sqlx::query(
            r#"
            SELECT id, external_id, city, nickname, short_name, full_name, logo_url,
                   wins, losses, ties
            FROM teams ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(team_from_row).collect())
    }

    pub async fn get_team_by_external_id(&self, external_id: &str) -> Result<Option<Team>> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id, city, nickname, short_name, full_name, logo_url,
                   wins, losses, ties
            FROM teams WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(team_from_row))
    }

    /// Record refresh is the standings feed's write path, separate from
    /// score sync.
    pub async fn update_team_record(
        &self,
        team_id: i32,
        wins: i32,
        losses: i32,
        ties: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE teams SET wins = $2, losses = $3, ties = $4 WHERE id = $1
            "#,
        )
        .bind(team_id)
        .bind(wins)
        .bind(losses)
        .bind(ties)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Players ====================

    pub async fn active_players(&self) -> Result<Vec<Player>> {
        let rows = sqlx::query(
            r#"
            SELECT id, first_name, last_name, nick_name, email, discord_id, active
            FROM players WHERE active ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(player_from_row).collect())
    }

    // ==================== Picks ====================

    /// Guarded insert for a pick. A duplicate (player, game) pick or a
    /// second weekly lock loses to the store's uniqueness constraints and
    /// is absorbed as "already recorded".
    #[instrument(skip(self, pick))]
    pub async fn insert_pick(&self, pick: &PlayerGamePick) -> Result<bool> {
        let row = sqlx::query(
            r#"
            INSERT INTO player_game_picks
                (player_id, game_id, picked_team_id, season, week_no, is_lock, is_upset, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(pick.player_id)
        .bind(pick.game_id)
        .bind(pick.picked_team_id)
        .bind(pick.season)
        .bind(pick.week_no)
        .bind(pick.is_lock)
        .bind(pick.is_upset)
        .bind(pick.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if row.is_none() {
            debug!(
                player_id = pick.player_id,
                game_id = pick.game_id,
                "pick already recorded"
            );
        }
        Ok(row.is_some())
    }

    pub async fn picks_for_week(&self, week: WeekInfo) -> Result<Vec<PlayerGamePick>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.player_id, p.game_id, p.picked_team_id, p.season, p.week_no,
                   p.is_lock, p.is_upset, p.created_at
            FROM player_game_picks p
            JOIN games g ON g.id = p.game_id
            WHERE p.season = $1 AND g.season_type = $2 AND p.week_no = $3
            ORDER BY p.created_at, p.id
            "#,
        )
        .bind(week.season)
        .bind(week.season_type.code())
        .bind(week.week_no)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(pick_from_row).collect())
    }

    // ==================== Awards ====================

    /// Upsert the static award catalog; unique on slug, never duplicated.
    pub async fn upsert_award_catalog(&self, catalog: &[AwardDefinition]) -> Result<()> {
        for definition in catalog {
            sqlx::query(
                r#"
                INSERT INTO awards (slug, name, description, icon, point_value)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (slug) DO UPDATE SET
                    name = EXCLUDED.name,
                    description = EXCLUDED.description,
                    icon = EXCLUDED.icon,
                    point_value = EXCLUDED.point_value
                "#,
            )
            .bind(definition.slug.as_str())
            .bind(definition.name)
            .bind(definition.description)
            .bind(definition.icon)
            .bind(definition.point_value)
            .execute(&self.pool)
            .await?;
        }
        info!("Award catalog upserted ({} rows)", catalog.len());
        Ok(())
    }

    /// Write a week's grants through the guarded insert, all in one
    /// transaction. A grant whose natural key already exists is a no-op;
    /// the count of newly inserted rows is returned.
    #[instrument(skip(self, grants))]
    pub async fn grant_awards(&self, week: WeekInfo, grants: &[AwardGrant]) -> Result<u64> {
        if grants.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let catalog: Vec<Award> =
            sqlx::query("SELECT id, slug, name, description, icon, point_value FROM awards")
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .map(award_from_row)
                .collect::<Result<_>>()?;
        let award_id_for = |slug: AwardSlug| -> Result<i32> {
            catalog
                .iter()
                .find(|award| award.slug == slug)
                .and_then(|award| award.id)
                .ok_or_else(|| {
                    PickemError::Internal(format!("award catalog missing slug {slug}"))
                })
        };

        let mut inserted = 0u64;
        for grant in grants {
            let award_id = award_id_for(grant.slug)?;
            let row = sqlx::query(
                r#"
                INSERT INTO player_awards (player_id, award_id, season, week_no, game_id)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT DO NOTHING
                RETURNING id
                "#,
            )
            .bind(grant.player_id)
            .bind(award_id)
            .bind(week.season)
            .bind(week.week_no)
            .bind(grant.game_id)
            .fetch_optional(&mut *tx)
            .await?;

            if row.is_some() {
                inserted += 1;
                info!(
                    player_id = grant.player_id,
                    award = %grant.slug,
                    game_id = ?grant.game_id,
                    "award granted"
                );
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Granted awards whose notification has not gone out yet
    pub async fn awards_needing_notification(&self) -> Result<Vec<PendingAwardNotice>> {
        let rows = sqlx::query(
            r#"
            SELECT pa.id AS player_award_id, pl.discord_id, pl.nick_name,
                   a.name AS award_name, pa.season, pa.week_no
            FROM player_awards pa
            JOIN players pl ON pl.id = pa.player_id
            JOIN awards a ON a.id = pa.award_id
            WHERE pa.notified_at IS NULL
            ORDER BY pa.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PendingAwardNotice {
                player_award_id: row.get("player_award_id"),
                player_discord_id: row.get("discord_id"),
                player_nick_name: row.get("nick_name"),
                award_name: row.get("award_name"),
                season: row.get("season"),
                week_no: row.get("week_no"),
            })
            .collect())
    }

    /// Stamp a delivered notification; only unstamped rows qualify, so a
    /// row is stamped at most once.
    pub async fn mark_award_notified(
        &self,
        player_award_id: i32,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE player_awards SET notified_at = $2
            WHERE id = $1 AND notified_at IS NULL
            "#,
        )
        .bind(player_award_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Scheduled jobs ====================

    /// Insert or replace-in-place a job row. The deterministic id is the
    /// arbiter; re-planning replaces the trigger and never duplicates.
    #[instrument(skip(self, kind, trigger))]
    pub async fn upsert_job(
        &self,
        id: &str,
        kind: &JobKind,
        trigger: &Trigger,
        next_fire_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_jobs (id, kind, trigger_spec, next_fire_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                kind = EXCLUDED.kind,
                trigger_spec = EXCLUDED.trigger_spec,
                next_fire_at = EXCLUDED.next_fire_at
            "#,
        )
        .bind(id)
        .bind(serde_json::to_value(kind)?)
        .bind(serde_json::to_value(trigger)?)
        .bind(next_fire_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a job row; deleting an absent row reports false, which the
    /// scheduler treats as success.
    pub async fn delete_job(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheduled_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, trigger_spec, next_fire_at, last_fired_at
            FROM scheduled_jobs
            WHERE next_fire_at <= $1
            ORDER BY next_fire_at, id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(job_from_row).collect()
    }

    /// Advance a fired job to its next fire time
    pub async fn mark_job_fired(
        &self,
        id: &str,
        next_fire_at: DateTime<Utc>,
        fired_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_jobs SET next_fire_at = $2, last_fired_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next_fire_at)
        .bind(fired_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All registered job ids, for reconciliation reporting
    pub async fn job_ids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM scheduled_jobs ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }
}

// ==================== row mapping ====================

fn game_from_row(row: PgRow) -> Result<Game> {
    let season_type_code: i32 = row.get("season_type");
    let status_raw: String = row.get("status");
    Ok(Game {
        id: Some(row.get("id")),
        external_id: row.get("external_id"),
        season: row.get("season"),
        season_type: SeasonType::from_code(season_type_code).ok_or_else(|| {
            PickemError::Internal(format!("unknown season type code {season_type_code}"))
        })?,
        week_no: row.get("week_no"),
        home_team_id: row.get("home_team_id"),
        road_team_id: row.get("road_team_id"),
        favorite_team_id: row.get("favorite_team_id"),
        home_score: row.get("home_score"),
        road_score: row.get("road_score"),
        status: GameStatus::from_str(&status_raw)
            .ok_or_else(|| PickemError::Internal(format!("unknown game status {status_raw}")))?,
        kickoff_at: row.get("kickoff_at"),
        spread: row.get("spread"),
    })
}

fn team_from_row(row: PgRow) -> Team {
    Team {
        id: Some(row.get("id")),
        external_id: row.get("external_id"),
        city: row.get("city"),
        nickname: row.get("nickname"),
        short_name: row.get("short_name"),
        full_name: row.get("full_name"),
        logo_url: row.get("logo_url"),
        wins: row.get("wins"),
        losses: row.get("losses"),
        ties: row.get("ties"),
    }
}

fn player_from_row(row: PgRow) -> Player {
    Player {
        id: Some(row.get("id")),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        nick_name: row.get("nick_name"),
        email: row.get("email"),
        discord_id: row.get("discord_id"),
        active: row.get("active"),
    }
}

fn award_from_row(row: PgRow) -> Result<Award> {
    let slug_raw: String = row.get("slug");
    Ok(Award {
        id: Some(row.get("id")),
        slug: AwardSlug::from_str(&slug_raw)
            .ok_or_else(|| PickemError::Internal(format!("unknown award slug {slug_raw}")))?,
        name: row.get("name"),
        description: row.get("description"),
        icon: row.get("icon"),
        point_value: row.get("point_value"),
    })
}

fn pick_from_row(row: PgRow) -> PlayerGamePick {
    PlayerGamePick {
        id: Some(row.get("id")),
        player_id: row.get("player_id"),
        game_id: row.get("game_id"),
        picked_team_id: row.get("picked_team_id"),
        season: row.get("season"),
        week_no: row.get("week_no"),
        is_lock: row.get("is_lock"),
        is_upset: row.get("is_upset"),
        created_at: row.get("created_at"),
    }
}

fn job_from_row(row: PgRow) -> Result<ScheduledJob> {
    Ok(ScheduledJob {
        id: row.get("id"),
        kind: serde_json::from_value(row.get("kind"))?,
        trigger: serde_json::from_value(row.get("trigger_spec"))?,
        next_fire_at: row.get("next_fire_at"),
        last_fired_at: row.get("last_fired_at"),
    })
}
