use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::game::Game;

/// A registered player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Option<i32>,
    pub first_name: String,
    pub last_name: String,
    pub nick_name: String,
    pub email: String,
    pub discord_id: i64,
    pub active: bool,
}

impl Player {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// How a pick resolved against its game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickResult {
    Win,
    Loss,
    /// Game not final yet, or a tied final
    Undecided,
}

/// A single pick a player makes for a specific game.
///
/// The store enforces one pick per (player, game) and at most one lock
/// per (player, season, week). `season` and `week_no` are denormalized
/// from the game to keep those constraints and the common queries flat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerGamePick {
    pub id: Option<i32>,
    pub player_id: i32,
    pub game_id: i32,
    pub picked_team_id: i32,
    pub season: i32,
    pub week_no: i32,
    pub is_lock: bool,
    pub is_upset: bool,
    pub created_at: DateTime<Utc>,
}

impl PlayerGamePick {
    pub fn result(&self, game: &Game) -> PickResult {
        match game.winning_team_id() {
            Some(winner) if winner == self.picked_team_id => PickResult::Win,
            Some(_) => PickResult::Loss,
            None => PickResult::Undecided,
        }
    }

    /// Bonus scoring: a winning lock and a winning upset each add a
    /// point, a losing lock costs one.
    pub fn bonus_points(&self, game: &Game) -> i32 {
        let mut bonus = 0;
        match self.result(game) {
            PickResult::Win => {
                if self.is_lock {
                    bonus += 1;
                }
                if self.is_upset {
                    bonus += 1;
                }
            }
            PickResult::Loss => {
                if self.is_lock {
                    bonus -= 1;
                }
            }
            PickResult::Undecided => {}
        }
        bonus
    }
}
