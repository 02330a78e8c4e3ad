pub mod discord;
pub mod league;
pub mod postgres;

pub use discord::{DiscordWebhook, Notifier};
pub use league::{
    fetch_current_week, parse_odds, LeagueClient, OddsLine, SourceGame, SourceStanding, SourceTeam,
};
pub use postgres::{PendingAwardNotice, PickemStore};
