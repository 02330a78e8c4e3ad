pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod scheduler;
pub mod services;

pub use adapters::{DiscordWebhook, LeagueClient, Notifier, PickemStore};
pub use config::AppConfig;
pub use domain::{
    Award, AwardGrant, AwardSlug, Game, GameStatus, JobKind, Player, PlayerAward, PlayerGamePick,
    SeasonType, Team, WeekInfo,
};
pub use error::{PickemError, Result};
pub use scheduler::{execute_job, JobContext, JobScheduler, ScheduledJob, Trigger};
pub use services::{
    AwardNotifier, AwardsEngine, ReminderService, ScoreSynchronizer, SyncOutcome, WeekPlanner,
    WeekSlate,
};
