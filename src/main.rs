use clap::{Parser, Subcommand};
use pickem::adapters::{fetch_current_week, DiscordWebhook, Notifier, PickemStore};
use pickem::config::AppConfig;
use pickem::error::{PickemError, Result};
use pickem::scheduler::{JobContext, JobScheduler};
use pickem::services::{
    AwardNotifier, AwardsEngine, ReminderService, ScoreSynchronizer, WeekPlanner,
};
use pickem::domain::WeekInfo;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pickem", about = "Seasonal pick'em competition engine")]
struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the job scheduler daemon
    Run,
    /// Show the source's current week
    Week,
    /// Create the current week's games from the source
    CreateWeek,
    /// Reconcile the current week's job set
    PlanWeek,
    /// Reconcile one game against the source
    UpdateGame { game_id: i32 },
    /// Reconcile every game of the current week
    UpdateScores,
    /// Run the awards pass for one week of the current season
    Awards {
        #[arg(long)]
        week: Option<i32>,
    },
    /// Run the awards pass over every completed week from week 1
    AwardsCatchup,
    /// Refresh team records from the standings feed
    RefreshTeams,
    /// Deliver pending award notifications
    NotifyAwards,
    /// Upsert the award catalog
    InitAwards,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config_dir)?;
    init_logging(&config);
    if let Err(errors) = config.validate() {
        for error in &errors {
            warn!("config: {error}");
        }
        return Err(PickemError::Internal(format!(
            "invalid configuration ({} problems)",
            errors.len()
        )));
    }

    let store = PickemStore::new(&config.database.url, config.database.max_connections).await?;
    let ctx = build_context(store, &config);

    match cli.command {
        Commands::Run => run_daemon(&ctx).await?,
        Commands::Week => {
            let week = fetch_current_week(&config.source).await?;
            info!(%week, "current week");
        }
        Commands::CreateWeek => {
            let week = ctx.planner.create_current_week().await?;
            ctx.planner.schedule_week(week).await?;
        }
        Commands::PlanWeek => {
            ctx.planner.plan_current_week().await?;
        }
        Commands::UpdateGame { game_id } => {
            let outcome = ctx.score_sync.sync_game(game_id).await?;
            info!(game_id, ?outcome, "game update finished");
        }
        Commands::UpdateScores => {
            let week = fetch_current_week(&config.source).await?;
            let updated = ctx.score_sync.sync_week(week).await?;
            info!(%week, updated, "score sweep finished");
        }
        Commands::Awards { week } => {
            let current = fetch_current_week(&config.source).await?;
            let week = WeekInfo::new(
                current.season,
                current.season_type,
                week.unwrap_or(current.week_no),
            );
            let granted = ctx.awards.run_awards_pass(week).await?;
            info!(%week, granted, "awards pass finished");
        }
        Commands::AwardsCatchup => {
            let current = fetch_current_week(&config.source).await?;
            let granted = ctx
                .awards
                .run_awards_catchup(current.season, current.season_type)
                .await?;
            info!(granted, "awards catchup finished");
        }
        Commands::RefreshTeams => ctx.planner.refresh_team_records().await?,
        Commands::NotifyAwards => {
            let delivered = ctx.award_notifier.deliver_pending().await?;
            info!(delivered, "notification pass finished");
        }
        Commands::InitAwards => ctx.awards.init_catalog().await?,
    }

    Ok(())
}

fn build_context(store: PickemStore, config: &AppConfig) -> Arc<JobContext> {
    let scheduler = JobScheduler::new(store.clone(), config.scheduler.clone());
    let reminder_webhook: Option<Arc<dyn Notifier>> = config
        .notify
        .reminder_webhook_url
        .as_ref()
        .map(|url| DiscordWebhook::new(url.clone()) as Arc<dyn Notifier>);
    let award_webhook: Option<Arc<dyn Notifier>> = config
        .notify
        .award_webhook_url
        .as_ref()
        .map(|url| DiscordWebhook::new(url.clone()) as Arc<dyn Notifier>);

    Arc::new(JobContext {
        scheduler: scheduler.clone(),
        score_sync: ScoreSynchronizer::new(store.clone(), config.source.clone()),
        planner: WeekPlanner::new(
            store.clone(),
            scheduler,
            config.source.clone(),
            config.scheduler.clone(),
        ),
        awards: AwardsEngine::new(store.clone()),
        reminders: ReminderService::new(
            store.clone(),
            reminder_webhook,
            config.notify.picks_url.clone(),
        ),
        award_notifier: AwardNotifier::new(store, award_webhook),
    })
}

async fn run_daemon(ctx: &Arc<JobContext>) -> Result<()> {
    // Catalog first, then a planning pass so a fresh deployment has its
    // week's jobs before the first tick.
    ctx.awards.init_catalog().await?;
    if let Err(e) = ctx.planner.plan_current_week().await {
        warn!("initial planning pass failed: {e}");
    }

    tokio::select! {
        _ = ctx.scheduler.run(ctx.clone()) => {}
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    if let Some(dir) = &config.logging.dir {
        let appender = tracing_appender::rolling::daily(dir, "pickem.log");
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(appender)
            .with_ansi(false)
            .init();
    } else if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
