//! Persistent, time-triggered job runner
//!
//! Jobs live in the store under deterministic string ids derived only
//! from logical parameters. `schedule_or_reschedule` is the single
//! idempotency primitive: re-planning replaces a trigger in place and
//! never duplicates a job. Fired jobs run on a bounded worker pool; one
//! job's failure never stops another from firing.

pub mod trigger;

pub use trigger::Trigger;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{debug, error, info};

use crate::adapters::PickemStore;
use crate::config::SchedulerConfig;
use crate::domain::JobKind;
use crate::error::{PickemError, Result};
use crate::services::{AwardNotifier, AwardsEngine, ReminderService, ScoreSynchronizer, SyncOutcome, WeekPlanner};

/// One persisted job row
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub id: String,
    pub kind: JobKind,
    pub trigger: Trigger,
    pub next_fire_at: DateTime<Utc>,
    pub last_fired_at: Option<DateTime<Utc>>,
}

/// Everything a fired job can reach
pub struct JobContext {
    pub scheduler: JobScheduler,
    pub score_sync: ScoreSynchronizer,
    pub planner: WeekPlanner,
    pub awards: AwardsEngine,
    pub reminders: ReminderService,
    pub award_notifier: AwardNotifier,
}

/// Persistent job scheduler
#[derive(Clone)]
pub struct JobScheduler {
    store: PickemStore,
    config: SchedulerConfig,
}

impl JobScheduler {
    pub fn new(store: PickemStore, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    /// The single idempotency primitive: if a job with this kind's id
    /// already exists its trigger is replaced in place, otherwise a new
    /// row is registered. A trigger with no future fire retires any
    /// stale row instead.
    pub async fn schedule_or_reschedule(&self, kind: JobKind, trigger: Trigger) -> Result<()> {
        let id = kind.job_id();
        let next = trigger.next_fire_after(Utc::now(), &mut rand::thread_rng());
        let result = match next {
            Some(next_fire_at) => {
                debug!(job_id = %id, %next_fire_at, "scheduling job");
                self.store.upsert_job(&id, &kind, &trigger, next_fire_at).await
            }
            None => {
                debug!(job_id = %id, "trigger already exhausted; retiring job");
                self.store.delete_job(&id).await.map(|_| ())
            }
        };
        result.map_err(|e| PickemError::Scheduling(format!("persisting job {id}: {e}")))
    }

    /// Remove a job by id; removing an already-absent job is success.
    pub async fn remove_job(&self, id: &str) -> Result<()> {
        let removed = self
            .store
            .delete_job(id)
            .await
            .map_err(|e| PickemError::Scheduling(format!("removing job {id}: {e}")))?;
        if removed {
            info!(job_id = %id, "removed job");
        } else {
            debug!(job_id = %id, "job already absent");
        }
        Ok(())
    }

    /// Run the scheduler loop: sweep for due jobs each tick and execute
    /// them on the bounded worker pool. Runs until the task is dropped.
    pub async fn run(&self, ctx: Arc<JobContext>) {
        info!(
            workers = self.config.workers,
            tick_secs = self.config.tick_secs,
            "job scheduler started"
        );
        let workers = Arc::new(Semaphore::new(self.config.workers));
        let mut tick = interval(TokioDuration::from_secs(self.config.tick_secs.max(1)));
        loop {
            tick.tick().await;
            if let Err(e) = self.dispatch_due(&ctx, &workers).await {
                // A store failure this sweep leaves every job row intact;
                // the next tick retries the sweep.
                error!("scheduler sweep failed: {e}");
            }
        }
    }

    async fn dispatch_due(&self, ctx: &Arc<JobContext>, workers: &Arc<Semaphore>) -> Result<()> {
        let now = Utc::now();
        let due = self.store.due_jobs(now).await?;
        for job in due {
            // Advance or retire the row before running so a slow worker
            // can not make the same firing due again next tick.
            match job.trigger.next_fire_after(now, &mut rand::thread_rng()) {
                Some(next) => self.store.mark_job_fired(&job.id, next, now).await?,
                None => {
                    self.store.delete_job(&job.id).await?;
                    debug!(job_id = %job.id, "trigger exhausted; job retired");
                }
            }

            let Ok(permit) = workers.clone().acquire_owned().await else {
                break;
            };
            let ctx = ctx.clone();
            let job_id = job.id.clone();
            let kind = job.kind.clone();
            tokio::spawn(async move {
                let _permit = permit;
                debug!(job_id = %job_id, "job firing");
                if let Err(e) = execute_job(&ctx, &kind).await {
                    error!(job_id = %job_id, "job failed: {e}");
                }
            });
        }
        Ok(())
    }
}

/// Run one fired job. Exhaustive over the closed set of job kinds; the
/// next natural recurrence is the retry for anything that fails here.
pub async fn execute_job(ctx: &JobContext, kind: &JobKind) -> Result<()> {
    match kind {
        JobKind::PollGame { game_id, week } => {
            match ctx.score_sync.sync_game(*game_id).await? {
                SyncOutcome::Updated { became_final: true } => {
                    // Terminal transition: retire the poll and settle the week.
                    ctx.scheduler.remove_job(&kind.job_id()).await?;
                    ctx.awards.run_awards_pass(*week).await?;
                    ctx.award_notifier.deliver_pending().await?;
                }
                SyncOutcome::AlreadyFinal => {
                    // A sweep finalized the game out from under this poll.
                    ctx.scheduler.remove_job(&kind.job_id()).await?;
                }
                SyncOutcome::Updated { became_final: false } | SyncOutcome::Skipped => {}
            }
            Ok(())
        }
        JobKind::KickoffReminder { week, .. } => ctx.reminders.send_kickoff_reminder(*week).await,
        JobKind::CreateWeek => {
            let week = ctx.planner.create_current_week().await?;
            ctx.planner.schedule_week(week).await
        }
        JobKind::RefreshTeamRecords => ctx.planner.refresh_team_records().await,
        JobKind::WeeklyPlanner => ctx.planner.plan_current_week().await.map(|_| ()),
    }
}
