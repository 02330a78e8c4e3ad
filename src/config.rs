use chrono::Weekday;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the league data source
    pub base_url: String,
    /// Per-attempt request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retries after the first attempt on transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in milliseconds, doubled each attempt
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between due-job sweeps
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Bounded worker pool size for fired jobs
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Minutes between score polls inside a fixture's window
    #[serde(default = "default_poll_interval_mins")]
    pub poll_interval_mins: i64,
    /// Hours a fixture's polling window stays open after it starts
    #[serde(default = "default_poll_window_hours")]
    pub poll_window_hours: i64,
    /// Upper bound of the random per-fire jitter in seconds
    #[serde(default = "default_poll_jitter_secs")]
    pub poll_jitter_secs: i64,
    /// Delay before the first poll of a late-discovered fixture
    #[serde(default = "default_late_start_delay_secs")]
    pub late_start_delay_secs: i64,
    /// Minutes before the week's earliest kickoff to remind late players
    #[serde(default = "default_reminder_offsets_mins")]
    pub reminder_offsets_mins: Vec<i64>,
    /// Weekday for the create-week / weekly-planner singletons
    #[serde(default = "default_plan_weekday")]
    pub plan_weekday: String,
    /// Weekday for the team-record refresh singleton
    #[serde(default = "default_records_weekday")]
    pub records_weekday: String,
    /// Local hour the weekly singletons fire at
    #[serde(default = "default_plan_hour")]
    pub plan_hour: u32,
    /// Local minute the weekly singletons fire at
    #[serde(default)]
    pub plan_minute: u32,
    /// Civil timezone for the weekly singleton triggers
    #[serde(default = "default_plan_timezone")]
    pub plan_timezone: String,
}

fn default_tick_secs() -> u64 {
    5
}

fn default_workers() -> usize {
    16
}

fn default_poll_interval_mins() -> i64 {
    5
}

fn default_poll_window_hours() -> i64 {
    8
}

fn default_poll_jitter_secs() -> i64 {
    60
}

fn default_late_start_delay_secs() -> i64 {
    5
}

fn default_reminder_offsets_mins() -> Vec<i64> {
    vec![60, 20, 7]
}

fn default_plan_weekday() -> String {
    "wed".to_string()
}

fn default_records_weekday() -> String {
    "tue".to_string()
}

fn default_plan_hour() -> u32 {
    6
}

fn default_plan_timezone() -> String {
    "America/Los_Angeles".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            workers: default_workers(),
            poll_interval_mins: default_poll_interval_mins(),
            poll_window_hours: default_poll_window_hours(),
            poll_jitter_secs: default_poll_jitter_secs(),
            late_start_delay_secs: default_late_start_delay_secs(),
            reminder_offsets_mins: default_reminder_offsets_mins(),
            plan_weekday: default_plan_weekday(),
            records_weekday: default_records_weekday(),
            plan_hour: default_plan_hour(),
            plan_minute: 0,
            plan_timezone: default_plan_timezone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifyConfig {
    /// Discord webhook for pick reminders (disabled when unset)
    #[serde(default)]
    pub reminder_webhook_url: Option<String>,
    /// Discord webhook for award announcements (disabled when unset)
    #[serde(default)]
    pub award_webhook_url: Option<String>,
    /// Link included in reminder messages
    #[serde(default)]
    pub picks_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily-rolled log files (stdout when unset)
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("database.url", "postgres://localhost/pickem")?
            .set_default(
                "source.base_url",
                "https://site.api.espn.com/apis/site/v2/sports/football/nfl",
            )?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("PICKEM_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (PICKEM_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("PICKEM")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.scheduler.workers == 0 {
            errors.push("scheduler.workers must be positive".to_string());
        }

        if self.scheduler.poll_interval_mins <= 0 {
            errors.push("scheduler.poll_interval_mins must be positive".to_string());
        }

        if self.scheduler.poll_window_hours <= 0 {
            errors.push("scheduler.poll_window_hours must be positive".to_string());
        }

        if self.scheduler.poll_jitter_secs < 0 {
            errors.push("scheduler.poll_jitter_secs must not be negative".to_string());
        }

        if self.scheduler.reminder_offsets_mins.is_empty() {
            errors.push("scheduler.reminder_offsets_mins must not be empty".to_string());
        }

        if self
            .scheduler
            .reminder_offsets_mins
            .iter()
            .any(|offset| *offset <= 0)
        {
            errors.push("scheduler.reminder_offsets_mins entries must be positive".to_string());
        }

        if self.scheduler.plan_weekday.parse::<Weekday>().is_err() {
            errors.push(format!(
                "scheduler.plan_weekday is not a weekday: {}",
                self.scheduler.plan_weekday
            ));
        }

        if self.scheduler.records_weekday.parse::<Weekday>().is_err() {
            errors.push(format!(
                "scheduler.records_weekday is not a weekday: {}",
                self.scheduler.records_weekday
            ));
        }

        if self.scheduler.plan_hour > 23 {
            errors.push("scheduler.plan_hour must be 0-23".to_string());
        }

        if self.scheduler.plan_minute > 59 {
            errors.push("scheduler.plan_minute must be 0-59".to_string());
        }

        if self
            .scheduler
            .plan_timezone
            .parse::<chrono_tz::Tz>()
            .is_err()
        {
            errors.push(format!(
                "scheduler.plan_timezone is not a known timezone: {}",
                self.scheduler.plan_timezone
            ));
        }

        if self.source.base_url.is_empty() {
            errors.push("source.base_url must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_scheduler(scheduler: SchedulerConfig) -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                url: "postgres://localhost/pickem".to_string(),
                max_connections: 5,
            },
            source: SourceConfig {
                base_url: "https://example.test/league".to_string(),
                request_timeout_secs: 10,
                max_retries: 2,
                retry_base_delay_ms: 1000,
            },
            scheduler,
            notify: NotifyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_default_scheduler_validates() {
        let config = config_with_scheduler(SchedulerConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_weekday_and_timezone_rejected() {
        let scheduler = SchedulerConfig {
            plan_weekday: "wednesday-ish".to_string(),
            plan_timezone: "America/Nowhere".to_string(),
            ..SchedulerConfig::default()
        };
        let errors = config_with_scheduler(scheduler).validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let scheduler = SchedulerConfig {
            workers: 0,
            ..SchedulerConfig::default()
        };
        let errors = config_with_scheduler(scheduler).validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("workers")));
    }
}
