//! Process configuration from the environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use channel::{ChannelConfig, ChannelError};
use motion_core::{DispatchError, DispatcherConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}={value:?} is not valid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub dispatcher: DispatcherConfig,
    pub channel: ChannelConfig,
    /// JSON file mapping media queries to paths.
    pub media_manifest: Option<PathBuf>,
}

impl AppConfig {
    /// Read `MOTION_*` variables, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from any variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut dispatcher = DispatcherConfig::default();

        if let Some(workers) = parse::<usize>(&var, "MOTION_WORKERS")? {
            dispatcher = dispatcher.with_workers(workers);
        }
        if let Some(secs) = parse::<u64>(&var, "MOTION_GENERATION_TIMEOUT_SECS")? {
            dispatcher = dispatcher.with_generation_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = parse::<u64>(&var, "MOTION_POLL_INTERVAL_MS")? {
            dispatcher = dispatcher.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = parse::<u64>(&var, "MOTION_DISPATCH_BACKOFF_MS")? {
            dispatcher = dispatcher.with_dispatch_backoff(Duration::from_millis(ms));
        }
        if let Some(secs) = parse::<u64>(&var, "MOTION_STATUS_INTERVAL_SECS")? {
            dispatcher = dispatcher.with_status_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = parse::<u64>(&var, "MOTION_JOB_ESTIMATE_SECS")? {
            dispatcher = dispatcher.with_per_job_estimate(Duration::from_secs(secs));
        }

        // Output lands next to the media database unless set explicitly.
        if let Some(dir) = var("MOTION_OUTPUT_DIR") {
            dispatcher = dispatcher.with_output_dir(dir);
        } else if let Some(database_dir) = var("DATABASE_DIR") {
            let dir = Path::new(&database_dir).join("generated_videos");
            dispatcher = dispatcher.with_output_dir(dir.to_string_lossy());
        }

        dispatcher.validate()?;

        let kind = var("MOTION_CHANNEL").unwrap_or_else(|| "memory".to_string());
        let channel = ChannelConfig::from_kind(
            &kind,
            var("MOTION_REDIS_URL"),
            var("MOTION_SURREAL_ENDPOINT"),
        )?
        .map_surreal(|mut surreal| {
            if let Some(namespace) = var("MOTION_SURREAL_NAMESPACE") {
                surreal = surreal.with_namespace(namespace);
            }
            if let Some(database) = var("MOTION_SURREAL_DATABASE") {
                surreal = surreal.with_database(database);
            }
            if let (Some(user), Some(password)) =
                (var("MOTION_SURREAL_USER"), var("MOTION_SURREAL_PASSWORD"))
            {
                surreal = surreal.with_credentials(user, password);
            }
            surreal
        });

        Ok(Self {
            dispatcher,
            channel,
            media_manifest: var("MOTION_MEDIA_MANIFEST").map(PathBuf::from),
        })
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = var(name) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        })
}
