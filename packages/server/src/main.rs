//! Motion generation dispatcher.
//!
//! Reads `<origin> <text>` lines from stdin, admits them to the dispatcher
//! and prints notices to stdout. Stops on EOF or Ctrl-C.

mod config;
mod lookup;
mod transport;

use std::error::Error;
use std::sync::Arc;

use actors::{DispatcherDeps, DispatcherHandle, MediaPlanner, start_dispatcher};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::AppConfig;
use crate::lookup::{JsonExtractor, ManifestLookup};
use crate::transport::{Command, HELP, StdoutNotifier, WELCOME};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,server=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!(
        workers = config.dispatcher.workers,
        output_dir = %config.dispatcher.output_dir,
        "Starting motion dispatcher"
    );

    let channel = channel::connect(config.channel.clone()).await?;

    let lookup = match &config.media_manifest {
        Some(path) => ManifestLookup::load(path).await?,
        None => {
            tracing::warn!("MOTION_MEDIA_MANIFEST not set; every reference lookup will miss");
            ManifestLookup::empty()
        }
    };
    tracing::info!(entries = lookup.len(), "Media manifest loaded");

    let planner = Arc::new(MediaPlanner::new(Arc::new(JsonExtractor), Arc::new(lookup)));
    let notifier = Arc::new(StdoutNotifier::new());

    let (dispatcher, join) = start_dispatcher(
        config.dispatcher,
        DispatcherDeps {
            channel,
            planner,
            notifier: notifier.clone(),
        },
    )
    .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => handle_line(&dispatcher, &notifier, &line),
                None => {
                    tracing::info!("Input closed, shutting down");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    dispatcher.shutdown()?;
    join.await?;
    tracing::info!("Dispatcher stopped");
    Ok(())
}

fn handle_line(dispatcher: &DispatcherHandle, notifier: &StdoutNotifier, line: &str) {
    let Some(command) = Command::parse(line) else {
        return;
    };

    let reply = match command {
        Command::Start(origin) => notifier.reply(&origin, WELCOME),
        Command::Help(origin) => notifier.reply(&origin, HELP),
        Command::Generate(origin, request) => {
            // Admission replies through the notifier; the position is only logged.
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                match dispatcher.admit(origin.clone(), request).await {
                    Ok(position) => tracing::debug!(origin = %origin, position, "Admitted"),
                    Err(e) => tracing::debug!(origin = %origin, "Not admitted: {}", e),
                }
            });
            Ok(())
        }
    };

    if let Err(e) = reply {
        tracing::warn!("Failed to write reply: {}", e);
    }
}
