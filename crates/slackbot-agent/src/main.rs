//! # slackbot-agent
//!
//! Bot binary: loads settings, installs logging, registers the built-in
//! commands and runs the client until the stream ends or Ctrl-C.

#![deny(unsafe_code)]

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use slackbot_rtm::Client;
use slackbot_rtm::logging::{init_json_subscriber, init_subscriber};

/// Slack RTM bot.
#[derive(Parser, Debug)]
#[command(name = "slackbot-agent", about = "Slack RTM bot")]
struct Cli {
    /// API token. Falls back to `SLACK_TOKEN`.
    #[arg(long)]
    token: Option<String>,

    /// Settings file (defaults to `~/.slackbot/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter, overriding the settings file.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(slackbot_settings::settings_path);
    let settings = slackbot_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    let level = args.log_level.as_deref().unwrap_or(&settings.log_level);
    if args.json_logs {
        init_json_subscriber(level);
    } else {
        init_subscriber(level);
    }

    let token = args
        .token
        .or_else(|| std::env::var("SLACK_TOKEN").ok())
        .context("No API token: pass --token or set SLACK_TOKEN")?;

    let mut client = Client::with_settings(token, settings).context("Failed to create client")?;
    commands::register_builtins(&mut client).context("Failed to register commands")?;

    let shutdown = client.shutdown_token();
    let _signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    });

    client.start().await.context("Bot stopped")?;
    Ok(())
}
