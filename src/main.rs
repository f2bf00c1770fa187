mod bot;
mod config;
mod detail;
mod fetch;
mod listing;
mod models;
mod seen;
mod validate;
mod webhook;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bot::{Bot, ShutdownFlag};
use config::Config;
use fetch::PageClient;
use seen::SeenSet;
use webhook::WebhookClient;

#[derive(Parser)]
#[command(name = "jobwatch")]
#[command(about = "Watches a job marketplace and posts new listings to a chat webhook")]
struct Cli {
    /// Webhook URL notifications are delivered to
    #[arg(long, global = true, env = "JOBWATCH_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Browse page to poll
    #[arg(long, global = true, env = "JOBWATCH_LISTING_URL", default_value = config::DEFAULT_LISTING_URL)]
    listing_url: String,

    /// Seconds between poll cycles
    #[arg(long, global = true, env = "JOBWATCH_POLL_INTERVAL", default_value = "1800")]
    poll_interval: u64,

    /// Seconds between detail-page fetches
    #[arg(long, global = true, env = "JOBWATCH_DETAIL_DELAY", default_value = "1.5")]
    detail_delay: f64,

    /// Minimum seconds between webhook deliveries in a batch
    #[arg(long, global = true, env = "JOBWATCH_SEND_DELAY", default_value = "1")]
    send_delay: f64,

    /// Seconds to back off after a failed cycle
    #[arg(long, global = true, env = "JOBWATCH_RECOVERY_DELAY", default_value = "60")]
    recovery_delay: u64,

    /// User agent sent with every request
    #[arg(long, global = true, env = "JOBWATCH_USER_AGENT", default_value = config::DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Path of the seen-jobs state file (defaults to the platform data dir)
    #[arg(long, global = true, env = "JOBWATCH_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Thumbnail image shown on each notification
    #[arg(long, global = true, env = "JOBWATCH_THUMBNAIL_URL", default_value = config::DEFAULT_THUMBNAIL_URL)]
    thumbnail_url: String,

    /// Footer line on each notification
    #[arg(long, global = true, env = "JOBWATCH_FOOTER_TEXT", default_value = "GModStore Job Market")]
    footer_text: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll continuously on the configured interval
    Run,

    /// Run a single poll cycle and exit
    Once,

    /// Send the connectivity probe to the webhook and exit
    TestWebhook,
}

/// Fractional-second delays come in as floats; reject anything a Duration
/// cannot represent before it can panic downstream.
fn delay_secs(value: f64, flag: &str) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        bail!("{} must be a non-negative number of seconds, got {}", flag, value);
    }
    Ok(Duration::from_secs_f64(value))
}

fn build_config(cli: &Cli) -> Result<Config> {
    let Some(webhook_url) = cli.webhook_url.clone() else {
        bail!("no webhook URL configured; pass --webhook-url or set JOBWATCH_WEBHOOK_URL");
    };
    Ok(Config {
        webhook_url,
        listing_url: cli.listing_url.clone(),
        user_agent: cli.user_agent.clone(),
        poll_interval: Duration::from_secs(cli.poll_interval),
        detail_delay: delay_secs(cli.detail_delay, "--detail-delay")?,
        send_delay: delay_secs(cli.send_delay, "--send-delay")?,
        recovery_delay: Duration::from_secs(cli.recovery_delay),
        state_file: cli
            .state_file
            .clone()
            .unwrap_or_else(config::default_state_file),
        thumbnail_url: cli.thumbnail_url.clone(),
        footer_text: cli.footer_text.clone(),
    })
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let notifier = WebhookClient::new(&config)?;

    match cli.command {
        Commands::TestWebhook => {
            if !notifier.test_connectivity() {
                bail!("webhook test failed, check the URL");
            }
        }

        Commands::Once => {
            let source = PageClient::new(&config)?;
            let seen = SeenSet::load(&config.state_file);
            let shutdown = install_signal_handler()?;
            let mut bot = Bot::new(config, source, notifier, seen, shutdown);
            let sent = bot.run_cycle()?;
            info!(sent, "single cycle done");
        }

        Commands::Run => {
            info!(
                interval = config.poll_interval.as_secs(),
                url = %config.listing_url,
                "starting job market watcher"
            );

            if !notifier.test_connectivity() {
                // Keep going: the webhook may only be flaky, and the service
                // usually runs unattended.
                error!("webhook test failed, continuing anyway");
            }

            let source = PageClient::new(&config)?;
            let seen = SeenSet::load(&config.state_file);
            let shutdown = install_signal_handler()?;
            let mut bot = Bot::new(config, source, notifier, seen, shutdown);
            bot.run()?;
        }
    }

    Ok(())
}

/// SIGINT and SIGTERM only flip the shutdown flag (ctrlc's `termination`
/// feature covers both); the orchestrator notices at its next wait tick,
/// persists, and exits.
fn install_signal_handler() -> Result<ShutdownFlag> {
    let shutdown = ShutdownFlag::new();
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nshutdown signal received, finishing up...");
        flag.trigger();
    })
    .context("failed to install the signal handler")?;
    Ok(shutdown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["jobwatch"];
        full.extend_from_slice(args);
        full.push("run");
        Cli::parse_from(full)
    }

    #[test]
    fn missing_webhook_url_is_a_config_error() {
        let err = build_config(&cli(&[])).unwrap_err();
        assert!(err.to_string().contains("webhook URL"));
    }

    #[test]
    fn fractional_delays_are_accepted() {
        let config = build_config(&cli(&[
            "--webhook-url",
            "https://example.invalid/webhook",
            "--detail-delay",
            "1.5",
        ]))
        .unwrap();
        assert_eq!(config.detail_delay, Duration::from_millis(1500));
    }

    #[test]
    fn negative_delay_is_a_config_error_not_a_panic() {
        let err = build_config(&cli(&[
            "--webhook-url",
            "https://example.invalid/webhook",
            "--detail-delay=-1",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("--detail-delay"));
    }

    #[test]
    fn non_finite_delay_is_a_config_error_not_a_panic() {
        let err = build_config(&cli(&[
            "--webhook-url",
            "https://example.invalid/webhook",
            "--send-delay",
            "NaN",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("--send-delay"));
    }
}
