//! Slack Extra - Socket Mode bot binary.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use slack_extra::oauth::{OAuthState, oauth_routes};
use slack_extra::{SlackConfig, SlackExtraBot};

/// Slack Extra bot
#[derive(Parser)]
#[command(name = "slack-extra")]
#[command(about = "Slack workspace bot: spoilers and friends")]
#[command(version)]
struct Args {
    /// Environment file to load before reading configuration
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Serve the OAuth install routes on this address
    #[arg(long)]
    oauth_listen: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

async fn serve_oauth(config: &SlackConfig, addr: &str) -> Result<(), String> {
    let state = OAuthState::from_config(config).map_err(|e| e.to_string())?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", addr, e))?;
    info!("Serving OAuth routes on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, oauth_routes(state)).await {
            error!("OAuth server error: {}", e);
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // A missing file is fine; the environment may already be set.
    let env_loaded = dotenvy::from_filename(&args.env_file).is_ok();

    setup_logging(&args.log_level, args.json_logs);
    if !env_loaded {
        warn!("No environment file at {}", args.env_file);
    }

    let config = match SlackConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config from environment: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(addr) = &args.oauth_listen
        && let Err(e) = serve_oauth(&config, addr).await
    {
        error!("OAuth routes disabled: {}", e);
        return ExitCode::FAILURE;
    }

    let bot = match SlackExtraBot::new(config) {
        Ok(bot) => Arc::new(bot),
        Err(e) => {
            error!("Failed to create bot: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let signal_bot = bot.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_bot.shutdown();
    });

    if let Err(e) = bot.start().await {
        error!("Bot error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Bot stopped");
    ExitCode::SUCCESS
}
