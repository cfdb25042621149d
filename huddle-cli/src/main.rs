use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use huddle::server::{LoggingSettings, ServerConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Voice rooms over peer-to-peer audio links")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the presence and signaling server.
    Serve {
        #[arg(short, long, default_value = "huddle.toml")]
        config: String,

        /// Overrides `http.bind`.
        #[arg(long)]
        bind: Option<String>,

        /// Overrides `logging.level`. `RUST_LOG` still wins.
        #[arg(long)]
        log_level: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration.
    Config {
        #[arg(short, long, default_value = "huddle.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Serve {
            config,
            bind,
            log_level,
            json,
        } => {
            let mut settings = ServerConfig::load(&config)?;
            apply_overrides(&mut settings, bind, log_level, json);
            init_logging(&settings.logging);
            info!(
                "Loaded configuration from {} ({} accounts, {} ICE servers)",
                config,
                settings.accounts.len(),
                settings.ice_servers.len()
            );

            println!("{}", "🎙  Starting huddle...".green().bold());
            println!("   🔌 Listening: {}", settings.http.bind.cyan());
            println!(
                "   ⏱  Presence TTL: {}s",
                settings.presence.ttl_secs.to_string().cyan()
            );

            huddle::server::run(settings).await
        }
        Commands::Config { config } => {
            let settings = ServerConfig::load(&config)?;
            let rendered =
                toml::to_string_pretty(&settings).context("Failed to render configuration")?;
            println!("{}", rendered);
            Ok(())
        }
    }
}

fn apply_overrides(
    settings: &mut ServerConfig,
    bind: Option<String>,
    log_level: Option<String>,
    json: bool,
) {
    if let Some(bind) = bind {
        settings.http.bind = bind;
    }
    if let Some(level) = log_level {
        settings.logging.level = level;
    }
    if json {
        settings.logging.format = "json".into();
    }
}

fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match logging.format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .init(),
        _ => fmt().with_env_filter(filter).with_target(true).init(),
    }
}
