use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

use contentsync::{ContentManager, ContentType, SyncConfig};

#[derive(Parser)]
#[command(name = "contentsync")]
#[command(
    about = "Real-time content update distribution: change-feed polling, cross-process broadcast, subscriber fan-out",
    version
)]
struct Cli {
    /// Path to a JSON config file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch for content updates and print every envelope received
    Watch {
        /// Content types to subscribe to ("all" for everything)
        #[arg(short, long, default_value = "all")]
        types: Vec<String>,
    },

    /// Push a manual content update into the relay and local subscribers
    Trigger {
        /// Content type of the update, e.g. "nutrition"
        content_type: String,

        /// JSON payload of the update
        payload: String,
    },

    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SyncConfig::from_file(path).await?,
        None => SyncConfig::default(),
    };

    match cli.command {
        Commands::Watch { types } => {
            println!(
                "{}",
                "📡 Starting real-time content monitoring...".cyan().bold()
            );
            println!(
                "{} Change feed: {}",
                "→".bright_blue(),
                config.change_feed_url().bright_yellow()
            );
            println!(
                "{} Relay slot: {}\n",
                "→".bright_blue(),
                config.relay_slot.display().to_string().bright_yellow()
            );

            let manager = ContentManager::new(config)?;

            for type_name in &types {
                manager.subscribe(type_name.as_str(), |envelope| {
                    let count = envelope
                        .count
                        .map(|c| format!("{} items", c))
                        .unwrap_or_else(|| "no count".to_string());
                    println!(
                        "📡 {} {} {} {}",
                        format!("{:?}", envelope.action).to_uppercase().green(),
                        envelope.content_type.to_string().bright_white(),
                        count.bright_black(),
                        envelope.timestamp.to_rfc3339().bright_black()
                    );
                    Ok(())
                });
                println!(
                    "{} Subscribed to {}",
                    "✓".green(),
                    type_name.bright_yellow()
                );
            }

            manager.start();
            tokio::signal::ctrl_c().await?;
            manager.stop();
            println!("{}", "📡 Stopped content monitoring".cyan());
        }

        Commands::Trigger {
            content_type,
            payload,
        } => {
            let content: serde_json::Value = serde_json::from_str(&payload)?;
            let manager = ContentManager::new(config)?;

            manager.trigger_update(ContentType::from(content_type.as_str()), content);
            println!(
                "{} Triggered {} update",
                "✓".green(),
                content_type.bright_yellow()
            );

            // Let the relay finish its write-then-delete cycle before exit.
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
