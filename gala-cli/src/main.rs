//! Gala CLI - command-line front end for the Gala messaging client.
//!
//! Opens a socket session with the configured identity, pages through chat
//! lists and conversation history, sends messages, and streams live events
//! to the terminal. Useful for scripting, debugging a messaging server, and
//! exercising the client without a UI.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use gala_core::config::{AppConfig, ConfigHandle};
use gala_core::error::GalaResult;
use gala_core::logging;

/// Gala - real-time client/vendor messaging.
#[derive(Parser)]
#[command(
    name = "gala",
    version,
    about = "Gala messaging client CLI",
    long_about = "A command-line interface for the Gala messaging client.\n\
                  Connects to a messaging server over a token-authenticated websocket."
)]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Bearer token to use instead of the configured token provider.
    #[arg(short, long, global = true)]
    token: Option<String>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as text or json.
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// How command results are printed.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Tables and styled lines.
    Text,
    /// One JSON document per result.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print live events until interrupted.
    Listen {
        /// Reconnect explicitly after automatic retries are exhausted.
        #[arg(long)]
        reconnect: bool,
    },
    /// List chats of the configured identity.
    Chats {
        /// Keep loading pages until the server reports no more.
        #[arg(short, long)]
        all: bool,
    },
    /// Show the history of one conversation.
    Messages {
        /// Counterpart id.
        counterpart: String,
        /// Number of earlier pages to load after the first.
        #[arg(short, long, default_value = "0")]
        earlier: u32,
    },
    /// Send a message.
    Send {
        /// Receiver id.
        receiver: String,
        /// Message text, or an image URL with --image.
        text: String,
        /// Send the text as an image URL.
        #[arg(long)]
        image: bool,
    },
    /// View or create the configuration file.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> GalaResult<()> {
    let cli = Cli::parse();

    let config_path = match cli.config.as_deref() {
        Some(path) => PathBuf::from(path),
        None => AppConfig::default_config_path()?,
    };
    let mut config = if config_path.exists() {
        AppConfig::load_from_file(&config_path)?
    } else {
        AppConfig::default()
    };

    if cli.verbose {
        config.logging.level = "debug".into();
    }
    let _guard = match config
        .effective_log_dir()
        .and_then(|dir| logging::init_logging(&config.logging, &dir))
    {
        Ok(guard) => Some(guard),
        Err(e) => {
            logging::init_console_logging(&config.logging.level);
            warn!("file logging unavailable, logging to stderr only: {e}");
            None
        }
    };

    info!("{} CLI v{}", gala_core::constants::APP_NAME, gala_core::constants::APP_VERSION);

    let config_handle = ConfigHandle::new(config);

    match cli.command {
        Commands::Listen { reconnect } => {
            commands::listen::run(config_handle, cli.token, reconnect, cli.format).await
        }
        Commands::Chats { all } => {
            commands::chats::run(config_handle, cli.token, all, cli.format).await
        }
        Commands::Messages { counterpart, earlier } => {
            commands::messages::run(config_handle, cli.token, counterpart, earlier, cli.format).await
        }
        Commands::Send { receiver, text, image } => {
            commands::send::run(config_handle, cli.token, receiver, text, image, cli.format).await
        }
        Commands::Config { action } => {
            commands::config::run(config_handle, config_path, action, cli.format).await
        }
    }
}
