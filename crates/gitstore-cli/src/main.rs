//! gitstore CLI
//!
//! Command-line interface for gitstore - a git-revisioned tiddler store.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gitstore_core::{Config, Store, StoreError, GUEST_USER};

mod commands;
mod editor;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "gitstore")]
#[command(about = "gitstore - tiddlers in plain files, revisioned by git")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug details to stderr (or the configured log file)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// User that writes are attributed to
    #[arg(short, long, global = true, default_value = GUEST_USER)]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a tiddler (text from --text, $EDITOR, or stdin)
    Put {
        /// Bag name
        bag: String,
        /// Tiddler title
        title: String,
        /// Tiddler text
        #[arg(short, long)]
        text: Option<String>,
        /// Tags to set
        #[arg(long)]
        tag: Vec<String>,
        /// Extra fields as key=value
        #[arg(short, long)]
        field: Vec<String>,
        /// Content type of the text
        #[arg(long = "type")]
        content_type: Option<String>,
    },
    /// Show a tiddler
    #[command(alias = "show")]
    Get {
        /// Bag name
        bag: String,
        /// Tiddler title
        title: String,
        /// Show the tiddler as of this revision
        #[arg(short, long)]
        revision: Option<String>,
    },
    /// List the revisions of a tiddler
    #[command(alias = "log")]
    History {
        /// Bag name
        bag: String,
        /// Tiddler title
        title: String,
    },
    /// List the tiddlers in a bag
    #[command(alias = "ls")]
    List {
        /// Bag name
        bag: String,
    },
    /// Delete a tiddler
    #[command(alias = "rm")]
    Delete {
        /// Bag name
        bag: String,
        /// Tiddler title
        title: String,
    },
    /// Manage bags
    Bag {
        #[command(subcommand)]
        command: Option<BagCommands>,
    },
    /// List all bags
    Bags,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum BagCommands {
    /// List all bags
    #[command(alias = "ls")]
    List,
    /// Create a bag or update its description
    #[command(alias = "add")]
    Create {
        /// Bag name
        name: String,
        /// Bag description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Show a bag
    Show {
        /// Bag name
        name: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (store_root, host, port, scheme, system_name,
        /// lock_attempts, lock_backoff_ms, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let result = run();
    if let Err(ref e) = result {
        if let Some(hint) = recovery_hint(e) {
            eprintln!("hint: {}", hint);
        }
    }
    result
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands don't need the store
    let command = match cli.command {
        Commands::Config { command } => return handle_config_command(command, config_path, &output),
        command => command,
    };

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);
    debug!(store_root = ?config.store_root, user = %cli.user, "opening store");

    let store = Store::open(config)
        .context("Failed to open store")?
        .with_usersign(cli.user);

    match command {
        Commands::Put {
            bag,
            title,
            text,
            tag,
            field,
            content_type,
        } => commands::tiddler::put(
            &store,
            commands::tiddler::PutArgs {
                bag,
                title,
                text,
                tags: tag,
                fields: field,
                content_type,
            },
            &output,
        ),
        Commands::Get {
            bag,
            title,
            revision,
        } => commands::tiddler::show(&store, &bag, &title, revision.as_deref(), &output),
        Commands::History { bag, title } => {
            commands::tiddler::history(&store, &bag, &title, &output)
        }
        Commands::List { bag } => commands::tiddler::list(&store, &bag, &output),
        Commands::Delete { bag, title } => {
            commands::tiddler::delete(&store, &bag, &title, &output)
        }
        Commands::Bag { command } => match command {
            Some(BagCommands::List) | None => commands::bag::list(&store, &output),
            Some(BagCommands::Create { name, description }) => {
                commands::bag::create(&store, name, description, &output)
            }
            Some(BagCommands::Show { name }) => commands::bag::show(&store, &name, &output),
        },
        Commands::Bags => commands::bag::list(&store, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Suggestion attached to the first store error in the chain
fn recovery_hint(error: &anyhow::Error) -> Option<&'static str> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<StoreError>())
        .and_then(StoreError::recovery_suggestion)
}

/// Initialize logging for the CLI
///
/// Level comes from `-v` (debug) or GITSTORE_LOG (default warn).
/// Logs go to config.log_file when set, otherwise stderr.
fn init_logging(config: &Config, verbose: bool) {
    let log_level = if verbose {
        "debug".to_string()
    } else {
        std::env::var("GITSTORE_LOG").unwrap_or_else(|_| "warn".to_string())
    };
    let env_filter = EnvFilter::new(format!(
        "gitstore_core={},gitstore_cli={}",
        log_level, log_level
    ));

    // Ignore error if already initialized
    match &config.log_file {
        Some(log_path) => {
            let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                    return;
                }
            };
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
