//! svnlocal - command line client for local repositories

mod commands;
mod config;
mod wc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "svnlocal")]
#[command(author = "svnlocal Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Work with version-controlled repositories on local disk", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Client configuration file (defaults to $SVNLOCAL_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Username to act as
    #[arg(long, global = true)]
    username: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new repository
    Create { path: PathBuf },

    /// Print the youngest revision
    Youngest { url: String },

    /// Check out a working copy
    Checkout {
        url: String,
        dir: PathBuf,
        #[arg(short, long)]
        revision: Option<u64>,
        /// Only the immediate files, no subdirectories
        #[arg(short = 'N', long)]
        non_recursive: bool,
    },

    /// Bring a working copy up to date
    Update {
        url: String,
        dir: PathBuf,
        #[arg(short, long)]
        revision: Option<u64>,
    },

    /// Show what an update of a working copy would change
    Status { url: String, dir: PathBuf },

    /// Print a file's contents
    Cat {
        url: String,
        #[arg(short, long)]
        revision: Option<u64>,
    },

    /// Describe a node
    Info {
        url: String,
        #[arg(short, long)]
        revision: Option<u64>,
    },

    /// Show commit history
    Log {
        url: String,
        /// START:END or a single revision
        #[arg(short, long)]
        revision: Option<String>,
        /// List changed paths
        #[arg(short, long)]
        verbose: bool,
    },

    /// Commit an unversioned tree
    Import {
        dir: PathBuf,
        url: String,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Create a directory in the repository
    Mkdir {
        url: String,
        #[arg(short, long)]
        message: Option<String>,
    },
}

fn init_tracing(debug: bool) {
    let env_filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = Config::resolve(cli.config.as_deref())?;
    let client = commands::Client::new(config, cli.username);

    match cli.command {
        Commands::Create { path } => client.create(&path),
        Commands::Youngest { url } => client.youngest(&url),
        Commands::Checkout {
            url,
            dir,
            revision,
            non_recursive,
        } => client.checkout(&url, &dir, revision, !non_recursive),
        Commands::Update { url, dir, revision } => client.update(&url, &dir, revision),
        Commands::Status { url, dir } => client.status(&url, &dir),
        Commands::Cat { url, revision } => client.cat(&url, revision),
        Commands::Info { url, revision } => client.info(&url, revision),
        Commands::Log {
            url,
            revision,
            verbose,
        } => client.log(&url, revision.as_deref(), verbose),
        Commands::Import { dir, url, message } => client.import(&dir, &url, message),
        Commands::Mkdir { url, message } => client.mkdir(&url, message),
    }
}
