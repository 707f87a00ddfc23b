use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Weekly trading journal: notes, checklist, screenshots and broker
/// trade-log imports, one entry per Monday-to-Sunday week
#[derive(Parser)]
#[command(name = "weekly-journal", version = env!("CARGO_PKG_VERSION"), long_about = None)]
pub struct Cli {
    /// Override the journal cache file
    #[arg(global = true, long = "cache")]
    pub cache: Option<PathBuf>,

    /// Use another config file
    #[arg(global = true, long = "config")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the week key containing DATE (default: today)
    Week { date: Option<String> },

    /// Print the entry of the week containing DATE
    Show { date: Option<String> },

    /// Set the week's free-text context
    Note { date: String, text: String },

    /// Add a tag to the week
    Tag {
        date: String,
        tag: String,
        /// Remove the tag instead
        #[arg(long)]
        remove: bool,
    },

    /// Tick a checklist item (fixed or custom id) for the week
    Tick {
        date: String,
        id: String,
        /// Untick instead
        #[arg(long)]
        off: bool,
    },

    /// Import a broker CSV/XLS-as-text trade log into a week
    ImportTrades {
        file: PathBuf,
        /// Any date of the target week (default: current week)
        #[arg(long)]
        week: Option<String>,
        /// Parse and summarize without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Attach screenshot images to the week
    Attach {
        date: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Write the whole journal as a JSON backup
    Export {
        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Replace the journal with a JSON backup
    Restore { file: PathBuf },

    /// List stored weeks, newest first
    History,

    /// Sign in to the configured backend, pull remote weeks and upload
    /// the local ones (password read from JOURNAL_PASSWORD)
    Sync {
        #[arg(long)]
        email: String,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the config file instead, if none exists yet
        #[arg(long)]
        init: bool,
    },

    /// Manage the custom checklist
    Checks {
        #[command(subcommand)]
        action: ChecksAction,
    },
}

#[derive(Subcommand)]
pub enum ChecksAction {
    /// Show fixed and custom checklist items
    List,
    Add { label: String },
    Rename { id: String, label: String },
    Remove { id: String },
}
