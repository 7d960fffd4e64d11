//! # Starjar CLI Module
//!
//! This module implements the CLI interface for Starjar.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Create the database and seed first-run content
//! - `balance`, `leaderboard` - Read balances
//! - `award`, `redeem` - Append to the ledgers
//! - `awards`, `redemptions`, `reasons`, `rewards` - Listings
//! - `reason-stars`, `reward-cost` - Catalog value changes
//! - `translate` - Upsert a display text
//! - `user-add`, `user-delete`, `passwd` - Accounts
//! - `export`, `import` - Backup and restore

mod commands;

use crate::config::{Backend, StarjarConfig};
use clap::{Parser, Subcommand, ValueEnum};
use starjar_core::LedgerError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Starjar - family star ledger
///
/// Children earn stars for good deeds and spend them on rewards.
#[derive(Parser, Debug)]
#[command(name = "starjar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a starjar.toml configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database (overrides config and STARJAR_DB)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "memory"
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Language for display texts
    #[arg(short = 'L', long, global = true)]
    pub lang: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// File format of `export` and `import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FileFormat {
    /// Human-readable export document
    Json,
    /// Checksummed binary backup
    Backup,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the database and seed default users and rewards
    Init,

    /// Show a user's current balance
    Balance {
        username: String,
    },

    /// Show every user's totals and balance
    Leaderboard,

    /// Award stars to a user
    Award {
        /// Beneficiary
        username: String,

        /// Catalog reason id
        #[arg(short = 'r', long, conflicts_with = "text")]
        reason_id: Option<u64>,

        /// Free-text reason, matched against existing reasons
        #[arg(short, long)]
        text: Option<String>,

        /// Star count override
        #[arg(short, long)]
        stars: Option<i64>,

        /// Awarding user
        #[arg(short, long)]
        by: Option<String>,
    },

    /// Redeem a reward if the balance allows
    Redeem {
        username: String,
        reward_id: u64,
    },

    /// List awards, newest first
    Awards {
        /// Only this beneficiary
        #[arg(short, long)]
        user: Option<String>,
    },

    /// List recent redemptions
    Redemptions {
        #[arg(short, long)]
        user: Option<String>,

        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// List reasons with award counts
    Reasons,

    /// List rewards by cost
    Rewards,

    /// Change a reason's star value
    ReasonStars {
        id: u64,
        stars: i64,

        /// Also rewrite past awards for this reason
        #[arg(long)]
        retroactive: bool,
    },

    /// Change a reward's cost
    RewardCost {
        id: u64,
        cost: i64,

        /// Let past unpinned redemptions follow the new price
        #[arg(long)]
        retroactive: bool,
    },

    /// Set the display text of a user, reason or reward
    Translate {
        /// user, reason or reward
        kind: String,
        id: u64,
        lang: String,
        text: String,
    },

    /// Create an account
    UserAdd {
        username: String,

        #[arg(short, long)]
        password: String,

        #[arg(long)]
        admin: bool,
    },

    /// Delete an account with its awards and redemptions
    UserDelete {
        username: String,
    },

    /// Change a password
    Passwd {
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Export the store
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short = 't', long, value_enum, default_value = "json")]
        format: FileFormat,
    },

    /// Replace catalog and ledgers from an export
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short = 't', long, value_enum, default_value = "json")]
        format: FileFormat,

        /// Reject the whole import on the first invalid record
        #[arg(long)]
        atomic: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Merge config file, environment and flags.
fn resolve_config(cli: &Cli) -> Result<StarjarConfig, LedgerError> {
    let mut config = StarjarConfig::resolve(cli.config.as_deref())?;
    if let Some(db) = &cli.database {
        config.database = db.clone();
    }
    if let Some(backend) = &cli.backend {
        config.backend = backend.parse::<Backend>()?;
    }
    if let Some(lang) = cli.lang.as_deref().filter(|l| !l.is_empty()) {
        config.default_lang = lang.to_string();
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), LedgerError> {
    let config = resolve_config(&cli)?;
    let out = Output {
        json: cli.json_mode,
        lang: config.default_lang.clone(),
    };

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(config, host, port).await,
        Some(Commands::Init) => cmd_init(&config, &out),
        Some(Commands::Balance { username }) => cmd_balance(&config, &out, &username),
        Some(Commands::Leaderboard) | None => cmd_leaderboard(&config, &out),
        Some(Commands::Award {
            username,
            reason_id,
            text,
            stars,
            by,
        }) => cmd_award(&config, &out, &username, reason_id, text, stars, by.as_deref()),
        Some(Commands::Redeem {
            username,
            reward_id,
        }) => cmd_redeem(&config, &out, &username, reward_id),
        Some(Commands::Awards { user }) => cmd_awards(&config, &out, user.as_deref()),
        Some(Commands::Redemptions { user, limit }) => {
            cmd_redemptions(&config, &out, user.as_deref(), limit)
        }
        Some(Commands::Reasons) => cmd_reasons(&config, &out),
        Some(Commands::Rewards) => cmd_rewards(&config, &out),
        Some(Commands::ReasonStars {
            id,
            stars,
            retroactive,
        }) => cmd_reason_stars(&config, &out, id, stars, retroactive),
        Some(Commands::RewardCost {
            id,
            cost,
            retroactive,
        }) => cmd_reward_cost(&config, &out, id, cost, retroactive),
        Some(Commands::Translate {
            kind,
            id,
            lang,
            text,
        }) => cmd_translate(&config, &kind, id, &lang, &text),
        Some(Commands::UserAdd {
            username,
            password,
            admin,
        }) => cmd_user_add(&config, &out, &username, &password, admin),
        Some(Commands::UserDelete { username }) => cmd_user_delete(&config, &username),
        Some(Commands::Passwd { username, password }) => {
            cmd_passwd(&config, &username, &password)
        }
        Some(Commands::Export { output, format }) => cmd_export(&config, &out, &output, format),
        Some(Commands::Import {
            input,
            format,
            atomic,
        }) => cmd_import(&config, &out, &input, format, atomic),
    }
}

// =============================================================================
// TESTS
// =============================================================================
