//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::FileFormat;
use crate::api::{self, AppState};
use crate::config::{Backend, StarjarConfig};
use serde::Serialize;
use starjar_core::{
    AwardRequest, ImportMode, ImportReport, Ledger, LedgerError, ReasonId, RewardId,
    StorageBackend, TranslationOwner, UserId, default_rewards, export::backup_hash,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for import (100 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), LedgerError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| LedgerError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(LedgerError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, LedgerError> {
    let canonical = path.canonicalize().map_err(|e| {
        LedgerError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(LedgerError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path whose parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, LedgerError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        LedgerError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(LedgerError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| LedgerError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Output settings shared by every command.
#[derive(Debug, Clone)]
pub struct Output {
    pub json: bool,
    pub lang: String,
}

impl Output {
    /// Print `value` as pretty JSON when in JSON mode, else run `human`.
    fn emit<T, F>(&self, value: &T, human: F) -> Result<(), LedgerError>
    where
        T: Serialize,
        F: FnOnce(&T),
    {
        if self.json {
            let text = serde_json::to_string_pretty(value)
                .map_err(|e| LedgerError::SerializationError(e.to_string()))?;
            println!("{}", text);
        } else {
            human(value);
        }
        Ok(())
    }
}

// =============================================================================
// LEDGER LOADING
// =============================================================================

/// Open the configured backend.
pub fn open_ledger(config: &StarjarConfig) -> Result<Ledger<StorageBackend>, LedgerError> {
    let backend = match config.backend {
        Backend::Redb => StorageBackend::open_redb(&config.database)?,
        Backend::Memory => StorageBackend::default(),
    };
    Ok(Ledger::new(backend))
}

/// Seed users and rewards into empty tables.
pub fn seed(ledger: &mut Ledger<StorageBackend>, config: &StarjarConfig) -> Result<(usize, usize), LedgerError> {
    let users = ledger.seed_users(&config.seed.users)?;
    let rewards = if config.seed.rewards {
        ledger.seed_rewards(&default_rewards())?
    } else {
        0
    };
    Ok((users, rewards))
}

fn require_user_id(ledger: &Ledger<StorageBackend>, username: &str) -> Result<UserId, LedgerError> {
    ledger
        .user_by_name(username)?
        .map(|u| u.id)
        .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    config: StarjarConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), LedgerError> {
    let mut ledger = open_ledger(&config)?;
    let (users, rewards) = seed(&mut ledger, &config)?;
    if users > 0 || rewards > 0 {
        tracing::info!(users, rewards, "seeded first-run content");
    }

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    println!("Starjar Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", config.backend);
    println!("  Database: {}", config.database.display());
    println!("  Language: {}", config.default_lang);
    println!("  Rate:     {} req/s per user", config.server.rate_limit);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(ledger)
        .with_api_key(config.api_key())
        .with_default_lang(&config.default_lang)
        .with_rate_limit(config.server.rate_limit);
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the database and seed first-run content.
pub fn cmd_init(config: &StarjarConfig, out: &Output) -> Result<(), LedgerError> {
    let mut ledger = open_ledger(config)?;
    let (users, rewards) = seed(&mut ledger, config)?;
    let report = serde_json::json!({
        "database": config.database.to_string_lossy(),
        "backend": config.backend.to_string(),
        "seeded_users": users,
        "seeded_rewards": rewards,
    });
    out.emit(&report, |_| {
        println!("Initialized {}", config.database.display());
        println!("  Seeded users:   {}", users);
        println!("  Seeded rewards: {}", rewards);
    })
}

// =============================================================================
// BALANCE COMMANDS
// =============================================================================

pub fn cmd_balance(config: &StarjarConfig, out: &Output, username: &str) -> Result<(), LedgerError> {
    let ledger = open_ledger(config)?;
    let balance = ledger.balance_of(username)?;
    let report = serde_json::json!({ "username": username, "balance": balance });
    out.emit(&report, |_| println!("{}: {} ★", username, balance))
}

pub fn cmd_leaderboard(config: &StarjarConfig, out: &Output) -> Result<(), LedgerError> {
    let ledger = open_ledger(config)?;
    let entries = ledger.leaderboard(&out.lang)?;
    out.emit(&entries, |entries| {
        println!("{:<20} {:>8} {:>8}", "User", "Earned", "Balance");
        for e in entries {
            let marker = if e.is_admin { " (admin)" } else { "" };
            println!(
                "{:<20} {:>8} {:>8}{}",
                e.display_name, e.total_awarded, e.balance, marker
            );
        }
    })
}

// =============================================================================
// LEDGER COMMANDS
// =============================================================================

/// Award stars. The awarder may not be the beneficiary.
pub fn cmd_award(
    config: &StarjarConfig,
    out: &Output,
    username: &str,
    reason_id: Option<u64>,
    text: Option<String>,
    stars: Option<i64>,
    by: Option<&str>,
) -> Result<(), LedgerError> {
    if by == Some(username) {
        return Err(LedgerError::InvalidInput(
            "cannot award stars to yourself".into(),
        ));
    }
    let mut ledger = open_ledger(config)?;
    let awarded_by = by.map(|name| require_user_id(&ledger, name)).transpose()?;

    let star = ledger.record_award(AwardRequest {
        username: username.to_string(),
        reason_id: reason_id.map(ReasonId),
        reason_text: text,
        stars,
        awarded_by,
    })?;
    let balance = ledger.balance(star.user)?;
    let report = serde_json::json!({
        "star_id": star.id.0,
        "reason_id": star.reason.map(|r| r.0),
        "stars": star.stars,
        "balance": balance,
    });
    out.emit(&report, |_| {
        println!(
            "Awarded {} ★ to {} (balance {})",
            star.stars, username, balance
        );
    })
}

pub fn cmd_redeem(
    config: &StarjarConfig,
    out: &Output,
    username: &str,
    reward_id: u64,
) -> Result<(), LedgerError> {
    let mut ledger = open_ledger(config)?;
    let redemption = ledger.redeem(username, RewardId(reward_id))?;
    let balance = ledger.balance(redemption.user)?;
    let name = ledger.display_text(TranslationOwner::Reward(redemption.reward), &out.lang);
    let report = serde_json::json!({
        "redemption_id": redemption.id.0,
        "cost": redemption.cost,
        "balance": balance,
    });
    out.emit(&report, |_| {
        println!("{} redeemed {} (balance {})", username, name, balance);
    })
}

pub fn cmd_awards(config: &StarjarConfig, out: &Output, user: Option<&str>) -> Result<(), LedgerError> {
    let ledger = open_ledger(config)?;
    let entries = ledger.list_awards(user, &out.lang)?;
    out.emit(&entries, |entries| {
        for e in entries {
            let by = e.awarded_by_display.as_deref().unwrap_or("-");
            println!(
                "#{:<5} {} {:<16} {:>3} ★  {}  (by {})",
                e.id.0,
                e.created_at.format("%Y-%m-%d %H:%M"),
                e.user_display,
                e.stars,
                e.reason_display,
                by
            );
        }
    })
}

pub fn cmd_redemptions(
    config: &StarjarConfig,
    out: &Output,
    user: Option<&str>,
    limit: Option<usize>,
) -> Result<(), LedgerError> {
    let ledger = open_ledger(config)?;
    let user_id = match user {
        Some(name) => match ledger.user_by_name(name)? {
            Some(u) => Some(u.id),
            None => return out.emit(&Vec::<()>::new(), |_| println!("No redemptions")),
        },
        None => None,
    };
    let entries = ledger.list_redemptions(limit, user_id, &out.lang)?;
    out.emit(&entries, |entries| {
        for e in entries {
            let pinned = if e.cost.is_some() { "" } else { " (floating)" };
            println!(
                "#{:<5} {} {:<16} {} {} -{} ★{}",
                e.id.0,
                e.created_at.format("%Y-%m-%d %H:%M"),
                e.user_display,
                e.reward_icon,
                e.reward_display,
                e.effective_cost,
                pinned
            );
        }
    })
}

// =============================================================================
// CATALOG COMMANDS
// =============================================================================

pub fn cmd_reasons(config: &StarjarConfig, out: &Output) -> Result<(), LedgerError> {
    let ledger = open_ledger(config)?;
    let reasons = ledger.reasons(&out.lang)?;
    out.emit(&reasons, |reasons| {
        for r in reasons {
            println!(
                "#{:<4} {:<30} {:>3} ★  used {}x  [{}]",
                r.reason.id.0, r.text, r.reason.default_stars, r.count, r.reason.key
            );
        }
    })
}

pub fn cmd_rewards(config: &StarjarConfig, out: &Output) -> Result<(), LedgerError> {
    let ledger = open_ledger(config)?;
    let rewards = ledger.rewards(&out.lang)?;
    out.emit(&rewards, |rewards| {
        for r in rewards {
            let adult = if r.reward.adult_only { " (adults)" } else { "" };
            println!(
                "#{:<4} {} {:<30} {:>3} ★{}",
                r.reward.id.0, r.reward.icon, r.text, r.reward.cost, adult
            );
        }
    })
}

pub fn cmd_reason_stars(
    config: &StarjarConfig,
    out: &Output,
    id: u64,
    stars: i64,
    retroactive: bool,
) -> Result<(), LedgerError> {
    let mut ledger = open_ledger(config)?;
    let reason = ledger.set_reason_stars(ReasonId(id), stars, retroactive)?;
    out.emit(&reason, |r| {
        println!(
            "Reason #{} is now worth {} ★{}",
            r.id.0,
            r.default_stars,
            if retroactive { " (past awards rewritten)" } else { "" }
        );
    })
}

pub fn cmd_reward_cost(
    config: &StarjarConfig,
    out: &Output,
    id: u64,
    cost: i64,
    retroactive: bool,
) -> Result<(), LedgerError> {
    let mut ledger = open_ledger(config)?;
    let reward = ledger.set_reward_cost(RewardId(id), cost, retroactive)?;
    out.emit(&reward, |r| {
        println!(
            "Reward #{} now costs {} ★{}",
            r.id.0,
            r.cost,
            if retroactive { "" } else { " (past redemptions pinned)" }
        );
    })
}

pub fn cmd_translate(
    config: &StarjarConfig,
    kind: &str,
    id: u64,
    lang: &str,
    text: &str,
) -> Result<(), LedgerError> {
    let owner = match kind {
        "user" => TranslationOwner::User(UserId(id)),
        "reason" => TranslationOwner::Reason(ReasonId(id)),
        "reward" => TranslationOwner::Reward(RewardId(id)),
        other => {
            return Err(LedgerError::InvalidInput(format!(
                "unknown kind '{}', expected user, reason or reward",
                other
            )));
        }
    };
    let mut ledger = open_ledger(config)?;
    ledger.set_translation(owner, lang, text)?;
    println!("Set {} #{} [{}] = {}", kind, id, lang, text);
    Ok(())
}

// =============================================================================
// ACCOUNT COMMANDS
// =============================================================================

pub fn cmd_user_add(
    config: &StarjarConfig,
    out: &Output,
    username: &str,
    password: &str,
    admin: bool,
) -> Result<(), LedgerError> {
    let mut ledger = open_ledger(config)?;
    let user = ledger.create_user(username, password, admin)?;
    let report = serde_json::json!({ "id": user.id.0, "username": user.username, "is_admin": admin });
    out.emit(&report, |_| println!("Created user {} (#{})", username, user.id.0))
}

pub fn cmd_user_delete(config: &StarjarConfig, username: &str) -> Result<(), LedgerError> {
    let mut ledger = open_ledger(config)?;
    let id = require_user_id(&ledger, username)?;
    ledger.delete_user(id)?;
    println!("Deleted user {}", username);
    Ok(())
}

pub fn cmd_passwd(config: &StarjarConfig, username: &str, password: &str) -> Result<(), LedgerError> {
    let mut ledger = open_ledger(config)?;
    let id = require_user_id(&ledger, username)?;
    ledger.set_password(id, password)?;
    println!("Password changed for {}", username);
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT COMMANDS
// =============================================================================

pub fn cmd_export(
    config: &StarjarConfig,
    out: &Output,
    output: &Path,
    format: FileFormat,
) -> Result<(), LedgerError> {
    let ledger = open_ledger(config)?;
    let path = validate_output_path(output)?;
    let bytes = match format {
        FileFormat::Json => ledger.export_json()?.into_bytes(),
        FileFormat::Backup => ledger.export_backup()?,
    };
    std::fs::write(&path, &bytes)
        .map_err(|e| LedgerError::IoError(format!("Write {}: {}", path.display(), e)))?;

    let digest = backup_hash(&bytes);
    let report = serde_json::json!({
        "path": path.to_string_lossy(),
        "bytes": bytes.len(),
        "blake3": digest,
    });
    out.emit(&report, |_| {
        println!("Exported {} bytes to {}", bytes.len(), path.display());
        println!("BLAKE3: {}", digest);
    })
}

pub fn cmd_import(
    config: &StarjarConfig,
    out: &Output,
    input: &Path,
    format: FileFormat,
    atomic: bool,
) -> Result<(), LedgerError> {
    let path = validate_file_path(input)?;
    validate_file_size(&path, MAX_IMPORT_FILE_SIZE)?;
    let data = std::fs::read(&path)
        .map_err(|e| LedgerError::IoError(format!("Read {}: {}", path.display(), e)))?;
    let mode = if atomic {
        ImportMode::Atomic
    } else {
        ImportMode::BestEffort
    };

    let mut ledger = open_ledger(config)?;
    let report: ImportReport = match format {
        FileFormat::Json => {
            let text = String::from_utf8(data)
                .map_err(|_| LedgerError::InvalidInput("export file is not UTF-8".into()))?;
            ledger.import_json(&text, mode)?
        }
        FileFormat::Backup => ledger.import_backup(&data, mode)?,
    };
    out.emit(&report, |r| {
        println!(
            "Imported {} reasons, {} rewards, {} awards, {} redemptions, {} settings",
            r.reasons, r.rewards, r.stars, r.redemptions, r.settings
        );
        for s in &r.skipped {
            println!("  skipped {}[{}]: {}", s.section, s.index, s.reason);
        }
    })
}

// =============================================================================
// TESTS
// =============================================================================
