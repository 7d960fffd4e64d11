//! # Export / Import
//!
//! Whole-store backup and restore.
//!
//! - `ExportDocument`: typed, versioned JSON document. Users, reasons and
//!   rewards are referenced by username and key, never by internal id, so a
//!   document can be restored into another instance.
//! - Binary backup: the same document as a postcard stream behind a header
//!   with magic bytes, record counts and a checksum.
//!
//! Import is destructive for the catalog and both ledgers and keeps user
//! accounts. Records are validated first; the resulting plan is applied in
//! one atomic `replace_catalog` call, so a failed import changes nothing.

use crate::ledger::Ledger;
use crate::primitives::{
    BACKUP_MAGIC, BACKUP_VERSION, DEFAULT_AWARD_STARS, DEFAULT_LANG, EXPORT_FORMAT,
    EXPORT_VERSION, MAX_IMPORT_RECORDS, MIN_REWARD_COST,
};
use crate::store::{
    CatalogSnapshot, LedgerStore, SnapshotReason, SnapshotRedemption, SnapshotReward, SnapshotStar,
};
use crate::translation::{resolve_award_reason, validate_lang, validate_text};
use crate::{LedgerError, NewReason, NewReward, ReasonId, RewardId, TranslationOwner, UserId};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

// =============================================================================
// DOCUMENT SCHEMA
// =============================================================================

fn default_stars() -> i64 {
    DEFAULT_AWARD_STARS
}

/// A user's exported profile. Password hashes are never exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReasonRecord {
    pub key: String,
    #[serde(default = "default_stars")]
    pub stars: i64,
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    /// Missing in older documents; import then falls back to `exported_at`.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewardRecord {
    pub key: String,
    pub cost: i64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub adult_only: bool,
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// An award, denormalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StarRecord {
    pub username: String,
    #[serde(default)]
    pub reason_key: Option<String>,
    #[serde(default)]
    pub reason_text: Option<String>,
    /// English display text at export time. Informational.
    #[serde(default)]
    pub reason: String,
    pub stars: i64,
    #[serde(default)]
    pub awarded_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A redemption, denormalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedemptionRecord {
    pub username: String,
    pub reward_key: String,
    /// `None` keeps the cost floating with the reward's price.
    #[serde(default)]
    pub cost: Option<i64>,
    /// Price charged at export time. Informational.
    #[serde(default)]
    pub effective_cost: i64,
    pub created_at: DateTime<Utc>,
}

/// A complete export of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportDocument {
    pub format: String,
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub reasons: Vec<ReasonRecord>,
    #[serde(default)]
    pub rewards: Vec<RewardRecord>,
    #[serde(default)]
    pub stars: Vec<StarRecord>,
    #[serde(default)]
    pub redemptions: Vec<RedemptionRecord>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl ExportDocument {
    /// An empty document of the current format.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            format: EXPORT_FORMAT.to_string(),
            version: EXPORT_VERSION,
            exported_at: Utc::now(),
            users: Vec::new(),
            reasons: Vec::new(),
            rewards: Vec::new(),
            stars: Vec::new(),
            redemptions: Vec::new(),
            settings: BTreeMap::new(),
        }
    }

    fn validate_header(&self) -> Result<(), LedgerError> {
        if self.format != EXPORT_FORMAT {
            return Err(LedgerError::InvalidInput(format!(
                "unknown document format '{}'",
                self.format
            )));
        }
        if self.version == 0 || self.version > EXPORT_VERSION {
            return Err(LedgerError::InvalidInput(format!(
                "unsupported document version {}",
                self.version
            )));
        }
        Ok(())
    }
}

// =============================================================================
// IMPORT MODE & REPORT
// =============================================================================

/// How invalid records are handled on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Skip invalid records and report them.
    #[default]
    BestEffort,
    /// Reject the whole import on the first invalid record.
    Atomic,
}

/// A record left out of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub section: String,
    pub index: usize,
    pub reason: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub users: usize,
    pub reasons: usize,
    pub rewards: usize,
    pub stars: usize,
    pub redemptions: usize,
    pub settings: usize,
    pub skipped: Vec<SkippedRecord>,
}

/// Collects rejected records according to the import mode.
struct Rejections {
    mode: ImportMode,
    skipped: Vec<SkippedRecord>,
}

impl Rejections {
    fn reject(
        &mut self,
        section: &'static str,
        index: usize,
        error: LedgerError,
    ) -> Result<(), LedgerError> {
        match self.mode {
            ImportMode::Atomic => Err(error),
            ImportMode::BestEffort => {
                warn!(section, index, error = %error, "import record skipped");
                self.skipped.push(SkippedRecord {
                    section: section.to_string(),
                    index,
                    reason: error.to_string(),
                });
                Ok(())
            }
        }
    }
}

fn check_section_len(section: &str, len: usize) -> Result<(), LedgerError> {
    if len > MAX_IMPORT_RECORDS {
        return Err(LedgerError::InvalidInput(format!(
            "section '{}' has {} records, maximum is {}",
            section, len, MAX_IMPORT_RECORDS
        )));
    }
    Ok(())
}

fn check_translations(langs: &BTreeMap<String, String>) -> Result<(), LedgerError> {
    for (lang, text) in langs {
        validate_lang(lang)?;
        validate_text(text)?;
    }
    Ok(())
}

// =============================================================================
// EXPORT
// =============================================================================

impl<S: LedgerStore> Ledger<S> {
    /// Snapshot the whole store as a document.
    pub fn export_document(&self) -> Result<ExportDocument, LedgerError> {
        let store = self.store();
        let users = store.users()?;
        let usernames: BTreeMap<UserId, String> =
            users.iter().map(|u| (u.id, u.username.clone())).collect();

        let mut doc = ExportDocument::empty();

        for user in &users {
            doc.users.push(UserRecord {
                username: user.username.clone(),
                is_admin: user.is_admin,
                translations: store.translations(TranslationOwner::User(user.id))?,
            });
        }

        let mut reason_keys: BTreeMap<ReasonId, String> = BTreeMap::new();
        for reason in store.reasons()? {
            doc.reasons.push(ReasonRecord {
                key: reason.key.clone(),
                stars: reason.default_stars,
                translations: store.translations(TranslationOwner::Reason(reason.id))?,
                created_at: Some(reason.created_at),
            });
            reason_keys.insert(reason.id, reason.key);
        }

        let mut reward_keys: BTreeMap<RewardId, (String, i64)> = BTreeMap::new();
        for reward in store.rewards()? {
            doc.rewards.push(RewardRecord {
                key: reward.key.clone(),
                cost: reward.cost,
                icon: reward.icon.clone(),
                adult_only: reward.adult_only,
                translations: store.translations(TranslationOwner::Reward(reward.id))?,
                created_at: Some(reward.created_at),
            });
            reward_keys.insert(reward.id, (reward.key, reward.cost));
        }

        for star in store.stars()? {
            let Some(username) = usernames.get(&star.user) else {
                continue;
            };
            doc.stars.push(StarRecord {
                username: username.clone(),
                reason_key: star.reason.and_then(|id| reason_keys.get(&id).cloned()),
                reason: resolve_award_reason(store, &star, DEFAULT_LANG),
                reason_text: star.reason_text,
                stars: star.stars,
                awarded_by: star.awarded_by.and_then(|id| usernames.get(&id).cloned()),
                created_at: star.created_at,
            });
        }

        for r in store.redemptions()? {
            let (Some(username), Some((reward_key, current))) =
                (usernames.get(&r.user), reward_keys.get(&r.reward))
            else {
                continue;
            };
            doc.redemptions.push(RedemptionRecord {
                username: username.clone(),
                reward_key: reward_key.clone(),
                cost: r.cost,
                effective_cost: r.cost.unwrap_or(*current),
                created_at: r.created_at,
            });
        }

        doc.settings = store.settings()?;
        Ok(doc)
    }

    /// Export the store as pretty-printed JSON.
    pub fn export_json(&self) -> Result<String, LedgerError> {
        let doc = self.export_document()?;
        serde_json::to_string_pretty(&doc).map_err(|e| LedgerError::SerializationError(e.to_string()))
    }

    /// Export the store as a binary backup.
    pub fn export_backup(&self) -> Result<Vec<u8>, LedgerError> {
        encode_backup(&self.export_document()?)
    }
}

// =============================================================================
// IMPORT
// =============================================================================

impl<S: LedgerStore> Ledger<S> {
    /// Replace the catalog and ledgers with the content of `doc`.
    ///
    /// Existing accounts are kept. Records naming an unknown local user are
    /// skipped (best effort) or reject the import (atomic).
    pub fn import_document(
        &mut self,
        doc: &ExportDocument,
        mode: ImportMode,
    ) -> Result<ImportReport, LedgerError> {
        self.import_checked(doc, Rejections {
            mode,
            skipped: Vec::new(),
        })
    }

    /// Parse and import a JSON document.
    ///
    /// Each record is decoded on its own, so in best-effort mode a malformed
    /// record only costs that record.
    pub fn import_json(&mut self, json: &str, mode: ImportMode) -> Result<ImportReport, LedgerError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| LedgerError::InvalidInput(format!("invalid JSON: {e}")))?;
        let serde_json::Value::Object(mut root) = value else {
            return Err(LedgerError::InvalidInput(
                "document must be a JSON object".into(),
            ));
        };

        if let Some(unknown) = root.keys().find(|k| !DOCUMENT_FIELDS.contains(&k.as_str())) {
            return Err(LedgerError::InvalidInput(format!(
                "unknown document field '{}'",
                unknown
            )));
        }

        let mut rejections = Rejections {
            mode,
            skipped: Vec::new(),
        };
        let mut doc = ExportDocument::empty();
        doc.format = required_field(&mut root, "format")?;
        doc.version = required_field(&mut root, "version")?;
        doc.exported_at = required_field(&mut root, "exported_at")?;
        doc.users = decode_section(&mut root, "users", &mut rejections)?;
        doc.reasons = decode_section(&mut root, "reasons", &mut rejections)?;
        doc.rewards = decode_section(&mut root, "rewards", &mut rejections)?;
        doc.stars = decode_section(&mut root, "stars", &mut rejections)?;
        doc.redemptions = decode_section(&mut root, "redemptions", &mut rejections)?;
        if let Some(settings) = root.remove("settings") {
            doc.settings = serde_json::from_value(settings)
                .map_err(|e| LedgerError::InvalidInput(format!("settings: {e}")))?;
        }

        self.import_checked(&doc, rejections)
    }

    /// Import a binary backup.
    pub fn import_backup(&mut self, bytes: &[u8], mode: ImportMode) -> Result<ImportReport, LedgerError> {
        let doc = decode_backup(bytes)?;
        self.import_document(&doc, mode)
    }

    fn import_checked(
        &mut self,
        doc: &ExportDocument,
        mut rejections: Rejections,
    ) -> Result<ImportReport, LedgerError> {
        doc.validate_header()?;
        check_section_len("users", doc.users.len())?;
        check_section_len("reasons", doc.reasons.len())?;
        check_section_len("rewards", doc.rewards.len())?;
        check_section_len("stars", doc.stars.len())?;
        check_section_len("redemptions", doc.redemptions.len())?;

        let snapshot = self.plan_import(doc, &mut rejections)?;
        let mut report = ImportReport {
            users: snapshot.user_translations.len(),
            reasons: snapshot.reasons.len(),
            rewards: snapshot.rewards.len(),
            stars: snapshot.stars.len(),
            redemptions: snapshot.redemptions.len(),
            settings: snapshot.settings.len(),
            skipped: Vec::new(),
        };
        self.store_mut().replace_catalog(snapshot)?;
        report.skipped = rejections.skipped;

        info!(
            reasons = report.reasons,
            rewards = report.rewards,
            stars = report.stars,
            redemptions = report.redemptions,
            skipped = report.skipped.len(),
            "import applied"
        );
        Ok(report)
    }

    /// Validate every record and stage the replacement content.
    fn plan_import(
        &self,
        doc: &ExportDocument,
        rejections: &mut Rejections,
    ) -> Result<CatalogSnapshot, LedgerError> {
        let local: BTreeMap<String, UserId> = self
            .store()
            .users()?
            .into_iter()
            .map(|u| (u.username, u.id))
            .collect();
        let lookup_user = |name: &str| {
            local
                .get(name)
                .copied()
                .ok_or_else(|| LedgerError::UserNotFound(name.to_string()))
        };

        let mut snapshot = CatalogSnapshot::default();

        for (index, record) in doc.users.iter().enumerate() {
            let checked = lookup_user(&record.username)
                .and_then(|id| check_translations(&record.translations).map(|()| id));
            match checked {
                Ok(id) => {
                    snapshot
                        .user_translations
                        .insert(id, record.translations.clone());
                }
                Err(e) => rejections.reject("users", index, e)?,
            }
        }

        let mut reason_index: BTreeMap<&str, usize> = BTreeMap::new();
        for (index, record) in doc.reasons.iter().enumerate() {
            let checked = if record.key.is_empty() {
                Err(LedgerError::InvalidInput("reason key is empty".into()))
            } else if reason_index.contains_key(record.key.as_str()) {
                Err(LedgerError::Conflict(format!("duplicate reason key '{}'", record.key)))
            } else {
                check_translations(&record.translations)
            };
            match checked {
                Ok(()) => {
                    reason_index.insert(record.key.as_str(), snapshot.reasons.len());
                    snapshot.reasons.push(SnapshotReason {
                        reason: NewReason {
                            key: record.key.clone(),
                            default_stars: record.stars.max(DEFAULT_AWARD_STARS),
                            created_at: record.created_at.unwrap_or(doc.exported_at),
                        },
                        translations: record.translations.clone(),
                    });
                }
                Err(e) => rejections.reject("reasons", index, e)?,
            }
        }

        let mut reward_index: BTreeMap<&str, usize> = BTreeMap::new();
        for (index, record) in doc.rewards.iter().enumerate() {
            let checked = if record.key.is_empty() {
                Err(LedgerError::InvalidInput("reward key is empty".into()))
            } else if reward_index.contains_key(record.key.as_str()) {
                Err(LedgerError::Conflict(format!("duplicate reward key '{}'", record.key)))
            } else {
                check_translations(&record.translations)
            };
            match checked {
                Ok(()) => {
                    reward_index.insert(record.key.as_str(), snapshot.rewards.len());
                    snapshot.rewards.push(SnapshotReward {
                        reward: NewReward {
                            key: record.key.clone(),
                            cost: record.cost.max(MIN_REWARD_COST),
                            icon: record.icon.clone(),
                            adult_only: record.adult_only,
                            created_at: record.created_at.unwrap_or(doc.exported_at),
                        },
                        translations: record.translations.clone(),
                    });
                }
                Err(e) => rejections.reject("rewards", index, e)?,
            }
        }

        for (index, record) in doc.stars.iter().enumerate() {
            let user = match lookup_user(&record.username) {
                Ok(id) if record.stars > 0 => id,
                Ok(_) => {
                    let e = LedgerError::InvalidInput(format!(
                        "award of {} stars is not positive",
                        record.stars
                    ));
                    rejections.reject("stars", index, e)?;
                    continue;
                }
                Err(e) => {
                    rejections.reject("stars", index, e)?;
                    continue;
                }
            };
            let reason = record
                .reason_key
                .as_deref()
                .and_then(|key| reason_index.get(key).copied());
            // An unknown reason key keeps the award with its text only.
            let reason_text = match (&record.reason_text, reason) {
                (Some(text), _) => Some(text.clone()),
                (None, None) if !record.reason.is_empty() => Some(record.reason.clone()),
                (None, _) => None,
            };
            snapshot.stars.push(SnapshotStar {
                user,
                reason,
                reason_text,
                stars: record.stars,
                awarded_by: record
                    .awarded_by
                    .as_deref()
                    .and_then(|name| local.get(name).copied()),
                created_at: record.created_at,
            });
        }

        for (index, record) in doc.redemptions.iter().enumerate() {
            let checked = lookup_user(&record.username).and_then(|user| {
                let reward = reward_index.get(record.reward_key.as_str()).copied().ok_or_else(|| {
                    LedgerError::InvalidInput(format!("unknown reward key '{}'", record.reward_key))
                })?;
                match record.cost {
                    Some(cost) if cost < MIN_REWARD_COST => Err(LedgerError::InvalidInput(
                        format!("redemption cost {} is not positive", cost),
                    )),
                    _ => Ok((user, reward)),
                }
            });
            match checked {
                Ok((user, reward)) => snapshot.redemptions.push(SnapshotRedemption {
                    user,
                    reward,
                    cost: record.cost,
                    created_at: record.created_at,
                }),
                Err(e) => rejections.reject("redemptions", index, e)?,
            }
        }

        for (key, value) in &doc.settings {
            if key.trim().is_empty() {
                continue;
            }
            snapshot.settings.insert(key.clone(), value.clone());
        }

        Ok(snapshot)
    }
}

/// Top-level fields of `ExportDocument`.
const DOCUMENT_FIELDS: [&str; 9] = [
    "format",
    "version",
    "exported_at",
    "users",
    "reasons",
    "rewards",
    "stars",
    "redemptions",
    "settings",
];

fn required_field<T: DeserializeOwned>(
    root: &mut serde_json::Map<String, serde_json::Value>,
    field: &'static str,
) -> Result<T, LedgerError> {
    let value = root
        .remove(field)
        .ok_or_else(|| LedgerError::InvalidInput(format!("missing field '{}'", field)))?;
    serde_json::from_value(value).map_err(|e| LedgerError::InvalidInput(format!("{field}: {e}")))
}

/// Decode one array section of a JSON document record by record.
fn decode_section<T: DeserializeOwned>(
    root: &mut serde_json::Map<String, serde_json::Value>,
    section: &'static str,
    rejections: &mut Rejections,
) -> Result<Vec<T>, LedgerError> {
    let Some(value) = root.remove(section) else {
        return Ok(Vec::new());
    };
    let serde_json::Value::Array(items) = value else {
        return Err(LedgerError::InvalidInput(format!(
            "section '{}' must be an array",
            section
        )));
    };
    check_section_len(section, items.len())?;

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value(item) {
            Ok(record) => records.push(record),
            Err(e) => rejections.reject(
                section,
                index,
                LedgerError::InvalidInput(format!("malformed record: {e}")),
            )?,
        }
    }
    Ok(records)
}

// =============================================================================
// BINARY BACKUP
// =============================================================================

/// Header of the binary backup format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupHeader {
    /// Magic bytes to identify the format.
    pub magic: [u8; 4],
    /// Format version for compatibility.
    pub version: u8,
    pub user_count: u64,
    pub reason_count: u64,
    pub reward_count: u64,
    pub star_count: u64,
    pub redemption_count: u64,
    /// FNV-1a checksum of the payload bytes.
    pub checksum: u64,
}

impl BackupHeader {
    fn for_document(doc: &ExportDocument, checksum: u64) -> Self {
        Self {
            magic: *BACKUP_MAGIC,
            version: BACKUP_VERSION,
            user_count: doc.users.len() as u64,
            reason_count: doc.reasons.len() as u64,
            reward_count: doc.rewards.len() as u64,
            star_count: doc.stars.len() as u64,
            redemption_count: doc.redemptions.len() as u64,
            checksum,
        }
    }

    /// Validate magic and version.
    ///
    /// Error messages are kept generic on purpose.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if &self.magic != BACKUP_MAGIC {
            return Err(LedgerError::SerializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != BACKUP_VERSION {
            return Err(LedgerError::SerializationError(
                "Unsupported file version".to_string(),
            ));
        }
        let limit = MAX_IMPORT_RECORDS as u64;
        let counts = [
            self.user_count,
            self.reason_count,
            self.reward_count,
            self.star_count,
            self.redemption_count,
        ];
        if counts.iter().any(|c| *c > limit) {
            return Err(LedgerError::SerializationError(format!(
                "Record count exceeds maximum allowed {}",
                limit
            )));
        }
        Ok(())
    }
}

/// Deterministic 64-bit FNV-1a checksum.
///
/// Detects accidental corruption. It is not a cryptographic hash; see
/// `backup_hash` for that.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

/// Encode a document as `[header_len: u32 LE] [header] [document]`.
pub fn encode_backup(doc: &ExportDocument) -> Result<Vec<u8>, LedgerError> {
    let data_bytes = postcard::to_allocvec(doc)
        .map_err(|e| LedgerError::SerializationError(format!("Data: {}", e)))?;
    let header = BackupHeader::for_document(doc, checksum(&data_bytes));
    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| LedgerError::SerializationError(format!("Header: {}", e)))?;
    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| LedgerError::SerializationError("Header too large".to_string()))?;

    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&header_len.to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);
    Ok(result)
}

/// Decode and verify a binary backup.
pub fn decode_backup(data: &[u8]) -> Result<ExportDocument, LedgerError> {
    let (len_bytes, rest) = data
        .split_first_chunk::<4>()
        .ok_or_else(|| LedgerError::SerializationError("Data too short".to_string()))?;
    let header_len = u32::from_le_bytes(*len_bytes) as usize;
    if rest.len() < header_len {
        return Err(LedgerError::SerializationError(
            "Data too short for header".to_string(),
        ));
    }
    let (header_bytes, data_bytes) = rest.split_at(header_len);

    let header: BackupHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| LedgerError::SerializationError(format!("Header: {}", e)))?;
    header.validate()?;

    let computed = checksum(data_bytes);
    if computed != header.checksum {
        return Err(LedgerError::SerializationError(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }

    let doc: ExportDocument = postcard::from_bytes(data_bytes)
        .map_err(|e| LedgerError::SerializationError(format!("Data: {}", e)))?;
    if doc.stars.len() as u64 != header.star_count
        || doc.redemptions.len() as u64 != header.redemption_count
        || doc.reasons.len() as u64 != header.reason_count
        || doc.rewards.len() as u64 != header.reward_count
        || doc.users.len() as u64 != header.user_count
    {
        return Err(LedgerError::SerializationError(
            "Record count mismatch".to_string(),
        ));
    }
    Ok(doc)
}

/// BLAKE3 hex digest of a backup file.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn backup_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================
