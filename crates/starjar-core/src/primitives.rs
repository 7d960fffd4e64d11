//! # Engine Primitives
//!
//! Hardcoded runtime constants for the Starjar engine.
//! These are compiled into the binary and immutable at runtime.

/// Language used as the second step of every fallback chain.
pub const DEFAULT_LANG: &str = "en";

/// Key substituted when a label contains no usable ASCII characters.
pub const KEY_PLACEHOLDER: &str = "custom";

/// Star count used when neither an override nor a positive reason value exists.
pub const DEFAULT_AWARD_STARS: i64 = 1;

/// Lowest cost a reward may carry. Lower values are clamped up to this.
pub const MIN_REWARD_COST: i64 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length (bytes) of a reason text, reward name, or translation.
pub const MAX_TEXT_LENGTH: usize = 512;

/// Maximum length (bytes) of a language code.
pub const MAX_LANG_LENGTH: usize = 16;

/// Maximum length (bytes) of a username.
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Minimum length (characters) of a password.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Default page size for redemption listings.
pub const DEFAULT_REDEMPTION_LIMIT: usize = 50;

/// Upper bound for redemption listings. Export is not limited.
pub const MAX_REDEMPTION_LIMIT: usize = 10_000;

// =============================================================================
// EXPORT FORMATS
// =============================================================================

/// `format` tag of JSON export documents.
pub const EXPORT_FORMAT: &str = "starjar-export";

/// Current JSON export document version.
pub const EXPORT_VERSION: u32 = 1;

/// Magic bytes of the binary backup format.
pub const BACKUP_MAGIC: &[u8; 4] = b"SJAR";

/// Current binary backup format version.
pub const BACKUP_VERSION: u8 = 1;

/// Maximum number of records accepted per section on import.
///
/// Guards against memory exhaustion from corrupted or hostile documents.
pub const MAX_IMPORT_RECORDS: usize = 1_000_000;
