//! # Key Generator
//!
//! Turns free-text labels into stable machine identifiers for reasons and
//! rewards.
//!
//! Keys are identifiers, not display text: only ASCII letters and digits
//! survive, spaces become `_`, everything else is dropped. Labels in
//! non-Latin scripts therefore all collapse to the placeholder key and are
//! told apart by the numeric suffix from [`uniquify`].

use crate::primitives::KEY_PLACEHOLDER;
use std::convert::Infallible;

/// Derive a base key from a label.
///
/// No case folding and no Unicode normalization is applied.
#[must_use]
pub fn make_key(label: &str) -> String {
    let key: String = label
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c)
            } else if c == ' ' {
                Some('_')
            } else {
                None
            }
        })
        .collect();

    if key.is_empty() {
        KEY_PLACEHOLDER.to_string()
    } else {
        key
    }
}

/// Make `base` unique within a scope.
///
/// `taken` reports whether a candidate already exists in the target catalog.
/// Returns `base` itself when free, otherwise the first free `base_2`,
/// `base_3`, ...
pub fn uniquify<F>(base: &str, taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    match try_uniquify(base, |k| Ok::<_, Infallible>(taken(k))) {
        Ok(key) => key,
        Err(never) => match never {},
    }
}

/// [`uniquify`] with a fallible lookup, for checks that hit the store.
pub fn try_uniquify<F, E>(base: &str, mut taken: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    let mut candidate = base.to_string();
    let mut suffix: u64 = 2;
    while taken(&candidate)? {
        candidate = format!("{}_{}", base, suffix);
        suffix = suffix.saturating_add(1);
    }
    Ok(candidate)
}

// =============================================================================
// TESTS
// =============================================================================
