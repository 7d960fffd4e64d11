//! # Translation Resolution
//!
//! Per-entity display text with a deterministic fallback chain:
//!
//! 1. the requested language, if present and non-empty
//! 2. English, if present and non-empty
//! 3. the entity-specific default: the username for users, `""` otherwise
//!
//! Resolution never fails. Store errors are logged and treated as a missing
//! translation, so a broken row degrades to the next fallback step.

use crate::ledger::Ledger;
use crate::primitives::{DEFAULT_LANG, MAX_LANG_LENGTH, MAX_TEXT_LENGTH};
use crate::store::LedgerStore;
use crate::{LedgerError, Star, TranslationOwner};
use std::collections::BTreeMap;
use tracing::warn;

/// Look up one translation, treating empty text and store errors as absent.
fn lookup<S: LedgerStore + ?Sized>(store: &S, owner: TranslationOwner, lang: &str) -> Option<String> {
    match store.translation(owner, lang) {
        Ok(Some(text)) if !text.is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            warn!(?owner, lang, error = %e, "translation lookup failed");
            None
        }
    }
}

/// Entity-specific last fallback.
fn final_fallback<S: LedgerStore + ?Sized>(store: &S, owner: TranslationOwner) -> String {
    match owner {
        TranslationOwner::User(id) => match store.user(id) {
            Ok(Some(user)) => user.username,
            Ok(None) => String::new(),
            Err(e) => {
                warn!(user = id.0, error = %e, "username lookup failed");
                String::new()
            }
        },
        TranslationOwner::Reason(_) | TranslationOwner::Reward(_) => String::new(),
    }
}

/// Resolve the display text of `owner` in `lang`.
pub fn resolve<S: LedgerStore + ?Sized>(store: &S, owner: TranslationOwner, lang: &str) -> String {
    if let Some(text) = lookup(store, owner, lang) {
        return text;
    }
    if lang != DEFAULT_LANG
        && let Some(text) = lookup(store, owner, DEFAULT_LANG)
    {
        return text;
    }
    final_fallback(store, owner)
}

/// Display text of an award's reason.
///
/// Falls back from the catalog translation to the free-text snapshot, and
/// finally to `#<id>` for a reason that has since been deleted.
pub fn resolve_award_reason<S: LedgerStore + ?Sized>(store: &S, star: &Star, lang: &str) -> String {
    if let Some(reason) = star.reason {
        let text = resolve(store, TranslationOwner::Reason(reason), lang);
        if !text.is_empty() {
            return text;
        }
    }
    match (&star.reason_text, star.reason) {
        (Some(text), _) if !text.is_empty() => text.clone(),
        (_, Some(reason)) => format!("#{}", reason.0),
        _ => String::new(),
    }
}

/// Reject empty or oversized language codes.
pub(crate) fn validate_lang(lang: &str) -> Result<(), LedgerError> {
    if lang.is_empty() {
        return Err(LedgerError::InvalidInput("language code is empty".into()));
    }
    if lang.len() > MAX_LANG_LENGTH {
        return Err(LedgerError::InvalidInput(format!(
            "language code longer than {} bytes",
            MAX_LANG_LENGTH
        )));
    }
    Ok(())
}

/// Reject empty or oversized display text.
pub(crate) fn validate_text(text: &str) -> Result<(), LedgerError> {
    if text.trim().is_empty() {
        return Err(LedgerError::InvalidInput("text is empty".into()));
    }
    if text.len() > MAX_TEXT_LENGTH {
        return Err(LedgerError::InvalidInput(format!(
            "text longer than {} bytes",
            MAX_TEXT_LENGTH
        )));
    }
    Ok(())
}

// =============================================================================
// LEDGER OPERATIONS
// =============================================================================

impl<S: LedgerStore> Ledger<S> {
    /// Resolve display text through the fallback chain.
    pub fn display_text(&self, owner: TranslationOwner, lang: &str) -> String {
        resolve(self.store(), owner, lang)
    }

    /// All stored translations of an entity.
    pub fn translations(
        &self,
        owner: TranslationOwner,
    ) -> Result<BTreeMap<String, String>, LedgerError> {
        self.store().translations(owner)
    }

    /// Upsert the text of `owner` in `lang`.
    ///
    /// Fails with a NotFound error if the entity does not exist.
    pub fn set_translation(
        &mut self,
        owner: TranslationOwner,
        lang: &str,
        text: &str,
    ) -> Result<(), LedgerError> {
        validate_lang(lang)?;
        validate_text(text)?;
        self.ensure_owner_exists(owner)?;
        self.store_mut().set_translation(owner, lang, text)
    }

    fn ensure_owner_exists(&self, owner: TranslationOwner) -> Result<(), LedgerError> {
        let exists = match owner {
            TranslationOwner::User(id) => self.store().user(id)?.is_some(),
            TranslationOwner::Reason(id) => self.store().reason(id)?.is_some(),
            TranslationOwner::Reward(id) => self.store().reward(id)?.is_some(),
        };
        if exists {
            Ok(())
        } else {
            Err(match owner {
                TranslationOwner::User(id) => LedgerError::UserIdNotFound(id),
                TranslationOwner::Reason(id) => LedgerError::ReasonNotFound(id),
                TranslationOwner::Reward(id) => LedgerError::RewardNotFound(id),
            })
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::{NewReason, NewUser, ReasonId, StarId, UserId};
    use chrono::Utc;

    fn store_with_user() -> (MemoryStore, UserId) {
        let mut store = MemoryStore::new();
        let user = store
            .insert_user(NewUser {
                username: "theo".into(),
                password_hash: String::new(),
                is_admin: false,
            })
            .expect("insert");
        (store, user.id)
    }

    #[test]
    fn exact_language_wins() {
        let (mut store, id) = store_with_user();
        let owner = TranslationOwner::User(id);
        store.set_translation(owner, "en", "Theo").expect("set");
        store.set_translation(owner, "fr", "Théo").expect("set");
        assert_eq!(resolve(&store, owner, "fr"), "Théo");
    }

    #[test]
    fn falls_back_to_english_then_username() {
        let (mut store, id) = store_with_user();
        let owner = TranslationOwner::User(id);
        assert_eq!(resolve(&store, owner, "fr"), "theo");

        store.set_translation(owner, "en", "Theo").expect("set");
        assert_eq!(resolve(&store, owner, "fr"), "Theo");
    }

    #[test]
    fn empty_translation_is_skipped() {
        let (mut store, id) = store_with_user();
        let owner = TranslationOwner::User(id);
        store.set_translation(owner, "fr", "").expect("set");
        store.set_translation(owner, "en", "Theo").expect("set");
        assert_eq!(resolve(&store, owner, "fr"), "Theo");
    }

    #[test]
    fn catalog_entities_fall_back_to_empty() {
        let store = MemoryStore::new();
        assert_eq!(resolve(&store, TranslationOwner::Reason(ReasonId(9)), "fr"), "");
        assert_eq!(resolve(&store, TranslationOwner::User(UserId(9)), "fr"), "");
    }

    #[test]
    fn award_reason_falls_back_to_snapshot_then_id() {
        let (mut store, user) = store_with_user();
        let reason = store
            .insert_reason(NewReason {
                key: "dishes".into(),
                default_stars: 1,
                created_at: Utc::now(),
            })
            .expect("reason");
        store
            .set_translation(TranslationOwner::Reason(reason.id), "en", "Dishes")
            .expect("set");

        let mut star = Star {
            id: StarId(1),
            user,
            reason: Some(reason.id),
            reason_text: Some("Helped with dishes".into()),
            stars: 1,
            awarded_by: None,
            created_at: Utc::now(),
        };
        assert_eq!(resolve_award_reason(&store, &star, "fr"), "Dishes");

        star.reason = Some(ReasonId(42));
        assert_eq!(resolve_award_reason(&store, &star, "en"), "Helped with dishes");

        star.reason_text = None;
        assert_eq!(resolve_award_reason(&store, &star, "en"), "#42");
    }

    #[test]
    fn set_translation_validates_owner_and_input() {
        let (store, id) = store_with_user();
        let mut ledger = Ledger::new(store);

        ledger
            .set_translation(TranslationOwner::User(id), "zh-CN", "小西")
            .expect("set");
        assert_eq!(ledger.display_text(TranslationOwner::User(id), "zh-CN"), "小西");

        let missing = ledger.set_translation(TranslationOwner::Reason(ReasonId(5)), "en", "x");
        assert!(matches!(missing, Err(LedgerError::ReasonNotFound(_))));

        let empty_lang = ledger.set_translation(TranslationOwner::User(id), "", "x");
        assert!(matches!(empty_lang, Err(LedgerError::InvalidInput(_))));
    }
}
