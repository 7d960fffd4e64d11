//! # User Accounts
//!
//! Account management on top of the store: Argon2id password hashing,
//! credential checks, admin flags, cascading deletion and first-run seeding.

use crate::ledger::Ledger;
use crate::primitives::{MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH};
use crate::store::LedgerStore;
use crate::{Actor, LedgerError, NewUser, User, UserId};
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use tracing::{info, warn};

/// Password given to seeded accounts.
pub const DEFAULT_SEED_PASSWORD: &str = "changeme";

/// An account created by `seed_users`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl SeedUser {
    pub fn new(username: &str, password: &str, is_admin: bool) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            is_admin,
        }
    }
}

/// Two admins and two children, all with the default password.
pub fn default_seed_users() -> Vec<SeedUser> {
    vec![
        SeedUser::new("dad", DEFAULT_SEED_PASSWORD, true),
        SeedUser::new("mom", DEFAULT_SEED_PASSWORD, true),
        SeedUser::new("theo", DEFAULT_SEED_PASSWORD, false),
        SeedUser::new("ray", DEFAULT_SEED_PASSWORD, false),
    ]
}

// =============================================================================
// PASSWORD HASHING
// =============================================================================

/// Hash a password using Argon2id. Returns the PHC string.
pub fn hash_password(password: &str) -> Result<String, LedgerError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LedgerError::InvalidInput(format!("failed to hash password: {e}")))
}

/// Check a password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, LedgerError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| LedgerError::SerializationError(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Random 256-bit session token, hex encoded.
pub fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn validate_username(username: &str) -> Result<(), LedgerError> {
    if username.trim().is_empty() {
        return Err(LedgerError::InvalidInput("username is empty".into()));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(LedgerError::InvalidInput(format!(
            "username longer than {} bytes",
            MAX_USERNAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LedgerError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(LedgerError::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

// =============================================================================
// LEDGER OPERATIONS
// =============================================================================

impl<S: LedgerStore> Ledger<S> {
    /// Create an account. Fails with `Conflict` if the username is taken.
    pub fn create_user(
        &mut self,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<User, LedgerError> {
        validate_username(username)?;
        validate_password(password)?;
        if self.store().user_by_name(username)?.is_some() {
            return Err(LedgerError::Conflict(format!(
                "username '{}' already exists",
                username
            )));
        }
        let user = self.store_mut().insert_user(NewUser {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            is_admin,
        })?;
        info!(user = %user.username, is_admin, "user created");
        Ok(user)
    }

    pub fn user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        self.store().user(id)
    }

    pub fn user_by_name(&self, username: &str) -> Result<Option<User>, LedgerError> {
        self.store().user_by_name(username)
    }

    pub fn users(&self) -> Result<Vec<User>, LedgerError> {
        self.store().users()
    }

    /// Resolve a username to an acting identity.
    pub fn actor(&self, username: &str) -> Result<Actor, LedgerError> {
        self.store()
            .user_by_name(username)?
            .map(|u| Actor::from(&u))
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))
    }

    /// Check a username/password pair.
    ///
    /// Returns `Ok(false)` for an unknown user or a wrong password.
    pub fn verify_credentials(&self, username: &str, password: &str) -> Result<bool, LedgerError> {
        match self.store().user_by_name(username)? {
            Some(user) => verify_password(password, &user.password_hash),
            None => Ok(false),
        }
    }

    /// Check credentials and return the acting identity.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Actor, LedgerError> {
        if self.verify_credentials(username, password)? {
            self.actor(username)
        } else {
            warn!(user = %username, "authentication failed");
            Err(LedgerError::Unauthenticated("invalid credentials".into()))
        }
    }

    pub fn set_password(&mut self, id: UserId, password: &str) -> Result<(), LedgerError> {
        validate_password(password)?;
        let mut user = self
            .store()
            .user(id)?
            .ok_or(LedgerError::UserIdNotFound(id))?;
        user.password_hash = hash_password(password)?;
        self.store_mut().update_user(&user)?;
        info!(user = %user.username, "password changed");
        Ok(())
    }

    pub fn set_admin(&mut self, id: UserId, is_admin: bool) -> Result<(), LedgerError> {
        let mut user = self
            .store()
            .user(id)?
            .ok_or(LedgerError::UserIdNotFound(id))?;
        user.is_admin = is_admin;
        self.store_mut().update_user(&user)?;
        info!(user = %user.username, is_admin, "admin flag changed");
        Ok(())
    }

    /// Delete an account with its translations, awards and redemptions.
    pub fn delete_user(&mut self, id: UserId) -> Result<(), LedgerError> {
        if !self.store_mut().remove_user(id)? {
            return Err(LedgerError::UserIdNotFound(id));
        }
        info!(user = id.0, "user deleted");
        Ok(())
    }

    /// Create the given accounts if no account exists yet.
    ///
    /// Returns the number of accounts created.
    pub fn seed_users(&mut self, users: &[SeedUser]) -> Result<usize, LedgerError> {
        if !self.store().users()?.is_empty() {
            return Ok(0);
        }
        for seed in users {
            self.create_user(&seed.username, &seed.password, seed.is_admin)?;
        }
        info!(count = users.len(), "seeded users");
        Ok(users.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================
