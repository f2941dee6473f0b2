//! Built-in user database authentication.
//!
//! Passwords are stored as salted SHA-256 digests and compared in constant
//! time. Successful verifications are cached by `(login, password digest)`
//! so repeated requests skip the salted hash. Every change to a user record
//! gives it a new generation; a cached verification only counts while the
//! record still carries the generation it was made against.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use quick_cache::sync::Cache;
use sha2::{Digest, Sha256};
use streamgate_core::Principal;
use subtle::ConstantTimeEq;

use crate::security::authentication::{AuthenticationError, AuthenticationProvider};
use crate::security::credentials::Credentials;

const SALT_LEN: usize = 16;

struct UserRecord {
    roles: Vec<String>,
    salt: [u8; SALT_LEN],
    digest: [u8; 32],
    disabled: bool,
    generation: u64,
}

impl UserRecord {
    fn new(password: &str, roles: Vec<String>, generation: u64) -> Self {
        let salt: [u8; SALT_LEN] = rand::random();
        Self {
            roles,
            digest: salted_digest(&salt, password),
            salt,
            disabled: false,
            generation,
        }
    }

    fn verify(&self, password: &str) -> bool {
        let candidate = salted_digest(&self.salt, password);
        self.digest[..].ct_eq(&candidate[..]).into()
    }
}

fn salted_digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Authenticates `Basic` credentials against an in-memory user table.
pub struct InternalAuthenticationProvider {
    users: DashMap<String, UserRecord>,
    verified: Cache<(String, [u8; 32]), (u64, Principal)>,
    generations: AtomicU64,
}

impl InternalAuthenticationProvider {
    #[must_use]
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            users: DashMap::new(),
            verified: Cache::new(cache_capacity.max(1)),
            generations: AtomicU64::new(0),
        }
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Create or replace a user.
    pub fn upsert_user(&self, login: &str, password: &str, roles: Vec<String>) {
        let record = UserRecord::new(password, roles, self.next_generation());
        self.users.insert(login.to_string(), record);
    }

    /// Enable or disable a user. Returns `false` if the user does not exist.
    pub fn set_disabled(&self, login: &str, disabled: bool) -> bool {
        let generation = self.next_generation();
        self.users
            .get_mut(login)
            .map(|mut record| {
                record.disabled = disabled;
                record.generation = generation;
            })
            .is_some()
    }

    pub fn remove_user(&self, login: &str) -> bool {
        self.users.remove(login).is_some()
    }

    fn verify(&self, username: &str, password: &str) -> Result<Principal, AuthenticationError> {
        let key: (String, [u8; 32]) =
            (username.to_string(), Sha256::digest(password.as_bytes()).into());
        let record = self
            .users
            .get(username)
            .ok_or(AuthenticationError::InvalidCredentials)?;
        if let Some((generation, principal)) = self.verified.get(&key) {
            if generation == record.generation {
                return Ok(principal);
            }
        }

        if !record.verify(password) {
            return Err(AuthenticationError::InvalidCredentials);
        }
        if record.disabled {
            return Err(AuthenticationError::AccountDisabled);
        }

        let principal = Principal::authenticated(username, record.roles.clone());
        self.verified.insert(key, (record.generation, principal.clone()));
        Ok(principal)
    }
}

#[async_trait]
impl AuthenticationProvider for InternalAuthenticationProvider {
    fn name(&self) -> &'static str {
        "internal"
    }

    async fn authenticate(&self, credentials: Credentials) -> Result<Principal, AuthenticationError> {
        match credentials {
            Credentials::Basic { username, password } => {
                let result = self.verify(&username, &password);
                if let Err(ref e) = result {
                    tracing::debug!(user = %username, error = %e, "authentication failed");
                }
                result
            }
            Credentials::Bearer(_) => Err(AuthenticationError::UnsupportedScheme("Bearer".into())),
        }
    }
}
