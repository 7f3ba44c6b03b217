//! User accounts and credential verification.
//!
//! Accounts are held in an injected in-memory repository so tests can seed
//! their own fixtures. Passwords are stored as Argon2 hashes; one-time codes
//! for the mobile and email grants live in the captcha store instead.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct UserDetails {
    pub username: String,
    pub password_hash: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub authorities: Vec<String>,
    pub enabled: bool,
    pub account_non_locked: bool,
    pub account_non_expired: bool,
    pub credentials_non_expired: bool,
}

impl UserDetails {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            password_hash: None,
            mobile: None,
            email: None,
            authorities: Vec::new(),
            enabled: true,
            account_non_locked: true,
            account_non_expired: true,
            credentials_non_expired: true,
        }
    }

    pub fn with_password_hash(mut self, hash: &str) -> Self {
        self.password_hash = Some(hash.to_string());
        self
    }

    pub fn with_mobile(mut self, mobile: &str) -> Self {
        self.mobile = Some(mobile.to_string());
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_authorities(mut self, authorities: &[&str]) -> Self {
        self.authorities = authorities.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Whether the account may authenticate at all. Checked after the
    /// credential itself so callers can keep failure responses uniform.
    pub fn account_status_ok(&self) -> bool {
        self.enabled
            && self.account_non_locked
            && self.account_non_expired
            && self.credentials_non_expired
    }

    /// Verify a cleartext password against the stored Argon2 hash.
    pub fn verify_password(&self, password: &str) -> bool {
        let Some(hash) = &self.password_hash else {
            return false;
        };
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Hash a cleartext password for storage.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// User lookup by username, mobile number, or email address.
#[derive(Clone, Default)]
pub struct UserRepository {
    users: Arc<RwLock<HashMap<String, UserDetails>>>,
}

impl UserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: UserDetails) {
        self.users.write().await.insert(user.username.clone(), user);
    }

    /// Find the account matching `identifier` as a username, mobile number,
    /// or email address, in that order.
    pub async fn find_by_identifier(&self, identifier: &str) -> Option<UserDetails> {
        let users = self.users.read().await;
        if let Some(user) = users.get(identifier) {
            return Some(user.clone());
        }
        users
            .values()
            .find(|user| {
                user.mobile.as_deref() == Some(identifier)
                    || user.email.as_deref() == Some(identifier)
            })
            .cloned()
    }
}
