use std::sync::Arc;

use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::config::HashConfig;

/// Salted one-way password hashing.
///
/// New hashes are Argon2id PHC strings carrying their own cost parameters,
/// so `verify` needs nothing but the stored string. Hashes written by the
/// previous bcrypt-based deployment still verify.
#[derive(Clone)]
pub struct Passwords {
    params: Params,
    // Hash of a throwaway password at the configured cost, verified against
    // when a login names an unknown email.
    dummy: Arc<str>,
}

impl Passwords {
    pub fn new(cfg: &HashConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        let mut passwords = Self {
            params,
            dummy: Arc::from(""),
        };
        let dummy = passwords
            .hash("not-a-real-password")
            .context("compute dummy password hash")?;
        passwords.dummy = Arc::from(dummy);
        Ok(passwords)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    pub fn verify(&self, plain: &str, stored: &str) -> bool {
        if is_bcrypt(stored) {
            return bcrypt::verify(plain, stored).unwrap_or_else(|e| {
                warn!(error = %e, "malformed bcrypt hash");
                false
            });
        }

        let parsed = match PasswordHash::new(stored) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "malformed password hash");
                return false;
            }
        };
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    /// Burns one verification's worth of work; the result is discarded.
    pub fn verify_dummy(&self, plain: &str) {
        let _ = self.verify(plain, &self.dummy);
    }

    pub async fn hash_blocking(&self, plain: String) -> anyhow::Result<String> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.hash(&plain))
            .await
            .context("password hashing task")?
    }

    pub async fn verify_blocking(&self, plain: String, stored: String) -> bool {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.verify(&plain, &stored))
            .await
            .unwrap_or(false)
    }

    pub async fn verify_dummy_blocking(&self, plain: String) {
        let this = self.clone();
        let _ = tokio::task::spawn_blocking(move || this.verify_dummy(&plain)).await;
    }
}

fn is_bcrypt(stored: &str) -> bool {
    ["$2a$", "$2b$", "$2y$", "$2x$"]
        .iter()
        .any(|prefix| stored.starts_with(prefix))
}

#[cfg(test)]
pub(crate) fn cheap() -> Passwords {
    Passwords::new(&HashConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    })
    .expect("cheap argon2 params are valid")
}
