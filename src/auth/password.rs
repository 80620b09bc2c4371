use std::sync::LazyLock;

use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use regex::Regex;
use tokio::task;

use crate::config::AuthConfig;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 64;

static UPPER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]").unwrap());
static LOWER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]").unwrap());
static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").unwrap());
static SYMBOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9\s]").unwrap());

/// 8-64 characters with at least one uppercase letter, one lowercase letter,
/// one digit and one symbol.
pub fn validate_password_policy(password: &str) -> Result<(), String> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(format!(
            "Password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        ));
    }

    let checks: [(&Regex, &str); 4] = [
        (&UPPER, "an uppercase letter"),
        (&LOWER, "a lowercase letter"),
        (&DIGIT, "a digit"),
        (&SYMBOL, "a special character"),
    ];

    for (pattern, description) in checks {
        if !pattern.is_match(password) {
            return Err(format!("Password must contain {description}"));
        }
    }

    Ok(())
}

fn hasher(config: &AuthConfig) -> Result<Argon2<'static>> {
    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password with Argon2id.
///
/// Runs on the blocking pool because hashing is CPU-bound.
pub async fn hash_password(password: &str, config: &AuthConfig) -> Result<String> {
    let password = password.to_string();
    let argon2 = hasher(config)?;

    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))
    })
    .await
    .context("Password hashing task panicked")?
}

/// Verify a password against a stored PHC string. Parameters are read from
/// the hash itself so older hashes keep verifying after a config change.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();

    task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        Ok::<bool, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> AuthConfig {
        AuthConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_password_policy_accepts_strong_password() {
        assert!(validate_password_policy("Abcdef1!").is_ok());
        assert!(validate_password_policy("Correct-Horse-9-Battery").is_ok());
    }

    #[test]
    fn test_password_policy_rejects_weak_passwords() {
        assert!(validate_password_policy("Ab1!").is_err());
        assert!(validate_password_policy(&format!("Ab1!{}", "a".repeat(61))).is_err());
        assert!(validate_password_policy("abcdef1!").is_err());
        assert!(validate_password_policy("ABCDEF1!").is_err());
        assert!(validate_password_policy("Abcdefg!").is_err());
        assert!(validate_password_policy("Abcdefg1").is_err());
    }

    #[tokio::test]
    async fn test_hash_then_verify() {
        let config = fast_config();
        let hash = hash_password("Secret12!", &config).await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Secret12!", &hash).await.unwrap());
        assert!(!verify_password("Secret12?", &hash).await.unwrap());
    }
}
