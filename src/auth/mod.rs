//! Credential primitives: password hashing and policy, access tokens,
//! one-time tokens for resets and email verification.

pub mod jwt;
pub mod password;

pub use jwt::{Claims, IssuedToken, JwtError, JwtService};
pub use password::{hash_password, validate_password_policy, verify_password};

/// Opaque single-use token (64 hex characters) for password resets,
/// activation and email verification.
#[must_use]
pub fn generate_one_time_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_time_tokens_are_hex_and_unique() {
        let a = generate_one_time_token();
        let b = generate_one_time_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
