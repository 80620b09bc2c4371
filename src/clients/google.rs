//! Google ID-token verification through Google's `tokeninfo` endpoint, which
//! checks the signature server-side.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Error)]
pub enum GoogleAuthError {
    #[error("Google sign-in is not configured")]
    NotConfigured,

    #[error("Invalid Google credential: {0}")]
    InvalidToken(String),

    #[error("Google verification unavailable: {0}")]
    Upstream(String),
}

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<GoogleIdentity, GoogleAuthError>;
}

/// Fields of interest in a `tokeninfo` response. Google encodes booleans and
/// timestamps as strings here.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    iss: String,
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<String>,
    exp: String,
    name: Option<String>,
}

pub struct GoogleTokenInfoClient {
    client: Client,
    endpoint: String,
    client_id: String,
}

impl GoogleTokenInfoClient {
    #[must_use]
    pub const fn new(client: Client, endpoint: String, client_id: String) -> Self {
        Self {
            client,
            endpoint,
            client_id,
        }
    }
}

fn check_claims(
    info: TokenInfo,
    client_id: &str,
    now: i64,
) -> Result<GoogleIdentity, GoogleAuthError> {
    if !GOOGLE_ISSUERS.contains(&info.iss.as_str()) {
        return Err(GoogleAuthError::InvalidToken("unexpected issuer".to_string()));
    }

    if info.aud != client_id {
        return Err(GoogleAuthError::InvalidToken("audience mismatch".to_string()));
    }

    let exp: i64 = info
        .exp
        .parse()
        .map_err(|_| GoogleAuthError::InvalidToken("malformed expiry".to_string()))?;
    if exp <= now {
        return Err(GoogleAuthError::InvalidToken("token expired".to_string()));
    }

    if info.email_verified.as_deref() != Some("true") {
        return Err(GoogleAuthError::InvalidToken("email not verified".to_string()));
    }

    let email = info
        .email
        .ok_or_else(|| GoogleAuthError::InvalidToken("no email claim".to_string()))?;

    Ok(GoogleIdentity {
        subject: info.sub,
        email: email.to_lowercase(),
        name: info.name,
    })
}

#[async_trait]
impl IdTokenVerifier for GoogleTokenInfoClient {
    async fn verify(&self, credential: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        if self.client_id.is_empty() {
            return Err(GoogleAuthError::NotConfigured);
        }

        let url = Url::parse_with_params(&self.endpoint, &[("id_token", credential)])
            .map_err(|e| GoogleAuthError::Upstream(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GoogleAuthError::Upstream(e.to_string()))?;

        // tokeninfo answers 400 for malformed, expired or forged tokens
        if response.status().is_client_error() {
            return Err(GoogleAuthError::InvalidToken(
                "rejected by Google".to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(GoogleAuthError::Upstream(format!(
                "tokeninfo returned {}",
                response.status()
            )));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| GoogleAuthError::Upstream(e.to_string()))?;

        check_claims(info, &self.client_id, chrono::Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> TokenInfo {
        TokenInfo {
            iss: "https://accounts.google.com".to_string(),
            aud: "client-123".to_string(),
            sub: "1098".to_string(),
            email: Some("Student@mail.utoronto.ca".to_string()),
            email_verified: Some("true".to_string()),
            exp: "2000".to_string(),
            name: Some("Student".to_string()),
        }
    }

    #[test]
    fn test_valid_claims() {
        let identity = check_claims(info(), "client-123", 1000).unwrap();
        assert_eq!(identity.subject, "1098");
        assert_eq!(identity.email, "student@mail.utoronto.ca");
    }

    #[test]
    fn test_rejects_wrong_audience_and_expiry() {
        assert!(check_claims(info(), "other-client", 1000).is_err());
        assert!(check_claims(info(), "client-123", 2000).is_err());
    }

    #[test]
    fn test_rejects_unverified_email() {
        let mut unverified = info();
        unverified.email_verified = Some("false".to_string());
        assert!(check_claims(unverified, "client-123", 1000).is_err());
    }
}
