use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AuthError, IdentityProvider};
use crate::models::user::Identity;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const TRUSTED_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

/// Claims returned by Google's tokeninfo endpoint. Numeric claims arrive as strings.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: Option<String>,
    iss: Option<String>,
    sub: Option<String>,
    exp: Option<String>,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenInfoError {
    error_description: Option<String>,
    error: Option<String>,
}

/// Verifies Google ID tokens obtained by the client's "Sign in with Google" flow.
#[derive(Clone)]
pub struct GoogleIdentityProvider {
    client: Client,
    client_id: String,
}

impl GoogleIdentityProvider {
    pub fn new(client_id: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, client_id })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn sign_in(&self, credential: &str) -> Result<Identity, AuthError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let response = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("id_token", credential)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TokenInfoError>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or(body);
            warn!("Google rejected ID token: {} {}", status, message);
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let claims: TokenInfo = response.json().await?;
        debug!("tokeninfo returned claims for sub={:?}", claims.sub);
        identity_from_claims(claims, &self.client_id, Utc::now().timestamp())
    }
}

fn identity_from_claims(
    claims: TokenInfo,
    client_id: &str,
    now: i64,
) -> Result<Identity, AuthError> {
    if claims.aud.as_deref() != Some(client_id) {
        return Err(AuthError::AudienceMismatch);
    }

    let iss = claims.iss.ok_or(AuthError::MissingClaim("iss"))?;
    if !TRUSTED_ISSUERS.contains(&iss.as_str()) {
        return Err(AuthError::UntrustedIssuer(iss));
    }

    let exp = claims
        .exp
        .and_then(|e| e.parse::<i64>().ok())
        .ok_or(AuthError::MissingClaim("exp"))?;
    if exp <= now {
        return Err(AuthError::Expired);
    }

    let uid = claims
        .sub
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingClaim("sub"))?;

    Ok(Identity {
        uid,
        display_name: claims.name,
        email: claims.email,
        avatar_url: claims.picture,
        signed_in_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_ID: &str = "123.apps.googleusercontent.com";
    const NOW: i64 = 1_700_000_000;

    fn claims() -> TokenInfo {
        TokenInfo {
            aud: Some(CLIENT_ID.to_string()),
            iss: Some("https://accounts.google.com".to_string()),
            sub: Some("1098765".to_string()),
            exp: Some((NOW + 3600).to_string()),
            email: Some("ada@example.com".to_string()),
            name: Some("Ada Lovelace".to_string()),
            picture: Some("https://lh3.googleusercontent.com/a/ada".to_string()),
        }
    }

    #[test]
    fn test_valid_claims_map_to_identity() {
        let identity = identity_from_claims(claims(), CLIENT_ID, NOW).unwrap();
        assert_eq!(identity.uid, "1098765");
        assert_eq!(identity.display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
        assert!(identity.avatar_url.unwrap().starts_with("https://"));
    }

    #[test]
    fn test_bare_issuer_is_trusted() {
        let mut c = claims();
        c.iss = Some("accounts.google.com".to_string());
        assert!(identity_from_claims(c, CLIENT_ID, NOW).is_ok());
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let mut c = claims();
        c.aud = Some("someone-else".to_string());
        assert!(matches!(
            identity_from_claims(c, CLIENT_ID, NOW),
            Err(AuthError::AudienceMismatch)
        ));
    }

    #[test]
    fn test_untrusted_issuer_rejected() {
        let mut c = claims();
        c.iss = Some("https://evil.example".to_string());
        assert!(matches!(
            identity_from_claims(c, CLIENT_ID, NOW),
            Err(AuthError::UntrustedIssuer(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut c = claims();
        c.exp = Some(NOW.to_string());
        assert!(matches!(
            identity_from_claims(c, CLIENT_ID, NOW),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_missing_subject_rejected() {
        let mut c = claims();
        c.sub = None;
        assert!(matches!(
            identity_from_claims(c, CLIENT_ID, NOW),
            Err(AuthError::MissingClaim("sub"))
        ));
    }

    #[test]
    fn test_tokeninfo_payload_deserializes() {
        let json = r#"{
            "iss": "https://accounts.google.com",
            "aud": "123.apps.googleusercontent.com",
            "sub": "42",
            "email": "ada@example.com",
            "email_verified": "true",
            "exp": "1700003600",
            "name": "Ada"
        }"#;
        let parsed: TokenInfo = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.sub.as_deref(), Some("42"));
        assert!(parsed.picture.is_none());
    }

    #[tokio::test]
    async fn test_empty_credential_short_circuits() {
        let provider = GoogleIdentityProvider::new(CLIENT_ID.to_string()).unwrap();
        assert!(matches!(
            provider.sign_in("   ").await,
            Err(AuthError::MissingCredential)
        ));
    }
}
