//! Identity provider seam. Handlers only ever see `Arc<dyn IdentityProvider>`;
//! `GoogleIdentityProvider` is the production backend.

pub mod google;
pub mod handlers;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::user::Identity;

pub use google::GoogleIdentityProvider;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing sign-in credential")]
    MissingCredential,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Credential rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Credential was issued for a different application")]
    AudienceMismatch,

    #[error("Credential issued by untrusted issuer '{0}'")]
    UntrustedIssuer(String),

    #[error("Credential has expired")]
    Expired,

    #[error("Credential is missing the '{0}' claim")]
    MissingClaim(&'static str),
}

/// Authenticates a user from a client-supplied credential.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, credential: &str) -> Result<Identity, AuthError>;

    /// Ends the provider-side session, if the provider keeps one.
    async fn sign_out(&self, _identity: &Identity) {}
}
