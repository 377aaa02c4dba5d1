//! Credential gate for being connections.
//!
//! Tokens are opaque, high-entropy bearer credentials. Only their SHA-256
//! digest is stored; comparison happens on digests and the raw token is
//! dropped as soon as it has been hashed.

use rand::distributions::Alphanumeric;
use rand::Rng;
use relayhub_database::{Being, BeingRepository, CreateBeingRequest, DatabaseError};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

const TOKEN_LENGTH: usize = 48;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("being not found")]
    BeingNotFound,
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

/// The identity a valid token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub being_id: String,
    pub org_id: String,
}

/// A provisioned being together with its freshly issued token.
///
/// The token is only available here; the store keeps the digest.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub being: Being,
    pub token: String,
}

/// Hex-encoded SHA-256 digest of a token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// A new random token suitable for a being credential.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Clone)]
pub struct CredentialGate {
    beings: BeingRepository,
}

impl CredentialGate {
    pub fn new(beings: BeingRepository) -> Self {
        Self { beings }
    }

    /// Resolve a claimed being id and token to an identity.
    ///
    /// Fails closed: lookup errors are logged and reported as `None`.
    pub async fn authenticate(&self, being_id: &str, token: &str) -> Option<Identity> {
        if being_id.is_empty() || token.is_empty() {
            return None;
        }

        let presented = hash_token(token);

        let being = match self.beings.find_by_id(being_id).await {
            Ok(Some(being)) => being,
            Ok(None) => {
                debug!(being_id, "credential check for unknown being");
                return None;
            }
            Err(error) => {
                warn!(being_id, %error, "credential lookup failed");
                return None;
            }
        };

        if being.token_hash != presented {
            debug!(being_id, "credential digest mismatch");
            return None;
        }

        Some(Identity {
            being_id: being.id,
            org_id: being.org_id,
        })
    }

    pub async fn verify(&self, being_id: &str, token: &str) -> bool {
        self.authenticate(being_id, token).await.is_some()
    }

    /// Create a being in `org_id` and issue its first token.
    pub async fn provision(&self, org_id: &str, name: &str) -> Result<IssuedCredential, CredentialError> {
        let token = generate_token();
        let being = self
            .beings
            .create(&CreateBeingRequest {
                org_id: org_id.to_string(),
                name: name.to_string(),
                token_hash: hash_token(&token),
            })
            .await?;

        info!(being_id = %being.id, org_id = %being.org_id, "provisioned being credential");
        Ok(IssuedCredential { being, token })
    }

    /// Replace a being's token. The previous token stops working immediately.
    pub async fn rotate(&self, being_id: &str) -> Result<IssuedCredential, CredentialError> {
        let being = self
            .beings
            .find_by_id(being_id)
            .await?
            .ok_or(CredentialError::BeingNotFound)?;

        let token = generate_token();
        let token_hash = hash_token(&token);
        if !self.beings.update_token_hash(&being.id, &token_hash).await? {
            return Err(CredentialError::BeingNotFound);
        }

        info!(being_id = %being.id, "rotated being credential");
        Ok(IssuedCredential {
            being: Being { token_hash, ..being },
            token,
        })
    }
}
