//! Durable client session.
//!
//! The token is kept in `bloodlink_session.json` so a restarted client stays
//! signed in. Claims are decoded without the server secret and used for
//! display and routing only; an expired token reads as signed out.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::ClientError;
use crate::auth::{decode_unverified, Claims};
use crate::db::models::AccountType;

/// File name of the stored session inside the caller's directory.
pub const SESSION_FILE: &str = "bloodlink_session.json";

/// Which dashboard a signed-in account lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dashboard {
    Donor,
    Recipient,
}

impl From<AccountType> for Dashboard {
    fn from(account_type: AccountType) -> Self {
        match account_type {
            AccountType::Donor => Dashboard::Donor,
            AccountType::Recipient => Dashboard::Recipient,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    token: String,
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    claims: Claims,
}

impl Session {
    fn from_token(token: String) -> Result<Self, ClientError> {
        let claims = decode_unverified(&token)?;
        Ok(Self { token, claims })
    }
}

#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Open the session kept in `dir`. A missing or unreadable file means
    /// signed out.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = dir.as_ref().join(SESSION_FILE);

        let current = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<StoredSession>(&bytes)
                .map_err(ClientError::from)
                .and_then(|stored| Session::from_token(stored.token))
            {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "discarding unreadable session");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    /// Store a token returned by login and return its claims.
    pub async fn sign_in(&self, token: String) -> Result<Claims, ClientError> {
        let session = Session::from_token(token)?;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let stored = serde_json::to_vec(&StoredSession {
            token: session.token.clone(),
        })?;
        tokio::fs::write(&self.path, stored).await?;

        let claims = session.claims.clone();
        *self.current.write().await = Some(session);
        tracing::info!(user_id = %claims.id, "signed in");
        Ok(claims)
    }

    pub async fn sign_out(&self) -> Result<(), ClientError> {
        *self.current.write().await = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn active(&self) -> Option<Session> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|s| !s.claims.is_expired())
            .cloned()
    }

    /// Claims of the signed-in user.
    pub async fn identity(&self) -> Option<Claims> {
        self.active().await.map(|s| s.claims)
    }

    pub async fn token(&self) -> Option<String> {
        self.active().await.map(|s| s.token)
    }

    pub async fn is_signed_in(&self) -> bool {
        self.active().await.is_some()
    }

    pub async fn dashboard(&self) -> Option<Dashboard> {
        self.identity().await.map(|c| c.account_type.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn token(account_type: AccountType, exp_offset_secs: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            account_type,
            name: "Ada".to_string(),
            iat: now,
            exp: now + exp_offset_secs,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"server-only")).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_store_is_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();
        assert!(!store.is_signed_in().await);
        assert!(store.identity().await.is_none());
        assert!(store.dashboard().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();
        let token = token(AccountType::Recipient, 3600);
        let claims = store.sign_in(token.clone()).await.unwrap();
        assert_eq!(claims.name, "Ada");
        assert!(dir.path().join(SESSION_FILE).exists());

        let reopened = SessionStore::open(dir.path()).await.unwrap();
        assert!(reopened.is_signed_in().await);
        assert_eq!(reopened.token().await.as_deref(), Some(token.as_str()));
        assert_eq!(reopened.dashboard().await, Some(Dashboard::Recipient));
    }

    #[tokio::test]
    async fn test_expired_session_reads_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();
        store.sign_in(token(AccountType::Donor, -60)).await.unwrap();
        assert!(!store.is_signed_in().await);
        assert!(store.token().await.is_none());
        assert!(store.dashboard().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();
        store.sign_in(token(AccountType::Donor, 3600)).await.unwrap();
        assert_eq!(store.dashboard().await, Some(Dashboard::Donor));

        store.sign_out().await.unwrap();
        assert!(!store.is_signed_in().await);
        assert!(!dir.path().join(SESSION_FILE).exists());
        // Signing out twice is harmless.
        store.sign_out().await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected_and_corrupt_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.sign_in("not.a.token".to_string()).await,
            Err(ClientError::Token(_))
        ));
        assert!(!store.is_signed_in().await);

        std::fs::write(dir.path().join(SESSION_FILE), b"{broken").unwrap();
        let reopened = SessionStore::open(dir.path()).await.unwrap();
        assert!(!reopened.is_signed_in().await);
    }
}
