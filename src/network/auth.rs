use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::watch;
use uuid::Uuid;

use crate::common::{AuthUser, UserId};

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("`{0}` is not a valid email address")]
    InvalidEmail(String),
    #[error("password must be at least 6 characters")]
    WeakPassword,
    #[error("an account already exists for {0}")]
    EmailInUse(String),
    #[error("wrong email or password")]
    InvalidCredentials,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// The identity collaborator. Sign-in state changes are published on a
/// watch channel so the chat loop can gate persistence on them.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;
    async fn sign_out(&self) -> Result<(), AuthError>;
    fn current_user(&self) -> Option<AuthUser>;
    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>>;
}

struct Account {
    uid: UserId,
    password: String,
}

/// In-process identity provider for offline development and tests.
/// Accounts live only as long as the process.
pub struct LocalAuthProvider {
    accounts: Mutex<HashMap<String, Account>>,
    current: watch::Sender<Option<AuthUser>>,
}

impl LocalAuthProvider {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current,
        }
    }

    fn publish(&self, user: Option<AuthUser>) {
        self.current.send_replace(user);
    }
}

impl Default for LocalAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if EMAIL_SHAPE.is_match(&email) {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail(email))
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let user = {
            let mut accounts = self
                .accounts
                .lock()
                .map_err(|_| AuthError::Unavailable("account table poisoned".into()))?;
            if accounts.contains_key(&email) {
                return Err(AuthError::EmailInUse(email));
            }
            let uid = UserId::new(Uuid::new_v4().simple().to_string());
            accounts.insert(
                email.clone(),
                Account {
                    uid: uid.clone(),
                    password: password.to_string(),
                },
            );
            AuthUser { uid, email }
        };

        log::info!("Created account for {}", user.email);
        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let email = normalize_email(email)?;
        let user = {
            let accounts = self
                .accounts
                .lock()
                .map_err(|_| AuthError::Unavailable("account table poisoned".into()))?;
            match accounts.get(&email) {
                Some(account) if account.password == password => AuthUser {
                    uid: account.uid.clone(),
                    email,
                },
                _ => return Err(AuthError::InvalidCredentials),
            }
        };

        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.publish(None);
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.current.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_then_sign_in_returns_same_uid() {
        let auth = LocalAuthProvider::new();
        let created = auth.sign_up("Ana@Example.com", "secreto").await.unwrap();
        auth.sign_out().await.unwrap();
        assert!(auth.current_user().is_none());

        let signed_in = auth.sign_in("ana@example.com", "secreto").await.unwrap();
        assert_eq!(created.uid, signed_in.uid);
        assert_eq!(auth.current_user(), Some(signed_in));
    }

    #[tokio::test]
    async fn rejects_bad_credentials_and_shapes() {
        let auth = LocalAuthProvider::new();
        assert!(matches!(
            auth.sign_up("not-an-email", "secreto").await,
            Err(AuthError::InvalidEmail(_))
        ));
        assert_eq!(
            auth.sign_up("ana@example.com", "123").await,
            Err(AuthError::WeakPassword)
        );

        auth.sign_up("ana@example.com", "secreto").await.unwrap();
        assert!(matches!(
            auth.sign_up("ana@example.com", "otro-secreto").await,
            Err(AuthError::EmailInUse(_))
        ));
        assert_eq!(
            auth.sign_in("ana@example.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn subscribers_observe_sign_in_and_out() {
        let auth = LocalAuthProvider::new();
        let mut changes = auth.subscribe();

        auth.sign_up("ana@example.com", "secreto").await.unwrap();
        changes.changed().await.unwrap();
        assert_eq!(
            changes.borrow_and_update().as_ref().map(|u| u.email.clone()),
            Some("ana@example.com".to_string())
        );

        auth.sign_out().await.unwrap();
        changes.changed().await.unwrap();
        assert!(changes.borrow_and_update().is_none());
    }
}
