use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{jwt::JwtKeys, password::CredentialHasher};
use crate::error::{IdentityError, Result};
use crate::users::{NewUser, OpContext, User, UserPatch, UserStore};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if !(2..=100).contains(&len) {
        return Err(IdentityError::ValidationFailed(
            "name must be between 2 and 100 characters".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    if !is_valid_email(email) {
        return Err(IdentityError::ValidationFailed("invalid email".into()));
    }
    Ok(())
}

/// Result of a successful login.
#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Registration, login and profile management over a [`UserStore`].
pub struct IdentityService {
    store: Arc<dyn UserStore>,
    hasher: CredentialHasher,
    keys: JwtKeys,
    store_timeout: Duration,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: CredentialHasher,
        keys: JwtKeys,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            keys,
            store_timeout,
        }
    }

    fn ctx(&self) -> OpContext {
        OpContext::with_timeout(self.store_timeout)
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let name = name.trim();
        let email = normalize_email(email);
        if name.is_empty() || email.is_empty() {
            return Err(IdentityError::ValidationFailed(
                "name and email are required".into(),
            ));
        }
        if password.is_empty() {
            return Err(IdentityError::ValidationFailed("password is required".into()));
        }
        validate_name(name)?;
        validate_email(&email)?;

        let password_hash = self.hasher.hash(password)?;
        let new = NewUser {
            name: name.to_string(),
            email,
            password_hash,
        };
        match self.store.create(&self.ctx(), new).await {
            Ok(user) => {
                info!(user_id = %user.id, "user registered");
                Ok(user)
            }
            Err(IdentityError::DuplicateEmail) => {
                warn!("email already registered");
                Err(IdentityError::DuplicateEmail)
            }
            Err(e) => {
                error!(error = %e, "create user failed");
                Err(e)
            }
        }
    }

    /// Any lookup failure and a wrong password all come back as `InvalidCredentials`.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);
        let user = match self.store.get_by_email(&self.ctx(), &email).await {
            Ok(u) => u,
            Err(e) => {
                match e {
                    IdentityError::NotFound => warn!("login unknown email"),
                    other => error!(error = %other, "get_by_email failed"),
                }
                // spend the same hashing cost as a real verify
                self.hasher.hash(password).ok();
                return Err(IdentityError::InvalidCredentials);
            }
        };

        if !self.hasher.verify(&user.password_hash, password) {
            warn!(user_id = %user.id, "login invalid password");
            return Err(IdentityError::InvalidCredentials);
        }

        let token = self.keys.issue(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(Session { token, user })
    }

    pub fn verify_token(&self, token: &str) -> Result<Uuid> {
        self.keys.verify(token)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        self.store.get_by_id(&self.ctx(), id).await
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.store.list(&self.ctx()).await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, id: Uuid, patch: UserPatch) -> Result<User> {
        let patch = UserPatch {
            name: patch.name.map(|n| n.trim().to_string()),
            email: patch.email.map(|e| normalize_email(&e)),
            avatar_url: patch.avatar_url.map(|u| u.trim().to_string()),
        };
        if let Some(name) = patch.name() {
            validate_name(name)?;
        }
        if let Some(email) = patch.email() {
            validate_email(email)?;
        }

        let ctx = self.ctx();
        self.store.get_by_id(&ctx, id).await?;
        let user = self.store.update(&ctx, id, &patch).await.map_err(|e| {
            if matches!(e, IdentityError::DuplicateEmail) {
                warn!(user_id = %id, "email already registered");
            }
            e
        })?;
        info!(user_id = %user.id, "user updated");
        Ok(user)
    }

    pub async fn update_avatar(&self, id: Uuid, avatar_url: &str) -> Result<User> {
        if avatar_url.trim().is_empty() {
            return Err(IdentityError::ValidationFailed("avatar_url is required".into()));
        }
        self.update_profile(
            id,
            UserPatch {
                avatar_url: Some(avatar_url.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> Result<()> {
        self.store.delete(&self.ctx(), id).await?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_service() -> IdentityService {
    test_service_with(Arc::new(crate::users::MemoryUserStore::new()))
}

#[cfg(test)]
pub(crate) fn test_service_with(store: Arc<dyn UserStore>) -> IdentityService {
    use crate::auth::password::test_hasher;
    use crate::config::JwtConfig;

    IdentityService::new(
        store,
        test_hasher(),
        JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
        }),
        OpContext::DEFAULT_TIMEOUT,
    )
}
