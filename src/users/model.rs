use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string, never exposed in JSON
    pub avatar_url: String,    // empty = no avatar
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields supplied by the caller on creation; the store assigns the rest.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial update. `None` and `Some("")` both leave the stored value alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserPatch {
    pub fn name(&self) -> Option<&str> {
        present(&self.name)
    }

    pub fn email(&self) -> Option<&str> {
        present(&self.email)
    }

    pub fn avatar_url(&self) -> Option<&str> {
        present(&self.avatar_url)
    }

    pub fn is_empty(&self) -> bool {
        self.name().is_none() && self.email().is_none() && self.avatar_url().is_none()
    }

    /// Applies the present fields to `user` and stamps `updated_at`.
    pub fn apply(&self, user: &mut User, now: OffsetDateTime) {
        if let Some(name) = self.name() {
            user.name = name.to_string();
        }
        if let Some(email) = self.email() {
            user.email = email.to_string();
        }
        if let Some(url) = self.avatar_url() {
            user.avatar_url = url.to_string();
        }
        user.updated_at = now.max(user.created_at);
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}
