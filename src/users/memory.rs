use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::{NewUser, User, UserPatch};
use super::store::{OpContext, UserStore};
use crate::error::{IdentityError, Result};

/// `UserStore` kept in process memory. Each operation takes the lock once, so
/// the uniqueness check and the write it guards are a single step.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(users: &HashMap<Uuid, User>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, ctx: &OpContext, new: NewUser) -> Result<User> {
        ctx.run("create", async move {
            if new.password_hash.is_empty() {
                return Err(IdentityError::ValidationFailed(
                    "password hash must not be empty".into(),
                ));
            }
            let mut users = self.users.write().await;
            if email_taken(&users, &new.email, None) {
                return Err(IdentityError::DuplicateEmail);
            }
            let now = OffsetDateTime::now_utc();
            let user = User {
                id: Uuid::now_v7(),
                name: new.name,
                email: new.email,
                password_hash: new.password_hash,
                avatar_url: String::new(),
                created_at: now,
                updated_at: now,
            };
            users.insert(user.id, user.clone());
            Ok(user)
        })
        .await
    }

    async fn list(&self, ctx: &OpContext) -> Result<Vec<User>> {
        ctx.run("list", async {
            let users = self.users.read().await;
            let mut out: Vec<User> = users.values().cloned().collect();
            out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            Ok(out)
        })
        .await
    }

    async fn get_by_id(&self, ctx: &OpContext, id: Uuid) -> Result<User> {
        ctx.run("get_by_id", async {
            self.users
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(IdentityError::NotFound)
        })
        .await
    }

    async fn get_by_email(&self, ctx: &OpContext, email: &str) -> Result<User> {
        ctx.run("get_by_email", async {
            self.users
                .read()
                .await
                .values()
                .find(|u| u.email == email)
                .cloned()
                .ok_or(IdentityError::NotFound)
        })
        .await
    }

    async fn update(&self, ctx: &OpContext, id: Uuid, patch: &UserPatch) -> Result<User> {
        ctx.run("update", async {
            let mut users = self.users.write().await;
            if let Some(email) = patch.email() {
                if email_taken(&users, email, Some(id)) {
                    return Err(IdentityError::DuplicateEmail);
                }
            }
            let user = users.get_mut(&id).ok_or(IdentityError::NotFound)?;
            patch.apply(user, OffsetDateTime::now_utc());
            Ok(user.clone())
        })
        .await
    }

    async fn delete(&self, ctx: &OpContext, id: Uuid) -> Result<()> {
        ctx.run("delete", async {
            self.users
                .write()
                .await
                .remove(&id)
                .map(|_| ())
                .ok_or(IdentityError::NotFound)
        })
        .await
    }
}
