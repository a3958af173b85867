use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use super::model::{NewUser, User, UserPatch};
use super::store::{OpContext, UserStore};
use crate::error::{IdentityError, Result};

const USER_COLUMNS: &str = "id, name, email, password_hash, avatar_url, created_at, updated_at";

/// `UserStore` backed by the `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn storage_err(op: &'static str) -> impl Fn(sqlx::Error) -> IdentityError {
    move |e| {
        let err = IdentityError::from(e);
        if let IdentityError::StorageUnavailable(ref msg) = err {
            error!(op, error = %msg, "postgres query failed");
        }
        err
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, ctx: &OpContext, new: NewUser) -> Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, now(), now())
            RETURNING {USER_COLUMNS}
            "#
        );
        ctx.run("create", async {
            sqlx::query_as::<_, User>(&sql)
                .bind(Uuid::now_v7())
                .bind(&new.name)
                .bind(&new.email)
                .bind(&new.password_hash)
                .fetch_one(&self.db)
                .await
                .map_err(storage_err("create"))
        })
        .await
    }

    async fn list(&self, ctx: &OpContext) -> Result<Vec<User>> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY created_at DESC, id DESC
            "#
        );
        ctx.run("list", async {
            sqlx::query_as::<_, User>(&sql)
                .fetch_all(&self.db)
                .await
                .map_err(storage_err("list"))
        })
        .await
    }

    async fn get_by_id(&self, ctx: &OpContext, id: Uuid) -> Result<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        ctx.run("get_by_id", async {
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .fetch_one(&self.db)
                .await
                .map_err(storage_err("get_by_id"))
        })
        .await
    }

    async fn get_by_email(&self, ctx: &OpContext, email: &str) -> Result<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        ctx.run("get_by_email", async {
            sqlx::query_as::<_, User>(&sql)
                .bind(email)
                .fetch_one(&self.db)
                .await
                .map_err(storage_err("get_by_email"))
        })
        .await
    }

    async fn update(&self, ctx: &OpContext, id: Uuid, patch: &UserPatch) -> Result<User> {
        // One statement: blank or missing fields keep the stored value.
        let sql = format!(
            r#"
            UPDATE users
               SET name       = COALESCE(NULLIF($2, ''), name),
                   email      = COALESCE(NULLIF($3, ''), email),
                   avatar_url = COALESCE(NULLIF($4, ''), avatar_url),
                   updated_at = GREATEST(now(), created_at)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        ctx.run("update", async {
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .bind(patch.name())
                .bind(patch.email())
                .bind(patch.avatar_url())
                .fetch_one(&self.db)
                .await
                .map_err(storage_err("update"))
        })
        .await
    }

    async fn delete(&self, ctx: &OpContext, id: Uuid) -> Result<()> {
        ctx.run("delete", async {
            let res = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(&self.db)
                .await
                .map_err(storage_err("delete"))?;
            if res.rows_affected() == 0 {
                return Err(IdentityError::NotFound);
            }
            Ok(())
        })
        .await
    }
}
