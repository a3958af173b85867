use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use super::model::{NewUser, User, UserPatch};
use crate::error::{IdentityError, Result};

/// Per-call bound on a store operation, supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct OpContext {
    pub timeout: Duration,
}

impl OpContext {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Drives `fut` to completion or cancels it once the timeout elapses.
    pub async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => {
                warn!(op, timeout_ms = self.timeout.as_millis() as u64, "store call timed out");
                Err(IdentityError::StorageUnavailable(format!(
                    "{op} timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }
}

/// Persistent user records.
///
/// Implementations must make `create` and `update` single atomic writes and must
/// report a taken email as [`IdentityError::DuplicateEmail`] and a missing row as
/// [`IdentityError::NotFound`].
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Assigns `id`, `created_at` and `updated_at`.
    async fn create(&self, ctx: &OpContext, new: NewUser) -> Result<User>;

    /// Newest first.
    async fn list(&self, ctx: &OpContext) -> Result<Vec<User>>;

    async fn get_by_id(&self, ctx: &OpContext, id: Uuid) -> Result<User>;

    async fn get_by_email(&self, ctx: &OpContext, email: &str) -> Result<User>;

    /// Applies only the present, non-empty fields of `patch` and refreshes
    /// `updated_at` in the same write.
    async fn update(&self, ctx: &OpContext, id: Uuid, patch: &UserPatch) -> Result<User>;

    async fn delete(&self, ctx: &OpContext, id: Uuid) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_passes_through_result() {
        let ctx = OpContext::default();
        let v = ctx.run("noop", async { Ok(7) }).await.unwrap();
        assert_eq!(v, 7);
        let err = ctx
            .run::<(), _>("noop", async { Err(IdentityError::NotFound) })
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::NotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn run_times_out_as_storage_unavailable() {
        let ctx = OpContext::with_timeout(Duration::from_millis(50));
        let err = ctx
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::StorageUnavailable(_)));
    }
}
