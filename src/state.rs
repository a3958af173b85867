use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::{CredentialHasher, JwtKeys};
use crate::config::{AppConfig, StoreKind};
use crate::identity::IdentityService;
use crate::users::{MemoryUserStore, PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub identity: Arc<IdentityService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn UserStore> = match config.store {
            StoreKind::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is not set")?;
                let db = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .connect(url)
                    .await
                    .context("connect to database")?;

                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;

                Arc::new(PgUserStore::new(db))
            }
            StoreKind::Memory => {
                tracing::warn!("using in-memory user store; data is lost on restart");
                Arc::new(MemoryUserStore::new())
            }
        };

        Self::from_parts(config, store)
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let hasher = CredentialHasher::new(config.hash).context("argon2 params")?;
        let keys = JwtKeys::new(&config.jwt);
        let identity = Arc::new(IdentityService::new(
            store,
            hasher,
            keys,
            config.store_timeout,
        ));
        Ok(Self { config, identity })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{HashConfig, JwtConfig};
        use crate::users::OpContext;

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            store: StoreKind::Memory,
            database_url: None,
            db_max_connections: 1,
            store_timeout: OpContext::DEFAULT_TIMEOUT,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
            },
            hash: HashConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
        });
        Self::from_parts(config, Arc::new(MemoryUserStore::new())).expect("fake state")
    }
}
