use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Argon2id work factor.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        // OWASP baseline for argon2id
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub store_timeout: Duration,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("STORE").as_deref() {
            Ok("memory") => StoreKind::Memory,
            Ok("postgres") | Err(_) => StoreKind::Postgres,
            Ok(other) => anyhow::bail!("unknown STORE value: {other}"),
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if store == StoreKind::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORE=postgres");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "accounthub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "accounthub-users".into()),
        };

        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: env_parse("HASH_MEMORY_KIB").unwrap_or(defaults.memory_kib),
            iterations: env_parse("HASH_ITERATIONS").unwrap_or(defaults.iterations),
            parallelism: env_parse("HASH_PARALLELISM").unwrap_or(defaults.parallelism),
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT").unwrap_or(8080),
            store,
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(10),
            store_timeout: Duration::from_secs(env_parse("STORE_TIMEOUT_SECS").unwrap_or(5)),
            jwt,
            hash,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid APP_HOST {:?}", self.host))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str, port: u16) -> AppConfig {
        AppConfig {
            host: host.into(),
            port,
            store: StoreKind::Memory,
            database_url: None,
            db_max_connections: 1,
            store_timeout: Duration::from_secs(5),
            jwt: JwtConfig {
                secret: "s".into(),
                issuer: "i".into(),
                audience: "a".into(),
            },
            hash: HashConfig::default(),
        }
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let addr = config("127.0.0.1", 9000).bind_addr().unwrap();
        assert_eq!(addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn bind_addr_rejects_unparseable_host() {
        assert!(config("not a host", 8080).bind_addr().is_err());
    }
}
