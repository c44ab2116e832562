use std::time::Duration;

use anyhow::Context;
use argon2::Params;
use serde::Deserialize;

const DEFAULT_APP_NAME: &str = "userhub";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,
    pub version: String,
}

impl ApplicationConfig {
    /// Leading integer of the version, `v` prefix ignored. Unparseable → 0.
    pub fn major_version(&self) -> u32 {
        self.version
            .trim_start_matches('v')
            .split('.')
            .next()
            .and_then(|major| major.parse().ok())
            .unwrap_or(0)
    }

    pub fn base_path(&self) -> String {
        format!("/api/v{}", self.major_version())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// How long in-flight requests may drain after the shutdown signal.
    pub shutdown_timeout: Duration,
}

impl HttpConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub store_timeout: Duration,
}

/// Argon2 cost parameters, shared by every hashing path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    pub application: ApplicationConfig,
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub hash: HashConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let application = ApplicationConfig {
            name: var("APP_NAME", DEFAULT_APP_NAME),
            version: var("APP_VERSION", "v0.0.0"),
        };
        let http = HttpConfig {
            host: var("APP_HOST", "localhost"),
            port: parse(&lookup, "APP_PORT", 8080)?,
            shutdown_timeout: Duration::from_secs(parse(&lookup, "SHUTDOWN_TIMEOUT_SECS", 15)?),
        };

        let url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                var("PG_USER", &format!("{DEFAULT_APP_NAME}user")),
                var("PG_PASSWD", &format!("{DEFAULT_APP_NAME}p44s5W0rD")),
                var("PG_HOST", "pgdb"),
                parse::<u16, _>(&lookup, "PG_PORT", 5432)?,
                var("PG_DBNAME", DEFAULT_APP_NAME),
            ),
        };
        let database = DatabaseConfig {
            url,
            max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            store_timeout: Duration::from_secs(parse(&lookup, "STORE_TIMEOUT_SECS", 5)?),
        };

        let hash = HashConfig {
            memory_kib: parse(&lookup, "HASH_MEMORY_KIB", Params::DEFAULT_M_COST)?,
            iterations: parse(&lookup, "HASH_ITERATIONS", Params::DEFAULT_T_COST)?,
            parallelism: parse(&lookup, "HASH_PARALLELISM", Params::DEFAULT_P_COST)?,
        };

        Ok(Self {
            application,
            http,
            database,
            hash,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
