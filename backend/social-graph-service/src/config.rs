/// Configuration management for social-graph-service
///
/// Loads configuration from environment variables.
use anyhow::{bail, Result};
use resilience::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub store: StoreConfig,
    pub graph: GraphConfig,
    pub feed: FeedConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    pub host: String,
    pub http_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// In-process store, for local development and tests
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Present whenever the backend is `postgres`
    pub database: Option<DatabaseConfig>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
}

/// Optimistic edge-commit retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub commit_max_retries: u32,
    pub commit_backoff_ms: u64,
}

impl GraphConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.commit_max_retries,
            initial_backoff: Duration::from_millis(self.commit_backoff_ms),
            ..RetryConfig::default()
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            commit_max_retries: 3,
            commit_backoff_ms: 10,
        }
    }
}

/// Paging and listing limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub suggestions_limit: usize,
    pub trending_default_limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            suggestions_limit: 50,
            trending_default_limit: 10,
        }
    }
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            default: T,
        ) -> T {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        }

        let app = AppConfig {
            env: lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            http_port: parsed(&lookup, "PORT", 8007),
        };

        let backend = match lookup("STORE_BACKEND")
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("unsupported STORE_BACKEND: {}", other),
        };

        let database = match (backend, lookup("DATABASE_URL")) {
            (_, Some(url)) => Some(DatabaseConfig {
                url,
                max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", default_max_connections()),
                min_connections: parsed(&lookup, "DB_MIN_CONNECTIONS", default_min_connections()),
                connect_timeout_secs: parsed(&lookup, "DB_CONNECT_TIMEOUT_SECS", 5),
                acquire_timeout_secs: parsed(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 10),
            }),
            (StoreBackend::Postgres, None) => {
                bail!("DATABASE_URL environment variable not set")
            }
            (StoreBackend::Memory, None) => None,
        };

        let graph_defaults = GraphConfig::default();
        let graph = GraphConfig {
            commit_max_retries: parsed(
                &lookup,
                "GRAPH_COMMIT_MAX_RETRIES",
                graph_defaults.commit_max_retries,
            ),
            commit_backoff_ms: parsed(
                &lookup,
                "GRAPH_COMMIT_BACKOFF_MS",
                graph_defaults.commit_backoff_ms,
            ),
        };

        let feed_defaults = FeedConfig::default();
        let max_page_size =
            parsed(&lookup, "FEED_MAX_PAGE_SIZE", feed_defaults.max_page_size).max(1);
        let feed = FeedConfig {
            default_page_size: parsed(
                &lookup,
                "FEED_DEFAULT_PAGE_SIZE",
                feed_defaults.default_page_size,
            )
            .clamp(1, max_page_size),
            max_page_size,
            suggestions_limit: parsed(
                &lookup,
                "SUGGESTIONS_LIMIT",
                feed_defaults.suggestions_limit,
            ),
            trending_default_limit: parsed(
                &lookup,
                "TRENDING_DEFAULT_LIMIT",
                feed_defaults.trending_default_limit,
            ),
        };

        Ok(Config {
            app,
            store: StoreConfig { backend, database },
            graph,
            feed,
        })
    }
}
