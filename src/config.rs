use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

/// Argon2 cost parameters used for new password hashes.
#[derive(Debug, Clone, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    pub api_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs the service against the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
    pub github: GithubConfig,
}

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 360_000;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        anyhow::ensure!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let jwt = JwtConfig {
            secret,
            ttl_seconds: env_or("JWT_TTL_SECONDS", DEFAULT_TOKEN_TTL_SECONDS),
        };
        anyhow::ensure!(jwt.ttl_seconds > 0, "JWT_TTL_SECONDS must be positive");

        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: env_or("HASH_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("HASH_ITERATIONS", defaults.iterations),
            parallelism: env_or("HASH_PARALLELISM", defaults.parallelism),
        };

        let github = GithubConfig {
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".into()),
            client_id: std::env::var("GITHUB_CLIENT_ID").ok(),
            client_secret: std::env::var("GITHUB_SECRET").ok(),
            timeout_secs: env_or("GITHUB_TIMEOUT_SECS", 10),
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 5000),
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            hash,
            github,
        })
    }
}

impl AppConfig {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid APP_HOST {:?}", self.host))
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("DEVLINK_TEST_NUMBER", "not-a-number");
        assert_eq!(env_or("DEVLINK_TEST_NUMBER", 42u32), 42);
        std::env::set_var("DEVLINK_TEST_NUMBER", "7");
        assert_eq!(env_or("DEVLINK_TEST_NUMBER", 42u32), 7);
        std::env::remove_var("DEVLINK_TEST_NUMBER");
    }

    fn with_host(host: &str, port: u16) -> AppConfig {
        AppConfig {
            host: host.into(),
            port,
            database_url: None,
            max_connections: 1,
            jwt: JwtConfig {
                secret: "s".into(),
                ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            },
            hash: HashConfig::default(),
            github: GithubConfig {
                api_url: "https://api.github.com".into(),
                client_id: None,
                client_secret: None,
                timeout_secs: 10,
            },
        }
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let addr = with_host("127.0.0.1", 5000).bind_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:5000");
        assert!(with_host("not a host", 5000).bind_addr().is_err());
    }

    #[test]
    fn default_ttl_is_one_hundred_hours() {
        assert_eq!(DEFAULT_TOKEN_TTL_SECONDS, 100 * 60 * 60);
    }
}
