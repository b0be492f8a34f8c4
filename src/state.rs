use crate::auth::{jwt::JwtKeys, password::Passwords, repo::PgUserStore, repo::UserStore};
use crate::config::AppConfig;
use crate::memory::MemoryStore;
use crate::posts::repo::{PgPostStore, PostStore};
use crate::profiles::github::{GithubClient, RepoLister};
use crate::profiles::repo::{PgProfileStore, ProfileStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub passwords: Passwords,
    pub users: Arc<dyn UserStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub posts: Arc<dyn PostStore>,
    pub github: Arc<dyn RepoLister>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let github = Arc::new(GithubClient::new(&config.github)?) as Arc<dyn RepoLister>;

        match config.database_url.clone() {
            Some(url) => {
                let db = crate::db::connect(&url, config.max_connections).await?;
                tracing::info!(max_connections = config.max_connections, "connected to postgres");
                Self::from_parts(
                    config,
                    Arc::new(PgUserStore::new(db.clone())),
                    Arc::new(PgProfileStore::new(db.clone())),
                    Arc::new(PgPostStore::new(db)),
                    github,
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; data lives in memory and is lost on exit");
                Self::in_memory(config, github)
            }
        }
    }

    pub fn in_memory(config: Arc<AppConfig>, github: Arc<dyn RepoLister>) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryStore::new());
        Self::from_parts(config, store.clone(), store.clone(), store, github)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        profiles: Arc<dyn ProfileStore>,
        posts: Arc<dyn PostStore>,
        github: Arc<dyn RepoLister>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            keys: JwtKeys::new(&config.jwt)?,
            passwords: Passwords::new(&config.hash)?,
            config,
            users,
            profiles,
            posts,
            github,
        })
    }

    /// In-memory state with cheap hashing and a canned GitHub upstream.
    #[cfg(test)]
    pub fn fake() -> Self {
        use async_trait::async_trait;
        use serde_json::json;

        struct FakeGithub;
        #[async_trait]
        impl RepoLister for FakeGithub {
            async fn recent_repos(&self, username: &str) -> anyhow::Result<Option<serde_json::Value>> {
                Ok((username == "octocat").then(|| json!([{ "name": "hello-world" }])))
            }
        }

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: None,
            max_connections: 1,
            jwt: crate::config::JwtConfig {
                secret: "dev-secret".into(),
                ttl_seconds: crate::config::DEFAULT_TOKEN_TTL_SECONDS,
            },
            hash: crate::config::HashConfig {
                memory_kib: 64,
                iterations: 1,
                parallelism: 1,
            },
            github: crate::config::GithubConfig {
                api_url: "http://github.invalid".into(),
                client_id: None,
                client_secret: None,
                timeout_secs: 1,
            },
        });

        Self::in_memory(config, Arc::new(FakeGithub)).expect("fake state")
    }
}
