use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{StatusCode, Url};
use tracing::{debug, instrument};

use crate::config::GithubConfig;

/// Upstream listing of a user's public repositories.
#[async_trait]
pub trait RepoLister: Send + Sync {
    /// `Ok(None)` when upstream answers with anything but 200.
    async fn recent_repos(&self, username: &str) -> anyhow::Result<Option<serde_json::Value>>;
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,38})$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

pub struct GithubClient {
    http: reqwest::Client,
    api_url: Url,
    credentials: Option<(String, String)>,
}

impl GithubClient {
    pub fn new(cfg: &GithubConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(concat!("devlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build github http client")?;
        let api_url = Url::parse(&cfg.api_url).context("parse GITHUB_API_URL")?;
        let credentials = match (&cfg.client_id, &cfg.client_secret) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => None,
        };
        Ok(Self {
            http,
            api_url,
            credentials,
        })
    }

    fn repos_url(&self, username: &str) -> anyhow::Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("github api url cannot be a base"))?
            .pop_if_empty()
            .extend(["users", username, "repos"]);
        url.query_pairs_mut()
            .append_pair("per_page", "5")
            .append_pair("sort", "created:asc");
        Ok(url)
    }
}

#[async_trait]
impl RepoLister for GithubClient {
    #[instrument(skip(self))]
    async fn recent_repos(&self, username: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let mut req = self.http.get(self.repos_url(username)?);
        if let Some((id, secret)) = &self.credentials {
            req = req.basic_auth(id, Some(secret));
        }
        let res = req.send().await.context("github request")?;
        if res.status() != StatusCode::OK {
            debug!(status = %res.status(), "github returned non-200");
            return Ok(None);
        }
        let repos = res.json().await.context("decode github response")?;
        Ok(Some(repos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> GithubClient {
        GithubClient::new(&GithubConfig {
            api_url: api_url.into(),
            client_id: None,
            client_secret: None,
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn repos_url_has_paging_and_sort() {
        let url = client("https://api.github.com").repos_url("octocat").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/users/octocat/repos?per_page=5&sort=created%3Aasc"
        );
    }

    #[test]
    fn repos_url_respects_base_path() {
        let url = client("http://localhost:9000/gh/").repos_url("octocat").unwrap();
        assert_eq!(url.path(), "/gh/users/octocat/repos");
    }

    #[test]
    fn usernames() {
        assert!(is_valid_username("octocat"));
        assert!(is_valid_username("a-b-9"));
        assert!(!is_valid_username("-leading"));
        assert!(!is_valid_username("../etc"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username(&"a".repeat(40)));
    }

    #[test]
    fn credentials_need_both_halves() {
        let c = GithubClient::new(&GithubConfig {
            api_url: "https://api.github.com".into(),
            client_id: Some("id".into()),
            client_secret: None,
            timeout_secs: 1,
        })
        .unwrap();
        assert!(c.credentials.is_none());
    }
}
