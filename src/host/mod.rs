//! Pull request hosts.
//!
//! An adapter is built per update once the actual branch is known. It can
//! repair the push remote, open the pull request, and close older pull
//! requests from the same lineage.

pub mod github;
pub mod gitlab;
pub mod mock;
pub mod pull_request;
pub mod settings;

pub use github::GitHubPullRequest;
pub use gitlab::GitLabMergeRequest;
pub use mock::TestPullRequest;
pub use pull_request::{Action, PullRequest, is_related_branch};
pub use settings::{HostSettings, RelatedPrBehavior};

use crate::agents::version_control::Git;
use crate::error::{DepsError, Result};
use reqwest::blocking::Client;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Host selection when `--host` is not given.
pub const GIT_HOST_ENV: &str = "DEPS_GIT_HOST";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHost {
    GitHub,
    GitLab,
    Test,
}

impl GitHost {
    /// Guess the host from the origin remote URL.
    pub fn detect(remote_url: &str) -> Option<Self> {
        let remote = remote_url.to_lowercase();
        if remote.contains("github") {
            Some(GitHost::GitHub)
        } else if remote.contains("gitlab") {
            Some(GitHost::GitLab)
        } else {
            None
        }
    }

    /// Host from an explicit choice, then the `DEPS_GIT_HOST` setting, then the remote.
    pub fn resolve(
        explicit: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
        remote_url: Option<&str>,
    ) -> Result<Self> {
        if let Some(value) = explicit {
            return value.parse();
        }
        if let Some(value) = lookup(GIT_HOST_ENV).filter(|v| !v.trim().is_empty()) {
            return value.parse();
        }

        remote_url.and_then(Self::detect).ok_or_else(|| {
            DepsError::Configuration(format!(
                "could not determine the git host, set --host or {GIT_HOST_ENV}"
            ))
        })
    }

    /// Prefix of the environment variables read for this host
    pub fn env_prefix(&self) -> &'static str {
        match self {
            GitHost::GitHub => "GITHUB",
            GitHost::GitLab => "GITLAB",
            GitHost::Test => "TEST",
        }
    }
}

impl FromStr for GitHost {
    type Err = DepsError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "github" => Ok(GitHost::GitHub),
            "gitlab" => Ok(GitHost::GitLab),
            "test" => Ok(GitHost::Test),
            _ => Err(DepsError::Configuration(format!(
                "git host '{value}' not recognized"
            ))),
        }
    }
}

impl fmt::Display for GitHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GitHost::GitHub => "github",
            GitHost::GitLab => "gitlab",
            GitHost::Test => "test",
        };
        f.write_str(name)
    }
}

/// Operations a pull request host offers for one update.
pub trait PullRequestAdapter {
    fn create(&mut self) -> Result<()>;
    /// Handles older open pull requests of the same lineage.
    fn do_related(&mut self) -> Result<()>;
    /// Repairs push access, typically by rewriting the remote with credentials.
    fn prepare_push(&mut self, git: &mut dyn Git) -> Result<()>;
    fn action(&self) -> &Action;
}

pub trait AdapterFactory {
    fn adapter(&self, pull_request: PullRequest) -> Result<Box<dyn PullRequestAdapter>>;
}

/// Builds adapters for the selected host from its settings.
pub struct HostAdapters {
    host: GitHost,
    settings: HostSettings,
}

impl HostAdapters {
    pub fn new(host: GitHost, settings: HostSettings) -> Self {
        Self { host, settings }
    }

    pub fn from_env(host: GitHost, remote_url: Option<&str>) -> Result<Self> {
        let settings = HostSettings::from_lookup(host, |key| std::env::var(key).ok(), remote_url)?;
        Ok(Self::new(host, settings))
    }
}

impl AdapterFactory for HostAdapters {
    fn adapter(&self, pull_request: PullRequest) -> Result<Box<dyn PullRequestAdapter>> {
        let settings = self.settings.clone();
        let adapter: Box<dyn PullRequestAdapter> = match self.host {
            GitHost::GitHub => Box::new(GitHubPullRequest::new(pull_request, settings)?),
            GitHost::GitLab => Box::new(GitLabMergeRequest::new(pull_request, settings)?),
            GitHost::Test => Box::new(TestPullRequest::new(pull_request, settings)),
        };
        Ok(adapter)
    }
}

pub(crate) fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("deppr/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// `owner/repo` from an https or scp-style remote URL.
pub fn repo_full_name_from_remote(remote_url: &str) -> Option<String> {
    let remote = remote_url.trim();
    let path = match Url::parse(remote) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => remote.split_once(':')?.1.to_string(),
    };

    let name = path.trim_matches('/').trim_end_matches(".git");
    if name.contains('/') && !name.is_empty() {
        Some(name.to_string())
    } else {
        None
    }
}

/// An https remote carrying credentials, for hosts that accept token pushes.
///
/// Non-http remotes (ssh, scp-style) are replaced with `fallback`.
pub fn authenticated_remote(
    remote_url: &str,
    fallback: &str,
    username: &str,
    token: &str,
) -> Result<String> {
    let mut url = match Url::parse(remote_url.trim()) {
        Ok(url) if matches!(url.scheme(), "https" | "http") => url,
        _ => Url::parse(fallback).map_err(|e| {
            DepsError::Configuration(format!("Invalid remote URL '{fallback}': {e}"))
        })?,
    };

    url.set_username(username)
        .and_then(|()| url.set_password(Some(token)))
        .map_err(|()| {
            DepsError::Configuration(format!("Remote URL '{remote_url}' cannot carry credentials"))
        })?;

    Ok(url.to_string())
}
