use super::{GitHost, repo_full_name_from_remote};
use crate::error::{DepsError, Result};

/// Controls what happens to older pull requests of the same lineage.
pub const RELATED_PR_BEHAVIOR_ENV: &str = "DEPS_RELATED_PR_BEHAVIOR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelatedPrBehavior {
    #[default]
    Close,
    Disabled,
}

impl RelatedPrBehavior {
    /// Unset means close, an empty value disables handling.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim) {
            None => Ok(RelatedPrBehavior::Close),
            Some("") => Ok(RelatedPrBehavior::Disabled),
            Some("close") => Ok(RelatedPrBehavior::Close),
            Some(other) => Err(DepsError::Configuration(format!(
                "related PR behavior '{other}' is not supported, expected \"close\" or empty"
            ))),
        }
    }
}

/// Host configuration read from `<PREFIX>_*` variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSettings {
    pub repo_full_name: String,
    pub api_token: String,
    pub api_url: Option<String>,
    /// Overrides the base branch the workflow was started from
    pub base_branch: Option<String>,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub milestone: Option<u64>,
    pub related_pr_behavior: RelatedPrBehavior,
}

impl HostSettings {
    /// Reads settings through `lookup`, falling back to the remote for the repository name.
    ///
    /// The test host needs no credentials.
    pub fn from_lookup(
        host: GitHost,
        lookup: impl Fn(&str) -> Option<String>,
        remote_url: Option<&str>,
    ) -> Result<Self> {
        let prefix = host.env_prefix();
        let get = |key: &str| {
            lookup(&format!("{prefix}_{key}")).filter(|value| !value.trim().is_empty())
        };

        let related_pr_behavior =
            RelatedPrBehavior::parse(lookup(RELATED_PR_BEHAVIOR_ENV).as_deref())?;
        let base_branch = get("BASE_BRANCH").map(|branch| branch.trim().to_string());

        if host == GitHost::Test {
            return Ok(Self {
                repo_full_name: get("REPO_FULL_NAME").unwrap_or_default(),
                base_branch,
                related_pr_behavior,
                ..Default::default()
            });
        }

        let repo_full_name = get("REPO_FULL_NAME")
            .or_else(|| remote_url.and_then(repo_full_name_from_remote))
            .ok_or_else(|| {
                DepsError::Configuration(format!(
                    "{prefix}_REPO_FULL_NAME is not set and could not be inferred from the git remote"
                ))
            })?;
        if !repo_full_name.contains('/') {
            return Err(DepsError::Configuration(format!(
                "{prefix}_REPO_FULL_NAME must look like owner/repo, got '{repo_full_name}'"
            )));
        }

        let api_token = get("API_TOKEN").ok_or_else(|| {
            DepsError::Configuration(format!("{prefix}_API_TOKEN is required"))
        })?;

        let milestone = match get("MILESTONE") {
            Some(value) => Some(value.trim().parse::<u64>().map_err(|_| {
                DepsError::Configuration(format!(
                    "{prefix}_MILESTONE must be a number, got '{value}'"
                ))
            })?),
            None => None,
        };

        Ok(Self {
            repo_full_name,
            api_token,
            api_url: get("API_URL"),
            base_branch,
            labels: parse_list(get("LABELS"), &format!("{prefix}_LABELS"))?,
            assignees: parse_list(get("ASSIGNEES"), &format!("{prefix}_ASSIGNEES"))?,
            milestone: milestone.filter(|number| *number > 0),
            related_pr_behavior,
        })
    }

    /// Whether labels, assignees, or a milestone need to be applied after creation.
    pub fn has_metadata(&self) -> bool {
        !self.labels.is_empty() || !self.assignees.is_empty() || self.milestone.is_some()
    }
}

/// Accepts a JSON array of strings or a comma separated list.
fn parse_list(value: Option<String>, name: &str) -> Result<Vec<String>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    let value = value.trim();
    if value.starts_with('[') {
        return serde_json::from_str(value).map_err(|e| {
            DepsError::Configuration(format!("{name} is not a JSON list of strings: {e}"))
        });
    }

    Ok(value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}
