use super::HostSettings;
use crate::schema::{Dependencies, ID_LENGTH};
use serde_json::{Map, Value};

/// What gets proposed to the host for one update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub title: String,
    pub body: String,
    pub branch: String,
    /// Branch the workflow started from
    pub default_base_branch: String,
    /// Branch prefix shared with older updates of the same target
    pub lineage: String,
}

impl PullRequest {
    pub fn from_dependencies(
        dependencies: &Dependencies,
        branch: &str,
        default_base_branch: &str,
    ) -> Self {
        Self {
            title: dependencies.title(),
            body: dependencies.body(),
            branch: branch.to_string(),
            default_base_branch: default_base_branch.to_string(),
            lineage: dependencies.lineage(),
        }
    }

    pub fn base_branch<'a>(&'a self, settings: &'a HostSettings) -> &'a str {
        settings
            .base_branch
            .as_deref()
            .unwrap_or(&self.default_base_branch)
    }
}

/// Outcome of an adapter run, named after the created pull request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Action {
    pub name: String,
    pub metadata: Map<String, Value>,
}

/// A branch belongs to the lineage when it is `<lineage>-<id>` for another id.
pub fn is_related_branch(candidate: &str, lineage: &str, own_branch: &str) -> bool {
    if candidate == own_branch {
        return false;
    }

    candidate
        .strip_prefix(lineage)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|id| id.len() == ID_LENGTH && id.chars().all(|c| c.is_ascii_hexdigit()))
}
