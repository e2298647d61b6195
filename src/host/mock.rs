use super::{Action, HostSettings, PullRequest, PullRequestAdapter, RelatedPrBehavior};
use crate::agents::version_control::Git;
use crate::error::Result;
use crate::output;
use serde_json::json;

/// Host used for dry runs: prints what would be opened and touches nothing remote.
pub struct TestPullRequest {
    pull_request: PullRequest,
    settings: HostSettings,
    action: Action,
}

impl TestPullRequest {
    pub fn new(pull_request: PullRequest, settings: HostSettings) -> Self {
        Self {
            pull_request,
            settings,
            action: Action::default(),
        }
    }
}

impl PullRequestAdapter for TestPullRequest {
    fn create(&mut self) -> Result<()> {
        let base = self.pull_request.base_branch(&self.settings);
        output::event(format!(
            "Would open pull request from {} into {base}",
            self.pull_request.branch
        ));
        println!("{}\n\n{}", self.pull_request.title, self.pull_request.body);

        self.action.name = "PR #0".to_string();
        self.action.metadata.insert(
            "test_pull_request".into(),
            json!({
                "title": self.pull_request.title,
                "head": self.pull_request.branch,
                "base": base,
            }),
        );
        Ok(())
    }

    fn do_related(&mut self) -> Result<()> {
        if self.settings.related_pr_behavior == RelatedPrBehavior::Close {
            output::event(format!(
                "Would close open pull requests from {}-*",
                self.pull_request.lineage
            ));
        }
        Ok(())
    }

    fn prepare_push(&mut self, _git: &mut dyn Git) -> Result<()> {
        Ok(())
    }

    fn action(&self) -> &Action {
        &self.action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_records_placeholder_action() {
        let mut adapter = TestPullRequest::new(
            PullRequest {
                title: "Update react".into(),
                body: "body".into(),
                branch: "deps/update-react-0123456789".into(),
                default_base_branch: "main".into(),
                lineage: "deps/update-react".into(),
            },
            HostSettings::default(),
        );

        adapter.create().unwrap();
        adapter.do_related().unwrap();

        assert_eq!(adapter.action().name, "PR #0");
        assert_eq!(
            adapter.action().metadata["test_pull_request"]["base"],
            "main"
        );
    }
}
