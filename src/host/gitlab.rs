use super::{
    Action, HostSettings, PullRequest, PullRequestAdapter, RelatedPrBehavior,
    authenticated_remote, build_client, is_related_branch,
};
use crate::agents::version_control::Git;
use crate::error::{DepsError, Result};
use crate::output;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

const GITLAB_API_URL: &str = "https://gitlab.com/api/v4";

#[derive(Debug, Serialize)]
struct CreateMergeRequest<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    description: &'a str,
    remove_source_branch: bool,
}

#[derive(Debug, Default, Serialize)]
struct MergeRequestFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    assignee_ids: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    milestone_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    iid: u64,
    #[serde(default)]
    web_url: String,
    source_branch: String,
}

/// GitLab merge request for one update
pub struct GitLabMergeRequest {
    pull_request: PullRequest,
    settings: HostSettings,
    client: Client,
    iid: Option<u64>,
    action: Action,
}

impl GitLabMergeRequest {
    pub fn new(pull_request: PullRequest, settings: HostSettings) -> Result<Self> {
        Ok(Self {
            pull_request,
            settings,
            client: build_client()?,
            iid: None,
            action: Action::default(),
        })
    }

    fn api_base(&self) -> &str {
        self.settings
            .api_url
            .as_deref()
            .unwrap_or(GITLAB_API_URL)
            .trim_end_matches('/')
    }

    /// Project-scoped endpoint; the full path is URL encoded as the project id.
    fn project_api(&self, path: &str) -> String {
        let project: String =
            url::form_urlencoded::byte_serialize(self.settings.repo_full_name.as_bytes()).collect();
        format!("{}/projects/{project}/{path}", self.api_base())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("private-token", &self.settings.api_token)
    }

    fn expect_status(response: Response, expected: StatusCode, what: &str) -> Result<Response> {
        let status = response.status();
        if status == expected {
            return Ok(response);
        }
        let text = response.text().unwrap_or_default();
        Err(DepsError::HostApi(format!(
            "{what} failed with {status} (expected {expected}): {text}"
        )))
    }

    fn merge_request_fields(&self) -> MergeRequestFields {
        let assignee_ids = self
            .settings
            .assignees
            .iter()
            .filter_map(|assignee| match assignee.parse::<u64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    output::warning(format!(
                        "GitLab assignees must be user ids, skipping '{assignee}'"
                    ));
                    None
                }
            })
            .collect();

        MergeRequestFields {
            labels: (!self.settings.labels.is_empty()).then(|| self.settings.labels.join(",")),
            assignee_ids,
            milestone_id: self.settings.milestone,
        }
    }

    /// Web origin for the https push remote, derived from the API URL.
    fn web_remote(&self) -> String {
        let host = Url::parse(self.api_base())
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "gitlab.com".to_string());
        format!("https://{host}/{}.git", self.settings.repo_full_name)
    }
}

impl PullRequestAdapter for GitLabMergeRequest {
    fn create(&mut self) -> Result<()> {
        output::event(format!(
            "Creating GitLab merge request on {} from {} into {}",
            self.settings.repo_full_name,
            self.pull_request.branch,
            self.pull_request.base_branch(&self.settings)
        ));

        let payload = CreateMergeRequest {
            source_branch: &self.pull_request.branch,
            target_branch: self.pull_request.base_branch(&self.settings),
            title: &self.pull_request.title,
            description: &self.pull_request.body,
            remove_source_branch: true,
        };
        let response = Self::expect_status(
            self.request(Method::POST, &self.project_api("merge_requests"))
                .json(&payload)
                .send()?,
            StatusCode::CREATED,
            "Creating the merge request",
        )?;

        let data: serde_json::Value = response.json()?;
        let created: MergeRequest = serde_json::from_value(data.clone())?;
        self.iid = Some(created.iid);
        self.action.name = format!("MR !{}", created.iid);
        self.action.metadata.insert("gitlab_merge_request".into(), data);
        output::success(format!("Created {}", created.web_url));

        if self.settings.has_metadata() {
            let fields = self.merge_request_fields();
            let response = self
                .request(
                    Method::PUT,
                    &self.project_api(&format!("merge_requests/{}", created.iid)),
                )
                .json(&fields)
                .send()?;
            if response.status() != StatusCode::OK {
                return Err(DepsError::HostApi(format!(
                    "{} was created but setting labels, assignees, or milestone failed with {}",
                    self.action.name,
                    response.status()
                )));
            }
        }

        Ok(())
    }

    fn do_related(&mut self) -> Result<()> {
        if self.settings.related_pr_behavior == RelatedPrBehavior::Disabled {
            return Ok(());
        }
        let Some(iid) = self.iid else {
            return Err(DepsError::HostApi(
                "related merge requests can only be handled after creating one".into(),
            ));
        };

        let response = Self::expect_status(
            self.request(
                Method::GET,
                &self.project_api("merge_requests?state=opened&per_page=100"),
            )
            .send()?,
            StatusCode::OK,
            "Listing open merge requests",
        )?;
        let open: Vec<MergeRequest> = response.json()?;
        let Some(related) = open.into_iter().find(|mr| {
            mr.iid != iid
                && is_related_branch(
                    &mr.source_branch,
                    &self.pull_request.lineage,
                    &self.pull_request.branch,
                )
        }) else {
            output::event("No related MR found.");
            return Ok(());
        };

        output::event(format!(
            "Closing related MR !{} ({})",
            related.iid, related.source_branch
        ));
        Self::expect_status(
            self.request(
                Method::PUT,
                &self.project_api(&format!("merge_requests/{}", related.iid)),
            )
            .json(&serde_json::json!({ "state_event": "close" }))
            .send()?,
            StatusCode::OK,
            "Closing the related merge request",
        )?;

        let note = format!("This MR has been automatically closed in favor of !{iid}.");
        Self::expect_status(
            self.request(
                Method::POST,
                &self.project_api(&format!("merge_requests/{}/notes", related.iid)),
            )
            .json(&serde_json::json!({ "body": note }))
            .send()?,
            StatusCode::CREATED,
            "Commenting on the related merge request",
        )?;

        Ok(())
    }

    fn prepare_push(&mut self, git: &mut dyn Git) -> Result<()> {
        output::debug("Switching the origin remote to token authentication");
        let remote = git.remote_url()?;
        let url = authenticated_remote(
            &remote,
            &self.web_remote(),
            "oauth2",
            &self.settings.api_token,
        )?;
        git.set_remote_url(&url)
    }

    fn action(&self) -> &Action {
        &self.action
    }
}
