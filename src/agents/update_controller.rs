use super::component::Component;
use super::version_control::Git;
use crate::error::{DepsError, Result};
use crate::host::{AdapterFactory, PullRequest, PullRequestAdapter};
use crate::output;
use crate::schema::Dependencies;
use jiff::Zoned;
use std::time::Duration;

/// Time the host gets to register a pushed branch before a PR is opened for it.
pub const PUSH_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Where an applied update ends up
pub enum Delivery<'a> {
    /// Change the working tree in place, no branches or commits
    Direct,
    /// Commit on a local update branch
    Commit { base_branch: String },
    /// Commit, push, and open a pull request against `base_branch`
    PullRequest {
        base_branch: String,
        hosts: &'a dyn AdapterFactory,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActOutcome {
    Applied,
    /// The actual update already has a branch; nothing was committed.
    Aborted { branch: String },
    Committed { branch: String },
    Opened { branch: String, pull_request: String },
}

/// Restores the branch and uncommitted work that were in place before an update.
///
/// Restoration runs exactly once: through `release`, or on drop if the
/// guard is abandoned.
struct WorkingTreeGuard<'g> {
    git: &'g mut dyn Git,
    previous_branch: String,
    stashed: bool,
    branch: Option<String>,
    committed: bool,
    released: bool,
}

impl<'g> WorkingTreeGuard<'g> {
    /// Stashes local changes, then arms the guard.
    ///
    /// Nothing is restored when this fails: uncommitted work that could not
    /// be stashed must never reach `reset_and_clean`.
    fn acquire(git: &'g mut dyn Git) -> Result<Self> {
        let previous_branch = git.current_branch()?;

        let mut stashed = false;
        if git.has_uncommitted_changes()? {
            output::event("Stashing uncommitted changes");
            let message = format!(
                "deps save before update {}",
                Zoned::now().strftime("%Y-%m-%d %H:%M:%S")
            );
            stashed = git.stash(&message)?;
        }

        Ok(Self {
            git,
            previous_branch,
            stashed,
            branch: None,
            committed: false,
            released: false,
        })
    }

    fn git(&mut self) -> &mut (dyn Git + 'g) {
        &mut *self.git
    }

    fn create_branch(&mut self, name: &str) -> Result<()> {
        output::event(format!("Creating branch {name}"));
        self.git.create_branch(name)?;
        self.branch = Some(name.to_string());
        Ok(())
    }

    fn rename_branch(&mut self, to: &str) -> Result<()> {
        let Some(from) = self.branch.clone() else {
            return Err(DepsError::GitOperation(
                "no update branch to rename".to_string(),
            ));
        };
        self.git.rename_branch(&from, to)?;
        self.branch = Some(to.to_string());
        Ok(())
    }

    fn commit(&mut self, message: &str) -> Result<()> {
        self.git.add_commit(message)?;
        self.committed = true;
        Ok(())
    }

    fn release(mut self) -> Result<()> {
        self.released = true;
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        let result = self.restore_steps();
        if result.is_err() && self.stashed {
            output::warning("Your uncommitted changes are still saved in `git stash`");
        }
        result.map_err(|e| DepsError::Cleanup(e.to_string()))
    }

    fn restore_steps(&mut self) -> Result<()> {
        // Without an update branch the tree was never handed to the actor
        if let Some(branch) = self.branch.take() {
            output::debug("Resetting the working tree");
            self.git.reset_and_clean()?;
            self.git.checkout(&self.previous_branch)?;

            if !self.committed {
                output::debug(format!("Deleting unused branch {branch}"));
                self.git.delete_branch(&branch)?;
            }
        }

        if self.stashed {
            output::event("Putting original uncommitted changes back");
            self.git.stash_pop()?;
            self.stashed = false;
        }

        Ok(())
    }
}

impl Drop for WorkingTreeGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.restore() {
            output::error(e);
        }
    }
}

/// Applies one update and carries it through the configured delivery.
pub struct UpdateController<'a> {
    delivery: Delivery<'a>,
    push_delay: Duration,
}

impl<'a> UpdateController<'a> {
    pub fn new(delivery: Delivery<'a>) -> Self {
        Self {
            delivery,
            push_delay: PUSH_SETTLE_DELAY,
        }
    }

    pub fn with_push_delay(mut self, push_delay: Duration) -> Self {
        self.push_delay = push_delay;
        self
    }

    /// Runs the actor for `input` and delivers the result.
    ///
    /// `git` may only be absent for direct delivery.
    pub fn act(
        &self,
        git: Option<&mut (dyn Git + '_)>,
        component: &dyn Component,
        input: &Dependencies,
    ) -> Result<ActOutcome> {
        let base_branch = match &self.delivery {
            Delivery::Direct => {
                output::event(format!(
                    "Applying update with {} directly (no branches)",
                    component.name()
                ));
                component.act(input)?.validate()?;
                return Ok(ActOutcome::Applied);
            }
            Delivery::Commit { base_branch } | Delivery::PullRequest { base_branch, .. } => {
                base_branch.as_str()
            }
        };

        let git = git.ok_or_else(|| {
            DepsError::Configuration("a git repository is required to create update branches".into())
        })?;
        let predicted = input.branch_name()?;
        let mut tree = WorkingTreeGuard::acquire(git)?;
        let result = tree
            .create_branch(&predicted)
            .and_then(|()| self.deliver(&mut tree, component, input, &predicted, base_branch));

        match tree.release() {
            Ok(()) => result,
            Err(cleanup) => {
                if let Err(e) = result {
                    output::error(e);
                }
                Err(cleanup)
            }
        }
    }

    fn deliver(
        &self,
        tree: &mut WorkingTreeGuard<'_>,
        component: &dyn Component,
        input: &Dependencies,
        predicted: &str,
        base_branch: &str,
    ) -> Result<ActOutcome> {
        let actual = component.act(input)?;
        actual.validate()?;

        let branch = actual.branch_name()?;
        if branch != predicted {
            output::debug("Actual update differed from expected, renaming git branch");
            if tree.git().branch_exists(&branch)? {
                output::warning(format!(
                    "Aborting update since branch {branch} already exists"
                ));
                return Ok(ActOutcome::Aborted { branch });
            }
            tree.rename_branch(&branch)?;
        }

        let mut adapter = match &self.delivery {
            Delivery::PullRequest { hosts, .. } => Some(hosts.adapter(
                PullRequest::from_dependencies(&actual, &branch, base_branch),
            )?),
            _ => None,
        };

        tree.commit(&input.title())?;

        let Some(adapter) = adapter.as_mut() else {
            output::success(format!("Committed update to {branch}"));
            return Ok(ActOutcome::Committed { branch });
        };

        push_with_retry(tree.git(), adapter.as_mut(), &branch)?;
        output::wait_with_spinner("Waiting for the host to register the push", self.push_delay);
        adapter.create()?;
        adapter.do_related()?;

        let pull_request = adapter.action().name.clone();
        output::success(format!("Opened {pull_request} from {branch}"));
        Ok(ActOutcome::Opened {
            branch,
            pull_request,
        })
    }
}

/// A failed push gets one adapter repair and one more attempt.
fn push_with_retry(
    git: &mut dyn Git,
    adapter: &mut dyn PullRequestAdapter,
    branch: &str,
) -> Result<()> {
    output::event(format!("Pushing {branch}"));
    let Err(first) = git.push_branch(branch) else {
        return Ok(());
    };

    output::warning(format!("Push failed, preparing the remote and retrying: {first}"));
    adapter.prepare_push(git)?;
    git.push_branch(branch)
}
