use crate::agents::{
    ActOutcome, Component, ComponentAgent, Delivery, Git, ProjectInfo, ProjectScannerAgent,
    UpdateController, VersionControlAgent,
};
use crate::config::{Config, DependencyConfig};
use crate::error::{DepsError, Result};
use crate::host::{GitHost, HostAdapters};
use crate::output;
use crate::updates::{UpdateScope, Updates};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options shared by every command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub scope: UpdateScope,
}

/// Builds the component for the entry at `index`
type ComponentFactory<'a> = dyn Fn(Arc<DependencyConfig>, usize) -> Arc<dyn Component> + 'a;

/// Collect updates and report which ones already have branches
pub fn execute_check<P: AsRef<Path>>(project_path: P, options: &RunOptions) -> Result<()> {
    println!("{}", "Checking for dependency updates...".cyan().bold());
    let (project, config) = load_project(project_path.as_ref(), options)?;

    let mut git = open_git(&project)?;
    let updates = collect_with_components(&project, &config, options.scope)?;
    report(updates, git.as_mut().map(|git| git as &mut dyn Git))?;

    println!("\n{}", "✨ Check completed".green().bold());
    Ok(())
}

/// Apply updates locally, in place or each on its own committed branch
pub fn execute_update<P: AsRef<Path>>(
    project_path: P,
    options: &RunOptions,
    branch: bool,
) -> Result<()> {
    println!("{}", "Starting dependency update process...".cyan().bold());
    let (project, config) = load_project(project_path.as_ref(), options)?;

    let mut git = open_git(&project)?;
    let delivery = match (&mut git, branch) {
        (_, false) => Delivery::Direct,
        (Some(git), true) => Delivery::Commit {
            base_branch: git.current_branch()?,
        },
        (None, true) => {
            return Err(DepsError::Configuration(
                "--branch needs a git repository".to_string(),
            ));
        }
    };

    let updates = collect_with_components(&project, &config, options.scope)?;
    let new = report(updates, git.as_mut().map(|git| git as &mut dyn Git))?;
    let controller = UpdateController::new(delivery);
    let outcomes = apply_updates(new, git.as_mut().map(|git| git as &mut dyn Git), &controller)?;

    print_outcomes(&outcomes);
    println!(
        "\n{}",
        "✨ Update process completed successfully!".green().bold()
    );
    Ok(())
}

/// Full CI lifecycle: branch, commit, push, and open pull requests
pub fn execute_ci<P: AsRef<Path>>(
    project_path: P,
    options: &RunOptions,
    base_branch: Option<String>,
    host: Option<&str>,
) -> Result<()> {
    println!("{}", "Starting dependency update pull requests...".cyan().bold());
    let (project, config) = load_project(project_path.as_ref(), options)?;

    let mut git = open_git(&project)?.ok_or_else(|| {
        DepsError::Configuration(format!(
            "{} is not a git repository",
            project.project_path.display()
        ))
    })?;

    let remote = git.remote_url().ok();
    let host = GitHost::resolve(host, |key| std::env::var(key).ok(), remote.as_deref())?;
    let hosts = HostAdapters::from_env(host, remote.as_deref())?;
    let base_branch = match base_branch {
        Some(branch) => branch,
        None => git.current_branch()?,
    };
    output::event(format!(
        "Opening {host} pull requests against {base_branch}"
    ));

    let updates = collect_with_components(&project, &config, options.scope)?;
    let new = report(updates, Some(&mut git as &mut dyn Git))?;
    let controller = UpdateController::new(Delivery::PullRequest {
        base_branch,
        hosts: &hosts,
    });
    let outcomes = apply_updates(new, Some(&mut git as &mut dyn Git), &controller)?;

    print_outcomes(&outcomes);
    println!(
        "\n{}",
        "✨ Update process completed successfully!".green().bold()
    );
    Ok(())
}

fn load_project(project_path: &Path, options: &RunOptions) -> Result<(ProjectInfo, Config)> {
    println!("\n{}", "1. Validating project structure...".yellow());
    let scanner = ProjectScannerAgent::new(project_path);
    let project = scanner.validate(options.config_path.as_deref())?;
    let config = Config::load(&project.config_path)?;
    println!(
        "{}",
        format!(
            "✓ Found {} dependency entries in {}",
            config.dependencies.len(),
            project.config_path.display()
        )
        .green()
    );
    Ok((project, config))
}

fn open_git(project: &ProjectInfo) -> Result<Option<VersionControlAgent>> {
    if !project.has_git {
        println!(
            "{}",
            "Git repository not detected, skipping Git checks".yellow()
        );
        return Ok(None);
    }
    VersionControlAgent::new(&project.project_path).map(Some)
}

fn collect_with_components(
    project: &ProjectInfo,
    config: &Config,
    scope: UpdateScope,
) -> Result<Updates> {
    println!("\n{}", "2. Collecting dependencies...".yellow());
    let project_path = project.project_path.clone();
    let factory = move |entry: Arc<DependencyConfig>, index: usize| -> Arc<dyn Component> {
        Arc::new(ComponentAgent::new(entry, &project_path, index))
    };
    collect_updates(config, scope, &factory)
}

/// Install, collect, validate, and group every entry in configured order.
///
/// Any failure here aborts the run before the working tree is touched.
fn collect_updates(
    config: &Config,
    scope: UpdateScope,
    make_component: &ComponentFactory<'_>,
) -> Result<Updates> {
    let mut updates = Updates::new();

    for (index, entry) in config.dependencies.iter().enumerate() {
        let entry = Arc::new(entry.clone());
        let component = make_component(Arc::clone(&entry), index);

        component.install()?;
        let dependencies = component.collect()?;
        dependencies.validate()?;
        updates.collect(&dependencies, &entry, &component, scope)?;
    }

    Ok(updates)
}

/// Prints the overview and returns the updates that still need a branch.
fn report(updates: Updates, git: Option<&mut (dyn Git + '_)>) -> Result<Updates> {
    println!("\n{}", "3. Comparing with existing branches...".yellow());
    let (existing, new) = match git {
        Some(git) => updates.partition(|update| git.branch_exists(&update.branch_name()?))?,
        None => (Updates::new(), updates),
    };

    if existing.is_empty() && new.is_empty() {
        output::success("No updates found");
        return Ok(new);
    }
    if !existing.is_empty() {
        println!();
        output::event(format!("{} existing updates", existing.len()));
        existing.print_overview()?;
    }
    if !new.is_empty() {
        println!();
        output::event(format!("{} new updates to be made", new.len()));
        new.print_overview()?;
    }

    Ok(new)
}

/// Runs every update through the controller, one at a time.
///
/// A failed update is reported and the run moves on, unless the failure
/// leaves the working tree in an unknown state.
fn apply_updates(
    updates: Updates,
    mut git: Option<&mut (dyn Git + '_)>,
    controller: &UpdateController<'_>,
) -> Result<Vec<ActOutcome>> {
    if updates.is_empty() {
        return Ok(Vec::new());
    }

    println!("\n{}", "4. Applying updates...".yellow());
    let total = updates.len();
    let mut failed = 0;
    let mut outcomes = Vec::with_capacity(total);

    for (index, update) in updates.into_iter().enumerate() {
        println!(
            "\n{}",
            format!("[{}/{}] {}", index + 1, total, update.title()).bold()
        );
        match controller.act(
            git.as_deref_mut(),
            update.component.as_ref(),
            &update.dependencies,
        ) {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) if e.aborts_run() => return Err(e),
            Err(e) => {
                output::error(&e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(DepsError::UpdatesFailed { failed, total });
    }
    Ok(outcomes)
}

fn print_outcomes(outcomes: &[ActOutcome]) {
    if outcomes.is_empty() {
        println!("\n{}", "No updates were applied".yellow());
        return;
    }

    println!("\n{}", "Summary:".cyan().bold());
    for outcome in outcomes {
        match outcome {
            ActOutcome::Applied => println!("  {} applied in place", "•".green()),
            ActOutcome::Aborted { branch } => {
                println!("  {} skipped, {} already exists", "•".yellow(), branch)
            }
            ActOutcome::Committed { branch } => {
                println!("  {} committed to {}", "•".green(), branch.bright_cyan())
            }
            ActOutcome::Opened {
                branch,
                pull_request,
            } => println!(
                "  {} {} opened from {}",
                "•".green(),
                pull_request.bold(),
                branch.bright_cyan()
            ),
        }
    }
}
