use crate::config::DependencyConfig;
use crate::error::{DepsError, Result};
use crate::output;
use crate::schema::Dependencies;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tempfile::TempPath;

/// Index of the `[[dependencies]]` entry a component runs for.
pub const DEPENDENCY_INDEX_ENV: &str = "DEPS_DEPENDENCY_INDEX";

/// Ecosystem-specific collector and actor for one dependency entry.
pub trait Component {
    fn name(&self) -> &str;
    fn install(&self) -> Result<()>;
    fn collect(&self) -> Result<Dependencies>;
    /// Applies `input` to the working tree and reports what actually changed.
    fn act(&self, input: &Dependencies) -> Result<Dependencies>;
}

/// ComponentAgent runs the configured install/collect/act commands.
///
/// Collect is invoked as `<collect> <path> <output.json>` and act as
/// `<act> <input.json> <output.json>`, both from the project directory.
pub struct ComponentAgent {
    config: Arc<DependencyConfig>,
    project_path: PathBuf,
    index: usize,
    keep_scratch: bool,
}

impl ComponentAgent {
    pub fn new<P: AsRef<Path>>(config: Arc<DependencyConfig>, project_path: P, index: usize) -> Self {
        Self {
            config,
            project_path: project_path.as_ref().to_path_buf(),
            index,
            keep_scratch: output::is_debug(),
        }
    }

    /// Leave exchange files behind for inspection (on by default in debug mode)
    pub fn keep_scratch_files(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }

    /// Deletes a scratch file unless it should be kept for inspection.
    fn release(&self, path: TempPath) {
        if !self.keep_scratch {
            return;
        }
        match path.keep() {
            Ok(kept) => output::debug(format!("Kept {}", kept.display())),
            Err(e) => output::debug(format!("Could not keep temp file: {e}")),
        }
    }

    /// Execute a component command with live output streaming
    fn execute(&self, command_line: &str, args: &[&OsStr]) -> Result<()> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            DepsError::Configuration(format!("Empty command for {} dependencies", self.config.kind))
        })?;
        let program = self.resolve_program(program);

        output::debug(format!("Executing: {command_line}"));

        let mut command = Command::new(&program);
        command
            .current_dir(&self.project_path)
            .args(parts)
            .args(args)
            .envs(self.config.environ()?)
            .env(DEPENDENCY_INDEX_ENV, self.index.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = command.spawn().map_err(|e| {
            DepsError::Collection(format!("Failed to spawn `{command_line}`: {e}"))
        })?;

        if let Some(stdout) = child.stdout.take() {
            let reader = BufReader::new(stdout);
            for line in reader.lines().map_while(std::result::Result::ok) {
                println!("{line}");
            }
        }

        let status = child.wait().map_err(|e| {
            DepsError::Collection(format!("Failed to wait for `{command_line}`: {e}"))
        })?;

        if !status.success() {
            return Err(DepsError::Collection(format!(
                "`{command_line}` failed with exit code: {}",
                status.code().unwrap_or(-1)
            )));
        }

        Ok(())
    }

    /// Relative program paths like `./bin/collect` are anchored at the project.
    fn resolve_program(&self, program: &str) -> PathBuf {
        let path = Path::new(program);
        if path.is_relative() && path.components().count() > 1 {
            self.project_path.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

fn scratch_file(prefix: &str) -> Result<TempPath> {
    Ok(tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".json")
        .tempfile()?
        .into_temp_path())
}

impl Component for ComponentAgent {
    fn name(&self) -> &str {
        &self.config.kind
    }

    fn install(&self) -> Result<()> {
        match &self.config.install {
            Some(install) => {
                output::event(format!("Installing {} component", self.config.kind));
                self.execute(install, &[])
            }
            None => Ok(()),
        }
    }

    fn collect(&self) -> Result<Dependencies> {
        output::event(format!(
            "Collecting {} dependencies in {}",
            self.config.kind, self.config.path
        ));

        let output_path = scratch_file("deps-collect-")?;
        let collected = self
            .execute(
                &self.config.collect_command(),
                &[OsStr::new(&self.config.path), output_path.as_os_str()],
            )
            .and_then(|()| Dependencies::from_json_path(&output_path));
        self.release(output_path);
        collected
    }

    fn act(&self, input: &Dependencies) -> Result<Dependencies> {
        let input_path = scratch_file("deps-act-input-")?;
        std::fs::write(&input_path, input.to_pretty_json()?)?;
        let output_path = scratch_file("deps-act-output-")?;

        let acted = self
            .execute(
                &self.config.act_command(),
                &[input_path.as_os_str(), output_path.as_os_str()],
            )
            .and_then(|()| Dependencies::from_json_path(&output_path));
        self.release(input_path);
        self.release(output_path);
        acted
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Component that replays canned results.
    #[derive(Default)]
    pub struct FakeComponent {
        pub collected: Dependencies,
        /// Output of `act`; `None` makes the actor fail
        pub acted: Option<Dependencies>,
        pub act_inputs: RefCell<Vec<Dependencies>>,
    }

    impl FakeComponent {
        pub fn acting(acted: Dependencies) -> Self {
            Self {
                acted: Some(acted),
                ..Default::default()
            }
        }
    }

    impl Component for FakeComponent {
        fn name(&self) -> &str {
            "fake"
        }

        fn install(&self) -> Result<()> {
            Ok(())
        }

        fn collect(&self) -> Result<Dependencies> {
            Ok(self.collected.clone())
        }

        fn act(&self, input: &Dependencies) -> Result<Dependencies> {
            self.act_inputs.borrow_mut().push(input.clone());
            self.acted
                .clone()
                .ok_or_else(|| DepsError::Collection("actor exited with code 1".into()))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::schema::test_support::{direct, lockfile_update, snapshot};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn script(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn agent(dir: &Path, toml: &str) -> ComponentAgent {
        let config = Config::parse(toml).unwrap();
        ComponentAgent::new(Arc::new(config.dependencies[0].clone()), dir, 3)
    }

    #[test]
    fn collect_reads_output_file() {
        let dir = tempdir().unwrap();
        let expected = lockfile_update(
            "Cargo.lock",
            snapshot("a", [("serde", direct("1.0.0"))]),
            snapshot("b", [("serde", direct("1.0.1"))]),
        );
        fs::write(dir.path().join("fixture.json"), expected.to_pretty_json().unwrap()).unwrap();
        script(dir.path(), "collect.sh", "cp fixture.json \"$2\"");

        let agent = agent(
            dir.path(),
            "[[dependencies]]\ntype = \"rust\"\ncollect = \"./collect.sh\"\n",
        );

        assert_eq!(agent.collect().unwrap(), expected);
    }

    #[test]
    fn act_receives_input_and_environment() {
        let dir = tempdir().unwrap();
        script(
            dir.path(),
            "act.sh",
            "echo \"$DEPS_DEPENDENCY_INDEX $DEPS_SETTING_MODE\" > seen.txt\ncp \"$1\" \"$2\"",
        );
        let agent = agent(
            dir.path(),
            "[[dependencies]]\ntype = \"rust\"\nact = \"./act.sh\"\n[dependencies.settings]\nmode = \"fast\"\n",
        );
        let input = lockfile_update(
            "Cargo.lock",
            snapshot("a", [("serde", direct("1.0.0"))]),
            snapshot("b", [("serde", direct("1.0.1"))]),
        );

        assert_eq!(agent.act(&input).unwrap(), input);
        let seen = fs::read_to_string(dir.path().join("seen.txt")).unwrap();
        assert_eq!(seen.trim(), "3 \"fast\"");
    }

    #[test]
    fn failing_command_is_a_collection_error() {
        let dir = tempdir().unwrap();
        script(dir.path(), "collect.sh", "exit 4");
        let agent = agent(
            dir.path(),
            "[[dependencies]]\ntype = \"rust\"\ncollect = \"./collect.sh\"\n",
        );

        let err = agent.collect().unwrap_err();
        assert!(matches!(err, DepsError::Collection(_)));
        assert!(err.to_string().contains("exit code: 4"));
    }

    #[test]
    fn missing_output_is_a_collection_error() {
        let dir = tempdir().unwrap();
        script(dir.path(), "collect.sh", "true");
        let agent = agent(
            dir.path(),
            "[[dependencies]]\ntype = \"rust\"\ncollect = \"./collect.sh\"\n",
        );

        assert!(matches!(agent.collect(), Err(DepsError::Collection(_))));
    }

    #[test]
    fn failed_actor_keeps_exchange_files_when_asked() {
        let dir = tempdir().unwrap();
        script(
            dir.path(),
            "act.sh",
            "echo \"$1\" > input-path.txt\necho \"$2\" > output-path.txt\nexit 2",
        );
        let agent = agent(
            dir.path(),
            "[[dependencies]]\ntype = \"rust\"\nact = \"./act.sh\"\n",
        )
        .keep_scratch_files(true);
        let input = lockfile_update(
            "Cargo.lock",
            snapshot("a", [("serde", direct("1.0.0"))]),
            snapshot("b", [("serde", direct("1.0.1"))]),
        );

        let err = agent.act(&input).unwrap_err();
        assert!(err.to_string().contains("exit code: 2"));

        let kept = fs::read_to_string(dir.path().join("input-path.txt")).unwrap();
        let kept = Path::new(kept.trim());
        let saved = Dependencies::from_json_path(kept).unwrap();
        assert_eq!(saved, input);
        fs::remove_file(kept).unwrap();

        let output = fs::read_to_string(dir.path().join("output-path.txt")).unwrap();
        let output = Path::new(output.trim());
        assert!(output.exists());
        fs::remove_file(output).unwrap();
    }

    #[test]
    fn failed_actor_removes_exchange_files_by_default() {
        let dir = tempdir().unwrap();
        script(dir.path(), "act.sh", "echo \"$1\" > input-path.txt\nexit 2");
        let agent = agent(
            dir.path(),
            "[[dependencies]]\ntype = \"rust\"\nact = \"./act.sh\"\n",
        )
        .keep_scratch_files(false);
        let input = lockfile_update(
            "Cargo.lock",
            snapshot("a", [("serde", direct("1.0.0"))]),
            snapshot("b", [("serde", direct("1.0.1"))]),
        );

        assert!(agent.act(&input).is_err());
        let kept = fs::read_to_string(dir.path().join("input-path.txt")).unwrap();
        assert!(!Path::new(kept.trim()).exists());
    }

    #[test]
    fn install_is_skipped_when_not_configured() {
        let dir = tempdir().unwrap();
        let agent = agent(dir.path(), "[[dependencies]]\ntype = \"rust\"\n");
        assert!(agent.install().is_ok());
    }
}
