use crate::config::DEFAULT_FILENAME;
use crate::error::{DepsError, Result};
use std::path::{Path, PathBuf};

/// ProjectScannerAgent validates the project structure
pub struct ProjectScannerAgent {
    project_path: PathBuf,
}

impl ProjectScannerAgent {
    pub fn new<P: AsRef<Path>>(project_path: P) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
        }
    }

    /// Validates the project structure.
    ///
    /// A relative `config_override` is resolved against the project directory.
    pub fn validate(&self, config_override: Option<&Path>) -> Result<ProjectInfo> {
        let project_path = self.project_path.canonicalize().map_err(|e| {
            DepsError::Configuration(format!(
                "Project directory {} is not accessible: {e}",
                self.project_path.display()
            ))
        })?;
        if !project_path.is_dir() {
            return Err(DepsError::Configuration(format!(
                "{} is not a directory",
                project_path.display()
            )));
        }

        let config_path = match config_override {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => project_path.join(path),
            None => project_path.join(DEFAULT_FILENAME),
        };
        if !config_path.is_file() {
            return Err(DepsError::Configuration(format!(
                "{} not found",
                config_path.display()
            )));
        }

        // Worktrees and submodules use a `.git` file rather than a directory
        let has_git = project_path.join(".git").exists();

        Ok(ProjectInfo {
            project_path,
            config_path,
            has_git,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProjectInfo {
    pub project_path: PathBuf,
    pub config_path: PathBuf,
    pub has_git: bool,
}
