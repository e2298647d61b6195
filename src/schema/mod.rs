//! Dependency JSON exchanged with collector and actor processes.
//!
//! Maps are ordered so that serialisation, reporting, and branch naming are
//! deterministic for a given content.

mod diff;
mod lockfile;
mod manifest;

pub use diff::{Category, Changes, Classification, Classified, DependencyKind, classify};
pub use lockfile::{Lockfile, LockfileDependency, LockfileVersion};
pub use manifest::{Manifest, ManifestChange, ManifestDependency, ManifestVersion};

use crate::error::{DepsError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

pub const BRANCH_PREFIX: &str = "deps/update-";
/// Hex characters of the content hash used in ids and branch names.
pub const ID_LENGTH: usize = 10;
const MAX_SLUG_LENGTH: usize = 48;
const SLUG_DIGEST_LENGTH: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub name: String,
}

impl Version {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A package reference as reported by a collector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default)]
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_transitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// One observed state of a manifest or lockfile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySnapshot {
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Dependency>,
}

impl DependencySnapshot {
    /// Keeps only the named dependencies, leaving the fingerprint as is.
    pub fn project<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let dependencies = names
            .into_iter()
            .filter_map(|name| {
                self.dependencies
                    .get(name)
                    .map(|dep| (name.to_string(), dep.clone()))
            })
            .collect();

        Self {
            fingerprint: self.fingerprint.clone(),
            dependencies,
        }
    }

    fn validate(&self, label: &str) -> Result<()> {
        if self.fingerprint.trim().is_empty() {
            return Err(DepsError::Validation(format!(
                "{label}: fingerprint is required"
            )));
        }

        for (name, dependency) in &self.dependencies {
            if dependency.version.name.trim().is_empty() {
                return Err(DepsError::Validation(format!(
                    "{label}: dependency `{name}` is missing version.name"
                )));
            }
        }

        Ok(())
    }
}

/// Checks a current/updated pair before it is diffed.
fn validate_pair(
    label: &str,
    current: &DependencySnapshot,
    updated: Option<&DependencySnapshot>,
) -> Result<()> {
    current.validate(&format!("{label} (current)"))?;

    let Some(updated) = updated else {
        return Ok(());
    };
    updated.validate(&format!("{label} (updated)"))?;

    for (name, dependency) in &updated.dependencies {
        if let Some(previous) = current.dependencies.get(name) {
            if previous.is_transitive != dependency.is_transitive {
                return Err(DepsError::Validation(format!(
                    "{label}: dependency `{name}` is direct on one side and transitive on the other"
                )));
            }
        }
    }

    if current.fingerprint != updated.fingerprint
        && !classify(&current.dependencies, &updated.dependencies).has_changes()
    {
        return Err(DepsError::Validation(format!(
            "{label}: fingerprint changed but no dependency did"
        )));
    }

    Ok(())
}

/// Everything one collector run observed for one dependency entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub manifests: BTreeMap<String, Manifest>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lockfiles: BTreeMap<String, Lockfile>,
}

impl Dependencies {
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DepsError::Collection(format!("Failed to read {}: {e}", path.display()))
        })?;

        if content.trim().is_empty() {
            return Err(DepsError::Collection(format!(
                "No dependencies JSON was written to {}",
                path.display()
            )));
        }

        serde_json::from_str(&content).map_err(|e| {
            DepsError::Collection(format!("Invalid dependencies JSON in {}: {e}", path.display()))
        })
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        for (path, lockfile) in &self.lockfiles {
            lockfile.validate(path)?;
        }
        for (path, manifest) in &self.manifests {
            manifest.validate(path)?;
        }
        Ok(())
    }

    pub fn has_updates(&self) -> bool {
        self.lockfiles.values().any(Lockfile::has_updates)
            || self.manifests.values().any(Manifest::has_updates)
    }

    /// Short content hash, identical for structurally identical values.
    pub fn id(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        serde_json::to_writer(&mut hasher, self)?;
        let mut id = hex::encode(hasher.finalize());
        id.truncate(ID_LENGTH);
        Ok(id)
    }

    /// Branch prefix shared by every update of the same dependency target.
    pub fn lineage(&self) -> String {
        let mut parts: Vec<String> = self
            .lockfiles
            .iter()
            .filter(|(_, lockfile)| lockfile.has_updates())
            .map(|(path, _)| path.clone())
            .collect();
        for manifest in self.manifests.values() {
            parts.extend(manifest.changed_names());
        }

        format!("{BRANCH_PREFIX}{}", slugify(&parts.join("-")))
    }

    pub fn branch_name(&self) -> Result<String> {
        Ok(format!("{}-{}", self.lineage(), self.id()?))
    }

    fn manifest_changes(&self) -> Vec<ManifestChange<'_>> {
        self.manifests
            .iter()
            .flat_map(|(path, manifest)| manifest.changes(path))
            .collect()
    }

    pub fn title(&self) -> String {
        let lockfile_paths: Vec<&str> = self
            .lockfiles
            .iter()
            .filter(|(_, lockfile)| lockfile.has_updates())
            .map(|(path, _)| path.as_str())
            .collect();
        let changes = self.manifest_changes();

        match (lockfile_paths.as_slice(), changes.as_slice()) {
            ([], [change]) => change.title(),
            ([], [first, rest @ ..]) if rest.iter().all(|c| c.path == first.path) => {
                format!("Update {} dependencies in {}", changes.len(), first.path)
            }
            ([path], []) => format!("Update {path}"),
            _ => "Update dependencies".to_string(),
        }
    }

    pub fn body(&self) -> String {
        let mut lines = Vec::new();
        for (path, lockfile) in &self.lockfiles {
            if lockfile.has_updates() {
                lines.push(lockfile.summary_line(path));
            }
        }
        lines.extend(self.manifest_changes().iter().map(ManifestChange::summary_line));

        format!(
            "The following dependencies have been updated:\n\n{}\n",
            lines.join("\n")
        )
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        return "dependencies".to_string();
    }
    if slug.len() <= MAX_SLUG_LENGTH {
        return slug.to_string();
    }

    // Truncated slugs end in a digest of the full text
    let digest = hex::encode(Sha256::digest(text.as_bytes()));
    let head = slug[..MAX_SLUG_LENGTH - SLUG_DIGEST_LENGTH - 1].trim_end_matches('-');
    format!("{head}-{}", &digest[..SLUG_DIGEST_LENGTH])
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn direct(version: &str) -> Dependency {
        Dependency {
            version: Version::new(version),
            ..Default::default()
        }
    }

    pub fn transitive(version: &str) -> Dependency {
        Dependency {
            is_transitive: true,
            ..direct(version)
        }
    }

    pub fn deps<const N: usize>(entries: [(&str, Dependency); N]) -> BTreeMap<String, Dependency> {
        entries
            .into_iter()
            .map(|(name, dep)| (name.to_string(), dep))
            .collect()
    }

    pub fn snapshot<const N: usize>(
        fingerprint: &str,
        entries: [(&str, Dependency); N],
    ) -> DependencySnapshot {
        DependencySnapshot {
            fingerprint: fingerprint.to_string(),
            dependencies: deps(entries),
        }
    }

    pub fn lockfile_update(path: &str, current: DependencySnapshot, updated: DependencySnapshot) -> Dependencies {
        Dependencies {
            lockfiles: BTreeMap::from([(
                path.to_string(),
                Lockfile {
                    current,
                    updated: Some(updated),
                },
            )]),
            ..Default::default()
        }
    }

    pub fn manifest_update(path: &str, current: DependencySnapshot, updated: DependencySnapshot) -> Dependencies {
        Dependencies {
            manifests: BTreeMap::from([(
                path.to_string(),
                Manifest {
                    lockfile_path: None,
                    current,
                    updated: Some(updated),
                },
            )]),
            ..Default::default()
        }
    }
}
