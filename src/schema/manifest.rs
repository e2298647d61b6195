use super::{Category, Classification, Dependency, DependencySnapshot, classify, validate_pair};
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub type ManifestVersion = DependencySnapshot;
pub type ManifestDependency = Dependency;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockfile_path: Option<String>,
    pub current: ManifestVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<ManifestVersion>,
}

/// One changed manifest entry, borrowed from the manifest it describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestChange<'a> {
    pub path: &'a str,
    pub name: &'a str,
    pub category: Category,
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
}

impl ManifestChange<'_> {
    pub fn title(&self) -> String {
        match self.category {
            Category::Added => format!("Add {} {}", self.name, self.to.unwrap_or_default()),
            Category::Removed => format!("Remove {}", self.name),
            _ => format!(
                "Update {} from {} to {}",
                self.name,
                self.from.unwrap_or_default(),
                self.to.unwrap_or_default()
            ),
        }
    }

    pub fn summary_line(&self) -> String {
        match self.category {
            Category::Added => format!(
                "- `{}` was added to `{}` at {}",
                self.name,
                self.path,
                self.to.unwrap_or_default()
            ),
            Category::Removed => format!("- `{}` was removed from `{}`", self.name, self.path),
            _ => format!(
                "- `{}` in `{}` was updated from {} to {}",
                self.name,
                self.path,
                self.from.unwrap_or_default(),
                self.to.unwrap_or_default()
            ),
        }
    }
}

impl Manifest {
    pub fn validate(&self, path: &str) -> Result<()> {
        validate_pair(path, &self.current, self.updated.as_ref())
    }

    pub fn classification(&self) -> Classification {
        let updated = self.updated.as_ref().unwrap_or(&self.current);
        classify(&self.current.dependencies, &updated.dependencies)
    }

    pub fn has_updates(&self) -> bool {
        self.updated
            .as_ref()
            .is_some_and(|updated| !updated.dependencies.is_empty())
            && self.classification().has_changes()
    }

    pub fn changed_names(&self) -> Vec<String> {
        self.classification()
            .changed_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Changed entries in name order.
    pub fn changes<'a>(&'a self, path: &'a str) -> Vec<ManifestChange<'a>> {
        let Some(updated) = self.updated.as_ref() else {
            return Vec::new();
        };
        let classification = self.classification();

        classification
            .changed_names()
            .into_iter()
            .filter_map(|name| {
                let (key, _) = self
                    .current
                    .dependencies
                    .get_key_value(name)
                    .or_else(|| updated.dependencies.get_key_value(name))?;
                let category = classification.get(name)?.category;

                Some(ManifestChange {
                    path,
                    name: key.as_str(),
                    category,
                    from: self
                        .current
                        .dependencies
                        .get(name)
                        .map(|dep| dep.version.name.as_str()),
                    to: updated
                        .dependencies
                        .get(name)
                        .map(|dep| dep.version.name.as_str()),
                })
            })
            .collect()
    }

    /// Both snapshots narrowed to `names`, so the subset can still be diffed.
    pub fn subset(&self, names: &[&str]) -> Manifest {
        Manifest {
            lockfile_path: self.lockfile_path.clone(),
            current: self.current.project(names.iter().copied()),
            updated: self
                .updated
                .as_ref()
                .map(|updated| updated.project(names.iter().copied())),
        }
    }
}
