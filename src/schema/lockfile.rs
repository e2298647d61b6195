use super::{Classification, Dependency, DependencyKind, DependencySnapshot, classify, validate_pair};
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub type LockfileVersion = DependencySnapshot;
pub type LockfileDependency = Dependency;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub current: LockfileVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<LockfileVersion>,
}

impl Lockfile {
    pub fn validate(&self, path: &str) -> Result<()> {
        validate_pair(path, &self.current, self.updated.as_ref())
    }

    /// Without an updated snapshot every dependency is unchanged.
    pub fn classification(&self) -> Classification {
        let updated = self.updated.as_ref().unwrap_or(&self.current);
        classify(&self.current.dependencies, &updated.dependencies)
    }

    pub fn has_updates(&self) -> bool {
        match &self.updated {
            Some(updated) => {
                !updated.dependencies.is_empty() && self.classification().has_changes()
            }
            None => false,
        }
    }

    /// Markdown bullet for a PR body.
    ///
    /// Direct updates are listed by name; transitive ones are only counted.
    pub fn summary_line(&self, path: &str) -> String {
        let classification = self.classification();
        let direct = classification.changes(DependencyKind::Direct);
        let transitive = classification.changes(DependencyKind::Transitive);

        let mut line = format!(
            "- `{path}` was updated (including {} direct and {} transitive dependencies)",
            direct.updated.len(),
            transitive.updated.len()
        );

        for name in &direct.updated {
            let from = version_of(&self.current, name);
            let to = self
                .updated
                .as_ref()
                .map(|updated| version_of(updated, name))
                .unwrap_or_default();
            line.push_str(&format!("\n  - `{name}` was updated from {from} to {to}"));
        }

        line
    }
}

fn version_of<'a>(snapshot: &'a LockfileVersion, name: &str) -> &'a str {
    snapshot
        .dependencies
        .get(name)
        .map(|dep| dep.version.name.as_str())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::test_support::{direct, snapshot, transitive};

    #[test]
    fn summary_counts_direct_and_transitive_updates() {
        let lockfile = Lockfile {
            current: snapshot("old", [("A", direct("1.0"))]),
            updated: Some(snapshot(
                "new",
                [("A", direct("2.0")), ("B", transitive("1.0"))],
            )),
        };

        assert_eq!(
            lockfile.summary_line("lock.json"),
            "- `lock.json` was updated (including 1 direct and 0 transitive dependencies)\n  - `A` was updated from 1.0 to 2.0"
        );
    }

    #[test]
    fn summary_sub_bullets_are_sorted() {
        let lockfile = Lockfile {
            current: snapshot(
                "old",
                [
                    ("zlib", direct("1")),
                    ("attr", direct("1")),
                    ("mio", direct("1")),
                    ("deep", transitive("1")),
                ],
            ),
            updated: Some(snapshot(
                "new",
                [
                    ("mio", direct("2")),
                    ("zlib", direct("2")),
                    ("attr", direct("2")),
                    ("deep", transitive("2")),
                ],
            )),
        };

        let summary = lockfile.summary_line("Cargo.lock");
        let names: Vec<&str> = summary
            .lines()
            .skip(1)
            .map(|line| line.split('`').nth(1).unwrap())
            .collect();

        assert_eq!(names, vec!["attr", "mio", "zlib"]);
        assert!(summary.contains("including 3 direct and 1 transitive dependencies"));
        assert!(!summary.contains("`deep`"));
    }

    #[test]
    fn has_updates_requires_an_updated_snapshot_with_changes() {
        let no_update = Lockfile {
            current: snapshot("old", [("A", direct("1.0"))]),
            updated: None,
        };
        assert!(!no_update.has_updates());

        let empty = Lockfile {
            current: snapshot("old", [("A", direct("1.0"))]),
            updated: Some(snapshot("new", [])),
        };
        assert!(!empty.has_updates());

        let unchanged = Lockfile {
            current: snapshot("same", [("A", direct("1.0"))]),
            updated: Some(snapshot("same", [("A", direct("1.0"))])),
        };
        assert!(!unchanged.has_updates());
    }
}
