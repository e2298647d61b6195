use super::Dependency;
use std::collections::BTreeMap;
use std::fmt;

/// Whether a dependency is declared by the project or pulled in by another one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyKind {
    Direct,
    Transitive,
}

impl DependencyKind {
    pub fn of(dependency: &Dependency) -> Self {
        if dependency.is_transitive {
            DependencyKind::Transitive
        } else {
            DependencyKind::Direct
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DependencyKind::Direct => "direct",
            DependencyKind::Transitive => "transitive",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Added,
    Removed,
    Updated,
    Unchanged,
}

/// Changed dependency names of one kind, each list sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    pub updated: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub category: Category,
    pub kind: DependencyKind,
}

/// Per-name outcome of comparing a current and an updated dependency map.
///
/// Every name from either side appears exactly once.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    entries: BTreeMap<String, Classified>,
}

impl Classification {
    pub fn get(&self, name: &str) -> Option<Classified> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Names in `category`, sorted
    pub fn names(&self, category: Category) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(_, c)| c.category == category)
            .map(|(name, _)| name.as_str())
    }

    /// Every name that is not unchanged, sorted
    pub fn changed_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, c)| c.category != Category::Unchanged)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.entries
            .values()
            .any(|c| c.category != Category::Unchanged)
    }

    /// Groups the changed names by dependency kind. Unchanged names are left out.
    pub fn by_kind(&self) -> BTreeMap<DependencyKind, Changes> {
        let mut by_kind: BTreeMap<DependencyKind, Changes> = BTreeMap::new();

        for (name, classified) in &self.entries {
            let changes = by_kind.entry(classified.kind).or_default();
            match classified.category {
                Category::Updated => changes.updated.push(name.clone()),
                Category::Added => changes.added.push(name.clone()),
                Category::Removed => changes.removed.push(name.clone()),
                Category::Unchanged => {}
            }
        }

        by_kind.retain(|_, changes| !changes.is_empty());
        by_kind
    }

    pub fn changes(&self, kind: DependencyKind) -> Changes {
        self.by_kind().remove(&kind).unwrap_or_default()
    }
}

/// Compares two dependency maps by version identity.
///
/// The kind comes from the current record when there is one, otherwise from
/// the updated record.
pub fn classify(
    current: &BTreeMap<String, Dependency>,
    updated: &BTreeMap<String, Dependency>,
) -> Classification {
    let mut entries = BTreeMap::new();

    for (name, dependency) in current {
        let category = match updated.get(name) {
            None => Category::Removed,
            Some(next) if next.version.name != dependency.version.name => Category::Updated,
            Some(_) => Category::Unchanged,
        };
        entries.insert(
            name.clone(),
            Classified {
                category,
                kind: DependencyKind::of(dependency),
            },
        );
    }

    for (name, dependency) in updated {
        if !current.contains_key(name) {
            entries.insert(
                name.clone(),
                Classified {
                    category: Category::Added,
                    kind: DependencyKind::of(dependency),
                },
            );
        }
    }

    Classification { entries }
}
