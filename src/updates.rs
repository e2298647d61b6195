use crate::agents::Component;
use crate::config::DependencyConfig;
use crate::error::Result;
use crate::output;
use crate::schema::Dependencies;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Update kinds enabled for a run, on top of each entry's own settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateScope {
    pub lockfiles: bool,
    pub manifests: bool,
}

impl Default for UpdateScope {
    fn default() -> Self {
        Self {
            lockfiles: true,
            manifests: true,
        }
    }
}

/// One proposed change, applied and delivered on its own.
pub struct Update {
    pub dependencies: Dependencies,
    pub config: Arc<DependencyConfig>,
    pub component: Arc<dyn Component>,
}

impl Update {
    pub fn id(&self) -> Result<String> {
        self.dependencies.id()
    }

    pub fn title(&self) -> String {
        self.dependencies.title()
    }

    pub fn branch_name(&self) -> Result<String> {
        self.dependencies.branch_name()
    }
}

/// Splits collected dependencies into independent updates.
///
/// Every changed lockfile becomes one update. Changed manifest entries are
/// grouped by the entry's filters, each group becoming one update. Lockfile
/// updates come first; within each kind the order follows the paths.
pub fn group_dependencies(
    dependencies: &Dependencies,
    config: &DependencyConfig,
    scope: UpdateScope,
) -> Result<Vec<Dependencies>> {
    let mut groups = Vec::new();

    if scope.lockfiles && config.lockfile_updates.enabled {
        for (path, lockfile) in &dependencies.lockfiles {
            if !lockfile.has_updates() {
                continue;
            }
            groups.push(Dependencies {
                lockfiles: BTreeMap::from([(path.clone(), lockfile.clone())]),
                ..Default::default()
            });
        }
    }

    if scope.manifests && config.manifest_updates.enabled {
        for (path, manifest) in &dependencies.manifests {
            if !manifest.has_updates() {
                continue;
            }

            let changed = manifest.changed_names();
            let names: Vec<&str> = changed.iter().map(String::as_str).collect();
            for group in config.manifest_updates.filtered_groups(&names)? {
                let update = Dependencies {
                    manifests: BTreeMap::from([(path.clone(), manifest.subset(&group))]),
                    ..Default::default()
                };
                if update.has_updates() {
                    groups.push(update);
                }
            }
        }
    }

    Ok(groups)
}

/// Ordered updates for a run
#[derive(Default)]
pub struct Updates(Vec<Update>);

impl Updates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect(
        &mut self,
        dependencies: &Dependencies,
        config: &Arc<DependencyConfig>,
        component: &Arc<dyn Component>,
        scope: UpdateScope,
    ) -> Result<()> {
        for group in group_dependencies(dependencies, config, scope)? {
            self.0.push(Update {
                dependencies: group,
                config: Arc::clone(config),
                component: Arc::clone(component),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Update> {
        self.0.iter()
    }

    /// Splits by `predicate`, keeping the order within each side.
    pub fn partition<F>(self, mut predicate: F) -> Result<(Updates, Updates)>
    where
        F: FnMut(&Update) -> Result<bool>,
    {
        let mut matching = Vec::new();
        let mut rest = Vec::new();
        for update in self.0 {
            if predicate(&update)? {
                matching.push(update);
            } else {
                rest.push(update);
            }
        }
        Ok((Updates(matching), Updates(rest)))
    }

    pub fn print_overview(&self) -> Result<()> {
        if self.is_empty() {
            output::success("No updates found");
            return Ok(());
        }

        for update in self.iter() {
            output::event(format!("[{}] {}", update.id()?, update.title()));
        }
        Ok(())
    }
}

impl IntoIterator for Updates {
    type Item = Update;
    type IntoIter = std::vec::IntoIter<Update>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
