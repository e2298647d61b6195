use crate::error::{DepsError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_FILENAME: &str = "deps.toml";

/// Project configuration read from `deps.toml`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DepsError::Configuration(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.dependencies.is_empty() {
            return Err(DepsError::Configuration("no dependencies found".to_string()));
        }

        for (index, dependency) in self.dependencies.iter().enumerate() {
            if dependency.kind.trim().is_empty() {
                return Err(DepsError::Configuration(format!(
                    "dependencies[{index}] is missing a type"
                )));
            }
            dependency.manifest_updates.compiled_filters()?;
        }

        Ok(())
    }
}

/// One `[[dependencies]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_path")]
    pub path: String,
    pub install: Option<String>,
    pub collect: Option<String>,
    pub act: Option<String>,
    #[serde(default)]
    pub settings: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub lockfile_updates: LockfileUpdates,
    #[serde(default)]
    pub manifest_updates: ManifestUpdates,
}

fn default_path() -> String {
    ".".to_string()
}

fn enabled() -> bool {
    true
}

impl DependencyConfig {
    pub fn collect_command(&self) -> String {
        self.collect
            .clone()
            .unwrap_or_else(|| format!("deps-{} collect", self.kind))
    }

    pub fn act_command(&self) -> String {
        self.act
            .clone()
            .unwrap_or_else(|| format!("deps-{} act", self.kind))
    }

    /// Variables exported to the component processes for this entry.
    ///
    /// Settings are JSON encoded under `DEPS_SETTING_<KEY>`.
    pub fn environ(&self) -> Result<Vec<(String, String)>> {
        let mut vars = Vec::with_capacity(self.settings.len() + self.env.len());

        for (key, value) in &self.settings {
            let name = format!("DEPS_SETTING_{}", key.to_uppercase().replace('-', "_"));
            vars.push((name, serde_json::to_string(value)?));
        }
        for (key, value) in &self.env {
            vars.push((key.clone(), value.clone()));
        }

        Ok(vars)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockfileUpdates {
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl Default for LockfileUpdates {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestUpdates {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub filters: Vec<ManifestFilter>,
}

impl Default for ManifestUpdates {
    fn default() -> Self {
        Self {
            enabled: true,
            filters: Vec::new(),
        }
    }
}

/// Routes matching dependency names into update groups.
///
/// `name` is a regular expression matched against the whole name.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestFilter {
    #[serde(default = "match_all")]
    pub name: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub group: bool,
}

fn match_all() -> String {
    ".*".to_string()
}

impl Default for ManifestFilter {
    fn default() -> Self {
        Self {
            name: match_all(),
            enabled: true,
            group: false,
        }
    }
}

impl ManifestUpdates {
    fn compiled_filters(&self) -> Result<Vec<(Regex, ManifestFilter)>> {
        let filters = if self.filters.is_empty() {
            vec![ManifestFilter::default()]
        } else {
            self.filters.clone()
        };

        filters
            .into_iter()
            .map(|filter| {
                let regex = Regex::new(&format!("^(?:{})$", filter.name)).map_err(|e| {
                    DepsError::Configuration(format!(
                        "Invalid manifest filter '{}': {e}",
                        filter.name
                    ))
                })?;
                Ok((regex, filter))
            })
            .collect()
    }

    /// Splits changed dependency names into update groups.
    ///
    /// Each name is claimed by the first filter that matches it. Disabled
    /// filters drop their names, grouping filters collect them into one group,
    /// the rest yield one group per name. Unmatched names are dropped.
    pub fn filtered_groups<'a>(&self, names: &[&'a str]) -> Result<Vec<Vec<&'a str>>> {
        let filters = self.compiled_filters()?;
        let mut claimed = vec![false; names.len()];
        let mut groups = Vec::new();

        for (regex, filter) in &filters {
            let mut matched = Vec::new();
            for (index, name) in names.iter().enumerate() {
                if !claimed[index] && regex.is_match(name) {
                    claimed[index] = true;
                    matched.push(*name);
                }
            }

            if !filter.enabled || matched.is_empty() {
                continue;
            }
            if filter.group {
                groups.push(matched);
            } else {
                groups.extend(matched.into_iter().map(|name| vec![name]));
            }
        }

        Ok(groups)
    }
}
