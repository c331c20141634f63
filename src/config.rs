//! Curation configuration, persisted as TOML.
//!
//! Holds the store layout flag, the editor identity, history defaults,
//! deletion policies and the intermediate-relation rule table that decides
//! which nodes count as proxies.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use oxigraph::model::NamedNode;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::StoreMode;
use crate::impact::DeletionPolicy;
use crate::mutation::EditorSettings;
use crate::provenance::HistoryOptions;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Policies for entities a deletion would leave behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionConfig {
    #[serde(default = "default_orphans")]
    pub orphans: DeletionPolicy,
    #[serde(default = "default_proxies")]
    pub proxies: DeletionPolicy,
}

fn default_orphans() -> DeletionPolicy {
    DeletionPolicy::Ask
}
fn default_proxies() -> DeletionPolicy {
    DeletionPolicy::Delete
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            orphans: default_orphans(),
            proxies: default_proxies(),
        }
    }
}

/// One `[[intermediate_relations]]` entry: entities of `subject_class` reach
/// their neighbours through nodes of `intermediate_class`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntermediateRule {
    pub subject_class: String,
    pub intermediate_class: String,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrailConfig {
    /// Statements live in named graphs and are compared as quads.
    #[serde(default)]
    pub dataset_is_quadstore: bool,
    /// Agent credited on every snapshot.
    #[serde(default)]
    pub resp_agent: Option<String>,
    /// Default primary source of new snapshots.
    #[serde(default)]
    pub primary_source: Option<String>,
    #[serde(default)]
    pub history: HistoryOptions,
    #[serde(default)]
    pub deletion: DeletionConfig,
    #[serde(default)]
    pub intermediate_relations: Vec<IntermediateRule>,
}

fn parse_iri(value: &str) -> ConfigResult<NamedNode> {
    NamedNode::new(value).map_err(|_| ConfigError::InvalidIri {
        iri: value.to_string(),
    })
}

impl TrailConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Parse TOML text. `origin` names the source in error messages.
    pub fn from_toml(content: &str, origin: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        // Surface bad IRIs at load time rather than on first use.
        config.editor_settings()?;
        config.intermediate_relations()?;
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn store_mode(&self) -> StoreMode {
        StoreMode::from_quadstore_flag(self.dataset_is_quadstore)
    }

    pub fn editor_settings(&self) -> ConfigResult<EditorSettings> {
        Ok(EditorSettings {
            resp_agent: self.resp_agent.as_deref().map(parse_iri).transpose()?,
            primary_source: self.primary_source.as_deref().map(parse_iri).transpose()?,
        })
    }

    /// Compile the rule list into a lookup table.
    pub fn intermediate_relations(&self) -> ConfigResult<IntermediateRelations> {
        let mut rules = Vec::with_capacity(self.intermediate_relations.len());
        for rule in &self.intermediate_relations {
            rules.push((parse_iri(&rule.subject_class)?, parse_iri(&rule.intermediate_class)?));
        }
        Ok(IntermediateRelations::new(rules))
    }
}

/// Class lookup for intermediate-relation (proxy) nodes.
#[derive(Debug, Clone, Default)]
pub struct IntermediateRelations {
    by_subject: HashMap<NamedNode, HashSet<NamedNode>>,
    intermediate: HashSet<NamedNode>,
}

impl IntermediateRelations {
    /// Build from `(subject_class, intermediate_class)` pairs.
    pub fn new(rules: impl IntoIterator<Item = (NamedNode, NamedNode)>) -> Self {
        let mut table = Self::default();
        for (subject, intermediate) in rules {
            table.intermediate.insert(intermediate.clone());
            table.by_subject.entry(subject).or_default().insert(intermediate);
        }
        table
    }

    /// Whether `class` is an intermediate class for any subject class.
    pub fn is_intermediate(&self, class: &NamedNode) -> bool {
        self.intermediate.contains(class)
    }

    /// Whether `class` is an intermediate class for one of `subject_types`.
    pub fn is_intermediate_for(&self, subject_types: &[NamedNode], class: &NamedNode) -> bool {
        subject_types
            .iter()
            .filter_map(|t| self.by_subject.get(t))
            .any(|classes| classes.contains(class))
    }

    pub fn is_empty(&self) -> bool {
        self.intermediate.is_empty()
    }
}
