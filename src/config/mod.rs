use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub mod validator;
pub mod watcher;

pub use validator::{ConfigValidator, ValidationError};
pub use watcher::ConfigWatcher;

use crate::agents::config::{
    AgentConfig, ContextBudgetConfig, CoordinationConfig, ModelsConfig, SelectionConfig,
};
use crate::cli::Cli;

/// Default config file name under a root directory
pub const CONFIG_FILE: &str = "consilium.toml";

/// Directory (under the root) holding one file per agent
pub const AGENTS_DIR: &str = "config/agents";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub context: ContextBudgetConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    /// HTTP knowledge-retrieval service; retrieval is unavailable without it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalConfig>,
    /// Wiki and issue-tracker endpoints for document references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<DocumentsConfig>,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

/// Knowledge-retrieval service endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Search endpoint; receives `{query, product_scope_id, top_k}` as JSON
    pub endpoint: String,
    /// Environment variable (or credential key) holding a bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

/// Document fetcher endpoints
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DocumentsConfig {
    /// Wiki base URL, used for `wiki:<page-id>` references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_base_url: Option<String>,
    /// Issue-tracker base URL, used for `ticket:<key>` references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_base_url: Option<String>,
    /// Environment variable (or credential key) holding a bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_root(".")
    }

    /// Load settings from the CLI's config path
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        Self::load(&cli.config)
    }

    /// Load `<root>/consilium.toml` plus `<root>/config/agents/*`
    pub fn from_root(root: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        Self::load(&root.as_ref().join(CONFIG_FILE))
    }

    /// Load a config file, env overrides and per-agent files, then validate
    ///
    /// Precedence: environment (`CONSILIUM__SECTION__KEY`) > file > defaults.
    /// Agent files override inline `[[agents]]` entries with the same id.
    pub fn load(config_path: &Path) -> Result<Self, anyhow::Error> {
        let root = Self::root_of(config_path);

        let s = Config::builder()
            .set_default("coordination.default_mode", "enhanced_collaborative")?
            .set_default("selection.default_primary", "general")?
            .add_source(File::from(config_path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("CONSILIUM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = s.try_deserialize()?;
        settings.load_agents_from_dir(&root.join(AGENTS_DIR))?;

        ConfigValidator::validate(&settings).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })?;

        tracing::debug!(
            path = %config_path.display(),
            agents = settings.agents.len(),
            "Settings loaded"
        );
        Ok(settings)
    }

    /// Paths a watcher should observe for `config_path`
    pub fn watch_paths(config_path: &Path) -> Vec<PathBuf> {
        vec![
            config_path.to_path_buf(),
            Self::root_of(config_path).join(AGENTS_DIR),
        ]
    }

    fn root_of(config_path: &Path) -> PathBuf {
        match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn load_agents_from_dir(&mut self, path: &Path) -> Result<(), anyhow::Error> {
        let pattern = format!("{}/*", path.display());
        let mut loaded = Vec::new();

        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) => {
                    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                        if matches!(ext, "json" | "yaml" | "yml" | "toml") {
                            let content = std::fs::read_to_string(&path)?;
                            let agent: AgentConfig = match ext {
                                "json" => serde_json::from_str(&content)?,
                                "toml" => toml::from_str(&content)?,
                                _ => serde_yaml::from_str(&content)?,
                            };
                            loaded.push(agent);
                        }
                    }
                }
                Err(e) => tracing::warn!("Failed to read glob entry: {}", e),
            }
        }

        Self::merge_vec_by_key(&mut self.agents, loaded, |a| a.id.clone());
        Ok(())
    }

    /// Merge two vectors by a key function.
    /// Items from `other` override items in `base` with the same key.
    fn merge_vec_by_key<T, K, F>(base: &mut Vec<T>, other: Vec<T>, key_fn: F)
    where
        K: Eq + std::hash::Hash,
        F: Fn(&T) -> K,
    {
        use std::collections::HashMap;

        let mut key_to_index: HashMap<K, usize> = HashMap::new();
        for (i, item) in base.iter().enumerate() {
            key_to_index.insert(key_fn(item), i);
        }

        for item in other {
            let key = key_fn(&item);
            if let Some(&idx) = key_to_index.get(&key) {
                base[idx] = item;
            } else {
                key_to_index.insert(key, base.len());
                base.push(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_vec_by_key_overrides_and_appends() {
        let mut base = vec![("a", 1), ("b", 2)];
        Settings::merge_vec_by_key(&mut base, vec![("b", 20), ("c", 3), ("c", 30)], |p| p.0);
        assert_eq!(base, vec![("a", 1), ("b", 20), ("c", 30)]);
    }

    #[test]
    fn test_root_of_bare_file_name() {
        assert_eq!(Settings::root_of(Path::new("consilium.toml")), PathBuf::from("."));
        assert_eq!(
            Settings::root_of(Path::new("/etc/consilium/consilium.toml")),
            PathBuf::from("/etc/consilium")
        );
    }

    #[test]
    fn test_watch_paths() {
        let paths = Settings::watch_paths(Path::new("/srv/app/consilium.toml"));
        assert_eq!(paths[1], PathBuf::from("/srv/app/config/agents"));
    }
}
