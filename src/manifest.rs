use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PluginError;
use crate::paths::manifest_path_in;
use crate::storage;

pub(crate) const COMMANDS_POINTER: &str = "./commands";
pub(crate) const AGENTS_POINTER: &str = "./agents";
pub(crate) const SKILLS_POINTER: &str = "./skills";
pub(crate) const HOOKS_POINTER: &str = "./hooks/hooks.json";
pub(crate) const MCP_POINTER: &str = "./.mcp.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginAuthor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Per-plugin descriptor stored at `.claude-plugin/plugin.json`.
///
/// The artifact pointer fields (`commands`, `agents`, `skills`, `hooks`,
/// `mcpServers`) are present exactly when the corresponding directory or file
/// exists inside the plugin directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<PluginAuthor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_servers: Option<String>,
}

impl PluginManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            author: None,
            homepage: None,
            repository: None,
            license: None,
            keywords: Vec::new(),
            commands: None,
            agents: None,
            skills: None,
            hooks: None,
            mcp_servers: None,
        }
    }

    pub fn exists_in(plugin_root: &Path) -> bool {
        manifest_path_in(plugin_root).is_file()
    }

    pub async fn load(plugin_root: &Path) -> Result<Self, PluginError> {
        let manifest_path = manifest_path_in(plugin_root);
        if !manifest_path.exists() {
            return Err(PluginError::ManifestNotFound {
                path: manifest_path,
            });
        }
        let content = tokio::fs::read_to_string(&manifest_path).await?;
        serde_json::from_str(&content).map_err(|e| PluginError::InvalidManifest {
            path: manifest_path,
            reason: e.to_string(),
        })
    }

    pub async fn save(&self, plugin_root: &Path) -> Result<(), PluginError> {
        storage::write_json(&manifest_path_in(plugin_root), self).await
    }
}
