//! On-disk layout of a single plugin directory.
//!
//! ```text
//! <root>/plugins/<id>/
//!   .claude-plugin/plugin.json
//!   skills/<skillId>/SKILL.md (+ extra files)
//!   commands/<id>.md
//!   agents/<id>.md
//!   hooks/hooks.json
//!   .mcp.json
//! ```
//!
//! Each artifact kind can be written or removed independently, so the
//! orchestrator can replace just one kind during an update.

use std::path::{Path, PathBuf};

use crate::error::PluginError;
use crate::manifest::PluginManifest;
use crate::paths::{PLUGIN_CONFIG_DIR, StoreLayout};
use crate::skills::SkillInput;
use crate::storage;
use crate::types::ResourceEntry;

const SKILL_FILE: &str = "SKILL.md";
const HOOKS_FILE: &str = "hooks.json";
const MCP_FILE: &str = ".mcp.json";

pub struct PluginFileSystem {
    layout: StoreLayout,
}

impl PluginFileSystem {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn plugin_dir(&self, id: &str) -> PathBuf {
        self.layout.plugin_dir(id)
    }

    pub fn plugin_dir_exists(&self, id: &str) -> bool {
        self.plugin_dir(id).is_dir()
    }

    pub async fn create_plugin_dir(&self, id: &str) -> Result<(), PluginError> {
        tokio::fs::create_dir_all(self.plugin_dir(id).join(PLUGIN_CONFIG_DIR)).await?;
        Ok(())
    }

    pub async fn delete_plugin_dir(&self, id: &str) -> Result<(), PluginError> {
        let dir = self.plugin_dir(id);
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Copy a plugin directory tree from `src` into the managed tree.
    ///
    /// Refuses to overwrite: the destination must not exist yet.
    pub async fn copy_plugin_dir(&self, src: &Path, id: &str) -> Result<PathBuf, PluginError> {
        let dest = self.plugin_dir(id);
        if dest.exists() {
            return Err(PluginError::DestinationExists { path: dest });
        }
        copy_dir_tree(src, &dest).await?;
        Ok(dest)
    }

    pub async fn write_manifest(
        &self,
        id: &str,
        manifest: &PluginManifest,
    ) -> Result<(), PluginError> {
        manifest.save(&self.plugin_dir(id)).await
    }

    pub async fn read_manifest(&self, id: &str) -> Result<PluginManifest, PluginError> {
        PluginManifest::load(&self.plugin_dir(id)).await
    }

    /// Write `skills/<skillId>/SKILL.md` plus any extra files per skill.
    ///
    /// Inputs are expected to be validated already; paths are joined as-is.
    pub async fn write_skills(&self, id: &str, skills: &[SkillInput]) -> Result<(), PluginError> {
        let skills_dir = self.plugin_dir(id).join("skills");
        for skill in skills {
            let skill_dir = skills_dir.join(&skill.id);
            tokio::fs::create_dir_all(&skill_dir).await?;
            tokio::fs::write(skill_dir.join(SKILL_FILE), &skill.content).await?;
            for file in &skill.files {
                let dest = skill_dir.join(&file.path);
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&dest, &file.content).await?;
            }
        }
        Ok(())
    }

    pub async fn remove_skills(&self, id: &str) -> Result<(), PluginError> {
        self.remove_kind_dir(id, "skills").await
    }

    pub async fn write_commands(
        &self,
        id: &str,
        commands: &[ResourceEntry],
    ) -> Result<(), PluginError> {
        self.write_markdown_entries(id, "commands", commands).await
    }

    pub async fn remove_commands(&self, id: &str) -> Result<(), PluginError> {
        self.remove_kind_dir(id, "commands").await
    }

    pub async fn write_agents(
        &self,
        id: &str,
        agents: &[ResourceEntry],
    ) -> Result<(), PluginError> {
        self.write_markdown_entries(id, "agents", agents).await
    }

    pub async fn remove_agents(&self, id: &str) -> Result<(), PluginError> {
        self.remove_kind_dir(id, "agents").await
    }

    /// Write `hooks/hooks.json` verbatim.
    pub async fn write_hooks(&self, id: &str, config: &serde_json::Value) -> Result<(), PluginError> {
        let path = self.plugin_dir(id).join("hooks").join(HOOKS_FILE);
        storage::write_json(&path, config).await
    }

    /// Write `.mcp.json` verbatim.
    pub async fn write_mcp_config(
        &self,
        id: &str,
        config: &serde_json::Value,
    ) -> Result<(), PluginError> {
        storage::write_json(&self.plugin_dir(id).join(MCP_FILE), config).await
    }

    async fn write_markdown_entries(
        &self,
        id: &str,
        kind: &str,
        entries: &[ResourceEntry],
    ) -> Result<(), PluginError> {
        let dir = self.plugin_dir(id).join(kind);
        tokio::fs::create_dir_all(&dir).await?;
        for entry in entries {
            tokio::fs::write(dir.join(format!("{}.md", entry.id)), &entry.content).await?;
        }
        Ok(())
    }

    async fn remove_kind_dir(&self, id: &str, kind: &str) -> Result<(), PluginError> {
        let dir = self.plugin_dir(id).join(kind);
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }
}

async fn copy_dir_tree(src: &Path, dest: &Path) -> Result<(), PluginError> {
    let mut pending = vec![(src.to_path_buf(), dest.to_path_buf())];
    while let Some((from, to)) = pending.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), target).await?;
            }
        }
    }
    Ok(())
}
