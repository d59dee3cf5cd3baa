//! The public facade: sequences file system, registry, marketplace and
//! importer so a plugin becomes visible all-or-nothing.
//!
//! Registration happens only after the plugin directory is fully written, so
//! a crash mid-operation can leave an orphaned directory but never a registry
//! entry without one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::error::PluginError;
use crate::files::PluginFileSystem;
use crate::import::{Fetcher, HttpFetcher, PluginImporter};
use crate::manifest::{
    AGENTS_POINTER, COMMANDS_POINTER, HOOKS_POINTER, MCP_POINTER, PluginAuthor, PluginManifest,
    SKILLS_POINTER,
};
use crate::marketplace::{MarketplaceManager, MarketplaceOwner};
use crate::paths::StoreLayout;
use crate::registry::RegistryManager;
use crate::skills::{SkillInput, validate_skill_input};
use crate::types::{
    PluginListFilter, PluginMeta, PluginMetaPatch, PluginSource, ResourceEntry, slugify,
};

/// Everything needed to create a plugin in place.
#[derive(Debug, Clone, Default)]
pub struct CreatePluginInput {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub author: Option<PluginAuthor>,
    pub tags: Vec<String>,
    pub skills: Vec<SkillInput>,
    pub commands: Vec<ResourceEntry>,
    pub agents: Vec<ResourceEntry>,
    pub hooks: Option<serde_json::Value>,
    pub mcp_servers: Option<serde_json::Value>,
    pub source: Option<PluginSource>,
}

impl CreatePluginInput {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }
}

/// Patch for an existing plugin. The id is immutable.
///
/// Artifact fields follow replace-on-present semantics: `None` leaves the
/// kind untouched, `Some(vec![])` deletes it (directory and manifest
/// pointer), a non-empty vec replaces it wholesale. Hooks and MCP config are
/// written verbatim when supplied and have no clear path.
#[derive(Debug, Clone, Default)]
pub struct UpdatePluginInput {
    pub version: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub skills: Option<Vec<SkillInput>>,
    pub commands: Option<Vec<ResourceEntry>>,
    pub agents: Option<Vec<ResourceEntry>>,
    pub hooks: Option<serde_json::Value>,
    pub mcp_servers: Option<serde_json::Value>,
}

pub struct PluginManager {
    layout: StoreLayout,
    files: PluginFileSystem,
    registry: RegistryManager,
    marketplace: MarketplaceManager,
    fetcher: Arc<dyn Fetcher>,
}

impl PluginManager {
    /// Open a manager over `root`, resolving the catalog owner from the
    /// environment.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_owner(root, MarketplaceOwner::from_env())
    }

    pub fn with_owner(root: impl Into<PathBuf>, owner: MarketplaceOwner) -> Self {
        let layout = StoreLayout::new(root);
        Self {
            files: PluginFileSystem::new(layout.clone()),
            registry: RegistryManager::new(layout.clone()),
            marketplace: MarketplaceManager::new(layout.clone(), owner),
            fetcher: Arc::new(HttpFetcher::new()),
            layout,
        }
    }

    /// Substitute the download capability (tests, custom transports).
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub async fn create(&self, input: CreatePluginInput) -> Result<PluginMeta, PluginError> {
        for skill in &input.skills {
            validate_skill_input(skill)?;
        }

        let id = slugify(&input.name);
        if self.registry.find_plugin(&id).await?.is_some() {
            return Err(PluginError::DuplicateId { id });
        }

        self.files.create_plugin_dir(&id).await?;
        let manifest = match self.write_artifacts(&id, &input).await {
            Ok(manifest) => manifest,
            Err(e) => {
                self.discard_dir(&id).await;
                return Err(e);
            }
        };

        let now = Utc::now();
        let meta = PluginMeta {
            id: id.clone(),
            name: input.name,
            version: input.version,
            description: input.description,
            location: self.layout.plugin_dir(&id).display().to_string(),
            source: input
                .source
                .unwrap_or(PluginSource::Generated { template_id: None }),
            tags: input.tags,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.registry.add_plugin(meta.clone()).await {
            self.discard_dir(&id).await;
            return Err(e);
        }
        self.marketplace.upsert_plugin(&meta, Some(&manifest)).await?;

        tracing::info!(id = %meta.id, "Created plugin");
        Ok(meta)
    }

    pub async fn update(
        &self,
        id: &str,
        patch: UpdatePluginInput,
    ) -> Result<PluginMeta, PluginError> {
        if self.registry.find_plugin(id).await?.is_none() {
            return Err(PluginError::NotFound { id: id.to_string() });
        }
        if let Some(skills) = &patch.skills {
            for skill in skills {
                validate_skill_input(skill)?;
            }
        }

        let mut manifest = self.files.read_manifest(id).await?;
        let mut manifest_dirty = false;

        if let Some(version) = &patch.version
            && manifest.version != *version
        {
            manifest.version = version.clone();
            manifest_dirty = true;
        }
        if let Some(description) = &patch.description
            && manifest.description.as_deref() != Some(description.as_str())
        {
            manifest.description = Some(description.clone());
            manifest_dirty = true;
        }

        if let Some(skills) = &patch.skills {
            self.files.remove_skills(id).await?;
            if skills.is_empty() {
                manifest.skills = None;
            } else {
                self.files.write_skills(id, skills).await?;
                manifest.skills = Some(SKILLS_POINTER.into());
            }
            manifest_dirty = true;
        }
        if let Some(commands) = &patch.commands {
            self.files.remove_commands(id).await?;
            if commands.is_empty() {
                manifest.commands = None;
            } else {
                self.files.write_commands(id, commands).await?;
                manifest.commands = Some(COMMANDS_POINTER.into());
            }
            manifest_dirty = true;
        }
        if let Some(agents) = &patch.agents {
            self.files.remove_agents(id).await?;
            if agents.is_empty() {
                manifest.agents = None;
            } else {
                self.files.write_agents(id, agents).await?;
                manifest.agents = Some(AGENTS_POINTER.into());
            }
            manifest_dirty = true;
        }
        if let Some(hooks) = &patch.hooks {
            self.files.write_hooks(id, hooks).await?;
            if manifest.hooks.is_none() {
                manifest.hooks = Some(HOOKS_POINTER.into());
                manifest_dirty = true;
            }
        }
        if let Some(mcp) = &patch.mcp_servers {
            self.files.write_mcp_config(id, mcp).await?;
            if manifest.mcp_servers.is_none() {
                manifest.mcp_servers = Some(MCP_POINTER.into());
                manifest_dirty = true;
            }
        }

        if manifest_dirty {
            self.files.write_manifest(id, &manifest).await?;
        }

        let meta = self
            .registry
            .update_plugin(
                id,
                PluginMetaPatch {
                    version: patch.version,
                    description: patch.description.map(Some),
                    tags: patch.tags,
                    ..Default::default()
                },
            )
            .await?;
        self.marketplace.upsert_plugin(&meta, Some(&manifest)).await?;

        tracing::info!(id, "Updated plugin");
        Ok(meta)
    }

    /// Remove the plugin directory, registry record and catalog entry.
    pub async fn delete(&self, id: &str) -> Result<(), PluginError> {
        if self.registry.find_plugin(id).await?.is_none() {
            return Err(PluginError::NotFound { id: id.to_string() });
        }

        self.files.delete_plugin_dir(id).await?;
        self.registry.remove_plugin(id).await?;
        self.marketplace.remove_plugin(id).await?;

        tracing::info!(id, "Deleted plugin");
        Ok(())
    }

    pub async fn import_from_path(&self, path: &Path) -> Result<PluginMeta, PluginError> {
        let importer = PluginImporter::with_fetcher(self.fetcher.clone());
        let source_dir = importer.import_from_path(path).await?;
        let meta = self
            .register_imported(
                &source_dir,
                PluginSource::Local {
                    path: path.display().to_string(),
                },
            )
            .await?;
        tracing::info!(id = %meta.id, path = %path.display(), "Imported plugin from path");
        Ok(meta)
    }

    pub async fn import_from_url(&self, url: &str) -> Result<PluginMeta, PluginError> {
        let mut importer = PluginImporter::with_fetcher(self.fetcher.clone());
        let staged = importer.import_from_url(url).await?;
        let result = self
            .register_imported(&staged, PluginSource::Url { url: url.to_string() })
            .await;
        importer.cleanup().await;

        let meta = result?;
        tracing::info!(id = %meta.id, url, "Imported plugin from URL");
        Ok(meta)
    }

    /// Tag-filtered projection of the registry (any matching tag qualifies).
    pub async fn list(
        &self,
        filter: Option<&PluginListFilter>,
    ) -> Result<Vec<PluginMeta>, PluginError> {
        let mut plugins = self.registry.list_plugins().await?;
        if let Some(filter) = filter
            && !filter.tags.is_empty()
        {
            plugins.retain(|p| p.matches_any_tag(&filter.tags));
        }
        Ok(plugins)
    }

    /// A missing id is an absent result, not an error.
    pub async fn get(&self, id: &str) -> Result<Option<PluginMeta>, PluginError> {
        self.registry.find_plugin(id).await
    }

    /// Recompute the catalog as a projection of the registry.
    ///
    /// Registry and catalog mutations are separate critical sections, so a
    /// crash between them can leave the two documents out of step; this is
    /// the recovery path.
    pub async fn sync_marketplace(&self) -> Result<(), PluginError> {
        let plugins = self.registry.list_plugins().await?;
        let mut entries = Vec::with_capacity(plugins.len());
        for meta in &plugins {
            let manifest = PluginManifest::load(Path::new(&meta.location)).await.ok();
            entries.push(MarketplaceManager::entry_for(meta, manifest.as_ref()));
        }
        self.marketplace.rebuild(entries).await
    }

    async fn write_artifacts(
        &self,
        id: &str,
        input: &CreatePluginInput,
    ) -> Result<PluginManifest, PluginError> {
        let mut manifest = PluginManifest::new(input.name.clone(), input.version.clone());
        manifest.description = input.description.clone();
        manifest.author = input.author.clone();

        if !input.skills.is_empty() {
            self.files.write_skills(id, &input.skills).await?;
            manifest.skills = Some(SKILLS_POINTER.into());
        }
        if !input.commands.is_empty() {
            self.files.write_commands(id, &input.commands).await?;
            manifest.commands = Some(COMMANDS_POINTER.into());
        }
        if !input.agents.is_empty() {
            self.files.write_agents(id, &input.agents).await?;
            manifest.agents = Some(AGENTS_POINTER.into());
        }
        if let Some(hooks) = &input.hooks {
            self.files.write_hooks(id, hooks).await?;
            manifest.hooks = Some(HOOKS_POINTER.into());
        }
        if let Some(mcp) = &input.mcp_servers {
            self.files.write_mcp_config(id, mcp).await?;
            manifest.mcp_servers = Some(MCP_POINTER.into());
        }

        self.files.write_manifest(id, &manifest).await?;
        Ok(manifest)
    }

    async fn register_imported(
        &self,
        source_dir: &Path,
        source: PluginSource,
    ) -> Result<PluginMeta, PluginError> {
        let manifest = PluginManifest::load(source_dir).await?;
        let id = slugify(&manifest.name);
        if self.registry.find_plugin(&id).await?.is_some() {
            return Err(PluginError::DuplicateId { id });
        }

        let dest = self.files.copy_plugin_dir(source_dir, &id).await?;

        let now = Utc::now();
        let meta = PluginMeta {
            id: id.clone(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            description: manifest.description.clone(),
            location: dest.display().to_string(),
            source,
            tags: manifest.keywords.clone(),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.registry.add_plugin(meta.clone()).await {
            self.discard_dir(&id).await;
            return Err(e);
        }
        self.marketplace.upsert_plugin(&meta, Some(&manifest)).await?;
        Ok(meta)
    }

    /// Best-effort removal of a half-written plugin directory; never masks
    /// the primary error.
    async fn discard_dir(&self, id: &str) {
        if let Err(e) = self.files.delete_plugin_dir(id).await {
            tracing::warn!(id, error = %e, "Failed to clean up plugin directory");
        }
    }
}
