//! The discovery catalog at `.claude-plugin/marketplace.json`.
//!
//! A second document mirroring registry fields, kept in sync by the
//! orchestrator. Entries are keyed by plugin id; `source` always points at
//! the managed tree (`./plugins/<id>`).

use serde::{Deserialize, Serialize};

use crate::error::PluginError;
use crate::manifest::{PluginAuthor, PluginManifest};
use crate::paths::StoreLayout;
use crate::storage;
use crate::types::{PluginMeta, slugify};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceOwner {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl MarketplaceOwner {
    /// Resolve the catalog owner from the environment once, at process start.
    pub fn from_env() -> Self {
        let name = std::env::var("CLAUDE_MARKETPLACE_OWNER")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| std::env::var("USER").ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| "claude".to_string());
        let email = std::env::var("CLAUDE_MARKETPLACE_OWNER_EMAIL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        Self { name, email }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceEntry {
    pub name: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<PluginAuthor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceSchema {
    pub name: String,
    pub owner: MarketplaceOwner,
    #[serde(default)]
    pub plugins: Vec<MarketplaceEntry>,
}

pub struct MarketplaceManager {
    layout: StoreLayout,
    default_owner: MarketplaceOwner,
}

impl MarketplaceManager {
    pub fn new(layout: StoreLayout, default_owner: MarketplaceOwner) -> Self {
        Self {
            layout,
            default_owner,
        }
    }

    /// Read the catalog, seeding a default when the file does not exist.
    pub async fn read(&self) -> Result<MarketplaceSchema, PluginError> {
        let path = self.layout.marketplace_path();
        if !path.exists() {
            return Ok(MarketplaceSchema {
                name: slugify(&self.layout.root_name()),
                owner: self.default_owner.clone(),
                plugins: Vec::new(),
            });
        }

        let raw = tokio::fs::read_to_string(&path).await?;
        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| PluginError::InvalidDocument {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let invalid = |reason: &str| PluginError::InvalidDocument {
            path: path.clone(),
            reason: reason.to_string(),
        };

        let Some(map) = value.as_object() else {
            return Err(invalid("root must be a JSON object"));
        };
        if !map.get("name").is_some_and(|n| n.is_string()) {
            return Err(invalid("missing required field 'name'"));
        }
        let owner_name = map.get("owner").and_then(|o| o.get("name"));
        if !owner_name.is_some_and(|n| n.is_string()) {
            return Err(invalid("missing required field 'owner.name'"));
        }
        if let Some(plugins) = map.get("plugins")
            && !plugins.is_array()
        {
            return Err(invalid("'plugins' must be an array"));
        }

        serde_json::from_value(value).map_err(|e| PluginError::InvalidDocument {
            path,
            reason: e.to_string(),
        })
    }

    /// Build the catalog entry for a registry record, pulling the author from
    /// the plugin manifest when one is supplied.
    pub fn entry_for(meta: &PluginMeta, manifest: Option<&PluginManifest>) -> MarketplaceEntry {
        MarketplaceEntry {
            name: meta.id.clone(),
            source: format!("./plugins/{}", meta.id),
            description: meta.description.clone(),
            version: Some(meta.version.clone()),
            author: manifest.and_then(|m| m.author.clone()),
        }
    }

    /// Replace the entry with the same name, or append a new one.
    pub async fn upsert_plugin(
        &self,
        meta: &PluginMeta,
        manifest: Option<&PluginManifest>,
    ) -> Result<(), PluginError> {
        let entry = Self::entry_for(meta, manifest);
        let path = self.layout.marketplace_path();
        storage::with_lock(&path, || async {
            let mut schema = self.read().await?;
            match schema.plugins.iter_mut().find(|p| p.name == entry.name) {
                Some(existing) => *existing = entry,
                None => schema.plugins.push(entry),
            }
            storage::write_json(&path, &schema).await
        })
        .await
    }

    /// Drop the entry for `id`; absent entries are a no-op, not an error.
    pub async fn remove_plugin(&self, id: &str) -> Result<(), PluginError> {
        let path = self.layout.marketplace_path();
        storage::with_lock(&path, || async {
            let mut schema = self.read().await?;
            let before = schema.plugins.len();
            schema.plugins.retain(|p| p.name != id);
            if schema.plugins.len() == before {
                return Ok(());
            }
            storage::write_json(&path, &schema).await
        })
        .await
    }

    /// Replace the whole plugin list in one guarded cycle.
    ///
    /// Used to recompute the catalog as a projection of the registry.
    pub async fn rebuild(&self, entries: Vec<MarketplaceEntry>) -> Result<(), PluginError> {
        let path = self.layout.marketplace_path();
        storage::with_lock(&path, || async {
            let mut schema = self.read().await?;
            schema.plugins = entries;
            storage::write_json(&path, &schema).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PluginSource;
    use chrono::Utc;
    use tempfile::tempdir;

    fn owner() -> MarketplaceOwner {
        MarketplaceOwner {
            name: "dev".into(),
            email: Some("dev@example.com".into()),
        }
    }

    fn meta(id: &str) -> PluginMeta {
        PluginMeta {
            id: id.into(),
            name: id.into(),
            version: "1.0.0".into(),
            description: Some(format!("{id} description")),
            location: format!("/store/plugins/{id}"),
            source: PluginSource::Generated { template_id: None },
            tags: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn write_catalog(root: &std::path::Path, raw: &str) {
        let dir = root.join(".claude-plugin");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("marketplace.json"), raw).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_seeds_default() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("My Store");
        std::fs::create_dir_all(&root).unwrap();
        let manager = MarketplaceManager::new(StoreLayout::new(&root), owner());

        let schema = manager.read().await.unwrap();
        assert_eq!(schema.name, "my-store");
        assert_eq!(schema.owner, owner());
        assert!(schema.plugins.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_appends_then_replaces() {
        let dir = tempdir().unwrap();
        let manager = MarketplaceManager::new(StoreLayout::new(dir.path()), owner());

        manager.upsert_plugin(&meta("alpha"), None).await.unwrap();
        manager.upsert_plugin(&meta("beta"), None).await.unwrap();

        let mut updated = meta("alpha");
        updated.version = "2.0.0".into();
        manager.upsert_plugin(&updated, None).await.unwrap();

        let schema = manager.read().await.unwrap();
        assert_eq!(schema.plugins.len(), 2);
        let alpha = schema.plugins.iter().find(|p| p.name == "alpha").unwrap();
        assert_eq!(alpha.version.as_deref(), Some("2.0.0"));
        assert_eq!(alpha.source, "./plugins/alpha");
    }

    #[tokio::test]
    async fn test_author_pulled_from_manifest() {
        let dir = tempdir().unwrap();
        let manager = MarketplaceManager::new(StoreLayout::new(dir.path()), owner());

        let mut manifest = PluginManifest::new("alpha", "1.0.0");
        manifest.author = Some(PluginAuthor {
            name: "Alice".into(),
            email: None,
            url: None,
        });
        manager
            .upsert_plugin(&meta("alpha"), Some(&manifest))
            .await
            .unwrap();

        let schema = manager.read().await.unwrap();
        assert_eq!(schema.plugins[0].author.as_ref().unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn test_remove_plugin_and_noop() {
        let dir = tempdir().unwrap();
        let manager = MarketplaceManager::new(StoreLayout::new(dir.path()), owner());

        manager.upsert_plugin(&meta("alpha"), None).await.unwrap();
        manager.remove_plugin("alpha").await.unwrap();
        assert!(manager.read().await.unwrap().plugins.is_empty());

        // Removing again is a no-op.
        manager.remove_plugin("alpha").await.unwrap();
    }

    #[tokio::test]
    async fn test_validation_errors_are_specific() {
        let dir = tempdir().unwrap();
        let manager = MarketplaceManager::new(StoreLayout::new(dir.path()), owner());

        let cases = [
            ("[1, 2]", "root must be a JSON object"),
            (r#"{"owner": {"name": "x"}}"#, "missing required field 'name'"),
            (r#"{"name": "cat"}"#, "missing required field 'owner.name'"),
            (r#"{"name": "cat", "owner": {}}"#, "missing required field 'owner.name'"),
            (
                r#"{"name": "cat", "owner": {"name": "x"}, "plugins": {}}"#,
                "'plugins' must be an array",
            ),
        ];
        for (raw, expected) in cases {
            write_catalog(dir.path(), raw);
            match manager.read().await.unwrap_err() {
                PluginError::InvalidDocument { reason, .. } => {
                    assert_eq!(reason, expected, "for document {raw}");
                }
                other => panic!("expected InvalidDocument, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_rebuild_replaces_catalog() {
        let dir = tempdir().unwrap();
        let manager = MarketplaceManager::new(StoreLayout::new(dir.path()), owner());

        manager.upsert_plugin(&meta("stale"), None).await.unwrap();
        manager
            .rebuild(vec![MarketplaceManager::entry_for(&meta("fresh"), None)])
            .await
            .unwrap();

        let schema = manager.read().await.unwrap();
        assert_eq!(schema.plugins.len(), 1);
        assert_eq!(schema.plugins[0].name, "fresh");
    }
}
