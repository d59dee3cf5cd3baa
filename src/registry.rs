//! The `registry.json` document: every installed plugin's record.
//!
//! Each mutator runs a full read-modify-write cycle under the document lock,
//! so concurrent invocations (in-process or from another process) never lose
//! updates to each other.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::PluginError;
use crate::paths::StoreLayout;
use crate::storage;
use crate::types::{PluginMeta, PluginMetaPatch};

pub const REGISTRY_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySchema {
    pub version: u32,
    #[serde(default)]
    pub plugins: Vec<PluginMeta>,
}

impl RegistrySchema {
    fn empty() -> Self {
        Self {
            version: REGISTRY_VERSION,
            plugins: Vec::new(),
        }
    }
}

pub struct RegistryManager {
    layout: StoreLayout,
}

impl RegistryManager {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Read the registry, seeding an empty schema when the file is absent and
    /// upgrading legacy document shapes in memory.
    pub async fn read(&self) -> Result<RegistrySchema, PluginError> {
        let path = self.layout.registry_path();
        if !path.exists() {
            return Ok(RegistrySchema::empty());
        }

        let raw = tokio::fs::read_to_string(&path).await?;
        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| PluginError::InvalidDocument {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let normalized = match value {
            // Oldest format: a bare array of plugin records.
            serde_json::Value::Array(plugins) => serde_json::json!({
                "version": REGISTRY_VERSION,
                "plugins": plugins,
            }),
            serde_json::Value::Object(mut map) => {
                if !map.contains_key("version") {
                    map.insert("version".into(), serde_json::json!(REGISTRY_VERSION));
                }
                map.entry("plugins").or_insert_with(|| serde_json::json!([]));
                serde_json::Value::Object(map)
            }
            _ => {
                return Err(PluginError::InvalidDocument {
                    path,
                    reason: "root must be a JSON object or array".into(),
                });
            }
        };

        serde_json::from_value(normalized).map_err(|e| PluginError::InvalidDocument {
            path,
            reason: e.to_string(),
        })
    }

    /// Append a record; fails with a duplicate-id error if one exists.
    pub async fn add_plugin(&self, meta: PluginMeta) -> Result<(), PluginError> {
        let path = self.layout.registry_path();
        storage::with_lock(&path, || async {
            let mut schema = self.read().await?;
            if schema.plugins.iter().any(|p| p.id == meta.id) {
                return Err(PluginError::DuplicateId { id: meta.id.clone() });
            }
            tracing::debug!(id = %meta.id, "Registering plugin");
            schema.plugins.push(meta);
            storage::write_json(&path, &schema).await
        })
        .await
    }

    /// Merge patch fields into an existing record and stamp `updated_at`.
    pub async fn update_plugin(
        &self,
        id: &str,
        patch: PluginMetaPatch,
    ) -> Result<PluginMeta, PluginError> {
        let path = self.layout.registry_path();
        storage::with_lock(&path, || async {
            let mut schema = self.read().await?;
            let meta = schema
                .plugins
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| PluginError::NotFound { id: id.to_string() })?;

            if let Some(name) = patch.name {
                meta.name = name;
            }
            if let Some(version) = patch.version {
                meta.version = version;
            }
            if let Some(description) = patch.description {
                meta.description = description;
            }
            if let Some(tags) = patch.tags {
                meta.tags = tags;
            }
            if let Some(location) = patch.location {
                meta.location = location;
            }
            if let Some(source) = patch.source {
                meta.source = source;
            }
            meta.updated_at = Utc::now();

            let updated = meta.clone();
            storage::write_json(&path, &schema).await?;
            Ok(updated)
        })
        .await
    }

    pub async fn remove_plugin(&self, id: &str) -> Result<(), PluginError> {
        let path = self.layout.registry_path();
        storage::with_lock(&path, || async {
            let mut schema = self.read().await?;
            let before = schema.plugins.len();
            schema.plugins.retain(|p| p.id != id);
            if schema.plugins.len() == before {
                return Err(PluginError::NotFound { id: id.to_string() });
            }
            tracing::debug!(id, "Removing plugin from registry");
            storage::write_json(&path, &schema).await
        })
        .await
    }

    pub async fn find_plugin(&self, id: &str) -> Result<Option<PluginMeta>, PluginError> {
        Ok(self.read().await?.plugins.into_iter().find(|p| p.id == id))
    }

    pub async fn list_plugins(&self) -> Result<Vec<PluginMeta>, PluginError> {
        Ok(self.read().await?.plugins)
    }
}
