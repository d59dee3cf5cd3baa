//! # claude-plugins
//!
//! Local-first registry and packaging engine for plugin bundles consumed by
//! Claude-style coding agents.
//!
//! A [`PluginManager`] owns a managed root directory containing
//! `registry.json`, a discovery catalog at `.claude-plugin/marketplace.json`,
//! and one directory per plugin under `plugins/`. Plugins are created from
//! structured input or imported from a local path or a remote zip URL; every
//! document mutation is an atomic, lock-guarded read-modify-write cycle that
//! is safe against concurrent processes sharing the same root.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use claude_plugins::{CreatePluginInput, PluginManager};
//!
//! #[tokio::main]
//! async fn main() -> claude_plugins::Result<()> {
//!     let manager = PluginManager::new("/home/dev/.claude");
//!
//!     let meta = manager
//!         .create(CreatePluginInput::new("My Plugin", "1.0.0"))
//!         .await?;
//!     println!("installed {} at {}", meta.id, meta.location);
//!
//!     for plugin in manager.list(None).await? {
//!         println!("{} {}", plugin.id, plugin.version);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod error;
pub mod files;
pub mod import;
pub mod manager;
pub mod manifest;
pub mod marketplace;
pub mod paths;
pub mod registry;
pub mod skills;
pub mod storage;
pub mod types;

pub use error::PluginError;
pub use files::PluginFileSystem;
pub use import::{Fetcher, HttpFetcher, PluginImporter};
pub use manager::{CreatePluginInput, PluginManager, UpdatePluginInput};
pub use manifest::{PluginAuthor, PluginManifest};
pub use marketplace::{
    MarketplaceEntry, MarketplaceManager, MarketplaceOwner, MarketplaceSchema,
};
pub use paths::StoreLayout;
pub use registry::{REGISTRY_VERSION, RegistryManager, RegistrySchema};
pub use skills::{SkillFile, SkillInput, SkillMetadata, parse_skill_metadata, validate_skill_input};
pub use types::{
    PluginListFilter, PluginMeta, PluginMetaPatch, PluginSource, ResourceEntry, slugify,
};

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, PluginError>;
