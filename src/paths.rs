use std::path::{Path, PathBuf};

pub(crate) const PLUGIN_CONFIG_DIR: &str = ".claude-plugin";
pub(crate) const PLUGIN_MANIFEST_FILE: &str = "plugin.json";
pub(crate) const REGISTRY_FILE: &str = "registry.json";
pub(crate) const MARKETPLACE_FILE: &str = "marketplace.json";
pub(crate) const PLUGINS_DIR: &str = "plugins";

/// Resolved paths under one managed root.
///
/// Every path the store touches is derived here, so tests can point the whole
/// engine at an isolated temp root with a single constructor argument.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name of the managed root, used to seed the marketplace name.
    pub fn root_name(&self) -> String {
        self.root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("plugins")
            .to_string()
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn marketplace_path(&self) -> PathBuf {
        self.root.join(PLUGIN_CONFIG_DIR).join(MARKETPLACE_FILE)
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join(PLUGINS_DIR)
    }

    pub fn plugin_dir(&self, id: &str) -> PathBuf {
        self.plugins_dir().join(id)
    }

    pub fn manifest_path(&self, id: &str) -> PathBuf {
        manifest_path_in(&self.plugin_dir(id))
    }
}

/// Manifest location inside an arbitrary plugin root (installed or staged).
pub(crate) fn manifest_path_in(plugin_root: &Path) -> PathBuf {
    plugin_root.join(PLUGIN_CONFIG_DIR).join(PLUGIN_MANIFEST_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = StoreLayout::new("/store");
        assert_eq!(layout.registry_path(), PathBuf::from("/store/registry.json"));
        assert_eq!(
            layout.marketplace_path(),
            PathBuf::from("/store/.claude-plugin/marketplace.json")
        );
        assert_eq!(
            layout.plugin_dir("my-plugin"),
            PathBuf::from("/store/plugins/my-plugin")
        );
        assert_eq!(
            layout.manifest_path("my-plugin"),
            PathBuf::from("/store/plugins/my-plugin/.claude-plugin/plugin.json")
        );
    }

    #[test]
    fn test_root_name() {
        assert_eq!(StoreLayout::new("/home/dev/my-store").root_name(), "my-store");
    }

    #[test]
    fn test_manifest_path_in_staged_root() {
        let staged = Path::new("/tmp/staging-abc");
        assert_eq!(
            manifest_path_in(staged),
            PathBuf::from("/tmp/staging-abc/.claude-plugin/plugin.json")
        );
    }
}
