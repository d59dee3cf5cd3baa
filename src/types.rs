use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an installed plugin came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PluginSource {
    /// Imported from a local directory.
    Local { path: String },
    /// Imported from a remote zip archive.
    Url { url: String },
    /// Created in place from structured input.
    Generated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template_id: Option<String>,
    },
}

/// One installed plugin as recorded in `registry.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginMeta {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Absolute path of the plugin directory; always contains a manifest.
    pub location: String,
    pub source: PluginSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PluginMeta {
    pub fn matches_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }
}

/// Patch applied to a registry record; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct PluginMetaPatch {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub location: Option<String>,
    pub source: Option<PluginSource>,
}

/// A single markdown-bodied resource written as `<id>.md` (command or agent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub id: String,
    pub content: String,
}

/// Tag filter for listing; a plugin matches when it carries any listed tag.
#[derive(Debug, Clone, Default)]
pub struct PluginListFilter {
    pub tags: Vec<String>,
}

/// Derive the canonical path-safe id from a human-readable name.
///
/// Lowercases, keeps ASCII alphanumerics, collapses every other run of
/// characters into a single dash, and trims dashes from both ends.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for ch in name.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            out.push(lower);
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        return "plugin".to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("My Plugin"), "my-plugin");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("Spaces   and__underscores"), "spaces-and-underscores");
    }

    #[test]
    fn test_slugify_trims_and_collapses() {
        assert_eq!(slugify("  Leading & trailing!  "), "leading-trailing");
        assert_eq!(slugify("v2.0 (beta)"), "v2-0-beta");
    }

    #[test]
    fn test_slugify_deterministic() {
        let name = "Déjà Vu Tools 3000";
        assert_eq!(slugify(name), slugify(name));
        assert_eq!(slugify(name), "d-j-vu-tools-3000");
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        assert_eq!(slugify(""), "plugin");
        assert_eq!(slugify("!!!"), "plugin");
    }

    #[test]
    fn test_source_serde_tagging() {
        let source = PluginSource::Url {
            url: "https://example.com/p.zip".into(),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["type"], "url");
        assert_eq!(json["url"], "https://example.com/p.zip");

        let generated: PluginSource = serde_json::from_str(r#"{"type":"generated"}"#).unwrap();
        assert_eq!(generated, PluginSource::Generated { template_id: None });
    }

    #[test]
    fn test_meta_serde_camel_case() {
        let meta = PluginMeta {
            id: "my-plugin".into(),
            name: "My Plugin".into(),
            version: "1.0.0".into(),
            description: None,
            location: "/store/plugins/my-plugin".into(),
            source: PluginSource::Local { path: "/src".into() },
            tags: vec!["dev".into()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn test_matches_any_tag() {
        let meta = PluginMeta {
            id: "p".into(),
            name: "p".into(),
            version: "0.1.0".into(),
            description: None,
            location: "/x".into(),
            source: PluginSource::Generated { template_id: None },
            tags: vec!["rust".into(), "testing".into()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(meta.matches_any_tag(&["testing".into(), "python".into()]));
        assert!(!meta.matches_any_tag(&["python".into()]));
        assert!(!meta.matches_any_tag(&[]));
    }
}
