//! Validation of untrusted skill bundles before they touch the store.
//!
//! A skill is guidance text with a leading `---`-delimited YAML metadata
//! block plus optional auxiliary files. Everything here is checked before a
//! single byte is written; the first violated rule wins and its message names
//! the rule.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PluginError;

const MAX_ID_CHARS: usize = 64;
const MAX_NAME_CHARS: usize = 64;
const MAX_DESCRIPTION_CHARS: usize = 1024;
const MAX_CONTENT_LINES: usize = 500;
const RESERVED_WORDS: &[&str] = &["anthropic", "claude"];

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid regex"));
static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("valid regex"));

/// One auxiliary file shipped alongside a skill's SKILL.md.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillFile {
    /// Relative forward-slash path, at most one directory deep.
    pub path: String,
    pub content: String,
}

/// A skill bundle as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillInput {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub files: Vec<SkillFile>,
}

/// Known metadata keys; anything else in the block is tolerated and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn invalid(reason: impl Into<String>) -> PluginError {
    PluginError::InvalidSkill {
        reason: reason.into(),
    }
}

/// Extract the metadata block from the start of skill content.
pub fn parse_skill_metadata(content: &str) -> Result<SkillMetadata, PluginError> {
    let Some(after_first) = content.strip_prefix("---") else {
        return Err(invalid(
            "content must start with a metadata block delimited by ---",
        ));
    };
    let Some(end_pos) = after_first.find("---") else {
        return Err(invalid("metadata block is not terminated with ---"));
    };
    let block = after_first[..end_pos].trim();
    serde_yaml_bw::from_str(block)
        .map_err(|e| invalid(format!("metadata block is not valid YAML: {e}")))
}

/// Check an untrusted skill bundle, failing on the first violated rule.
pub fn validate_skill_input(skill: &SkillInput) -> Result<(), PluginError> {
    validate_id(&skill.id)?;

    let metadata = parse_skill_metadata(&skill.content)?;
    let name = metadata
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| invalid("metadata block must include a non-empty name"))?;
    let description = metadata
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| invalid("metadata block must include a non-empty description"))?;

    check_reserved("name", name)?;
    check_reserved("description", description)?;

    if MARKUP_TAG.is_match(name) {
        return Err(invalid("name must not contain markup tags"));
    }
    if MARKUP_TAG.is_match(description) {
        return Err(invalid("description must not contain markup tags"));
    }

    if name.chars().count() > MAX_NAME_CHARS {
        return Err(invalid(format!(
            "name exceeds {MAX_NAME_CHARS} characters"
        )));
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(invalid(format!(
            "description exceeds {MAX_DESCRIPTION_CHARS} characters"
        )));
    }

    if skill.content.lines().count() > MAX_CONTENT_LINES {
        return Err(invalid(format!(
            "content exceeds {MAX_CONTENT_LINES} lines"
        )));
    }

    for file in &skill.files {
        validate_file_path(&file.path)?;
    }

    Ok(())
}

fn validate_id(id: &str) -> Result<(), PluginError> {
    if id.chars().count() > MAX_ID_CHARS || !ID_PATTERN.is_match(id) {
        return Err(invalid(format!(
            "id '{id}' must be lowercase alphanumeric segments separated by hyphens, at most {MAX_ID_CHARS} characters"
        )));
    }
    for word in RESERVED_WORDS {
        if id.contains(word) {
            return Err(invalid(format!("id '{id}' contains reserved word '{word}'")));
        }
    }
    Ok(())
}

fn check_reserved(field: &str, value: &str) -> Result<(), PluginError> {
    let lower = value.to_lowercase();
    for word in RESERVED_WORDS {
        if lower.contains(word) {
            return Err(invalid(format!(
                "{field} contains reserved word '{word}'"
            )));
        }
    }
    Ok(())
}

fn validate_file_path(path: &str) -> Result<(), PluginError> {
    if path.trim().is_empty() {
        return Err(invalid("file path must not be empty"));
    }
    if path.starts_with('/') || std::path::Path::new(path).is_absolute() {
        return Err(invalid(format!("file path '{path}' must be relative")));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(invalid(format!(
            "file path '{path}' must not reference parent directories"
        )));
    }
    if path.contains('\\') {
        return Err(invalid(format!(
            "file path '{path}' must use forward slashes"
        )));
    }
    if path.split('/').count() > 2 {
        return Err(invalid(format!(
            "file path '{path}' may be nested at most one directory deep"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_with(name: &str, description: &str) -> String {
        format!("---\nname: {name}\ndescription: {description}\n---\n\nGuidance body.\n")
    }

    fn skill(id: &str) -> SkillInput {
        SkillInput {
            id: id.into(),
            content: content_with("refactor-helper", "Helps with refactors"),
            files: Vec::new(),
        }
    }

    fn reason(result: Result<(), PluginError>) -> String {
        match result.unwrap_err() {
            PluginError::InvalidSkill { reason } => reason,
            other => panic!("expected InvalidSkill, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_skill_accepted() {
        validate_skill_input(&skill("refactor-helper")).unwrap();
    }

    #[test]
    fn test_id_pattern_rejected() {
        assert!(reason(validate_skill_input(&skill("Bad_ID"))).contains("lowercase"));
        assert!(reason(validate_skill_input(&skill("-leading"))).contains("lowercase"));
        assert!(reason(validate_skill_input(&skill("double--dash"))).contains("lowercase"));
        assert!(reason(validate_skill_input(&skill(""))).contains("lowercase"));
    }

    #[test]
    fn test_id_length_boundary() {
        let ok = "a".repeat(64);
        validate_skill_input(&skill(&ok)).unwrap();
        let too_long = "a".repeat(65);
        assert!(validate_skill_input(&skill(&too_long)).is_err());
    }

    #[test]
    fn test_id_reserved_word_rejected() {
        assert!(reason(validate_skill_input(&skill("anthropic-tools"))).contains("reserved"));
        assert!(reason(validate_skill_input(&skill("my-claude-skill"))).contains("reserved"));
    }

    #[test]
    fn test_id_pattern_checked_before_reserved_word() {
        // Both rules are violated; the pattern rule reports first.
        assert!(reason(validate_skill_input(&skill("Claude_Helper"))).contains("lowercase"));
    }

    #[test]
    fn test_missing_metadata_block() {
        let mut s = skill("no-header");
        s.content = "Just guidance, no header.".into();
        assert!(reason(validate_skill_input(&s)).contains("metadata block"));
    }

    #[test]
    fn test_unterminated_metadata_block() {
        let mut s = skill("unterminated");
        s.content = "---\nname: x\ndescription: y\n".into();
        assert!(reason(validate_skill_input(&s)).contains("terminated"));
    }

    #[test]
    fn test_missing_name_or_description() {
        let mut s = skill("partial");
        s.content = "---\ndescription: only a description\n---\nBody".into();
        assert!(reason(validate_skill_input(&s)).contains("name"));

        s.content = "---\nname: only-a-name\n---\nBody".into();
        assert!(reason(validate_skill_input(&s)).contains("description"));
    }

    #[test]
    fn test_unknown_metadata_keys_ignored() {
        let mut s = skill("tolerant");
        s.content =
            "---\nname: tolerant\ndescription: Fine\nauthor: someone\nextra: 42\n---\nBody".into();
        validate_skill_input(&s).unwrap();
    }

    #[test]
    fn test_reserved_word_in_name() {
        let mut s = skill("ok-id");
        s.content = content_with("Claude Helper", "A helper");
        assert!(reason(validate_skill_input(&s)).contains("reserved"));
    }

    #[test]
    fn test_markup_tag_rejected() {
        let mut s = skill("ok-id");
        s.content = content_with("plain-name", "Click <b>here</b>");
        assert!(reason(validate_skill_input(&s)).contains("markup"));
    }

    #[test]
    fn test_name_length_boundary() {
        let mut s = skill("ok-id");
        s.content = content_with(&"n".repeat(64), "fine");
        validate_skill_input(&s).unwrap();

        s.content = content_with(&"n".repeat(65), "fine");
        assert!(reason(validate_skill_input(&s)).contains("64"));
    }

    #[test]
    fn test_description_length_boundary() {
        let mut s = skill("ok-id");
        s.content = content_with("fine", &"d".repeat(1024));
        validate_skill_input(&s).unwrap();

        s.content = content_with("fine", &"d".repeat(1025));
        assert!(reason(validate_skill_input(&s)).contains("1024"));
    }

    #[test]
    fn test_content_line_count_boundary() {
        let header = "---\nname: long-one\ndescription: long\n---\n";
        let mut s = skill("ok-id");

        s.content = format!("{header}{}", "line\n".repeat(500 - 5));
        validate_skill_input(&s).unwrap();

        s.content = format!("{header}{}", "line\n".repeat(501));
        assert!(reason(validate_skill_input(&s)).contains("500"));
    }

    #[test]
    fn test_file_path_rules() {
        let mut s = skill("ok-id");

        s.files = vec![SkillFile { path: "a/b.md".into(), content: String::new() }];
        validate_skill_input(&s).unwrap();

        s.files = vec![SkillFile { path: "../x.md".into(), content: String::new() }];
        assert!(reason(validate_skill_input(&s)).contains("parent"));

        s.files = vec![SkillFile { path: "a/b/c.md".into(), content: String::new() }];
        assert!(reason(validate_skill_input(&s)).contains("one directory"));

        s.files = vec![SkillFile { path: "/etc/x.md".into(), content: String::new() }];
        assert!(reason(validate_skill_input(&s)).contains("relative"));

        s.files = vec![SkillFile { path: "a\\b.md".into(), content: String::new() }];
        assert!(reason(validate_skill_input(&s)).contains("forward slashes"));

        s.files = vec![SkillFile { path: "  ".into(), content: String::new() }];
        assert!(reason(validate_skill_input(&s)).contains("empty"));
    }
}
