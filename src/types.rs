//! Core types and constants for the block generator

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub type RecordId = u64;

// Artifact file names
pub const MANIFEST_FILENAME: &str = "block.json";
pub const RENDER_FILENAME: &str = "render.php";
pub const STYLE_FILENAME: &str = "style.css";
pub const EDITOR_STYLE_FILENAME: &str = "editor.css";
pub const SCRIPT_FILENAME: &str = "view.js";
pub const EDITOR_SCRIPT_FILENAME: &str = "index.js";
pub const SYMBOLS_DIRNAME: &str = "symbols";
pub const SYMBOL_EXTENSION: &str = "php";

// Content field keys
pub const FIELD_RENDER_TEMPLATE: &str = "render_template";
pub const FIELD_STYLE_SOURCE: &str = "style_source";
pub const FIELD_EDITOR_STYLE_SOURCE: &str = "editor_style_source";
pub const FIELD_SCRIPT_SOURCE: &str = "script_source";
pub const FIELD_ATTRIBUTES_SCHEMA: &str = "attributes_schema_json";

// Manifest defaults
pub const BLOCK_API_VERSION: u8 = 3;
pub const BLOCK_SCHEMA_URL: &str = "https://schemas.wp.org/trunk/block.json";
pub const DEFAULT_NAMESPACE: &str = "blockforge";
pub const DEFAULT_CATEGORY: &str = "widgets";
pub const DEFAULT_ICON: &str = "block-default";

// Limits
pub const MAX_SYMBOL_DEPTH: usize = 8;
pub const DEFAULT_LINT_TIMEOUT_SECS: u64 = 10;

/// Taxonomy term classifying a content record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Block,
    Symbol,
    Partial,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RecordKind::Block => "block",
            RecordKind::Symbol => "symbol",
            RecordKind::Partial => "partial",
        };
        write!(f, "{}", name)
    }
}

/// A stored content item: block, symbol or style partial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub kind: RecordKind,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl ContentRecord {
    pub fn new(id: RecordId, title: impl Into<String>, kind: RecordKind) -> Self {
        let title = title.into();
        Self {
            id,
            slug: crate::utils::slugify(&title),
            title,
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Field text, or the empty string when absent
    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn has_content(&self, key: &str) -> bool {
        !self.field(key).trim().is_empty()
    }

    /// Slug used for directories and block names; derived from the title when unset
    pub fn effective_slug(&self) -> String {
        if self.slug.trim().is_empty() {
            crate::utils::slugify(&self.title)
        } else {
            self.slug.clone()
        }
    }

    /// Human-readable label used in error messages
    pub fn label(&self) -> String {
        format!("{} \"{}\" (#{})", self.kind, self.title, self.id)
    }
}

/// Per-block structured configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockSettings {
    pub category: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub inner_blocks: bool,
    pub allowed_blocks: Vec<String>,
    pub template: Vec<Value>,
    pub selected_partials: Vec<RecordId>,
    pub editor_selected_partials: Vec<RecordId>,
    pub module_script: bool,
    pub supports: Option<serde_json::Map<String, Value>>,
}

impl BlockSettings {
    /// Every partial this block opts into, front-end selections first
    pub fn local_partials(&self) -> Vec<RecordId> {
        let mut partials = self.selected_partials.clone();
        for id in &self.editor_selected_partials {
            if !partials.contains(id) {
                partials.push(*id);
            }
        }
        partials
    }

    pub fn selects_partial(&self, partial_id: RecordId) -> bool {
        self.selected_partials.contains(&partial_id)
            || self.editor_selected_partials.contains(&partial_id)
    }
}

/// A partial-update of block settings. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub category: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub inner_blocks: Option<bool>,
    pub allowed_blocks: Option<Vec<String>>,
    pub template: Option<Vec<Value>>,
    pub selected_partials: Option<Vec<RecordId>>,
    pub editor_selected_partials: Option<Vec<RecordId>>,
    pub module_script: Option<bool>,
    pub supports: Option<serde_json::Map<String, Value>>,
}

impl SettingsPatch {
    /// Apply onto existing settings, keeping every value the patch leaves out
    pub fn apply_to(&self, settings: &mut BlockSettings) {
        if let Some(category) = &self.category {
            settings.category = Some(category.clone());
        }
        if let Some(icon) = &self.icon {
            settings.icon = Some(icon.clone());
        }
        if let Some(description) = &self.description {
            settings.description = Some(description.clone());
        }
        if let Some(inner_blocks) = self.inner_blocks {
            settings.inner_blocks = inner_blocks;
        }
        if let Some(allowed) = &self.allowed_blocks {
            settings.allowed_blocks = allowed.clone();
        }
        if let Some(template) = &self.template {
            settings.template = template.clone();
        }
        if let Some(selected) = &self.selected_partials {
            settings.selected_partials = selected.clone();
        }
        if let Some(selected) = &self.editor_selected_partials {
            settings.editor_selected_partials = selected.clone();
        }
        if let Some(module_script) = self.module_script {
            settings.module_script = module_script;
        }
        if let Some(supports) = &self.supports {
            settings.supports = Some(supports.clone());
        }
    }
}

/// Kind of file an artifact generator produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Manifest,
    Render,
    Style,
    EditorStyle,
    Script,
    Symbol,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ArtifactKind::Manifest => "manifest",
            ArtifactKind::Render => "render",
            ArtifactKind::Style => "style",
            ArtifactKind::EditorStyle => "editor_style",
            ArtifactKind::Script => "script",
            ArtifactKind::Symbol => "symbol",
        };
        write!(f, "{}", name)
    }
}

/// Which compiled stylesheet to ask the CSS compiler for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CssVariant {
    Style,
    Editor,
}

/// A file produced by a generator. Transient; never stored as a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifact {
    pub path: PathBuf,
    #[serde(skip)]
    pub content: Vec<u8>,
    pub kind: ArtifactKind,
}

impl GeneratedArtifact {
    pub fn new(path: PathBuf, content: Vec<u8>, kind: ArtifactKind) -> Self {
        Self { path, content, kind }
    }

    /// MD5 of the content, hex encoded
    pub fn digest(&self) -> String {
        hex::encode(md5::compute(&self.content).0)
    }
}

/// A derived `(block, partial)` inclusion entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PartialUsage {
    pub block_id: RecordId,
    pub partial_id: RecordId,
}

/// Global/local status of a style partial and its position among globals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialScope {
    pub partial_id: RecordId,
    pub global: bool,
    #[serde(default)]
    pub order: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_preserves_absent_keys() {
        let mut settings = BlockSettings {
            category: Some("design".to_string()),
            selected_partials: vec![4, 7],
            inner_blocks: true,
            ..Default::default()
        };

        let patch = SettingsPatch {
            icon: Some("star-filled".to_string()),
            ..Default::default()
        };
        patch.apply_to(&mut settings);

        assert_eq!(settings.category.as_deref(), Some("design"));
        assert_eq!(settings.icon.as_deref(), Some("star-filled"));
        assert_eq!(settings.selected_partials, vec![4, 7]);
        assert!(settings.inner_blocks);
    }

    #[test]
    fn test_local_partials_dedupes_editor_selection() {
        let settings = BlockSettings {
            selected_partials: vec![3, 1],
            editor_selected_partials: vec![1, 9],
            ..Default::default()
        };
        assert_eq!(settings.local_partials(), vec![3, 1, 9]);
        assert!(settings.selects_partial(9));
        assert!(!settings.selects_partial(2));
    }

    #[test]
    fn test_record_slug_falls_back_to_title() {
        let mut record = ContentRecord::new(12, "Hero Banner", RecordKind::Block);
        assert_eq!(record.effective_slug(), "hero-banner");
        record.slug = String::new();
        assert_eq!(record.effective_slug(), "hero-banner");
        assert_eq!(record.label(), "block \"Hero Banner\" (#12)");
    }

    #[test]
    fn test_artifact_digest_is_stable() {
        let artifact = GeneratedArtifact::new(
            PathBuf::from("style.css"),
            b"body{}".to_vec(),
            ArtifactKind::Style,
        );
        assert_eq!(artifact.digest(), artifact.clone().digest());
        assert_eq!(artifact.digest().len(), 32);
    }
}
