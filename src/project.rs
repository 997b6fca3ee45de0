//! Project files
//!
//! A project describes records, their settings, partial scopes and the
//! compiled CSS the external compiler produced, as JSON or TOML:
//!
//! ```toml
//! namespace = "acme"
//!
//! [[records]]
//! id = 1
//! title = "Call To Action"
//! kind = "block"
//! settings = { inner_blocks = false, selected_partials = [10] }
//! css = { style = ".cta{padding:1rem}" }
//!
//! [records.fields]
//! render_template = '<div blockProps><Button label="Go"/></div>'
//!
//! [records.files]
//! script_source = "cta/view.js"
//! ```
//!
//! `files` entries are read relative to the project file and override
//! inline `fields` with the same key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GeneratorError, Result};
use crate::store::{MemoryContentStore, MemorySettingsRepository, PrecompiledCss, SettingsRepository};
use crate::tracker::PartialTracker;
use crate::types::{ContentRecord, CssVariant, PartialScope, RecordId, RecordKind, SettingsPatch};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectCss {
    pub style: Option<String>,
    pub editor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub kind: RecordKind,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub settings: Option<SettingsPatch>,
    /// Partials only
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub css: Option<ProjectCss>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub namespace: Option<String>,
    #[serde(default)]
    pub records: Vec<ProjectRecord>,
}

impl ProjectFile {
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(content).map_err(|e| {
                GeneratorError::invalid_format(format!("Invalid JSON project {}: {}", path.display(), e))
            }),
            Some("toml") => toml::from_str(content).map_err(|e| {
                GeneratorError::invalid_format(format!("Invalid TOML project {}: {}", path.display(), e))
            }),
            _ => Err(GeneratorError::invalid_format(
                "Project file must be .json or .toml format",
            )),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| GeneratorError::FileNotFound {
            path: format!("Project file {}: {}", path.display(), e),
        })?;
        Self::parse(&content, path)
    }

    /// Render back to the format implied by `path`
    pub fn to_string_for(&self, path: &Path) -> Result<String> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| GeneratorError::invalid_format(e.to_string())),
            _ => serde_json::to_string_pretty(self)
                .map_err(|e| GeneratorError::invalid_format(e.to_string())),
        }
    }

    /// Starter project with one symbol and one block using it
    pub fn sample(namespace: &str) -> Self {
        let symbol = ProjectRecord {
            id: 2,
            title: "Button".to_string(),
            slug: None,
            kind: RecordKind::Symbol,
            fields: BTreeMap::from([(
                crate::types::FIELD_RENDER_TEMPLATE.to_string(),
                "<button class=\"btn\"><?= esc_html($attributes['label'] ?? 'Click') ?></button>"
                    .to_string(),
            )]),
            files: BTreeMap::new(),
            settings: None,
            global: false,
            order: 0,
            css: None,
        };
        let block = ProjectRecord {
            id: 1,
            title: "Call To Action".to_string(),
            slug: None,
            kind: RecordKind::Block,
            fields: BTreeMap::from([(
                crate::types::FIELD_RENDER_TEMPLATE.to_string(),
                "<div blockProps><Button label=\"Go\"/></div>".to_string(),
            )]),
            files: BTreeMap::new(),
            settings: Some(SettingsPatch {
                category: Some("design".to_string()),
                ..Default::default()
            }),
            global: false,
            order: 0,
            css: Some(ProjectCss {
                style: Some(".wp-block-cta{padding:1rem}".to_string()),
                editor: None,
            }),
        };
        Self {
            namespace: Some(namespace.to_string()),
            records: vec![block, symbol],
        }
    }
}

/// A loaded project: in-memory collaborators plus the partial tracker
#[derive(Debug, Default)]
pub struct Project {
    pub namespace: Option<String>,
    pub store: MemoryContentStore,
    pub settings: MemorySettingsRepository,
    pub css: PrecompiledCss,
    pub tracker: PartialTracker,
    scopes: Vec<PartialScope>,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self> {
        let file = ProjectFile::read(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let project = Self::from_file(file, base_dir)?;
        log::info!(
            "Loaded project {} ({} records)",
            path.display(),
            project.store.len()
        );
        Ok(project)
    }

    pub fn from_file(file: ProjectFile, base_dir: &Path) -> Result<Self> {
        let mut project = Project {
            namespace: file.namespace.clone(),
            ..Default::default()
        };

        for entry in file.records {
            let mut record = ContentRecord::new(entry.id, entry.title, entry.kind);
            if let Some(slug) = entry.slug {
                record.slug = slug;
            }
            record.fields = entry.fields;
            for (key, relative) in entry.files {
                let path = base_dir.join(&relative);
                let content = fs::read_to_string(&path).map_err(|e| GeneratorError::FileNotFound {
                    path: format!("{} (field {} of #{}): {}", path.display(), key, entry.id, e),
                })?;
                record.fields.insert(key, content);
            }

            if let Some(patch) = &entry.settings {
                project.settings.save(entry.id, patch)?;
            }
            if let Some(css) = entry.css {
                if let Some(style) = css.style {
                    project.css.insert(entry.id, CssVariant::Style, style);
                }
                if let Some(editor) = css.editor {
                    project.css.insert(entry.id, CssVariant::Editor, editor);
                }
            }
            if entry.kind == RecordKind::Partial {
                project.scopes.push(PartialScope {
                    partial_id: entry.id,
                    global: entry.global,
                    order: entry.order,
                });
            }
            project.store.insert(record);
        }

        project
            .tracker
            .rebuild(&project.store, &project.settings, project.scopes.clone())?;
        Ok(project)
    }

    pub fn scopes(&self) -> &[PartialScope] {
        &self.scopes
    }
}
