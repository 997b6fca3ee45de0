//! `block.json` generation
//!
//! The manifest references an asset only when its file is already on disk or
//! another generator will write it in the same pass. Output is pretty printed
//! with sorted keys so unchanged input gives byte-identical files.

use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

use super::{ArtifactGenerator, GenerationContext};
use crate::error::{GeneratorError, Result};
use crate::transform::{has_inner_content_marker, transform_render_template};
use crate::types::{
    ArtifactKind, BlockSettings, ContentRecord, CssVariant, RecordKind, BLOCK_API_VERSION,
    BLOCK_SCHEMA_URL, DEFAULT_CATEGORY, DEFAULT_ICON, EDITOR_SCRIPT_FILENAME,
    EDITOR_STYLE_FILENAME, FIELD_ATTRIBUTES_SCHEMA, FIELD_RENDER_TEMPLATE, FIELD_SCRIPT_SOURCE,
    MANIFEST_FILENAME, RENDER_FILENAME, SCRIPT_FILENAME, STYLE_FILENAME,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestGenerator;

/// What the manifest can reference for one block directory
#[derive(Debug, Default, Clone, PartialEq)]
struct AssetPlan {
    editor_script: bool,
    style: bool,
    editor_style: bool,
    render: bool,
    script: bool,
    /// The record itself carries script source
    interactive: bool,
    /// Render text contains a nested-block area
    inner_content: bool,
}

impl AssetPlan {
    fn inspect(ctx: &GenerationContext<'_>, record: &ContentRecord, output_dir: &Path) -> Self {
        let exists = |filename: &str| output_dir.join(filename).is_file();
        let has_render_template = record.has_content(FIELD_RENDER_TEMPLATE);

        let render_path = output_dir.join(RENDER_FILENAME);
        let render_text = if render_path.is_file() {
            fs::read_to_string(&render_path).ok()
        } else if has_render_template {
            Some(transform_render_template(record.field(FIELD_RENDER_TEMPLATE)))
        } else {
            None
        };

        Self {
            editor_script: exists(EDITOR_SCRIPT_FILENAME),
            style: exists(STYLE_FILENAME)
                || ctx.css.compiled_css_for(record.id, CssVariant::Style).is_some(),
            editor_style: exists(EDITOR_STYLE_FILENAME)
                || ctx.css.compiled_css_for(record.id, CssVariant::Editor).is_some(),
            render: exists(RENDER_FILENAME) || has_render_template,
            script: exists(SCRIPT_FILENAME) || record.has_content(FIELD_SCRIPT_SOURCE),
            interactive: record.has_content(FIELD_SCRIPT_SOURCE),
            inner_content: render_text
                .map(|text| has_inner_content_marker(&text))
                .unwrap_or(false),
        }
    }
}

fn file_ref(filename: &str) -> Value {
    Value::String(format!("file:./{}", filename))
}

impl ManifestGenerator {
    /// Build the manifest document for a block
    pub fn build(
        &self,
        ctx: &GenerationContext<'_>,
        record: &ContentRecord,
        settings: &BlockSettings,
        output_dir: &Path,
    ) -> Value {
        let plan = AssetPlan::inspect(ctx, record, output_dir);
        let namespace = if ctx.namespace.trim().is_empty() {
            crate::types::DEFAULT_NAMESPACE
        } else {
            ctx.namespace.as_str()
        };

        let mut manifest = Map::new();
        manifest.insert("$schema".into(), json!(BLOCK_SCHEMA_URL));
        manifest.insert("apiVersion".into(), json!(BLOCK_API_VERSION));
        manifest.insert(
            "name".into(),
            json!(format!("{}/{}", namespace, record.effective_slug())),
        );
        manifest.insert("title".into(), json!(record.title));
        manifest.insert(
            "category".into(),
            json!(non_empty(settings.category.as_deref()).unwrap_or(DEFAULT_CATEGORY)),
        );
        manifest.insert(
            "icon".into(),
            json!(non_empty(settings.icon.as_deref()).unwrap_or(DEFAULT_ICON)),
        );
        manifest.insert(
            "description".into(),
            json!(settings.description.as_deref().unwrap_or("")),
        );
        manifest.insert("textdomain".into(), json!(namespace));
        manifest.insert("supports".into(), Value::Object(supports(settings, &plan)));

        let attributes = ctx
            .schema
            .schema_for(record)
            .unwrap_or_else(|| Value::Object(Map::new()));
        manifest.insert("attributes".into(), attributes);

        if !settings.allowed_blocks.is_empty() {
            manifest.insert("allowedBlocks".into(), json!(settings.allowed_blocks));
        }
        if plan.editor_script {
            manifest.insert("editorScript".into(), file_ref(EDITOR_SCRIPT_FILENAME));
        }
        if plan.style {
            manifest.insert("style".into(), file_ref(STYLE_FILENAME));
        }
        if plan.editor_style {
            manifest.insert("editorStyle".into(), file_ref(EDITOR_STYLE_FILENAME));
        }
        if plan.render {
            manifest.insert("render".into(), file_ref(RENDER_FILENAME));
        }
        if plan.script {
            let key = if settings.module_script {
                "viewScriptModule"
            } else {
                "viewScript"
            };
            manifest.insert(key.into(), file_ref(SCRIPT_FILENAME));
        }

        Value::Object(manifest)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn supports(settings: &BlockSettings, plan: &AssetPlan) -> Map<String, Value> {
    let mut supports = Map::new();
    supports.insert("align".into(), json!(["wide", "full"]));
    supports.insert("anchor".into(), json!(true));
    supports.insert("html".into(), json!(false));
    if settings.inner_blocks {
        supports.insert("innerBlocks".into(), json!(true));
    }
    if plan.interactive {
        supports.insert("interactivity".into(), json!(true));
    }

    if let Some(user) = &settings.supports {
        for (key, value) in user {
            supports.insert(key.clone(), value.clone());
        }
    }

    // Markup with a nested-block area must declare it whatever the author set
    if plan.inner_content {
        supports.insert("html".into(), json!(true));
        supports.insert("innerBlocks".into(), json!(true));
    }
    supports
}

impl ArtifactGenerator for ManifestGenerator {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Manifest
    }

    fn can_generate(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Block
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &[FIELD_ATTRIBUTES_SCHEMA]
    }

    fn output_filename(&self, _record: &ContentRecord) -> String {
        MANIFEST_FILENAME.to_string()
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        record: &ContentRecord,
        settings: &BlockSettings,
        output_dir: &Path,
    ) -> Result<bool> {
        let manifest = self.build(ctx, record, settings, output_dir);
        let mut json = serde_json::to_string_pretty(&manifest).map_err(|e| {
            GeneratorError::invalid_format(format!("{}: {}", record.label(), e))
        })?;
        json.push('\n');

        ctx.writer.write(
            output_dir,
            &self.output_filename(record),
            json.as_bytes(),
            self.kind(),
            None,
        )?;
        Ok(true)
    }
}
