//! Artifact generators
//!
//! One generator per artifact kind, all behind [`ArtifactGenerator`]. A
//! generator either writes its file through the [`AtomicWriter`] and returns
//! `Ok(true)`, declines with `Ok(false)` when the record has nothing for that
//! kind, or propagates the writer's error unchanged.

pub mod manifest;
pub mod render;
pub mod script;
pub mod style;
pub mod symbol;

pub use manifest::ManifestGenerator;
pub use render::RenderGenerator;
pub use script::ScriptGenerator;
pub use style::StyleGenerator;
pub use symbol::SymbolGenerator;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GeneratorError, Result};
use crate::store::{AttributeSchemaMapper, ContentStore, CssCompiler, SettingsRepository};
use crate::types::{
    ArtifactKind, BlockSettings, ContentRecord, RecordId, RecordKind, DEFAULT_NAMESPACE,
    SYMBOLS_DIRNAME,
};
use crate::writer::AtomicWriter;

/// Collaborators shared by every generator for one request
pub struct GenerationContext<'a> {
    pub store: &'a dyn ContentStore,
    pub settings: &'a dyn SettingsRepository,
    pub schema: &'a dyn AttributeSchemaMapper,
    pub css: &'a dyn CssCompiler,
    pub writer: &'a AtomicWriter,
    pub namespace: String,
}

impl<'a> GenerationContext<'a> {
    pub fn new(
        store: &'a dyn ContentStore,
        settings: &'a dyn SettingsRepository,
        schema: &'a dyn AttributeSchemaMapper,
        css: &'a dyn CssCompiler,
        writer: &'a AtomicWriter,
    ) -> Self {
        Self {
            store,
            settings,
            schema,
            css,
            writer,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Look up the record and its settings. Records without a settings row
    /// get defaults.
    pub fn load(&self, record_id: RecordId) -> Result<(ContentRecord, BlockSettings)> {
        let record = self
            .store
            .record(record_id)
            .ok_or(GeneratorError::RecordNotFound { id: record_id })?;
        let settings = self.settings.get(record_id)?.unwrap_or_default();
        Ok((record, settings))
    }

    /// Run one generator for a record, creating its package directory under
    /// `output_root` first
    pub fn generate(
        &self,
        generator: &dyn ArtifactGenerator,
        record_id: RecordId,
        output_root: &Path,
    ) -> Result<bool> {
        let (record, settings) = self.load(record_id)?;
        if !generator.can_generate(record.kind) {
            return Ok(false);
        }
        let dir = package_dir(output_root, &record);
        fs::create_dir_all(&dir)?;
        generator.generate(self, &record, &settings, &dir)
    }
}

/// One artifact kind
pub trait ArtifactGenerator {
    fn kind(&self) -> ArtifactKind;

    /// Whether this generator applies to records of `kind`
    fn can_generate(&self, kind: RecordKind) -> bool;

    /// Content fields the generator reads
    fn required_fields(&self) -> &'static [&'static str];

    fn output_filename(&self, record: &ContentRecord) -> String;

    /// Write the artifact into `output_dir`. `Ok(false)` means the record
    /// has no content for this kind.
    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        record: &ContentRecord,
        settings: &BlockSettings,
        output_dir: &Path,
    ) -> Result<bool>;
}

/// Directory a record's artifacts live in: `<root>/<slug>` for blocks, the
/// shared `<root>/symbols` for symbols
pub fn package_dir(output_root: &Path, record: &ContentRecord) -> PathBuf {
    match record.kind {
        RecordKind::Symbol => output_root.join(SYMBOLS_DIRNAME),
        _ => output_root.join(record.effective_slug()),
    }
}

/// Every generator in write order. The manifest comes last so its asset
/// checks see the files written in the same pass.
pub fn default_generators() -> Vec<Box<dyn ArtifactGenerator>> {
    vec![
        Box::new(SymbolGenerator),
        Box::new(RenderGenerator),
        Box::new(StyleGenerator::front()),
        Box::new(StyleGenerator::editor()),
        Box::new(ScriptGenerator),
        Box::new(ManifestGenerator),
    ]
}
