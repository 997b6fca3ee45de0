//! Blockforge block package generator
//!
//! Turns stored content records into WordPress block packages on disk:
//! `block.json`, `render.php`, compiled styles, view scripts and shared
//! symbol templates. Generated PHP is syntax checked before it replaces
//! anything, every file is written atomically, and a partial dependency
//! tracker answers which blocks must regenerate after a style partial
//! changes.
//!
//! # Basic Usage
//!
//! ```no_run
//! use blockforge::{generate_project, GeneratorOptions, Result};
//! use std::path::Path;
//!
//! fn main() -> Result<()> {
//!     let (reports, stats) = generate_project(
//!         Path::new("project.toml"),
//!         Path::new("build/blocks"),
//!         &GeneratorOptions::default(),
//!     )?;
//!     println!("{} records, {} failed", reports.len(), stats.artifacts_failed);
//!     Ok(())
//! }
//! ```
//!
//! # Generation Pipeline
//!
//! 1. **Load**: record and settings come from the content store and the
//!    settings repository
//! 2. **Transform**: the render template's `blockProps` placeholder becomes
//!    the wrapper attributes call; symbol tags stay for render time
//! 3. **Validate**: PHP output is linted, or structurally scanned when no
//!    interpreter is usable
//! 4. **Persist**: temp file in the target directory, then rename
//! 5. **Manifest**: written last, referencing only assets that exist

pub mod cli;
pub mod error;
pub mod generators;
pub mod project;
pub mod schema;
pub mod store;
pub mod tracker;
pub mod transform;
pub mod types;
pub mod utils;
pub mod validator;
pub mod writer;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub use cli::EnhancedCli;
pub use error::{GeneratorError, QueryError, Result};
pub use generators::{
    default_generators, package_dir, ArtifactGenerator, GenerationContext, ManifestGenerator,
    RenderGenerator, ScriptGenerator, StyleGenerator, SymbolGenerator,
};
pub use project::{Project, ProjectFile};
pub use schema::FieldSchemaMapper;
pub use store::{
    AttributeSchemaMapper, ContentStore, CssCompiler, MemoryContentStore,
    MemorySettingsRepository, PrecompiledCss, SettingsRepository,
};
pub use tracker::PartialTracker;
pub use transform::{
    expand_wrapper_attributes, PhpSymbolRenderer, StaticSymbolRenderer, SymbolRenderer,
    SymbolResolver, TemplateRenderer,
};
pub use types::*;
pub use validator::SyntaxValidator;
pub use writer::AtomicWriter;

/// Generator version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// How symbol tags are rendered for previews
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolRendererKind {
    /// Substitute attribute echoes without executing PHP
    #[default]
    Static,
    /// Run the symbol through the PHP CLI
    Php,
}

/// Generation options and settings
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Extra logging of each pipeline step
    pub debug_mode: bool,

    /// Block name namespace and text domain
    pub namespace: String,

    /// Try `php -l` before the structural scanner
    pub lint: bool,

    /// PHP interpreter used for linting and PHP symbol rendering
    pub php_binary: PathBuf,

    pub lint_timeout: Duration,

    pub symbol_renderer: SymbolRendererKind,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            debug_mode: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
            lint: true,
            php_binary: PathBuf::from("php"),
            lint_timeout: Duration::from_secs(DEFAULT_LINT_TIMEOUT_SECS),
            symbol_renderer: SymbolRendererKind::Static,
        }
    }
}

impl GeneratorOptions {
    pub fn syntax_validator(&self) -> SyntaxValidator {
        if self.lint {
            SyntaxValidator::with_lint(&self.php_binary, self.lint_timeout)
        } else {
            SyntaxValidator::structural_only()
        }
    }

    pub fn symbol_renderer(&self) -> Box<dyn SymbolRenderer> {
        match self.symbol_renderer {
            SymbolRendererKind::Static => Box::new(StaticSymbolRenderer::new()),
            SymbolRendererKind::Php => {
                Box::new(PhpSymbolRenderer::new(&self.php_binary, self.lint_timeout))
            }
        }
    }
}

/// Result of one generator for one record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    Written {
        path: PathBuf,
        bytes: usize,
        digest: String,
    },
    Skipped,
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactReport {
    pub kind: ArtifactKind,
    pub outcome: ArtifactOutcome,
}

/// Everything that happened while generating one record
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub record_id: RecordId,
    pub label: String,
    pub artifacts: Vec<ArtifactReport>,
    pub elapsed_ms: u64,
}

impl GenerationReport {
    /// True only when no artifact kind failed
    pub fn succeeded(&self) -> bool {
        self.failures().is_empty()
    }

    pub fn failures(&self) -> Vec<&ArtifactReport> {
        self.artifacts
            .iter()
            .filter(|report| matches!(report.outcome, ArtifactOutcome::Failed { .. }))
            .collect()
    }

    pub fn outcome(&self, kind: ArtifactKind) -> Option<&ArtifactOutcome> {
        self.artifacts
            .iter()
            .find(|report| report.kind == kind)
            .map(|report| &report.outcome)
    }

    fn count(&self, predicate: impl Fn(&ArtifactOutcome) -> bool) -> usize {
        self.artifacts.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

/// Totals over a batch of reports
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationStats {
    pub records: usize,
    pub records_failed: usize,
    pub artifacts_written: usize,
    pub artifacts_skipped: usize,
    pub artifacts_failed: usize,
    pub bytes_written: usize,
    pub generate_time_ms: u64,
}

impl GenerationStats {
    pub fn from_reports(reports: &[GenerationReport]) -> Self {
        let mut stats = Self {
            records: reports.len(),
            ..Default::default()
        };
        for report in reports {
            if !report.succeeded() {
                stats.records_failed += 1;
            }
            stats.artifacts_written +=
                report.count(|o| matches!(o, ArtifactOutcome::Written { .. }));
            stats.artifacts_skipped += report.count(|o| matches!(o, ArtifactOutcome::Skipped));
            stats.artifacts_failed += report.count(|o| matches!(o, ArtifactOutcome::Failed { .. }));
            stats.bytes_written += report
                .artifacts
                .iter()
                .map(|r| match &r.outcome {
                    ArtifactOutcome::Written { bytes, .. } => *bytes,
                    _ => 0,
                })
                .sum::<usize>();
            stats.generate_time_ms += report.elapsed_ms;
        }
        stats
    }
}

/// Runs every generator for a record. A failing kind is recorded and the
/// remaining kinds still run.
pub struct BlockPipeline<'a> {
    ctx: GenerationContext<'a>,
    generators: Vec<Box<dyn ArtifactGenerator>>,
    debug_mode: bool,
}

impl<'a> BlockPipeline<'a> {
    pub fn new(ctx: GenerationContext<'a>) -> Self {
        Self {
            ctx,
            generators: default_generators(),
            debug_mode: false,
        }
    }

    pub fn with_generators(mut self, generators: Vec<Box<dyn ArtifactGenerator>>) -> Self {
        self.generators = generators;
        self
    }

    pub fn with_debug(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    pub fn context(&self) -> &GenerationContext<'a> {
        &self.ctx
    }

    /// Content fields any generator reads for records of `kind`
    pub fn required_fields(&self, kind: RecordKind) -> Vec<&'static str> {
        let mut fields: Vec<&'static str> = self
            .generators
            .iter()
            .filter(|g| g.can_generate(kind))
            .flat_map(|g| g.required_fields().iter().copied())
            .collect();
        fields.sort_unstable();
        fields.dedup();
        fields
    }

    pub fn generate_record(
        &self,
        record_id: RecordId,
        output_root: &Path,
    ) -> Result<GenerationReport> {
        let start_time = Instant::now();
        let (record, settings) = self.ctx.load(record_id)?;
        let label = record.label();

        let applicable: Vec<&dyn ArtifactGenerator> = self
            .generators
            .iter()
            .map(|g| g.as_ref())
            .filter(|g| g.can_generate(record.kind))
            .collect();

        let dir = package_dir(output_root, &record);
        if !applicable.is_empty() {
            fs::create_dir_all(&dir)?;
        }
        if self.debug_mode {
            log::debug!("Generating {} into {}", label, dir.display());
        }

        let mut artifacts = Vec::with_capacity(applicable.len());
        for generator in applicable {
            let kind = generator.kind();
            let written = generator
                .generate(&self.ctx, &record, &settings, &dir)
                .and_then(|generated| {
                    if !generated {
                        return Ok(None);
                    }
                    let path = dir.join(generator.output_filename(&record));
                    let content = fs::read(&path)
                        .map_err(|e| GeneratorError::write(path.display().to_string(), e))?;
                    Ok(Some(GeneratedArtifact::new(path, content, kind)))
                });

            let outcome = match written {
                Ok(Some(artifact)) => {
                    if self.debug_mode {
                        log::debug!("  {} -> {} ({})", kind, artifact.path.display(), artifact.digest());
                    }
                    ArtifactOutcome::Written {
                        bytes: artifact.content.len(),
                        digest: artifact.digest(),
                        path: artifact.path,
                    }
                }
                Ok(None) => ArtifactOutcome::Skipped,
                Err(e) => {
                    if e.is_syntax() {
                        log::warn!("{} {} rejected: {}", label, kind, e);
                    } else {
                        log::error!("{} {} failed: {}", label, kind, e);
                    }
                    ArtifactOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            artifacts.push(ArtifactReport { kind, outcome });
        }

        let report = GenerationReport {
            record_id,
            label,
            artifacts,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        };
        if report.succeeded() {
            log::info!("Generated {}", report.label);
        } else {
            log::warn!(
                "{} generated with {} failed artifact(s)",
                report.label,
                report.failures().len()
            );
        }
        Ok(report)
    }

    /// Symbols first so block previews can resolve them, then blocks
    pub fn generate_all(&self, output_root: &Path) -> Result<Vec<GenerationReport>> {
        let mut ids = self.ctx.store.record_ids(RecordKind::Symbol);
        ids.extend(self.ctx.store.record_ids(RecordKind::Block));
        ids.into_iter()
            .map(|id| self.generate_record(id, output_root))
            .collect()
    }

    /// Regenerate the blocks a partial change reaches
    pub fn regenerate_for_partial(
        &self,
        tracker: &PartialTracker,
        partial_id: RecordId,
        output_root: &Path,
    ) -> Result<Vec<GenerationReport>> {
        let affected = tracker.affected_blocks(self.ctx.store, partial_id);
        log::info!("Partial {} affects {} block(s)", partial_id, affected.len());
        affected
            .into_iter()
            .map(|id| self.generate_record(id, output_root))
            .collect()
    }
}

/// Load a project file and generate every record in it
pub fn generate_project(
    project_path: &Path,
    output_root: &Path,
    options: &GeneratorOptions,
) -> Result<(Vec<GenerationReport>, GenerationStats)> {
    let start_time = Instant::now();
    if options.debug_mode {
        log::info!("{} v{}", NAME, VERSION);
        log::debug!("Generator options: {:?}", options);
    }

    let project = Project::load(project_path)?;
    let schema = FieldSchemaMapper::new();
    let writer = AtomicWriter::new(options.syntax_validator());
    let namespace = project
        .namespace
        .clone()
        .unwrap_or_else(|| options.namespace.clone());
    let ctx = GenerationContext::new(
        &project.store,
        &project.settings,
        &schema,
        &project.css,
        &writer,
    )
    .with_namespace(namespace);

    let reports = BlockPipeline::new(ctx)
        .with_debug(options.debug_mode)
        .generate_all(output_root)?;

    let mut stats = GenerationStats::from_reports(&reports);
    stats.generate_time_ms = start_time.elapsed().as_millis() as u64;
    if options.debug_mode {
        log::info!("Records: {}", stats.records);
        log::info!("Artifacts written: {}", stats.artifacts_written);
        log::debug!("Full stats: {:?}", stats);
    }
    Ok((reports, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct Harness {
        store: MemoryContentStore,
        settings: MemorySettingsRepository,
        schema: FieldSchemaMapper,
        css: PrecompiledCss,
        writer: AtomicWriter,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: MemoryContentStore::new(),
                settings: MemorySettingsRepository::new(),
                schema: FieldSchemaMapper::new(),
                css: PrecompiledCss::new(),
                writer: AtomicWriter::new(SyntaxValidator::structural_only()),
            }
        }

        fn pipeline(&self) -> BlockPipeline<'_> {
            BlockPipeline::new(GenerationContext::new(
                &self.store,
                &self.settings,
                &self.schema,
                &self.css,
                &self.writer,
            ))
        }
    }

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        walkdir::WalkDir::new(dir)
            .into_iter()
            .map(|entry| entry.unwrap())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| (entry.path().to_path_buf(), fs::read(entry.path()).unwrap()))
            .collect()
    }

    fn cta_harness() -> Harness {
        let mut harness = Harness::new();
        harness.store.insert(
            ContentRecord::new(1, "Call To Action", RecordKind::Block)
                .with_field(FIELD_RENDER_TEMPLATE, r#"<div blockProps><Button label="Go"/></div>"#),
        );
        harness.store.insert(
            ContentRecord::new(2, "Button", RecordKind::Symbol).with_field(
                FIELD_RENDER_TEMPLATE,
                "<button><?= esc_html($attributes['label']) ?></button>",
            ),
        );
        harness
    }

    #[test]
    fn test_end_to_end_block_generation() {
        let temp_dir = TempDir::new().unwrap();
        let harness = cta_harness();
        let reports = harness.pipeline().generate_all(temp_dir.path()).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(GenerationReport::succeeded));

        let block_dir = temp_dir.path().join("call-to-action");
        let render = fs::read_to_string(block_dir.join(RENDER_FILENAME)).unwrap();
        assert_eq!(
            render,
            r#"<div <?php echo get_block_wrapper_attributes(); ?>><Button label="Go"/></div>"#
        );

        let manifest: Value =
            serde_json::from_slice(&fs::read(block_dir.join(MANIFEST_FILENAME)).unwrap()).unwrap();
        assert_eq!(manifest["render"], "file:./render.php");
        assert_eq!(manifest["supports"]["html"], false);
        assert_eq!(manifest["name"], "blockforge/call-to-action");

        // Symbol tags resolve only at render time
        let resolver =
            SymbolResolver::for_template_dir(&block_dir, Box::new(StaticSymbolRenderer::new()));
        let html = TemplateRenderer::new(resolver).render(&render);
        assert_eq!(
            html,
            "<div <?php echo get_block_wrapper_attributes(); ?>><button>Go</button></div>"
        );
    }

    #[test]
    fn test_regeneration_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let mut harness = cta_harness();
        harness.css.insert(1, CssVariant::Style, ".cta{}");
        harness
            .settings
            .save(
                1,
                &SettingsPatch {
                    allowed_blocks: Some(vec!["core/heading".to_string()]),
                    ..Default::default()
                },
            )
            .unwrap();

        let pipeline = harness.pipeline();
        pipeline.generate_all(temp_dir.path()).unwrap();
        let first = snapshot(temp_dir.path());
        pipeline.generate_all(temp_dir.path()).unwrap();
        assert_eq!(first, snapshot(temp_dir.path()));
    }

    #[test]
    fn test_failed_kind_does_not_block_others() {
        let temp_dir = TempDir::new().unwrap();
        let mut harness = Harness::new();
        harness.store.insert(
            ContentRecord::new(5, "Broken", RecordKind::Block)
                .with_field(FIELD_RENDER_TEMPLATE, "<div blockProps><?php if ($a) { ?></div>"),
        );
        harness.css.insert(5, CssVariant::Style, ".broken{}");

        let report = harness.pipeline().generate_record(5, temp_dir.path()).unwrap();
        assert!(!report.succeeded());
        assert!(matches!(
            report.outcome(ArtifactKind::Render),
            Some(ArtifactOutcome::Failed { .. })
        ));
        assert!(matches!(
            report.outcome(ArtifactKind::Style),
            Some(ArtifactOutcome::Written { .. })
        ));
        assert_eq!(report.outcome(ArtifactKind::Script), Some(&ArtifactOutcome::Skipped));

        let block_dir = temp_dir.path().join("broken");
        let names: Vec<String> = fs::read_dir(&block_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(!names.iter().any(|n| n.ends_with(".tmp")));
        assert!(!block_dir.join(RENDER_FILENAME).exists());
        assert!(block_dir.join(MANIFEST_FILENAME).exists());

        let stats = GenerationStats::from_reports(&[report]);
        assert_eq!(stats.records_failed, 1);
        assert_eq!(stats.artifacts_failed, 1);
        assert_eq!(stats.artifacts_written, 2);
    }

    #[test]
    fn test_global_partial_regenerates_every_block() {
        let temp_dir = TempDir::new().unwrap();
        let mut harness = Harness::new();
        for (id, title) in [(1, "Alpha"), (2, "Beta")] {
            harness.store.insert(ContentRecord::new(id, title, RecordKind::Block));
        }
        harness
            .store
            .insert(ContentRecord::new(9, "Tokens", RecordKind::Partial));

        let mut tracker = PartialTracker::new();
        tracker
            .rebuild(
                &harness.store,
                &harness.settings,
                vec![PartialScope { partial_id: 9, global: true, order: 0 }],
            )
            .unwrap();

        let reports = harness
            .pipeline()
            .regenerate_for_partial(&tracker, 9, temp_dir.path())
            .unwrap();
        let ids: Vec<RecordId> = reports.iter().map(|r| r.record_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(temp_dir.path().join("beta").join(MANIFEST_FILENAME).exists());
    }

    #[test]
    fn test_custom_generator_set() {
        let temp_dir = TempDir::new().unwrap();
        let harness = cta_harness();
        let pipeline = harness
            .pipeline()
            .with_generators(vec![Box::new(ManifestGenerator)]);

        let report = pipeline.generate_record(1, temp_dir.path()).unwrap();
        assert_eq!(report.artifacts.len(), 1);
        assert!(report.succeeded());

        let block_dir = temp_dir.path().join("call-to-action");
        assert!(block_dir.join(MANIFEST_FILENAME).is_file());
        assert!(!block_dir.join(RENDER_FILENAME).exists());

        // No generator in the set handles symbols
        let symbol = pipeline.generate_record(2, temp_dir.path()).unwrap();
        assert!(symbol.artifacts.is_empty());
        assert!(!temp_dir.path().join("symbols").exists());
    }

    /// Claims success without leaving a file behind
    struct VanishingGenerator;

    impl ArtifactGenerator for VanishingGenerator {
        fn kind(&self) -> ArtifactKind {
            ArtifactKind::Script
        }

        fn can_generate(&self, kind: RecordKind) -> bool {
            kind == RecordKind::Block
        }

        fn required_fields(&self) -> &'static [&'static str] {
            &[]
        }

        fn output_filename(&self, _record: &ContentRecord) -> String {
            SCRIPT_FILENAME.to_string()
        }

        fn generate(
            &self,
            _ctx: &GenerationContext<'_>,
            _record: &ContentRecord,
            _settings: &BlockSettings,
            _output_dir: &Path,
        ) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_unreadable_artifact_fails_only_its_kind() {
        let temp_dir = TempDir::new().unwrap();
        let harness = cta_harness();
        let pipeline = harness.pipeline().with_generators(vec![
            Box::new(VanishingGenerator),
            Box::new(RenderGenerator),
            Box::new(ManifestGenerator),
        ]);

        let report = pipeline.generate_record(1, temp_dir.path()).unwrap();
        assert!(!report.succeeded());
        assert!(matches!(
            report.outcome(ArtifactKind::Script),
            Some(ArtifactOutcome::Failed { .. })
        ));
        assert!(matches!(
            report.outcome(ArtifactKind::Render),
            Some(ArtifactOutcome::Written { .. })
        ));
        assert!(matches!(
            report.outcome(ArtifactKind::Manifest),
            Some(ArtifactOutcome::Written { .. })
        ));
    }

    #[test]
    fn test_required_fields_per_kind() {
        let harness = Harness::new();
        let pipeline = harness.pipeline();
        assert_eq!(
            pipeline.required_fields(RecordKind::Block),
            vec![
                FIELD_ATTRIBUTES_SCHEMA,
                FIELD_EDITOR_STYLE_SOURCE,
                FIELD_RENDER_TEMPLATE,
                FIELD_SCRIPT_SOURCE,
                FIELD_STYLE_SOURCE,
            ]
        );
        assert_eq!(pipeline.required_fields(RecordKind::Symbol), vec![FIELD_RENDER_TEMPLATE]);
        assert!(pipeline.required_fields(RecordKind::Partial).is_empty());
    }

    #[test]
    fn test_generate_project_file() {
        let temp_dir = TempDir::new().unwrap();
        let project_path = temp_dir.path().join("site.json");
        let sample = ProjectFile::sample("acme");
        fs::write(&project_path, sample.to_string_for(&project_path).unwrap()).unwrap();

        let out = temp_dir.path().join("out");
        let options = GeneratorOptions {
            lint: false,
            ..Default::default()
        };
        let (reports, stats) = generate_project(&project_path, &out, &options).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(stats.records_failed, 0);
        assert!(out.join("symbols/button.php").is_file());

        let manifest: Value = serde_json::from_slice(
            &fs::read(out.join("call-to-action").join(MANIFEST_FILENAME)).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["name"], "acme/call-to-action");
        assert_eq!(manifest["category"], "design");
        assert_eq!(manifest["style"], "file:./style.css");
    }

    #[test]
    fn test_generator_options_default() {
        let options = GeneratorOptions::default();
        assert!(!options.debug_mode);
        assert!(options.lint);
        assert_eq!(options.namespace, "blockforge");
        assert_eq!(options.lint_timeout, Duration::from_secs(10));
        assert_eq!(options.symbol_renderer, SymbolRendererKind::Static);
        assert_eq!(
            GeneratorOptions { lint: false, ..options }.syntax_validator().strategy_names(),
            vec!["structural"]
        );
    }
}
