use crate::cli::{parse_key_values, ProjectFormat};
use crate::project::{Project, ProjectFile};
use crate::transform::{
    substitute_attribute_echoes, symbols_dir_for, transform_render_template, InnerBlocksSlot,
    SymbolResolver, TemplateRenderer,
};
use crate::{
    BlockPipeline, FieldSchemaMapper, GenerationContext, GenerationReport, GenerationStats,
    GeneratorError, GeneratorOptions, AtomicWriter, ArtifactOutcome, ContentStore, RecordId,
    Result,
};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Instant;

// --- GENERATE ---
pub fn handle_generate_command(cli: &super::EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let project_path = PathBuf::from(required(matches, "project")?);
    let output_dir = cli.output_directory(matches);
    let record = matches.get_one::<u64>("record").copied();
    let options = cli.build_generator_options(matches)?;

    if matches.get_flag("watch") {
        watch_and_generate(&project_path, &output_dir, record, &options)
    } else {
        let reports = generate_once(&project_path, &output_dir, record, &options)?;
        print_reports(&reports, matches.get_flag("json"))?;
        if matches.get_flag("stats") {
            print_detailed_stats(&GenerationStats::from_reports(&reports));
        }
        let failed = reports.iter().filter(|r| !r.succeeded()).count();
        if failed > 0 {
            return Err(GeneratorError::GenerationFailed {
                failed,
                total: reports.len(),
            });
        }
        Ok(())
    }
}

fn required<'a>(matches: &'a clap::ArgMatches, id: &str) -> Result<&'a String> {
    matches.get_one::<String>(id).ok_or_else(|| GeneratorError::InvalidFormat {
        message: format!("missing argument <{}>", id),
    })
}

fn generate_once(
    project_path: &Path,
    output_dir: &Path,
    record: Option<RecordId>,
    options: &GeneratorOptions,
) -> Result<Vec<GenerationReport>> {
    let project = Project::load(project_path)?;
    let schema = FieldSchemaMapper::new();
    let writer = AtomicWriter::new(options.syntax_validator());
    let namespace = project
        .namespace
        .clone()
        .unwrap_or_else(|| options.namespace.clone());
    let ctx = GenerationContext::new(&project.store, &project.settings, &schema, &project.css, &writer)
        .with_namespace(namespace);
    let pipeline = BlockPipeline::new(ctx).with_debug(options.debug_mode);

    println!("🔨 Generating {} -> {}", project_path.display(), output_dir.display());
    match record {
        Some(id) => Ok(vec![pipeline.generate_record(id, output_dir)?]),
        None => pipeline.generate_all(output_dir),
    }
}

fn print_reports(reports: &[GenerationReport], as_json: bool) -> Result<()> {
    if as_json {
        let json = serde_json::to_string_pretty(reports)
            .map_err(|e| GeneratorError::invalid_format(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }

    for report in reports {
        let marker = if report.succeeded() { "✅" } else { "❌" };
        println!("{} {} ({}ms)", marker, report.label, report.elapsed_ms);
        for artifact in &report.artifacts {
            match &artifact.outcome {
                ArtifactOutcome::Written { path, bytes, .. } => {
                    println!("   {:<12} {} ({} bytes)", artifact.kind.to_string(), path.display(), bytes)
                }
                ArtifactOutcome::Skipped => {
                    log::info!("   {:<12} skipped", artifact.kind.to_string())
                }
                ArtifactOutcome::Failed { error } => {
                    println!("   {:<12} {}", artifact.kind.to_string(), error)
                }
            }
        }
    }
    Ok(())
}

fn print_detailed_stats(stats: &GenerationStats) {
    println!("\n📊 Generation Statistics:");
    println!("   Records: {}", stats.records);
    println!("   Records with failures: {}", stats.records_failed);
    println!("   Artifacts written: {}", stats.artifacts_written);
    println!("   Artifacts skipped: {}", stats.artifacts_skipped);
    println!("   Artifacts failed: {}", stats.artifacts_failed);
    println!("   Bytes written: {}", stats.bytes_written);
    println!("   Time: {}ms", stats.generate_time_ms);
}

fn watch_and_generate(
    project_path: &Path,
    output_dir: &Path,
    record: Option<RecordId>,
    options: &GeneratorOptions,
) -> Result<()> {
    println!("👀 Watching {} for changes...", project_path.display());

    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if let Err(e) = tx.send(event) {
                    eprintln!("Watch error: {}", e);
                }
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| {
        GeneratorError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to create file watcher: {}", e),
        ))
    })?;

    watcher
        .watch(project_path, RecursiveMode::NonRecursive)
        .map_err(|e| {
            GeneratorError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to watch file: {}", e),
            ))
        })?;

    match generate_once(project_path, output_dir, record, options) {
        Ok(reports) => print_reports(&reports, false)?,
        Err(e) => eprintln!("❌ Initial generation failed: {}", e),
    }

    loop {
        match rx.recv() {
            Ok(event) => {
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    continue;
                }
                println!("🔄 Project changed, regenerating...");
                let start = Instant::now();
                match generate_once(project_path, output_dir, record, options) {
                    Ok(reports) => {
                        let stats = GenerationStats::from_reports(&reports);
                        print_reports(&reports, false)?;
                        println!(
                            "✅ Regenerated {} record(s), {} failed ({}ms)",
                            stats.records,
                            stats.records_failed,
                            start.elapsed().as_millis()
                        );
                    }
                    Err(e) => eprintln!("❌ Generation failed: {}", e),
                }
            }
            Err(e) => {
                eprintln!("Watch error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

// --- CHECK ---
pub fn handle_check_command(cli: &super::EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = PathBuf::from(required(matches, "input")?);
    let options = cli.build_generator_options(matches)?;
    let validator = options.syntax_validator();
    log::debug!("Syntax strategies: {:?}", validator.strategy_names());

    if matches.get_flag("recursive") && input_path.is_dir() {
        check_directory_recursive(&input_path, &options)
    } else {
        check_single_file(&input_path, &options)
    }
}

fn check_single_file(input_path: &Path, options: &GeneratorOptions) -> Result<()> {
    let source = fs::read_to_string(input_path).map_err(|e| GeneratorError::FileNotFound {
        path: format!("{}: {}", input_path.display(), e),
    })?;
    let label = input_path.display().to_string();
    match options
        .syntax_validator()
        .validate_file(input_path, &source, &label)
    {
        Ok(()) => {
            println!("✅ {} - No issues found", label);
            Ok(())
        }
        Err(e) => {
            println!("❌ {}", e);
            Err(e)
        }
    }
}

fn check_directory_recursive(dir_path: &Path, options: &GeneratorOptions) -> Result<()> {
    let mut total_files = 0;
    let mut error_files = 0;

    for entry in walkdir::WalkDir::new(dir_path) {
        let entry = entry.map_err(|e| {
            GeneratorError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Directory traversal error: {}", e),
            ))
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().map_or(false, |ext| ext == "php")
        {
            total_files += 1;
            if check_single_file(entry.path(), options).is_err() {
                error_files += 1;
            }
        }
    }

    println!("\n📊 Check Summary:");
    println!("   Total files: {}", total_files);
    println!("   Files with errors: {}", error_files);
    if error_files > 0 {
        return Err(GeneratorError::syntax(
            dir_path.display().to_string(),
            format!("{} of {} file(s) failed", error_files, total_files),
        ));
    }
    Ok(())
}

// --- RENDER ---
pub fn handle_render_command(cli: &super::EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let template_path = PathBuf::from(required(matches, "template")?);
    let options = cli.build_generator_options(matches)?;
    let attributes = match matches.get_many::<String>("attr") {
        Some(pairs) => parse_key_values(pairs)?,
        None => Default::default(),
    };

    let template = fs::read_to_string(&template_path).map_err(|e| GeneratorError::FileNotFound {
        path: format!("{}: {}", template_path.display(), e),
    })?;

    let symbols_dir = match matches.get_one::<String>("symbols") {
        Some(dir) => PathBuf::from(dir),
        None => symbols_dir_for(template_path.parent().unwrap_or_else(|| Path::new("."))),
    };
    log::info!("Resolving symbols from {}", symbols_dir.display());

    let resolver = SymbolResolver::new(symbols_dir, options.symbol_renderer());
    let mut renderer = TemplateRenderer::new(resolver);
    if let Some(inner) = matches.get_one::<String>("inner") {
        renderer = renderer.with_inner_content(Box::new(InnerBlocksSlot::new(inner.clone())));
    }

    let expanded = transform_render_template(&template);
    let html = renderer.render(&substitute_attribute_echoes(&expanded, &attributes));

    match matches.get_one::<String>("output") {
        Some(output) => {
            fs::write(output, &html)?;
            println!("✅ Preview saved to {}", output);
        }
        None => println!("{}", html),
    }
    Ok(())
}

// --- AFFECTED ---
pub fn handle_affected_command(matches: &clap::ArgMatches) -> Result<()> {
    let project_path = PathBuf::from(required(matches, "project")?);
    let partial_id = matches
        .get_one::<u64>("partial")
        .copied()
        .ok_or_else(|| GeneratorError::invalid_format("missing argument <partial>"))?;

    let project = Project::load(&project_path)?;
    if project.store.record(partial_id).is_none() {
        log::warn!("Partial {} is not in {}", partial_id, project_path.display());
    }
    let affected = project.tracker.affected_blocks(&project.store, partial_id);

    if matches.get_flag("json") {
        let json = serde_json::to_string(&affected)
            .map_err(|e| GeneratorError::invalid_format(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }

    let scope = if project.tracker.is_global(partial_id) { "global" } else { "local" };
    println!("🔗 Partial {} ({}) affects {} block(s)", partial_id, scope, affected.len());
    for block_id in affected {
        let label = project
            .store
            .record(block_id)
            .map(|record| record.label())
            .unwrap_or_else(|| format!("#{}", block_id));
        println!("   {}", label);
    }
    Ok(())
}

// --- INIT ---
pub fn handle_init_command(cli: &super::EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let project_name = required(matches, "name")?;
    let format = matches
        .get_one::<ProjectFormat>("format")
        .copied()
        .unwrap_or(ProjectFormat::Toml);
    let options = cli.build_generator_options(matches)?;

    println!("🚀 Initializing new block project: {}", project_name);
    let project_dir = Path::new(project_name);
    let project_file = init_project(project_dir, format, &options)?;

    println!("✅ Project created successfully!");
    println!("   Directory: {}", project_dir.display());
    println!("\nNext steps:");
    println!("   cd {}", project_name);
    println!(
        "   {} generate {}",
        crate::NAME,
        project_file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    );
    Ok(())
}

fn init_project(project_dir: &Path, format: ProjectFormat, options: &GeneratorOptions) -> Result<PathBuf> {
    fs::create_dir_all(project_dir)?;
    let project_file = project_dir.join(match format {
        ProjectFormat::Toml => "blocks.toml",
        ProjectFormat::Json => "blocks.json",
    });
    if project_file.exists() {
        return Err(GeneratorError::invalid_format(format!(
            "{} already exists",
            project_file.display()
        )));
    }

    let namespace = project_dir
        .file_name()
        .map(|name| crate::utils::slugify(&name.to_string_lossy()))
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| options.namespace.clone());
    let sample = ProjectFile::sample(&namespace);
    fs::write(&project_file, sample.to_string_for(&project_file)?)?;
    Ok(project_file)
}
