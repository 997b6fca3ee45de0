mod config;
mod handlers;

pub use config::ConfigFile;

use crate::error::{GeneratorError, Result};
use crate::{GeneratorOptions, SymbolRendererKind};
use clap::{Arg, ArgAction, Command, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererChoice {
    Static,
    Php,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProjectFormat {
    Toml,
    Json,
}

pub struct EnhancedCli {
    config: ConfigFile,
    start_time: Instant,
}

impl Default for EnhancedCli {
    fn default() -> Self {
        Self::new()
    }
}

impl EnhancedCli {
    pub fn new() -> Self {
        Self {
            config: ConfigFile::default(),
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = self.build_cli().get_matches();

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        self.setup_logging(matches.get_count("verbose"))?;

        let result = match matches.subcommand() {
            Some(("generate", sub_matches)) => handlers::handle_generate_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(self, sub_matches),
            Some(("render", sub_matches)) => handlers::handle_render_command(self, sub_matches),
            Some(("affected", sub_matches)) => handlers::handle_affected_command(sub_matches),
            Some(("init", sub_matches)) => handlers::handle_init_command(self, sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        };
        log::debug!("Finished in {}ms", self.start_time.elapsed().as_millis());
        result
    }

    fn build_cli(&self) -> Command {
        let php_args = [
            Arg::new("php")
                .long("php")
                .value_name("BINARY")
                .help("PHP interpreter used for linting and symbol rendering"),
            Arg::new("no-lint")
                .long("no-lint")
                .help("Skip php -l and use only the structural checker")
                .action(ArgAction::SetTrue),
        ];

        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                Command::new("generate")
                    .about("Generate block packages from a project file")
                    .arg(Arg::new("project").help("Project file (.toml or .json)").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("DIR").help("Output directory"))
                    .arg(Arg::new("record").short('r').long("record").value_name("ID").value_parser(clap::value_parser!(u64)).help("Generate a single record"))
                    .arg(Arg::new("namespace").short('n').long("namespace").value_name("NAME").help("Block name namespace"))
                    .arg(Arg::new("debug").short('d').long("debug").help("Log every pipeline step").action(ArgAction::SetTrue))
                    .arg(Arg::new("stats").long("stats").help("Show generation statistics").action(ArgAction::SetTrue))
                    .arg(Arg::new("json").long("json").help("Print the generation report as JSON").action(ArgAction::SetTrue))
                    .arg(Arg::new("watch").short('w').long("watch").help("Watch the project file and regenerate").action(ArgAction::SetTrue))
                    .args(php_args.clone()),
            )
            .subcommand(
                Command::new("check")
                    .about("Check PHP templates for syntax errors")
                    .arg(Arg::new("input").help("PHP file or directory").required(true).index(1))
                    .arg(Arg::new("recursive").short('r').long("recursive").help("Check all PHP files in directory recursively").action(ArgAction::SetTrue))
                    .args(php_args.clone()),
            )
            .subcommand(
                Command::new("render")
                    .about("Preview a render template with symbols resolved")
                    .arg(Arg::new("template").help("Render template file").required(true).index(1))
                    .arg(Arg::new("attr").short('a').long("attr").value_name("KEY=VALUE").help("Attribute value for $attributes lookups").action(ArgAction::Append))
                    .arg(Arg::new("symbols").short('s').long("symbols").value_name("DIR").help("Symbols directory (default: ../symbols)"))
                    .arg(Arg::new("inner").long("inner").value_name("HTML").help("Markup placed into <InnerBlocks /> areas"))
                    .arg(Arg::new("renderer").long("renderer").value_parser(clap::value_parser!(RendererChoice)).help("Symbol renderer"))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Write the preview to a file"))
                    .args(php_args),
            )
            .subcommand(
                Command::new("affected")
                    .about("List the blocks a partial change regenerates")
                    .arg(Arg::new("project").help("Project file (.toml or .json)").required(true).index(1))
                    .arg(Arg::new("partial").help("Partial record id").required(true).index(2).value_parser(clap::value_parser!(u64)))
                    .arg(Arg::new("json").long("json").help("Print as JSON").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("init")
                    .about("Create a starter project")
                    .arg(Arg::new("name").help("Project name").required(true).index(1))
                    .arg(Arg::new("format").short('f').long("format").value_parser(clap::value_parser!(ProjectFormat)).default_value("toml").help("Project file format")),
            )
    }

    fn setup_logging(&self, verbose_count: u8) -> Result<()> {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
        Ok(())
    }

    /// Options from command-line flags, falling back to the config file
    pub fn build_generator_options(&self, matches: &clap::ArgMatches) -> Result<GeneratorOptions> {
        let mut options = GeneratorOptions::default();

        if let Some(namespace) = flag_value(matches, "namespace").or(self.config.namespace.clone()) {
            options.namespace = namespace;
        }
        if let Some(php) = flag_value(matches, "php").or(self.config.php_binary.clone()) {
            options.php_binary = PathBuf::from(php);
        }
        options.lint = !has_flag(matches, "no-lint") && self.config.lint.unwrap_or(true);
        if let Some(secs) = self.config.lint_timeout_secs {
            options.lint_timeout = Duration::from_secs(secs);
        }
        options.debug_mode = has_flag(matches, "debug");

        let choice = matches
            .try_get_one::<RendererChoice>("renderer")
            .ok()
            .flatten()
            .copied();
        options.symbol_renderer = match choice {
            Some(RendererChoice::Static) => SymbolRendererKind::Static,
            Some(RendererChoice::Php) => SymbolRendererKind::Php,
            None => self.config.symbol_renderer.unwrap_or_default(),
        };
        Ok(options)
    }

    pub fn output_directory(&self, matches: &clap::ArgMatches) -> PathBuf {
        flag_value(matches, "output")
            .or(self.config.output_directory.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("build/blocks"))
    }
}

/// String option that may not be defined on every subcommand
fn flag_value(matches: &clap::ArgMatches, id: &str) -> Option<String> {
    matches.try_get_one::<String>(id).ok().flatten().cloned()
}

fn has_flag(matches: &clap::ArgMatches, id: &str) -> bool {
    matches.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}

/// Parse repeated `KEY=VALUE` arguments
pub fn parse_key_values<'a>(
    pairs: impl IntoIterator<Item = &'a String>,
) -> Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                values.insert(key.trim().to_string(), value.to_string());
            }
            _ => {
                return Err(GeneratorError::InvalidFormat {
                    message: format!("Invalid attribute: {}. Use KEY=VALUE format.", pair),
                })
            }
        }
    }
    Ok(values)
}
