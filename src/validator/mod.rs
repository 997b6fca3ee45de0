//! Syntax validation of generated templates before they reach their final path
//!
//! Validation is a capability negotiation: each strategy either answers
//! (`Available`) or declares that it cannot run (`Unavailable`). The first
//! strategy that answers decides. When none can run, validation passes with
//! a warning; a concrete parse failure is never turned into success.

mod lint;
mod scanner;

pub use lint::{is_unusable_output, run_with_timeout, LintCommand, ProcessOutput};
pub use scanner::{scan, ScanError, StructuralCheck};

use lazy_static::lazy_static;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GeneratorError, Result};

/// Outcome of asking one strategy to validate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The strategy ran. `Err` carries the raw diagnostic text.
    Available(std::result::Result<(), String>),
    /// The strategy could not run; the reason is logged only.
    Unavailable(String),
}

/// One way of checking template syntax
pub trait SyntaxCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// Validate `source`, which is also on disk at `path`
    fn try_validate(&self, path: &Path, source: &str) -> Validation;
}

/// Ordered list of syntax check strategies
pub struct SyntaxValidator {
    strategies: Vec<Box<dyn SyntaxCheck>>,
}

impl std::fmt::Debug for SyntaxValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("SyntaxValidator").field("strategies", &names).finish()
    }
}

impl Default for SyntaxValidator {
    fn default() -> Self {
        Self::structural_only()
    }
}

impl SyntaxValidator {
    pub fn new(strategies: Vec<Box<dyn SyntaxCheck>>) -> Self {
        Self { strategies }
    }

    /// External linter first, structural scan as the fallback
    pub fn with_lint(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self::new(vec![
            Box::new(LintCommand::new(binary, timeout)),
            Box::new(StructuralCheck::new()),
        ])
    }

    pub fn structural_only() -> Self {
        Self::new(vec![Box::new(StructuralCheck::new())])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Validate a file that already holds `source`
    pub fn validate_file(&self, path: &Path, source: &str, label: &str) -> Result<()> {
        for strategy in &self.strategies {
            match strategy.try_validate(path, source) {
                Validation::Available(Ok(())) => {
                    log::debug!("{} passed {} check", label, strategy.name());
                    return Ok(());
                }
                Validation::Available(Err(raw)) => {
                    let message = normalize_diagnostic(&raw);
                    log::debug!("{} failed {} check: {}", label, strategy.name(), message);
                    return Err(GeneratorError::syntax(label, message));
                }
                Validation::Unavailable(reason) => {
                    log::debug!("Validator {} unavailable: {}", strategy.name(), reason);
                }
            }
        }

        log::warn!("No syntax validator could run for {}; accepting it unchecked", label);
        Ok(())
    }

    /// Validate text that is not on disk yet by writing it to a temporary file
    pub fn validate_source(&self, source: &str, label: &str) -> Result<()> {
        let mut temp = tempfile::Builder::new()
            .prefix(".blockforge-lint-")
            .suffix(".php")
            .tempfile()?;
        temp.write_all(source.as_bytes())?;
        temp.flush()?;
        self.validate_file(temp.path(), source, label)
    }
}

lazy_static! {
    static ref BOILERPLATE_PREFIX_RE: Regex =
        Regex::new(r"(?i)^(?:PHP\s+)?(?:Parse|Fatal)\s+error:\s*").unwrap();
    static ref ON_LINE_RE: Regex =
        Regex::new(r"(?i)^(.*?)\s+in\s+.*?\s+on\s+line\s+(\d+)\s*$").unwrap();
    static ref FILE_COLON_RE: Regex =
        Regex::new(r"(?i)^(.*?)(?:\s+in)?\s+[^\s:]*[/\\.][^\s:]*:(\d+)\s*$").unwrap();
    static ref BARE_COLON_RE: Regex = Regex::new(r"^(.*?):(\d+)\s*$").unwrap();
}

/// Reduce a raw diagnostic to `"<message> on line N"`.
///
/// Takes the first meaningful line, strips the `PHP Parse error:` family of
/// prefixes, and pulls the line number out of either
/// `... in <file> on line N` or `...:N`.
pub fn normalize_diagnostic(raw: &str) -> String {
    let first = raw
        .lines()
        .map(str::trim)
        .find(|line| {
            !line.is_empty()
                && !line.starts_with("Errors parsing")
                && !line.starts_with("No syntax errors")
        })
        .unwrap_or("");

    let stripped = BOILERPLATE_PREFIX_RE.replace(first, "").trim().to_string();

    let (message, line) = if let Some(caps) = ON_LINE_RE.captures(&stripped) {
        (caps[1].trim().to_string(), Some(caps[2].to_string()))
    } else if let Some(caps) = FILE_COLON_RE.captures(&stripped) {
        (caps[1].trim().to_string(), Some(caps[2].to_string()))
    } else if let Some(caps) = BARE_COLON_RE.captures(&stripped) {
        (caps[1].trim().to_string(), Some(caps[2].to_string()))
    } else {
        (stripped.clone(), None)
    };

    let message = if message.is_empty() {
        "unknown syntax error".to_string()
    } else {
        message
    };

    match line {
        Some(line) => format!("{} on line {}", message, line),
        None => message,
    }
}
