//! Symbol tag resolution: `<ProductCard title="x" />` -> rendered symbol markup

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::attributes::TagAttributes;
use super::markup::normalize_self_closing;
use crate::types::{MAX_SYMBOL_DEPTH, SYMBOLS_DIRNAME, SYMBOL_EXTENSION};
use crate::utils::kebab_case;

/// Host-framework component names that are never symbol references
pub const RESERVED_COMPONENTS: &[&str] = &[
    "InnerBlocks",
    "RichText",
    "MediaPlaceholder",
    "MediaUpload",
    "PlainText",
    "BlockControls",
    "InspectorControls",
    "Slot",
    "Fill",
];

lazy_static! {
    static ref SYMBOL_TAG_RE: Regex = Regex::new(
        r#"<([A-Z][A-Za-z0-9]*)((?:\s+[A-Za-z_:@][-\w:.@]*(?:\s*=\s*(?:"[^"]*"|'[^']*'))?)*)\s*/>"#
    )
    .unwrap();
}

pub fn is_reserved_component(name: &str) -> bool {
    RESERVED_COMPONENTS.contains(&name)
}

/// Renders one symbol source file with the tag's attributes in scope
pub trait SymbolRenderer: Send + Sync {
    fn render(
        &self,
        symbol_path: &Path,
        attributes: &BTreeMap<String, String>,
    ) -> std::result::Result<String, String>;
}

/// Resolves symbol tags against a `symbols/` directory
pub struct SymbolResolver {
    symbols_dir: PathBuf,
    renderer: Box<dyn SymbolRenderer>,
}

impl std::fmt::Debug for SymbolResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolResolver")
            .field("symbols_dir", &self.symbols_dir)
            .finish()
    }
}

impl SymbolResolver {
    pub fn new(symbols_dir: impl Into<PathBuf>, renderer: Box<dyn SymbolRenderer>) -> Self {
        Self {
            symbols_dir: symbols_dir.into(),
            renderer,
        }
    }

    /// Resolver for a template living in `template_dir`; symbols sit in the
    /// sibling `symbols/` directory
    pub fn for_template_dir(template_dir: &Path, renderer: Box<dyn SymbolRenderer>) -> Self {
        Self::new(symbols_dir_for(template_dir), renderer)
    }

    pub fn symbols_dir(&self) -> &Path {
        &self.symbols_dir
    }

    pub fn symbol_path(&self, symbol_name: &str) -> PathBuf {
        self.symbols_dir
            .join(format!("{}.{}", kebab_case(symbol_name), SYMBOL_EXTENSION))
    }

    /// Replace every symbol tag with its rendered output. Never fails:
    /// missing or broken symbols become HTML comments.
    pub fn resolve(&self, html: &str) -> String {
        let mut stack = Vec::new();
        let resolved = self.resolve_nested(html, &mut stack);
        normalize_self_closing(&resolved)
    }

    fn resolve_nested(&self, html: &str, stack: &mut Vec<String>) -> String {
        SYMBOL_TAG_RE
            .replace_all(html, |caps: &Captures| self.resolve_tag(caps, stack))
            .into_owned()
    }

    fn resolve_tag(&self, caps: &Captures, stack: &mut Vec<String>) -> String {
        let name = &caps[1];
        if is_reserved_component(name) {
            return caps[0].to_string();
        }

        let slug = kebab_case(name);
        if stack.contains(&slug) {
            log::warn!("Symbol '{}' includes itself; chain: {}", slug, stack.join(" -> "));
            return format!("<!-- Symbol recursion: {} -->", slug);
        }
        if stack.len() >= MAX_SYMBOL_DEPTH {
            log::warn!("Symbol nesting deeper than {} at '{}'", MAX_SYMBOL_DEPTH, slug);
            return format!("<!-- Symbol nesting too deep: {} -->", slug);
        }

        let path = self.symbol_path(name);
        if !path.is_file() {
            log::debug!("Symbol '{}' not found at {}", slug, path.display());
            return format!("<!-- Symbol not found: {} -->", slug);
        }

        let attributes = TagAttributes::parse(&caps[2]).to_map();
        match self.renderer.render(&path, &attributes) {
            Ok(output) => {
                stack.push(slug);
                let nested = self.resolve_nested(&output, stack);
                stack.pop();
                nested
            }
            Err(reason) => {
                log::warn!("Symbol '{}' failed to render: {}", slug, reason);
                format!("<!-- Symbol render failed: {} -->", slug)
            }
        }
    }
}

pub fn symbols_dir_for(template_dir: &Path) -> PathBuf {
    template_dir
        .parent()
        .unwrap_or(template_dir)
        .join(SYMBOLS_DIRNAME)
}
