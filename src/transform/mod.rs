//! Template transformation
//!
//! Two independent rewrites are applied to render templates:
//!
//! - **Wrapper expansion** (`blockProps` -> wrapper attributes call) runs at
//!   generation time, before the render file is written.
//! - **Symbol resolution** (`<ProductCard />` -> symbol markup) runs at render
//!   time, so a generated render file still contains its symbol tags.
//!
//! Neither rewrite fails. Problems are reported in-band as HTML comments.

pub mod attributes;
pub mod markup;
pub mod renderers;
pub mod symbols;
pub mod wrapper;

pub use attributes::{Attribute, TagAttributes};
pub use markup::{is_self_closing_allowed, normalize_self_closing};
pub use renderers::{substitute_attribute_echoes, PhpSymbolRenderer, StaticSymbolRenderer};
pub use symbols::{is_reserved_component, symbols_dir_for, SymbolRenderer, SymbolResolver};
pub use wrapper::{expand_wrapper_attributes, WRAPPER_CALL, WRAPPER_PLACEHOLDER};

use lazy_static::lazy_static;
use regex::Regex;

/// Case-insensitive marker for a nested-block area in render output
pub const INNER_CONTENT_MARKER: &str = "<innerblocks";

/// Fills nested-content areas at render time
pub trait InnerContentProcessor: Send + Sync {
    fn process(&self, html: &str) -> String;
}

lazy_static! {
    static ref INNER_BLOCKS_TAG_RE: Regex =
        Regex::new(r"(?s)<InnerBlocks\b[^>]*?/>|<InnerBlocks\b[^>]*>.*?</InnerBlocks>").unwrap();
}

/// Replaces every `<InnerBlocks />` area with already-rendered child markup
#[derive(Debug, Clone, Default)]
pub struct InnerBlocksSlot {
    content: String,
}

impl InnerBlocksSlot {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl InnerContentProcessor for InnerBlocksSlot {
    fn process(&self, html: &str) -> String {
        INNER_BLOCKS_TAG_RE
            .replace_all(html, regex::NoExpand(&self.content))
            .into_owned()
    }
}

/// True when render output declares a nested-block area
pub fn has_inner_content_marker(render_output: &str) -> bool {
    render_output.to_lowercase().contains(INNER_CONTENT_MARKER)
}

/// Generation-time transform of a render template
pub fn transform_render_template(template: &str) -> String {
    expand_wrapper_attributes(template)
}

/// Render-time pipeline: symbols, then nested content, then symbols again
/// for anything the nested content brought in
pub struct TemplateRenderer {
    resolver: SymbolResolver,
    inner: Option<Box<dyn InnerContentProcessor>>,
}

impl TemplateRenderer {
    pub fn new(resolver: SymbolResolver) -> Self {
        Self {
            resolver,
            inner: None,
        }
    }

    pub fn with_inner_content(mut self, processor: Box<dyn InnerContentProcessor>) -> Self {
        self.inner = Some(processor);
        self
    }

    pub fn render(&self, template: &str) -> String {
        let resolved = self.resolver.resolve(template);
        match &self.inner {
            Some(inner) => self.resolver.resolve(&inner.process(&resolved)),
            None => resolved,
        }
    }
}
