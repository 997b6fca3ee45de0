//! Symbol renderers: a pure substitution renderer and a PHP CLI renderer

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use super::symbols::SymbolRenderer;
use crate::utils::escape_html;
use crate::validator::run_with_timeout;

lazy_static! {
    /// `<?= esc_html($attributes['key'] ?? 'fallback') ?>` and the
    /// `<?php echo ...; ?>` spelling of the same thing
    static ref ATTRIBUTE_ECHO_RE: Regex = Regex::new(
        r#"<\?(?:php\s+echo\s+|=\s*)(?:(esc_html|esc_attr|esc_url)\s*\(\s*)?\$attributes\[\s*['"]([^'"]+)['"]\s*\](?:\s*\?\?\s*(?:'([^']*)'|"([^"]*)"))?\s*\)?\s*;?\s*\?>"#
    )
    .unwrap();
}

/// Substitutes attribute echo blocks without running any PHP.
///
/// A symbol containing other PHP cannot be rendered this way and is
/// reported as a render failure.
#[derive(Debug, Default, Clone)]
pub struct StaticSymbolRenderer;

impl StaticSymbolRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render_source(
        &self,
        source: &str,
        attributes: &BTreeMap<String, String>,
    ) -> std::result::Result<String, String> {
        let rendered = substitute_attribute_echoes(source, attributes);
        if rendered.contains("<?") && !rendered.contains("<?xml") {
            return Err("symbol contains PHP the static renderer cannot evaluate".to_string());
        }
        Ok(rendered)
    }
}

/// Replace `$attributes[...]` echo blocks with attribute values, leaving any
/// other PHP in place
pub fn substitute_attribute_echoes(source: &str, attributes: &BTreeMap<String, String>) -> String {
    ATTRIBUTE_ECHO_RE
        .replace_all(source, |caps: &Captures| {
            let fallback = caps
                .get(3)
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or("");
            let value = attributes
                .get(&caps[2])
                .map(String::as_str)
                .unwrap_or(fallback);
            if caps.get(1).is_some() {
                escape_html(value)
            } else {
                value.to_string()
            }
        })
        .into_owned()
}

impl SymbolRenderer for StaticSymbolRenderer {
    fn render(
        &self,
        symbol_path: &Path,
        attributes: &BTreeMap<String, String>,
    ) -> std::result::Result<String, String> {
        let source = fs::read_to_string(symbol_path)
            .map_err(|e| format!("{}: {}", symbol_path.display(), e))?;
        self.render_source(&source, attributes)
    }
}

/// Driver run by `php -r`: attributes arrive as JSON on stdin
const PHP_DRIVER: &str =
    "$attributes = json_decode(stream_get_contents(STDIN), true) ?: []; include $argv[1];";

/// Executes the symbol with the PHP CLI and captures its output
#[derive(Debug, Clone)]
pub struct PhpSymbolRenderer {
    binary: PathBuf,
    timeout: Duration,
}

impl PhpSymbolRenderer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl SymbolRenderer for PhpSymbolRenderer {
    fn render(
        &self,
        symbol_path: &Path,
        attributes: &BTreeMap<String, String>,
    ) -> std::result::Result<String, String> {
        let payload = serde_json::to_vec(attributes).map_err(|e| e.to_string())?;

        let mut command = Command::new(&self.binary);
        command
            .arg("-d")
            .arg("display_errors=stderr")
            .arg("-r")
            .arg(PHP_DRIVER)
            .arg("--")
            .arg(symbol_path);

        let output = run_with_timeout(command, Some(payload), self.timeout)?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(output
                .combined()
                .lines()
                .next()
                .unwrap_or("php exited with an error")
                .to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_static_echo_forms() {
        let renderer = StaticSymbolRenderer::new();
        let source = r#"<button><?= $attributes['label'] ?></button><?php echo esc_attr($attributes["title"] ?? 'None'); ?>"#;
        assert_eq!(
            renderer.render_source(source, &attrs(&[("label", "Go")])).unwrap(),
            "<button>Go</button>None"
        );
    }

    #[test]
    fn test_static_escapes_under_helpers_only() {
        let renderer = StaticSymbolRenderer::new();
        let source = "<?= esc_html($attributes['x']) ?>|<?= $attributes['x'] ?>";
        assert_eq!(
            renderer.render_source(source, &attrs(&[("x", "<b>")])).unwrap(),
            "&lt;b&gt;|<b>"
        );
    }

    #[test]
    fn test_static_rejects_other_php() {
        let renderer = StaticSymbolRenderer::new();
        assert!(renderer
            .render_source("<?php foreach ($items as $i): ?>x<?php endforeach; ?>", &attrs(&[]))
            .is_err());
        assert!(renderer
            .render_source("<?xml version=\"1.0\"?><svg/>", &attrs(&[]))
            .is_ok());
    }

    #[test]
    fn test_substitution_keeps_other_php() {
        let source = "<div <?php echo get_block_wrapper_attributes(); ?>><?= $attributes['t'] ?? 'x' ?></div>";
        assert_eq!(
            substitute_attribute_echoes(source, &attrs(&[])),
            "<div <?php echo get_block_wrapper_attributes(); ?>>x</div>"
        );
    }

    #[test]
    fn test_php_renderer_missing_binary_is_error() {
        let renderer = PhpSymbolRenderer::new("/no/such/php", Duration::from_millis(200));
        assert!(renderer
            .render(Path::new("button.php"), &attrs(&[("label", "Go")]))
            .is_err());
    }
}
