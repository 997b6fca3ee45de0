use std::path::Path;

use super::{ArtifactGenerator, GenerationContext};
use crate::error::Result;
use crate::types::{
    ArtifactKind, BlockSettings, ContentRecord, RecordKind, FIELD_RENDER_TEMPLATE,
    SYMBOL_EXTENSION,
};
use crate::utils::kebab_case;

/// Writes a symbol's template into the shared symbols directory, named so
/// the render-time resolver finds it from the tag name
#[derive(Debug, Default, Clone, Copy)]
pub struct SymbolGenerator;

impl ArtifactGenerator for SymbolGenerator {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Symbol
    }

    fn can_generate(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Symbol
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &[FIELD_RENDER_TEMPLATE]
    }

    fn output_filename(&self, record: &ContentRecord) -> String {
        format!("{}.{}", kebab_case(&record.title), SYMBOL_EXTENSION)
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        record: &ContentRecord,
        _settings: &BlockSettings,
        output_dir: &Path,
    ) -> Result<bool> {
        if !record.has_content(FIELD_RENDER_TEMPLATE) {
            return Ok(false);
        }
        ctx.writer.write(
            output_dir,
            &self.output_filename(record),
            record.field(FIELD_RENDER_TEMPLATE).as_bytes(),
            self.kind(),
            Some(&record.label()),
        )?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::fixtures::Fixture;
    use crate::transform::{StaticSymbolRenderer, SymbolResolver};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_symbol_file_is_resolvable_by_tag_name() {
        let temp_dir = TempDir::new().unwrap();
        let mut fixture = Fixture::default();
        fixture.store.insert(
            ContentRecord::new(20, "ProductCard", RecordKind::Symbol).with_field(
                FIELD_RENDER_TEMPLATE,
                "<article><?= esc_html($attributes['name']) ?></article>",
            ),
        );

        assert!(fixture
            .context()
            .generate(&SymbolGenerator, 20, temp_dir.path())
            .unwrap());

        let symbols = temp_dir.path().join("symbols");
        assert!(symbols.join("product-card.php").is_file());

        let resolver = SymbolResolver::new(&symbols, Box::new(StaticSymbolRenderer::new()));
        assert_eq!(
            resolver.resolve(r#"<ProductCard name="Green tea"/>"#),
            "<article>Green tea</article>"
        );
    }

    #[test]
    fn test_title_with_digits_matches_tag() {
        let temp_dir = TempDir::new().unwrap();
        let mut fixture = Fixture::default();
        fixture.store.insert(
            ContentRecord::new(22, "Hero 2 Column", RecordKind::Symbol)
                .with_field(FIELD_RENDER_TEMPLATE, "<section>two</section>"),
        );

        assert!(fixture
            .context()
            .generate(&SymbolGenerator, 22, temp_dir.path())
            .unwrap());

        let symbols = temp_dir.path().join("symbols");
        assert!(symbols.join("hero2-column.php").is_file());
        let resolver = SymbolResolver::new(&symbols, Box::new(StaticSymbolRenderer::new()));
        assert_eq!(resolver.resolve("<Hero2Column/>"), "<section>two</section>");
    }

    #[test]
    fn test_invalid_symbol_is_not_written() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = Fixture::default();
        let record = ContentRecord::new(21, "Badge", RecordKind::Symbol)
            .with_field(FIELD_RENDER_TEMPLATE, "<?php if ($x) { ?><b></b>");

        assert!(SymbolGenerator
            .generate(&fixture.context(), &record, &BlockSettings::default(), temp_dir.path())
            .is_err());
        assert!(fs::read_dir(temp_dir.path()).unwrap().next().is_none());
    }
}
