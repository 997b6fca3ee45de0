use std::path::Path;

use super::{ArtifactGenerator, GenerationContext};
use crate::error::Result;
use crate::transform::transform_render_template;
use crate::types::{
    ArtifactKind, BlockSettings, ContentRecord, RecordKind, FIELD_RENDER_TEMPLATE,
    RENDER_FILENAME,
};

/// Writes `render.php` from the record's render template. Only the wrapper
/// placeholder is expanded here; symbol tags are left for render time.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenderGenerator;

impl ArtifactGenerator for RenderGenerator {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Render
    }

    fn can_generate(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Block
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &[FIELD_RENDER_TEMPLATE]
    }

    fn output_filename(&self, _record: &ContentRecord) -> String {
        RENDER_FILENAME.to_string()
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        record: &ContentRecord,
        _settings: &BlockSettings,
        output_dir: &Path,
    ) -> Result<bool> {
        if !record.has_content(FIELD_RENDER_TEMPLATE) {
            log::debug!("{} has no render template", record.label());
            return Ok(false);
        }

        let rendered = transform_render_template(record.field(FIELD_RENDER_TEMPLATE));
        ctx.writer.write(
            output_dir,
            &self.output_filename(record),
            rendered.as_bytes(),
            self.kind(),
            Some(&record.label()),
        )?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeneratorError;
    use crate::generators::fixtures::Fixture;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_declines_without_template() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = Fixture::default();
        let record = ContentRecord::new(1, "Empty", RecordKind::Block)
            .with_field(FIELD_RENDER_TEMPLATE, "  \n");

        let written = RenderGenerator
            .generate(&fixture.context(), &record, &BlockSettings::default(), temp_dir.path())
            .unwrap();
        assert!(!written);
        assert!(!temp_dir.path().join(RENDER_FILENAME).exists());
    }

    #[test]
    fn test_expands_wrapper_and_keeps_symbol_tags() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = Fixture::default();
        let record = ContentRecord::new(1, "Cta", RecordKind::Block)
            .with_field(FIELD_RENDER_TEMPLATE, r#"<div blockProps><Button label="Go"/></div>"#);

        assert!(RenderGenerator
            .generate(&fixture.context(), &record, &BlockSettings::default(), temp_dir.path())
            .unwrap());
        assert_eq!(
            fs::read_to_string(temp_dir.path().join(RENDER_FILENAME)).unwrap(),
            r#"<div <?php echo get_block_wrapper_attributes(); ?>><Button label="Go"/></div>"#
        );
    }

    #[test]
    fn test_invalid_template_keeps_previous_render() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(RENDER_FILENAME), "<p>ok</p>").unwrap();
        let fixture = Fixture::default();
        let record = ContentRecord::new(5, "Broken", RecordKind::Block)
            .with_field(FIELD_RENDER_TEMPLATE, "<div blockProps><?php foreach ($items as $i) { ?></div>");

        let err = RenderGenerator
            .generate(&fixture.context(), &record, &BlockSettings::default(), temp_dir.path())
            .unwrap_err();
        match err {
            GeneratorError::Syntax { label, .. } => assert_eq!(label, "block \"Broken\" (#5)"),
            other => panic!("expected syntax error, got {other}"),
        }
        assert_eq!(
            fs::read_to_string(temp_dir.path().join(RENDER_FILENAME)).unwrap(),
            "<p>ok</p>"
        );
    }
}
