use std::path::Path;

use super::{ArtifactGenerator, GenerationContext};
use crate::error::Result;
use crate::types::{
    ArtifactKind, BlockSettings, ContentRecord, CssVariant, RecordKind,
    EDITOR_STYLE_FILENAME, FIELD_EDITOR_STYLE_SOURCE, FIELD_STYLE_SOURCE, STYLE_FILENAME,
};

/// Copies compiled CSS into `style.css` or `editor.css`. CSS is not
/// validated; that belongs to the compiler.
#[derive(Debug, Clone, Copy)]
pub struct StyleGenerator {
    variant: CssVariant,
}

impl StyleGenerator {
    pub fn front() -> Self {
        Self {
            variant: CssVariant::Style,
        }
    }

    pub fn editor() -> Self {
        Self {
            variant: CssVariant::Editor,
        }
    }

    pub fn variant(&self) -> CssVariant {
        self.variant
    }
}

impl ArtifactGenerator for StyleGenerator {
    fn kind(&self) -> ArtifactKind {
        match self.variant {
            CssVariant::Style => ArtifactKind::Style,
            CssVariant::Editor => ArtifactKind::EditorStyle,
        }
    }

    fn can_generate(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Block
    }

    fn required_fields(&self) -> &'static [&'static str] {
        match self.variant {
            CssVariant::Style => &[FIELD_STYLE_SOURCE],
            CssVariant::Editor => &[FIELD_EDITOR_STYLE_SOURCE],
        }
    }

    fn output_filename(&self, _record: &ContentRecord) -> String {
        match self.variant {
            CssVariant::Style => STYLE_FILENAME,
            CssVariant::Editor => EDITOR_STYLE_FILENAME,
        }
        .to_string()
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        record: &ContentRecord,
        _settings: &BlockSettings,
        output_dir: &Path,
    ) -> Result<bool> {
        let css = match ctx.css.compiled_css_for(record.id, self.variant) {
            Some(css) => css,
            None => {
                log::debug!("No compiled {} CSS for {}", self.kind(), record.label());
                return Ok(false);
            }
        };

        ctx.writer
            .write(output_dir, &self.output_filename(record), &css, self.kind(), None)?;
        Ok(true)
    }
}
