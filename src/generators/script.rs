use std::path::Path;

use super::{ArtifactGenerator, GenerationContext};
use crate::error::Result;
use crate::types::{
    ArtifactKind, BlockSettings, ContentRecord, RecordKind, FIELD_SCRIPT_SOURCE, SCRIPT_FILENAME,
};

/// Front-end view script, written as authored
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptGenerator;

impl ArtifactGenerator for ScriptGenerator {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Script
    }

    fn can_generate(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Block
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &[FIELD_SCRIPT_SOURCE]
    }

    fn output_filename(&self, _record: &ContentRecord) -> String {
        SCRIPT_FILENAME.to_string()
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        record: &ContentRecord,
        _settings: &BlockSettings,
        output_dir: &Path,
    ) -> Result<bool> {
        if !record.has_content(FIELD_SCRIPT_SOURCE) {
            return Ok(false);
        }
        ctx.writer.write(
            output_dir,
            &self.output_filename(record),
            record.field(FIELD_SCRIPT_SOURCE).as_bytes(),
            self.kind(),
            None,
        )?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::fixtures::Fixture;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_script_written_only_when_present() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = Fixture::default();
        let ctx = fixture.context();
        let settings = BlockSettings::default();

        let empty = ContentRecord::new(1, "Quiet", RecordKind::Block);
        assert!(!ScriptGenerator.generate(&ctx, &empty, &settings, temp_dir.path()).unwrap());

        let source = "document.querySelectorAll('.x').forEach(el => el.hidden = false);\n";
        let record = empty.with_field(FIELD_SCRIPT_SOURCE, source);
        assert!(ScriptGenerator.generate(&ctx, &record, &settings, temp_dir.path()).unwrap());
        assert_eq!(
            fs::read_to_string(temp_dir.path().join(SCRIPT_FILENAME)).unwrap(),
            source
        );
    }
}
