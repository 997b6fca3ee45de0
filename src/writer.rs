//! Atomic artifact writes
//!
//! Content goes to a uniquely named temp file in the destination directory,
//! is validated there when asked, and is then renamed over the destination.
//! The temp file is removed on every failure path, so the destination holds
//! either the previous complete file or the new one.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{GeneratorError, Result};
use crate::types::{ArtifactKind, GeneratedArtifact};
use crate::validator::SyntaxValidator;

#[derive(Debug, Default)]
pub struct AtomicWriter {
    validator: SyntaxValidator,
}

impl AtomicWriter {
    pub fn new(validator: SyntaxValidator) -> Self {
        Self { validator }
    }

    /// Write `content` to `dir/filename`.
    ///
    /// With `validate_label`, the temp file is syntax checked before it is
    /// promoted and the label names the artifact in any syntax error.
    pub fn write(
        &self,
        dir: &Path,
        filename: &str,
        content: &[u8],
        kind: ArtifactKind,
        validate_label: Option<&str>,
    ) -> Result<GeneratedArtifact> {
        let destination = dir.join(filename);
        let artifact = destination.display().to_string();

        if !dir.is_dir() {
            return Err(GeneratorError::write(
                artifact,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("output directory {} does not exist", dir.display()),
                ),
            ));
        }

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", filename))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| GeneratorError::write(&artifact, e))?;

        temp.write_all(content)
            .and_then(|_| temp.flush())
            .map_err(|e| GeneratorError::write(&artifact, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o644))
                .map_err(|e| GeneratorError::write(&artifact, e))?;
        }

        if let Some(label) = validate_label {
            let source = String::from_utf8_lossy(content);
            self.validator.validate_file(temp.path(), &source, label)?;
        }

        let temp_path = temp.into_temp_path();

        if destination.exists() {
            fs::remove_file(&destination).map_err(|source| GeneratorError::Overwrite {
                path: destination.clone(),
                source,
            })?;
        }

        match temp_path.persist(&destination) {
            Ok(()) => {}
            Err(err) => {
                log::debug!(
                    "Rename into {} failed ({}), falling back to copy",
                    destination.display(),
                    err.error
                );
                let temp_path = err.path;
                if let Err(copy_err) = fs::copy(&temp_path, &destination) {
                    // A failed copy can leave a truncated destination behind
                    let _ = fs::remove_file(&destination);
                    return Err(GeneratorError::persist(
                        artifact,
                        destination,
                        format!("rename failed ({}) and copy failed ({})", err.error, copy_err),
                    ));
                }
                drop(temp_path);
            }
        }

        log::debug!("Wrote {} ({} bytes)", destination.display(), content.len());
        Ok(GeneratedArtifact::new(destination, content.to_vec(), kind))
    }
}
