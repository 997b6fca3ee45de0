//! `php -l` strategy: lint the file with an external interpreter binary

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{SyntaxCheck, Validation};

/// Output fragments that mean the binary could not lint at all
const UNUSABLE_SIGNATURES: &[&str] = &["usage:", "command not found", "no such file or directory"];

/// Binary name fragments of server variants that cannot lint inline
const SERVER_VARIANTS: &[&str] = &["fpm", "cgi"];

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `<binary> -l <file>` and reads the verdict from its exit status
#[derive(Debug, Clone)]
pub struct LintCommand {
    binary: PathBuf,
    timeout: Duration,
}

/// Captured result of one child process run
#[derive(Debug, Default)]
pub struct ProcessOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// stderr then stdout, as one diagnostic blob
    pub fn combined(&self) -> String {
        let mut combined = self.stderr.trim().to_string();
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stdout);
        }
        combined
    }
}

impl LintCommand {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn is_server_variant(&self) -> bool {
        let name = self
            .binary
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        SERVER_VARIANTS.iter().any(|variant| name.contains(variant))
    }
}

/// True when a failed run's output says the tool itself is unusable
pub fn is_unusable_output(output: &str) -> bool {
    let lowered = output.to_lowercase();
    UNUSABLE_SIGNATURES.iter().any(|sig| lowered.contains(sig))
}

impl SyntaxCheck for LintCommand {
    fn name(&self) -> &'static str {
        "php-lint"
    }

    fn try_validate(&self, path: &Path, _source: &str) -> Validation {
        if self.is_server_variant() {
            return Validation::Unavailable(format!(
                "{} is a server binary and cannot lint",
                self.binary.display()
            ));
        }

        let mut command = Command::new(&self.binary);
        command.arg("-l").arg(path);

        let output = match run_with_timeout(command, None, self.timeout) {
            Ok(output) => output,
            Err(reason) => return Validation::Unavailable(reason),
        };

        if output.success() {
            return Validation::Available(Ok(()));
        }

        let combined = output.combined();
        if output.status.is_none() || combined.is_empty() || is_unusable_output(&combined) {
            log::debug!(
                "Lint binary {} unusable: {}",
                self.binary.display(),
                combined.lines().next().unwrap_or("no output")
            );
            return Validation::Unavailable(format!(
                "{} could not lint: {}",
                self.binary.display(),
                combined.lines().next().unwrap_or("no output")
            ));
        }

        Validation::Available(Err(combined))
    }
}

/// Spawn a command, optionally feed stdin, and wait at most `timeout`.
///
/// A spawn failure or an expired timeout is an `Err` describing why the
/// tool could not be used.
pub fn run_with_timeout(
    mut command: Command,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
) -> std::result::Result<ProcessOutput, String> {
    command
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| format!("failed to spawn {:?}: {}", command.get_program(), e))?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        thread::spawn(move || {
            use std::io::Write;
            let _ = pipe.write_all(&input);
        });
    }

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let status = wait_with_deadline(&mut child, timeout)?;

    Ok(ProcessOutput {
        status,
        stdout: stdout_reader.join().unwrap_or_default(),
        stderr: stderr_reader.join().unwrap_or_default(),
    })
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::result::Result<Option<i32>, String> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code()),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("timed out after {}ms", timeout.as_millis()));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(format!("failed waiting for child: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_signatures() {
        assert!(is_unusable_output("Usage: php-fpm [-n] [-e] [-h]"));
        assert!(is_unusable_output("sh: php: command not found"));
        assert!(is_unusable_output("Could not open input file: No such file or directory"));
        assert!(!is_unusable_output(
            "PHP Parse error:  syntax error, unexpected token \"}\" in x.php on line 3"
        ));
    }

    #[test]
    fn test_server_variant_is_unavailable() {
        let lint = LintCommand::new("/usr/sbin/php-fpm8.2", Duration::from_secs(1));
        let result = lint.try_validate(Path::new("render.php"), "<?php ?>");
        assert!(matches!(result, Validation::Unavailable(_)));

        let cgi = LintCommand::new("/usr/bin/php-cgi", Duration::from_secs(1));
        assert!(matches!(
            cgi.try_validate(Path::new("render.php"), ""),
            Validation::Unavailable(_)
        ));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let lint = LintCommand::new("/definitely/not/a/php-binary", Duration::from_secs(1));
        let result = lint.try_validate(Path::new("render.php"), "<?php ?>");
        assert!(matches!(result, Validation::Unavailable(_)));
    }

    #[cfg(unix)]
    mod fake_binaries {
        use super::super::*;
        use crate::error::GeneratorError;
        use crate::validator::SyntaxValidator;
        use std::fs;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Write an executable shell script standing in for the interpreter
        fn fake_php(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("php");
            let mut file = fs::File::create(&path).unwrap();
            writeln!(file, "#!/bin/sh\n{}", body).unwrap();
            file.sync_all().unwrap();
            drop(file);
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn template(dir: &TempDir, source: &str) -> PathBuf {
            let path = dir.path().join("render.php");
            fs::write(&path, source).unwrap();
            path
        }

        #[test]
        fn test_lint_failure_is_normalized() {
            let temp_dir = TempDir::new().unwrap();
            let php = fake_php(
                &temp_dir,
                "echo \"PHP Parse error:  syntax error, unexpected end of file in $2 on line 4\" >&2\n\
                 echo \"Errors parsing $2\"\nexit 255",
            );
            let source = "<?php if ($a) { ?>";
            let path = template(&temp_dir, source);

            let validator = SyntaxValidator::with_lint(&php, Duration::from_secs(5));
            match validator.validate_file(&path, source, "Hero render") {
                Err(GeneratorError::Syntax { label, message }) => {
                    assert_eq!(label, "Hero render");
                    assert_eq!(message, "syntax error, unexpected end of file on line 4");
                }
                other => panic!("expected syntax error, got {:?}", other),
            }
        }

        #[test]
        fn test_passing_lint() {
            let temp_dir = TempDir::new().unwrap();
            let php = fake_php(&temp_dir, "echo \"No syntax errors detected in $2\"\nexit 0");
            let path = template(&temp_dir, "<p>ok</p>");
            let lint = LintCommand::new(&php, Duration::from_secs(5));
            assert!(matches!(
                lint.try_validate(&path, "<p>ok</p>"),
                Validation::Available(Ok(()))
            ));
        }

        #[test]
        fn test_usage_banner_is_unavailable() {
            let temp_dir = TempDir::new().unwrap();
            let php = fake_php(
                &temp_dir,
                "echo \"Usage: php [options] [-f] <file> [--] [args...]\"\nexit 1",
            );
            let valid = template(&temp_dir, "<div><?php echo 1; ?></div>");

            let lint = LintCommand::new(&php, Duration::from_secs(5));
            assert!(matches!(
                lint.try_validate(&valid, "<div><?php echo 1; ?></div>"),
                Validation::Unavailable(_)
            ));

            // The structural scan takes over: valid passes, broken still fails
            let validator = SyntaxValidator::with_lint(&php, Duration::from_secs(5));
            assert!(validator
                .validate_file(&valid, "<div><?php echo 1; ?></div>", "valid")
                .is_ok());
            let broken_source = "<?php if ($a) { ?>";
            let broken = template(&temp_dir, broken_source);
            assert!(validator.validate_file(&broken, broken_source, "broken").is_err());
        }

        #[test]
        fn test_hung_linter_is_killed() {
            let temp_dir = TempDir::new().unwrap();
            let php = fake_php(&temp_dir, "exec sleep 30");
            let path = template(&temp_dir, "<p>ok</p>");

            let lint = LintCommand::new(&php, Duration::from_millis(200));
            let start = Instant::now();
            let result = lint.try_validate(&path, "<p>ok</p>");
            assert!(start.elapsed() < Duration::from_secs(5));
            match result {
                Validation::Unavailable(reason) => assert!(reason.contains("timed out")),
                other => panic!("expected unavailable, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_combined_output_order() {
        let output = ProcessOutput {
            status: Some(255),
            stdout: "Errors parsing x.php\n".to_string(),
            stderr: "PHP Parse error: boom in x.php on line 2\n".to_string(),
        };
        assert_eq!(
            output.combined(),
            "PHP Parse error: boom in x.php on line 2\nErrors parsing x.php"
        );
    }
}
