//! Script-backed feeds: an external program prints a feed on stdout.

use super::parser::parse_feed;
use super::types::ParsedFeed;
use super::ParseError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Collaborator that turns a script reference into a parsed feed.
///
/// The parser applies its own timeout around [`ScriptExecutor::execute_script`];
/// implementations should make dropping the future stop the work.
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute_script(&self, script_path: &str) -> Result<ParsedFeed, ParseError>;
}

/// Runs scripts from a fixed directory and parses their stdout as RSS/Atom.
#[derive(Debug, Clone)]
pub struct CommandScriptExecutor {
    scripts_dir: PathBuf,
}

impl CommandScriptExecutor {
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
        }
    }

    /// SEC-008: Canonicalize so `../` and symlinks cannot escape the scripts directory.
    fn resolve(&self, script_path: &str) -> Result<PathBuf, ParseError> {
        let dir = self.scripts_dir.canonicalize().map_err(|e| {
            ParseError::Script(format!(
                "scripts directory {} unavailable: {e}",
                self.scripts_dir.display()
            ))
        })?;
        let candidate = dir.join(script_path.trim());
        let resolved = candidate
            .canonicalize()
            .map_err(|e| ParseError::Script(format!("script {script_path:?} not found: {e}")))?;

        if !resolved.starts_with(&dir) {
            return Err(ParseError::Script(format!(
                "script {script_path:?} resolves outside the scripts directory"
            )));
        }
        if !resolved.is_file() {
            return Err(ParseError::Script(format!("script {script_path:?} is not a file")));
        }
        Ok(resolved)
    }
}

/// Interpreter for a script, chosen by extension; `None` means execute directly.
fn interpreter_for(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("py") => Some("python3"),
        Some("sh") => Some("sh"),
        Some("js") => Some("node"),
        Some("rb") => Some("ruby"),
        Some("ps1") => Some("pwsh"),
        _ => None,
    }
}

#[async_trait]
impl ScriptExecutor for CommandScriptExecutor {
    async fn execute_script(&self, script_path: &str) -> Result<ParsedFeed, ParseError> {
        let resolved = self.resolve(script_path)?;

        let mut command = match interpreter_for(&resolved) {
            Some(interpreter) => {
                let mut cmd = tokio::process::Command::new(interpreter);
                cmd.arg(&resolved);
                cmd
            }
            None => tokio::process::Command::new(&resolved),
        };
        command
            .current_dir(&self.scripts_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(script = %resolved.display(), "Running feed script");
        let output = command
            .output()
            .await
            .map_err(|e| ParseError::Script(format!("failed to start {script_path:?}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ParseError::Script(format!(
                "{script_path:?} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let source = format!("script://{script_path}");
        parse_feed(&output.stdout, &source).map_err(|e| ParseError::Feed(e.to_string()))
    }
}
