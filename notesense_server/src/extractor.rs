use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Deserialize;
use tokio::process::Command;

use crate::models::files::FileKind;

/// An external program that prints the text of a file to stdout. The file's
/// path is passed as the last argument.
#[derive(Clone, Debug, Deserialize)]
pub struct ExtractorCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Clone, Default)]
pub struct Extractor {
    commands: Arc<HashMap<FileKind, ExtractorCommand>>,
}

impl Extractor {
    pub fn new(commands: HashMap<FileKind, ExtractorCommand>) -> Self {
        Self {
            commands: Arc::new(commands),
        }
    }

    /// Extract text from a stored file. Plain text files are read as is.
    /// Returns `None` when there's no way to extract text for the kind.
    pub async fn extract(
        &self,
        kind: FileKind,
        path: &Path,
    ) -> Result<Option<String>, (StatusCode, String)> {
        let is_plain_text = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("txt"));
        if is_plain_text {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|err| (StatusCode::BAD_REQUEST, format!("text file isn't UTF-8: {err}")))?;
            return Ok(Some(text));
        }

        let Some(command) = self.commands.get(&kind) else {
            return Ok(None);
        };
        let output = Command::new(&command.program)
            .args(&command.args)
            .arg(path)
            .output()
            .await
            .map_err(|err| {
                tracing::warn!(program = %command.program, error = %err, "failed to run extractor");
                (
                    StatusCode::BAD_GATEWAY,
                    format!("failed to run {kind} extractor: {err}"),
                )
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                program = %command.program,
                status = %output.status,
                stderr = %stderr.trim(),
                "extractor failed"
            );
            return Err((
                StatusCode::BAD_GATEWAY,
                format!("{kind} extractor failed: {}", stderr.trim()),
            ));
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(text))
    }
}
