//! Shared output layer: plain text for humans and pipes, JSON for tools.
//!
//! Every command handler receives an [`OutputMode`]. JSON output is one
//! pretty-printed document on stdout; errors go to stderr in the same mode.

use serde::Serialize;
use std::io::{self, Write};

use tasklist_core::EngineError;
use tasklist_core::config::ConfigError;
use tasklist_core::model::{Item, Status};

/// Output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// A structured error with optional hint and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Stable `E####` code when the error came from the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: None,
            error_code: None,
        }
    }
}

impl From<&EngineError> for CliError {
    fn from(err: &EngineError) -> Self {
        Self {
            message: err.to_string(),
            hint: err.hint().map(str::to_string),
            error_code: Some(err.code().code().to_string()),
        }
    }
}

impl From<&ConfigError> for CliError {
    fn from(err: &ConfigError) -> Self {
        let code = err.code();
        Self {
            message: err.to_string(),
            hint: code.and_then(|code| code.hint()).map(str::to_string),
            error_code: code.map(|code| code.code().to_string()),
        }
    }
}

impl CliError {
    /// Map a command failure, keeping codes for engine and config errors.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(engine) = err.downcast_ref::<EngineError>() {
            return Self::from(engine);
        }
        if let Some(config) = err.downcast_ref::<ConfigError>() {
            return Self::from(config);
        }
        Self::new(format!("{err:#}"))
    }
}

/// Render a serializable value to stdout in the requested format.
///
/// In JSON mode the value is serialized with `serde_json`; otherwise
/// `text_fn` writes the human form.
pub fn render<T: Serialize + ?Sized>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(hint) = &error.hint {
                writeln!(out, "  hint: {hint}")?;
            }
        }
    }
    Ok(())
}

/// One-character status marker for text listings.
pub const fn status_marker(status: Status) -> &'static str {
    match status {
        Status::Pending => "[ ]",
        Status::InProgress => "[~]",
        Status::Completed => "[x]",
        Status::Failed => "[!]",
    }
}

/// `[~] key  content` line with indentation for nesting.
pub fn write_item_line(w: &mut dyn Write, item: &Item, depth: usize) -> io::Result<()> {
    writeln!(
        w,
        "{:indent$}{} {}  {}",
        "",
        status_marker(item.status),
        item.key,
        item.content,
        indent = depth * 2
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklist_core::ErrorCode;

    #[test]
    fn engine_errors_carry_code_and_hint() {
        let err = EngineError::IncompleteChildren {
            item: "work/a".into(),
            incomplete: 1,
            total: 2,
        };
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some(ErrorCode::IncompleteChildren.code()));
        assert!(cli.hint.is_some());
        assert!(cli.message.contains("incomplete: 1/2"));
    }

    #[test]
    fn config_parse_errors_carry_code_and_hint() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage\n").expect("write");
        let err = tasklist_core::config::load_config_file(&path).expect_err("bad toml");

        let cli = CliError::from_anyhow(&anyhow::Error::new(err));
        assert_eq!(cli.error_code.as_deref(), Some("E1002"));
        assert!(cli.hint.is_some_and(|hint| hint.contains("config.toml")));
        assert!(cli.message.contains("Failed to parse"));
    }

    #[test]
    fn untyped_errors_keep_context_chain() {
        let err = anyhow::anyhow!("locked").context("Failed to open database");
        let cli = CliError::from_anyhow(&err);
        assert_eq!(cli.error_code, None);
        assert_eq!(cli.message, "Failed to open database: locked");
    }

    #[test]
    fn error_json_omits_empty_fields() {
        let json = serde_json::to_value(CliError::new("boom")).expect("serialize");
        assert_eq!(json, serde_json::json!({ "message": "boom" }));
    }

    #[test]
    fn item_line_is_indented_by_depth() {
        let item = Item {
            id: tasklist_core::model::ItemId(1),
            list_id: tasklist_core::model::ListId(1),
            key: "a1".into(),
            content: "Draft".into(),
            position: 1,
            status: Status::Completed,
            parent_id: None,
            completion_states: std::collections::BTreeMap::new(),
            started_at_us: None,
            completed_at_us: None,
            created_at_us: 0,
            updated_at_us: 0,
        };
        let mut buf = Vec::new();
        write_item_line(&mut buf, &item, 2).expect("write");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "    [x] a1  Draft\n");
    }
}
