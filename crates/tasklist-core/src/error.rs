use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    NotFound,
    IncompleteChildren,
    CycleDetected,
    DuplicateKey,
    InvalidHierarchy,
    StorageFailure,
    ConsistencyViolation,
}

impl ErrorCode {
    pub const ALL: [Self; 8] = [
        Self::ConfigParseError,
        Self::NotFound,
        Self::IncompleteChildren,
        Self::CycleDetected,
        Self::DuplicateKey,
        Self::InvalidHierarchy,
        Self::StorageFailure,
        Self::ConsistencyViolation,
    ];

    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::NotFound => "E2001",
            Self::IncompleteChildren => "E2002",
            Self::CycleDetected => "E2003",
            Self::DuplicateKey => "E2004",
            Self::InvalidHierarchy => "E2005",
            Self::StorageFailure => "E5001",
            Self::ConsistencyViolation => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::NotFound => "List or item not found",
            Self::IncompleteChildren => "Item has incomplete children",
            Self::CycleDetected => "Cycle would be created",
            Self::DuplicateKey => "Key already exists",
            Self::InvalidHierarchy => "Invalid parent/child relation",
            Self::StorageFailure => "Storage operation failed",
            Self::ConsistencyViolation => "Internal consistency violation",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => {
                Some("Fix the syntax or value types in config.toml and retry.")
            }
            Self::NotFound | Self::StorageFailure => None,
            Self::IncompleteChildren => {
                Some("Complete the remaining subitems first, or retry with --force.")
            }
            Self::CycleDetected => Some("Remove/adjust dependency links to keep the graph acyclic."),
            Self::DuplicateKey => Some("Pick a key that is unique within its list."),
            Self::InvalidHierarchy => {
                Some("Parents must live in the same list and must not be descendants of the item.")
            }
            Self::ConsistencyViolation => {
                Some("The operation was rolled back. Run `tl verify` and report a bug with logs.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors returned by [`crate::engine::Engine`] operations.
///
/// Domain errors (`NotFound`, `IncompleteChildren`, `CycleDetected`,
/// `DuplicateKey`, `InvalidHierarchy`) are expected and actionable.
/// `Consistency` means stored data broke an engine invariant; the enclosing
/// transaction is always rolled back.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{entity} not found: '{key}'")]
    NotFound { entity: &'static str, key: String },

    #[error("cannot complete '{item}': incomplete: {incomplete}/{total} subitems (use force to override)")]
    IncompleteChildren {
        item: String,
        incomplete: usize,
        total: usize,
    },

    #[error("dependency '{dependent}' -> '{required}' would create a cycle: {}", .path.join(" → "))]
    CycleDetected {
        dependent: String,
        required: String,
        path: Vec<String>,
    },

    #[error("{entity} key already exists: '{key}'")]
    DuplicateKey { entity: &'static str, key: String },

    #[error("cannot place '{item}' under '{parent}': {reason}")]
    InvalidHierarchy {
        item: String,
        parent: String,
        reason: String,
    },

    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    pub(crate) fn list_not_found(key: &str) -> Self {
        Self::NotFound {
            entity: "list",
            key: key.to_string(),
        }
    }

    pub(crate) fn item_not_found(list_key: &str, item_key: &str) -> Self {
        Self::NotFound {
            entity: "item",
            key: format!("{list_key}/{item_key}"),
        }
    }

    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::IncompleteChildren { .. } => ErrorCode::IncompleteChildren,
            Self::CycleDetected { .. } => ErrorCode::CycleDetected,
            Self::DuplicateKey { .. } => ErrorCode::DuplicateKey,
            Self::InvalidHierarchy { .. } => ErrorCode::InvalidHierarchy,
            Self::Consistency(_) => ErrorCode::ConsistencyViolation,
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// Convenience alias for engine results.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{EngineError, ErrorCode};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ErrorCode::ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ErrorCode::ALL {
            let code = code.code();
            assert_eq!(code.len(), 5);
            assert!(code.starts_with('E'));
            assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn incomplete_children_reports_count() {
        let err = EngineError::IncompleteChildren {
            item: "work/A".into(),
            incomplete: 2,
            total: 3,
        };
        let message = err.to_string();
        assert!(message.contains("incomplete: 2/3"), "message: {message}");
        assert_eq!(err.code(), ErrorCode::IncompleteChildren);
        assert!(err.hint().is_some_and(|hint| hint.contains("--force")));
    }

    #[test]
    fn cycle_message_renders_path() {
        let err = EngineError::CycleDetected {
            dependent: "l/D2".into(),
            required: "l/D1".into(),
            path: vec!["l/D2".into(), "l/D1".into(), "l/D2".into()],
        };
        assert_eq!(
            err.to_string(),
            "dependency 'l/D2' -> 'l/D1' would create a cycle: l/D2 → l/D1 → l/D2"
        );
    }

    #[test]
    fn storage_errors_keep_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("insert item");
        let err = EngineError::from(inner);
        assert_eq!(err.code(), ErrorCode::StorageFailure);
        assert_eq!(err.to_string(), "storage error: insert item: disk full");
    }
}
