use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::Diagnostic;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("{} syntax error(s); first: {}", .0.len(), first_message(.0))]
    Syntax(Vec<Diagnostic>),
    #[error("key `{key}` at line {line} uses the reserved `__` prefix")]
    ReservedKey { key: String, line: u32 },
    #[error("duplicate key `{key}` at line {line}")]
    DuplicateKey { key: String, line: u32 },
    #[error("duplicate term `-{name}` at line {line}")]
    DuplicateTerm { name: String, line: u32 },
    #[error("invalid range [{start}..{end}] in `{key}` at line {line}: start exceeds end")]
    InvalidRange {
        key: String,
        start: i64,
        end: i64,
        line: u32,
    },
    #[error("invalid compiled table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{}: {source}", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Attach the file being compiled to this error.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        CoreError::InFile {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Parser diagnostics carried by this error, looking through file wrappers.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CoreError::Syntax(diagnostics) => diagnostics,
            CoreError::InFile { source, .. } => source.diagnostics(),
            _ => &[],
        }
    }
}

fn first_message(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_wrapper_prefixes_path() {
        let err = CoreError::DuplicateKey {
            key: "title".to_string(),
            line: 4,
        }
        .in_file("locales/en.mbel");
        assert_eq!(
            err.to_string(),
            "locales/en.mbel: duplicate key `title` at line 4"
        );
    }

    #[test]
    fn diagnostics_are_reachable_through_wrapper() {
        let err = CoreError::Syntax(vec![Diagnostic::error("boom", 2, 1)]).in_file("a.mbel");
        assert_eq!(err.diagnostics().len(), 1);
        assert!(err.to_string().contains("line 2"));
    }
}
