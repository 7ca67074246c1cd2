//! Source resolution errors.

use thiserror::Error;
use wisp_types::ErrorCode;

/// Errors raised while loading or flattening script sources.
///
/// # Error Codes
///
/// | Variant | Code | Recoverable |
/// |---------|------|-------------|
/// | NotFound | `SOURCE_NOT_FOUND` | Yes |
/// | Io | `SOURCE_IO` | Yes |
/// | InvalidPath | `SOURCE_INVALID_PATH` | No |
/// | InvalidDirective | `SOURCE_INVALID_DIRECTIVE` | No |
/// | ImportCycle | `SOURCE_IMPORT_CYCLE` | No |
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source not found: {path}")]
    NotFound { path: String },

    #[error("failed to read source '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid source path '{path}'")]
    InvalidPath { path: String },

    #[error("malformed @import in '{path}' line {line}")]
    InvalidDirective { path: String, line: usize },

    /// `path` is the import that closed the cycle; `chain` is the stack
    /// of files being resolved when it was found.
    #[error("import cycle at '{path}' ({})", chain.join(" -> "))]
    ImportCycle { path: String, chain: Vec<String> },
}

impl SourceError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }
}

impl ErrorCode for SourceError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "SOURCE_NOT_FOUND",
            Self::Io { .. } => "SOURCE_IO",
            Self::InvalidPath { .. } => "SOURCE_INVALID_PATH",
            Self::InvalidDirective { .. } => "SOURCE_INVALID_DIRECTIVE",
            Self::ImportCycle { .. } => "SOURCE_IMPORT_CYCLE",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisp_types::assert_error_codes;

    fn all_variants() -> Vec<SourceError> {
        vec![
            SourceError::not_found("/a.lua"),
            SourceError::io("/a.lua", std::io::Error::other("boom")),
            SourceError::invalid_path("../x"),
            SourceError::InvalidDirective {
                path: "/a.lua".into(),
                line: 3,
            },
            SourceError::ImportCycle {
                path: "/a.lua".into(),
                chain: vec!["/a.lua".into(), "/b.lua".into()],
            },
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "SOURCE_");
    }

    #[test]
    fn cycle_message_names_path() {
        let err = SourceError::ImportCycle {
            path: "/a.lua".into(),
            chain: vec!["/a.lua".into(), "/b.lua".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("/a.lua"));
        assert!(msg.contains("/a.lua -> /b.lua"));
    }
}
