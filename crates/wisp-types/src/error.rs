//! Unified error interface for wisp.
//!
//! Every error enum in the workspace implements [`ErrorCode`] so that
//! sessions, debug listeners and the stats surface can report failures
//! with a stable machine-readable code.
//!
//! # Example
//!
//! ```
//! use wisp_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum MoveError {
//!     Cycle,
//!     Busy,
//! }
//!
//! impl ErrorCode for MoveError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Cycle => "MOVE_CYCLE",
//!             Self::Busy => "MOVE_BUSY",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Busy)
//!     }
//! }
//!
//! assert_eq!(MoveError::Cycle.code(), "MOVE_CYCLE");
//! assert!(MoveError::Busy.is_recoverable());
//! ```

/// Machine-readable code and recoverability for an error.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**: e.g. `"RUNTIME_NOT_FOUND"`
/// - **Crate-prefixed**: `RUNTIME_`, `SOURCE_`, `SCRIPT_`, `HOST_`, `CONFIG_`
/// - **Stable**: codes are part of the admin surface and never renamed
///
/// # Recoverability
///
/// An error is recoverable when the same operation may succeed later
/// without a code or content change (a lock was contended, a file was
/// briefly missing). Malformed arguments and containment violations are
/// not recoverable.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether the error is recoverable.
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows wisp conventions.
///
/// # Panics
///
/// Panics if the code is empty, lacks `expected_prefix`, or is not
/// UPPER_SNAKE_CASE.
///
/// ```
/// use wisp_types::{ErrorCode, assert_error_code};
///
/// #[derive(Debug)]
/// enum MyError { Timeout }
///
/// impl ErrorCode for MyError {
///     fn code(&self) -> &'static str { "MY_TIMEOUT" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&MyError::Timeout, "MY_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates every variant of an error enum at once.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
