//! Error types for the spirvgen translator

use crate::parser::SourceLocation;
use std::fmt;
use thiserror::Error;

/// A node-local translation failure.
///
/// Diagnostics are accumulated while the front end keeps walking, so a single
/// run reports every problem it can find. They only become an [`Error`] once
/// the whole translation unit has been visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Where in the source the problem was found
    pub location: SourceLocation,
    /// One-line summary
    pub short_message: String,
    /// Full explanation (defaults to the short message)
    pub full_message: String,
}

impl Diagnostic {
    /// Create a diagnostic whose full message equals its short message
    pub fn new(location: SourceLocation, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            location,
            full_message: message.clone(),
            short_message: message,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.full_message)
    }
}

/// Translator errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The front end recorded one or more diagnostics
    ///
    /// **Triggered by:** Unsupported constructs, missing resolvers, attribute
    /// validation failures or writes to read-only values anywhere in the module
    /// **Recovery:** Fix every listed diagnostic; the module is never serialized
    /// while any remain
    #[error("Translation failed with {count} error(s): {}", join_diagnostics(.diagnostics))]
    TranslationFailed {
        /// Number of diagnostics
        count: usize,
        /// Every diagnostic in the order it was reported
        diagnostics: Vec<Diagnostic>,
    },

    /// A configured entry point does not exist
    ///
    /// **Triggered by:** `EntryPointOptions::function` naming an unknown
    /// `Owner.Function` pair
    #[error("Entry point not found: {name}")]
    EntryPointNotFound {
        /// Requested entry point name
        name: String,
    },

    /// A configured entry point exists but cannot be used as one
    #[error("Invalid entry point {name}: {reason}")]
    InvalidEntryPoint {
        /// Entry point name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// The serialized AST could not be decoded
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Binary emission hit an entity without an assigned ID
    ///
    /// **Triggered by:** An internal inconsistency between the collector and
    /// the emitter (e.g. an op referenced by a function that was never collected)
    #[error("Emit error: {0}")]
    EmitError(String),

    /// General compiler error
    #[error("Compiler error: {0}")]
    CompilerError(String),
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Fatal error that cannot be recovered from
    Fatal,
    /// The input can be fixed and resubmitted
    Recoverable,
}

impl Error {
    /// Create a compiler error with a message
    pub fn compiler(msg: impl Into<String>) -> Self {
        Error::CompilerError(msg.into())
    }

    /// Create an emit error with a message
    pub fn emit(msg: impl Into<String>) -> Self {
        Error::EmitError(msg.into())
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::EmitError(_) | Error::CompilerError(_) => ErrorSeverity::Fatal,
            _ => ErrorSeverity::Recoverable,
        }
    }

    /// Diagnostics carried by a translation failure (empty for other errors)
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::TranslationFailed { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

/// Result type for spirvgen operations
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_failed_message() {
        let diag = Diagnostic::new(SourceLocation::new("a.shader", 3, 7), "foreach is not supported.");
        let err = Error::TranslationFailed {
            count: 1,
            diagnostics: vec![diag],
        };
        let msg = err.to_string();
        assert!(msg.contains("1 error"));
        assert!(msg.contains("a.shader:3:7"));
        assert!(msg.contains("foreach is not supported."));
        assert_eq!(err.diagnostics().len(), 1);
        assert_eq!(err.classify(), ErrorSeverity::Recoverable);
    }

    #[test]
    fn test_emit_error_is_fatal() {
        assert_eq!(Error::emit("missing id").classify(), ErrorSeverity::Fatal);
        assert!(Error::compiler("x").diagnostics().is_empty());
    }
}
