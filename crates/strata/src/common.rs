//! Shared diagnostic and error types used across every pipeline stage.
//!
//! Mirrors the teacher's `resource.rs`/`exception_private.rs` shape: a plain
//! struct/enum with a hand-written `Display`, no `thiserror`. Per the design,
//! there is exactly one hard-failure error kind (`CompileError`); everything
//! else is a non-fatal `Diagnostic`.

use std::fmt;

/// A position in a source file.
///
/// The lexer/parser (an external collaborator, see crate docs) attaches
/// these to every AST node it produces; the frontend only ever reads them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceLocation {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(filename: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
            column,
        }
    }

    /// A placeholder location for internally synthesized nodes (e.g. a
    /// monomorphized clone) that don't map back to a single source span.
    pub fn synthetic() -> Self {
        Self::default()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

/// The one hard-failure error kind a pipeline stage can produce.
///
/// Propagation policy: the current pass aborts, the pipeline stops, and no
/// partial `AnalyzedProgram` is produced (see crate docs, "Error handling").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub message: String,
    pub location: SourceLocation,
}

impl CompileError {
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }

    /// An error raised by a stage-boundary invariant check rather than by
    /// ordinary pass logic. There is no meaningful source location for an
    /// internal invariant violation, so it is reported at a synthetic one.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(format!("internal error: {}", message.into()), SourceLocation::synthetic())
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

impl std::error::Error for CompileError {}

pub type CompileResult<T> = Result<T, CompileError>;

/// Severity of a non-fatal [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Note,
}

/// A non-fatal message, e.g. an unrecognized annotation (spec §4.2, §7:
/// "Annotations unknown to the compiler are warnings on stderr and do not
/// fail."). Diagnostics accumulate on the side; they never abort a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub location: SourceLocation,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            location,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.level, self.location, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_display_includes_location() {
        let err = CompileError::new("duplicate name: x", SourceLocation::new("a.strata", 3, 5));
        assert_eq!(err.to_string(), "a.strata:3:5: duplicate name: x");
    }

    #[test]
    fn internal_error_uses_synthetic_location() {
        let err = CompileError::internal("residualizer did not converge");
        assert!(err.message.starts_with("internal error:"));
        assert_eq!(err.location, SourceLocation::synthetic());
    }

    #[test]
    fn diagnostic_renders_hint() {
        let diag = Diagnostic::warning("unknown annotation 'foo'", SourceLocation::new("a.strata", 1, 1))
            .with_hint("did you mean 'inline'?");
        let rendered = diag.to_string();
        assert!(rendered.contains("hint: did you mean"));
    }
}
