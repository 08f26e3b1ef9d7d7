use serde::Serialize;

use crate::diagnostics::{render_diagnostics, Diagnostic, DiagnosticLabel, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnboundSymbol,
    AmbiguousOverload,
    UnificationMismatch,
    DuplicateDefinition,
    UnboundTypeVariable,
    RecursionDepthExceeded,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::UnboundSymbol => "E3001",
            ErrorKind::AmbiguousOverload => "E3002",
            ErrorKind::UnificationMismatch => "E3003",
            ErrorKind::DuplicateDefinition => "E3004",
            ErrorKind::UnboundTypeVariable => "E3005",
            ErrorKind::RecursionDepthExceeded => "E3006",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ErrorKind::UnboundSymbol => "unbound symbol",
            ErrorKind::AmbiguousOverload => "ambiguous overload",
            ErrorKind::UnificationMismatch => "type mismatch",
            ErrorKind::DuplicateDefinition => "duplicate definition",
            ErrorKind::UnboundTypeVariable => "unbound type variable",
            ErrorKind::RecursionDepthExceeded => "recursion depth exceeded",
        };
        f.write_str(text)
    }
}

/// One "while doing X" step recorded as an error propagates outward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextFrame {
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} at {span}: {message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    /// Innermost first.
    pub frames: Vec<ContextFrame>,
    /// Set when this error only repeats the failure of a definition that was
    /// already reported; the batch driver drops such errors.
    pub depends_on: Option<String>,
}

pub type SemaResult<T> = Result<T, CompileError>;

impl CompileError {
    pub fn new(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            frames: Vec::new(),
            depends_on: None,
        }
    }

    /// A use of `fqn` at `signature` after that instantiation already failed.
    pub fn depends_on_failed(kind: ErrorKind, fqn: &str, signature: &str, span: Span) -> Self {
        let mut err = Self::new(
            kind,
            span,
            format!("`{fqn}` as `{signature}` failed to check"),
        );
        err.depends_on = Some(fqn.to_string());
        err
    }

    pub fn unbound_symbol(name: &str, span: Span) -> Self {
        Self::new(
            ErrorKind::UnboundSymbol,
            span,
            format!("`{name}` is not defined in any visible scope"),
        )
    }

    pub fn with_frame(mut self, message: impl Into<String>, span: Span) -> Self {
        self.frames.push(ContextFrame {
            message: message.into(),
            span,
        });
        self
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            code: self.kind.code().to_string(),
            message: format!("{}: {}", self.kind, self.message),
            span: self.span.clone(),
            labels: self
                .frames
                .iter()
                .map(|frame| DiagnosticLabel {
                    message: frame.message.clone(),
                    span: frame.span.clone(),
                })
                .collect(),
        }
    }
}

/// Every error collected from a whole-program check.
#[derive(Debug, Clone, thiserror::Error)]
#[error("semantic analysis failed with {} error(s)", errors.len())]
pub struct CheckFailure {
    pub errors: Vec<CompileError>,
}

impl CheckFailure {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors.iter().map(CompileError::to_diagnostic).collect()
    }

    pub fn render_report(&self, path: &str) -> String {
        render_diagnostics(path, &self.diagnostics())
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(|err| err.kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_frames_after_the_primary_location() {
        let failure = CheckFailure {
            errors: vec![CompileError::unbound_symbol("g", Span::point(4, 9))
                .with_frame("while checking statement `g(...)`", Span::point(4, 5))
                .with_frame("while checking definition `main`", Span::point(3, 1))],
        };

        let report = failure.render_report("main.ql");
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines[0],
            "error[E3001] main.ql:4:9 unbound symbol: `g` is not defined in any visible scope"
        );
        assert_eq!(
            lines[1],
            "  note: while checking statement `g(...)` at main.ql:4:5"
        );
        assert_eq!(lines[2], "  note: while checking definition `main` at main.ql:3:1");
    }

    #[test]
    fn diagnostics_serialize_with_codes() {
        let err = CompileError::new(ErrorKind::AmbiguousOverload, Span::point(1, 1), "two fits");
        let json = crate::diagnostics::render_diagnostics_json("x.ql", &[err.to_diagnostic()]);
        assert_eq!(json["diagnostics"][0]["code"], "E3002");
        assert_eq!(json["path"], "x.ql");
    }
}
