use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    /// A zero-width span at `line:column`.
    pub fn point(line: usize, column: usize) -> Self {
        let at = Position { line, column };
        Self { start: at, end: at }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start.line, self.start.column)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticLabel {
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub span: Span,
    pub labels: Vec<DiagnosticLabel>,
}

pub fn render_diagnostics(path: &str, diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|diagnostic| render_diagnostic(path, diagnostic))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_diagnostic(path: &str, diagnostic: &Diagnostic) -> String {
    let mut output = format!(
        "error[{}] {}:{} {}",
        diagnostic.code, path, diagnostic.span, diagnostic.message
    );
    // Context frames are stored innermost first, which is also the order a reader wants.
    for label in &diagnostic.labels {
        output.push_str(&format!("\n  note: {} at {}:{}", label.message, path, label.span));
    }
    output
}

pub fn render_diagnostics_json(path: &str, diagnostics: &[Diagnostic]) -> serde_json::Value {
    serde_json::json!({
        "path": path,
        "diagnostics": diagnostics,
    })
}
