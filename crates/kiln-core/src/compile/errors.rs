//! Compiler diagnostics and their mapping back to the submitted source.

use serde::{Deserialize, Serialize};

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Note,
    Help,
}

/// One compiler message, located in the submitted source where possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Error message
    pub message: String,

    /// Error code (e.g., "E0425")
    pub code: Option<String>,

    /// Severity level
    pub level: DiagnosticLevel,

    /// Line in the submitted source (1-indexed)
    pub line: Option<usize>,

    /// Column (1-indexed)
    pub column: Option<usize>,

    /// Full compiler rendering, kept verbatim
    pub rendered: Option<String>,
}

impl Diagnostic {
    /// An error at a known line.
    pub fn at_line(line: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            level: DiagnosticLevel::Error,
            line: Some(line),
            column: None,
            rendered: None,
        }
    }

    /// An error carrying raw build-tool output.
    pub fn raw(output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            message: output.clone(),
            code: None,
            level: DiagnosticLevel::Error,
            line: None,
            column: None,
            rendered: Some(output),
        }
    }

    /// One-line form: `line N: message`, or the raw text when unlocated.
    pub fn render(&self) -> String {
        match (self.line, &self.code) {
            (Some(line), Some(code)) => format!("line {}: [{}] {}", line, code, self.message),
            (Some(line), None) => format!("line {}: {}", line, self.message),
            (None, _) => self
                .rendered
                .clone()
                .unwrap_or_else(|| self.message.clone()),
        }
    }
}

/// Render a list of diagnostics for a `Failure` stderr payload.
pub fn render_all(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(Diagnostic::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rustc JSON diagnostic format.
#[derive(Debug, Deserialize)]
struct RustcDiagnostic {
    message: String,
    code: Option<RustcCode>,
    level: String,
    spans: Vec<RustcSpan>,
    rendered: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RustcCode {
    code: String,
}

#[derive(Debug, Deserialize)]
struct RustcSpan {
    line_start: usize,
    column_start: usize,
    is_primary: bool,
}

/// Parses rustc JSON output and maps lines from generated code to the
/// submitted source.
///
/// Generated code is laid out as `prelude | user source | epilogue`; a line
/// inside the user source maps to `line - prelude_lines`. Lines in the
/// prelude or epilogue have no source location.
pub struct DiagnosticParser {
    prelude_lines: usize,
    source_lines: usize,
}

impl DiagnosticParser {
    /// Create a parser for code with `prelude_lines` generated lines before
    /// a user source of `source_lines` lines.
    pub fn new(prelude_lines: usize, source_lines: usize) -> Self {
        Self {
            prelude_lines,
            source_lines,
        }
    }

    /// Parse rustc `--error-format=json` output. Only errors are kept.
    pub fn parse_rustc_output(&self, json_output: &str) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for line in json_output.lines() {
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<RustcDiagnostic>(line) {
                Ok(diagnostic) => {
                    if let Some(mapped) = self.map_diagnostic(&diagnostic) {
                        diagnostics.push(mapped);
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        "Failed to parse rustc JSON: {} (line: {})",
                        e,
                        line.chars().take(100).collect::<String>()
                    );
                }
            }
        }

        diagnostics
    }

    fn map_diagnostic(&self, diagnostic: &RustcDiagnostic) -> Option<Diagnostic> {
        let level = match diagnostic.level.as_str() {
            "error" | "error: internal compiler error" => DiagnosticLevel::Error,
            _ => return None,
        };

        // "aborting due to previous error" carries no information
        if diagnostic.spans.is_empty() && diagnostic.message.starts_with("aborting due to") {
            return None;
        }

        let primary = diagnostic.spans.iter().find(|s| s.is_primary);

        Some(Diagnostic {
            message: diagnostic.message.clone(),
            code: diagnostic.code.as_ref().map(|c| c.code.clone()),
            level,
            line: primary.and_then(|span| self.map_line(span.line_start)),
            column: primary.map(|span| span.column_start),
            rendered: diagnostic.rendered.clone(),
        })
    }

    /// Map a generated line number to a submitted-source line number.
    fn map_line(&self, generated_line: usize) -> Option<usize> {
        let line = generated_line.checked_sub(self.prelude_lines)?;
        (1..=self.source_lines).contains(&line).then_some(line)
    }
}
