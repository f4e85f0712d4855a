use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A source position range within one compilation unit.
///
/// `start`/`end` are byte offsets into the original source text; `line` is
/// 1-based and refers to `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: u32,
    pub end: u32,
    pub line: u32,
}

impl SourceSpan {
    pub fn new(start: u32, end: u32, line: u32) -> Self {
        Self { start, end, line }
    }
}

/// A user-facing error tied to a source location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub span: SourceSpan,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.file.display(),
            self.span.line,
            self.message
        )
    }
}

/// Collects user-facing errors per compilation unit.
///
/// A unit with errors is excluded from further lowering but does not abort
/// the whole compile; internal-invariant violations go through
/// [`crate::error::InternalError`] instead and are always fatal.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diags: Vec<Diagnostic>,
    /// Files that produced at least one error.
    failed_files: Vec<PathBuf>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, file: &Path, span: SourceSpan, message: impl Into<String>) {
        let file = file.to_path_buf();
        if !self.failed_files.contains(&file) {
            self.failed_files.push(file.clone());
        }
        self.diags.push(Diagnostic {
            file,
            span,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.diags.is_empty()
    }

    /// Whether the given unit produced any error and must be skipped.
    pub fn unit_failed(&self, file: &Path) -> bool {
        self.failed_files.iter().any(|f| f == file)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Errors are tracked per file so later stages can skip failed units.
    #[test]
    fn failed_units_tracked() {
        let mut sink = DiagnosticSink::new();
        sink.error(
            Path::new("a.src"),
            SourceSpan::new(10, 14, 2),
            "malformed delimiters",
        );
        assert!(sink.has_errors());
        assert!(sink.unit_failed(Path::new("a.src")));
        assert!(!sink.unit_failed(Path::new("b.src")));
        assert_eq!(sink.diagnostics().len(), 1);
        assert_eq!(sink.diagnostics()[0].span.line, 2);
    }
}
