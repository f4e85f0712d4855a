use std::fmt;
use std::path::PathBuf;

use crate::diag::SourceSpan;

/// Core error type for the graft middle tier.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("parse error in {file}: {message}")]
    Parse { file: PathBuf, message: String },

    #[error("unknown pass name: {0}")]
    UnknownPass(String),

    #[error(transparent)]
    Internal(#[from] InternalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Internal-compiler error: an IR invariant or pass contract was violated.
///
/// Always fatal to the compile. As it unwinds, callers append a chain of
/// "currently processing" node descriptions so the report names the type,
/// method and statement the compiler was looking at when the invariant
/// broke.
#[derive(Debug)]
pub struct InternalError {
    message: String,
    context: Vec<String>,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Append a "currently processing" frame. Outermost frames go last.
    pub fn in_node(mut self, description: impl Into<String>) -> Self {
        self.context.push(description.into());
        self
    }

    /// Append a frame carrying a source position.
    pub fn at(self, description: &str, span: SourceSpan) -> Self {
        self.in_node(format!("{description} (line {})", span.line))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal compiler error: {}", self.message)?;
        for frame in &self.context {
            write!(f, "\n  while processing {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for InternalError {}

/// Shorthand for raising an [`InternalError`] inside the compiler.
#[macro_export]
macro_rules! ice {
    ($($arg:tt)*) => {
        return Err($crate::error::InternalError::new(format!($($arg)*)).into())
    };
}

/// Extension to attach processing context to any `Result<_, CoreError>`.
pub trait ErrorContext<T> {
    fn in_node<F: FnOnce() -> String>(self, describe: F) -> Result<T, CoreError>;
}

impl<T> ErrorContext<T> for Result<T, CoreError> {
    fn in_node<F: FnOnce() -> String>(self, describe: F) -> Result<T, CoreError> {
        self.map_err(|e| match e {
            CoreError::Internal(ice) => CoreError::Internal(ice.in_node(describe())),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Context frames accumulate innermost-first and all print.
    #[test]
    fn internal_error_context_chain() {
        let err = InternalError::new("cross-reference miss")
            .in_node("expression `a + b`".to_string())
            .in_node("method Foo.bar".to_string());
        let text = err.to_string();
        assert!(text.contains("cross-reference miss"));
        assert!(text.contains("expression `a + b`"));
        assert!(text.contains("method Foo.bar"));
    }

    /// The `in_node` combinator only decorates the internal tier.
    #[test]
    fn in_node_skips_user_errors() {
        let err: Result<(), CoreError> = Err(CoreError::Parse {
            file: "a.src".into(),
            message: "bad token".into(),
        });
        let decorated = err.in_node(|| "method Foo.bar".to_string());
        assert!(matches!(decorated, Err(CoreError::Parse { .. })));
    }
}
