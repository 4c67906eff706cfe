pub mod ansi;
pub mod json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A renderable diagnostic: severity, stable code, a one-line message and
/// optional context. The back end works on an already-parsed AST, so there
/// are no source spans to carry.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<&'static str>,
    pub message: String,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            notes: Vec::new(),
            suggestion: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code: None,
            message: message.into(),
            notes: Vec::new(),
            suggestion: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

// ---- From impls for the pass error types ----

impl From<&crate::analyze::AnalyzeError> for Diagnostic {
    fn from(e: &crate::analyze::AnalyzeError) -> Self {
        use crate::analyze::AnalyzeError;
        let d = Diagnostic::error(e.to_string()).with_code(e.code());
        match e {
            AnalyzeError::Uninitialized { name, .. } => d.with_suggestion(format!(
                "assign or READ '{name}' before using it in an expression"
            )),
            AnalyzeError::RecursiveCall { .. } => {
                d.with_note("procedures store a single return address; recursion is not supported")
            }
            AnalyzeError::IteratorWrite { .. } => {
                d.with_note("a for-loop iterator is read-only inside its loop body")
            }
            _ => d,
        }
    }
}

impl From<&crate::emit::EmitError> for Diagnostic {
    fn from(e: &crate::emit::EmitError) -> Self {
        Diagnostic::error(e.to_string()).with_code(e.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::AnalyzeError;

    #[test]
    fn diagnostic_error_builder() {
        let d = Diagnostic::error("something went wrong");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "something went wrong");
        assert!(d.notes.is_empty());
        assert!(d.suggestion.is_none());
        assert!(d.code.is_none());
    }

    #[test]
    fn diagnostic_with_note_and_suggestion() {
        let d = Diagnostic::error("bad call")
            .with_note("in scope 'MAIN'")
            .with_suggestion("check the argument list");
        assert_eq!(d.notes, vec!["in scope 'MAIN'"]);
        assert_eq!(d.suggestion.as_deref(), Some("check the argument list"));
    }

    #[test]
    fn from_analyze_error_carries_code() {
        let e = AnalyzeError::Undeclared { name: "x".to_string(), scope: "MAIN".to_string() };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("ACC-S001"));
        assert!(d.message.contains("x"));
        assert!(d.message.contains("MAIN"));
    }

    #[test]
    fn from_uninitialized_has_suggestion() {
        let e = AnalyzeError::Uninitialized { name: "n".to_string(), scope: "p".to_string() };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("ACC-S004"));
        assert!(d.suggestion.is_some());
    }

    #[test]
    fn from_recursive_call_has_note() {
        let e = AnalyzeError::RecursiveCall { name: "p".to_string() };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("ACC-S007"));
        assert!(d.notes.iter().any(|n| n.contains("recursion")));
    }

    #[test]
    fn from_emit_error() {
        let e = crate::emit::EmitError::UnresolvedCall { name: "q".to_string() };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("ACC-E002"));
        assert!(d.message.contains("q"));
    }

    #[test]
    fn diagnostic_warning_constructor() {
        let d = Diagnostic::warning("odd but legal");
        assert_eq!(d.severity, Severity::Warning);
    }
}
