use std::sync::Arc;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// The toplevel error type for this crate: returned when a KDL document
/// failed to parse entirely.
///
/// This diagnostic implements [`miette::Diagnostic`] and can be used to
/// display detailed, pretty-printed diagnostic messages when using
/// [`miette::Result`] and the `"fancy"` feature flag for `miette`:
///
/// ```no_run
/// fn main() -> miette::Result<()> {
///     "foo 1.".parse::<cuddle::Document>()?;
///     Ok(())
/// }
/// ```
///
/// This will display a message like:
/// ```text
/// Error:
///   × Expected digits after the decimal point.
///    ╭────
///  1 │ foo 1.
///    ·     ─┬
///    ·      ╰── here
///    ╰────
/// ```
#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
#[error("Failed to parse KDL document.")]
pub struct ParseFailure {
    /// Original input that this failure came from.
    #[source_code]
    pub input: Arc<String>,

    /// Sub-diagnostics for this failure.
    #[related]
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// An individual diagnostic message for a KDL parsing issue.
///
/// The parse as a whole fails if even one of these was recorded, but
/// several may be reported from a single run.
#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
#[error("{kind}")]
pub struct ParseDiagnostic {
    /// Shared source for the diagnostic.
    #[source_code]
    pub input: Arc<String>,

    /// Byte span of the offending region.
    #[label("{}", label.unwrap_or("here"))]
    pub span: SourceSpan,

    /// Label text for this span. Defaults to `"here"`.
    pub label: Option<&'static str>,

    /// Suggestion for fixing the parser error.
    #[help]
    pub help: Option<&'static str>,

    /// Severity level for the Diagnostic.
    #[diagnostic(severity)]
    pub severity: miette::Severity,

    /// Specific error kind for this parser error.
    pub kind: DiagnosticKind,
}

/// A type representing additional information specific to the type of error
/// being returned.
#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum DiagnosticKind {
    /// Generic parsing error. The given context string denotes the component
    /// that failed to parse.
    #[error("Expected {0}.")]
    #[diagnostic(code(cuddle::parse_component))]
    Context(&'static str),

    /// A parsing error whose message is not an "expected X" phrasing, such
    /// as use of a reserved keyword as a bare identifier.
    #[error("{0}.")]
    #[diagnostic(code(cuddle::parse_message))]
    Message(&'static str),

    /// Generic unspecified error. If this is returned, the call site should
    /// be annotated with context, if possible.
    #[error("An unspecified parse error occurred.")]
    #[diagnostic(code(cuddle::other))]
    Other,
}
