use std::fmt::Display;

use miette::SourceSpan;

/// Represents a KDL identifier: a node name, type annotation name, or
/// property key.
///
/// An identifier carries its decoded string value plus the original lexical
/// form, so that API consumers can tell whether it was written bare
/// (`node`), quoted (`"node"`), or as a raw string (`#"node"#`). Equality
/// compares the decoded value only.
#[derive(Debug, Clone, Eq)]
pub struct Identifier {
    pub(crate) value: String,
    pub(crate) repr: Option<String>,
    pub(crate) span: SourceSpan,
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
        // Intentionally omitted: repr and span
    }
}

impl Identifier {
    /// Gets the string value for this identifier.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Sets the string value for this identifier.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    /// Gets this identifier's span.
    ///
    /// This value will be properly initialized when created via
    /// [`Document::parse`](crate::Document::parse) but may become
    /// invalidated if the document is mutated. We do not currently
    /// guarantee this to yield any particularly consistent results at that
    /// point.
    pub fn span(&self) -> SourceSpan {
        self.span
    }

    /// Sets this identifier's span.
    pub fn set_span(&mut self, span: impl Into<SourceSpan>) {
        self.span = span.into();
    }

    /// Gets the original source representation for this identifier, if it
    /// was produced by the parser.
    pub fn repr(&self) -> Option<&str> {
        self.repr.as_deref()
    }

    /// Returns true if the original source form was a bare identifier.
    pub fn is_bare(&self) -> bool {
        self.repr
            .as_deref()
            .map(|r| !r.starts_with('"') && !r.starts_with('#'))
            .unwrap_or(false)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::fmt::write_identifier(f, &self.value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier {
            value: value.to_string(),
            repr: None,
            span: SourceSpan::from(0..0),
        }
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier {
            value,
            repr: None,
            span: SourceSpan::from(0..0),
        }
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.value
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equality_ignores_repr() {
        let mut quoted = Identifier::from("foo");
        quoted.repr = Some("\"foo\"".into());
        assert_eq!(quoted, Identifier::from("foo"));
    }

    #[test]
    fn formatting() {
        let plain = Identifier::from("foo");
        assert_eq!(format!("{}", plain), "foo");

        let quoted = Identifier::from("foo\"bar");
        assert_eq!(format!("{}", quoted), r#""foo\"bar""#);

        let spacey = Identifier::from("foo bar");
        assert_eq!(format!("{}", spacey), r#""foo bar""#);

        let digits = Identifier::from("123");
        assert_eq!(format!("{}", digits), r#""123""#);
    }
}
