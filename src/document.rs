use std::fmt::Display;
use std::str::FromStr;

use miette::SourceSpan;

use crate::{Node, ParseFailure, Value};

/// Represents a KDL document: an ordered list of nodes.
///
/// This type is also used to manage a [`Node`]'s children block, when
/// present.
///
/// # Examples
///
/// The easiest way to create a `Document` is to parse it:
/// ```rust
/// # use cuddle::Document;
/// let doc: Document = "foo 1 2 3\nbar 4 5 6".parse().expect("parse failed");
/// ```
#[derive(Debug, Clone, Eq)]
pub struct Document {
    pub(crate) nodes: Vec<Node>,
    pub(crate) span: SourceSpan,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
        // Intentionally omitted: span
    }
}

impl Default for Document {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            span: SourceSpan::from(0..0),
        }
    }
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Default::default()
    }

    /// Parses a string into a document.
    ///
    /// The whole input is consumed; any diagnostic recorded along the way
    /// makes the parse fail with a [`ParseFailure`] carrying every
    /// diagnostic from the run.
    pub fn parse(s: &str) -> Result<Self, ParseFailure> {
        let (maybe_doc, errs) = crate::parser::try_parse(crate::parser::document, s);
        if let (Some(doc), true) = (maybe_doc, errs.is_empty()) {
            Ok(doc)
        } else {
            Err(crate::parser::failure_from_errs(errs, s))
        }
    }

    /// Gets this document's span.
    ///
    /// This value will be properly initialized when created via
    /// [`Document::parse`] but may become invalidated if the document is
    /// mutated.
    pub fn span(&self) -> SourceSpan {
        self.span
    }

    /// Gets the first node with a matching name.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(move |n| n.name().value() == name)
    }

    /// Gets a mutable reference to the first node with a matching name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes
            .iter_mut()
            .find(move |n| n.name().value() == name)
    }

    /// Gets the first argument of the first node with a matching name. This
    /// is a shorthand utility for cases where a document is being used as a
    /// key/value store.
    ///
    /// # Examples
    ///
    /// Given a document like this:
    /// ```kdl
    /// foo 1
    /// bar #false
    /// ```
    ///
    /// You can fetch the value of `foo` in a single call like this:
    /// ```rust
    /// # use cuddle::{Document, Value};
    /// # let doc: Document = "foo 1\nbar #false".parse().unwrap();
    /// assert_eq!(doc.get_arg("foo"), Some(&1.into()));
    /// ```
    pub fn get_arg(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(|node| node.arg(0))
    }

    /// Returns an iterator over all arguments of the first node with a
    /// matching name. This is a shorthand utility for cases where a
    /// document is being used as a key/value store and the value is
    /// expected to be array-ish.
    ///
    /// If there is no such node, or it has no arguments, the iterator is
    /// empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use cuddle::{Document, Value};
    /// # let doc: Document = "foo 1 2 3\nbar #false".parse().unwrap();
    /// assert_eq!(
    ///   doc.iter_args("foo").collect::<Vec<&Value>>(),
    ///   vec![&1.into(), &2.into(), &3.into()]
    /// );
    /// ```
    pub fn iter_args(&self, name: &str) -> impl Iterator<Item = &Value> {
        self.get(name)
            .map(|n| n.args())
            .unwrap_or_default()
            .iter()
    }

    /// Returns a reference to this document's nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns a mutable reference to this document's nodes.
    pub fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    /// Length of this document when rendered as a string.
    pub fn len(&self) -> usize {
        format!("{}", self).len()
    }

    /// Returns true if this document renders to nothing.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Renders the document on a single line: entries separated by spaces,
    /// nodes separated by `;`, children blocks inline.
    ///
    /// ```rust
    /// # use cuddle::Document;
    /// let doc: Document = "a 1 {\n    b 2\n}\nc 3".parse().unwrap();
    /// assert_eq!(doc.to_compact_string(), "a 1 { b 2 }; c 3");
    /// ```
    pub fn to_compact_string(&self) -> String {
        let mut out = String::new();
        self.compactify(&mut out);
        out
    }

    pub(crate) fn stringify(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        indent: usize,
    ) -> std::fmt::Result {
        for node in &self.nodes {
            write!(f, "{:indent$}", "", indent = indent)?;
            node.stringify(f, indent)?;
            f.write_str("\n")?;
        }
        Ok(())
    }

    pub(crate) fn compactify(&self, out: &mut String) {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                out.push_str("; ");
            }
            node.compactify(out);
        }
    }
}

impl FromStr for Document {
    type Err = ParseFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Document::parse(s)
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.stringify(f, 0)
    }
}

impl IntoIterator for Document {
    type Item = Node;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}
