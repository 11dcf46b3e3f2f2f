use std::collections::BTreeMap;
use std::fmt::Display;
use std::ops::Index;
use std::str::FromStr;

use miette::SourceSpan;

use crate::{Document, Identifier, ParseFailure, Value};

/// Represents a KDL node: a name, an optional type annotation, ordered
/// arguments, named properties, and an optional children block.
///
/// Arguments keep their source order. Properties are a last-write-wins map:
/// when the same key appears more than once in source, the later occurrence
/// supersedes the earlier one. `children` distinguishes a node with no
/// braces at all (`None`) from one with an empty block (`Some` of an empty
/// document).
///
/// # Examples
///
/// ```
/// use cuddle::Node;
///
/// let node: Node = "commit abc123 author=\"Gwen\"".parse().expect("parse failed");
/// assert_eq!(node.arg(0), Some(&"abc123".into()));
/// assert_eq!(node["author"], "Gwen".into());
/// ```
#[derive(Debug, Clone, Eq)]
pub struct Node {
    pub(crate) name: Identifier,
    pub(crate) ty: Option<Identifier>,
    pub(crate) args: Vec<Value>,
    pub(crate) props: BTreeMap<String, Value>,
    pub(crate) children: Option<Document>,
    pub(crate) span: SourceSpan,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.ty == other.ty
            && self.args == other.args
            && self.props == other.props
            && self.children == other.children
        // Intentionally omitted: span
    }
}

impl Node {
    /// Creates a new node with the given name and nothing else.
    pub fn new(name: impl Into<Identifier>) -> Self {
        Node {
            name: name.into(),
            ty: None,
            args: Vec::new(),
            props: BTreeMap::new(),
            children: None,
            span: SourceSpan::from(0..0),
        }
    }

    /// Gets this node's name.
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    /// Sets this node's name.
    pub fn set_name(&mut self, name: impl Into<Identifier>) {
        self.name = name.into();
    }

    /// Gets the node's type annotation, if any.
    pub fn ty(&self) -> Option<&Identifier> {
        self.ty.as_ref()
    }

    /// Sets the node's type annotation.
    pub fn set_ty(&mut self, ty: impl Into<Identifier>) {
        self.ty = Some(ty.into());
    }

    /// Gets this node's span.
    ///
    /// This value will be properly initialized when created via
    /// [`Document::parse`] but may become invalidated if the document is
    /// mutated.
    pub fn span(&self) -> SourceSpan {
        self.span
    }

    /// The node's arguments, in source order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Mutable access to the node's arguments.
    pub fn args_mut(&mut self) -> &mut Vec<Value> {
        &mut self.args
    }

    /// Gets the argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// The node's properties, keyed by property name.
    pub fn props(&self) -> &BTreeMap<String, Value> {
        &self.props
    }

    /// Mutable access to the node's properties.
    pub fn props_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.props
    }

    /// Gets the value of the property named `key`, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    /// Gets a mutable reference to the value of the property named `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.props.get_mut(key)
    }

    /// Appends an argument.
    pub fn push(&mut self, value: impl Into<Value>) {
        self.args.push(value.into());
    }

    /// Sets a property, returning the previous value for the key, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.props.insert(key.into(), value.into())
    }

    /// Removes a property, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.props.remove(key)
    }

    /// Returns a reference to this node's children block, if it has one.
    pub fn children(&self) -> Option<&Document> {
        self.children.as_ref()
    }

    /// Returns a mutable reference to this node's children block.
    pub fn children_mut(&mut self) -> Option<&mut Document> {
        self.children.as_mut()
    }

    /// Replaces this node's children block.
    pub fn set_children(&mut self, children: Document) -> Option<Document> {
        self.children.replace(children)
    }

    /// Removes this node's children block, returning it if it was present.
    pub fn clear_children(&mut self) -> Option<Document> {
        self.children.take()
    }

    /// Returns a mutable reference to this node's children block, creating
    /// an empty one first if the node has none.
    pub fn ensure_children(&mut self) -> &mut Document {
        self.children.get_or_insert_with(Document::new)
    }

    pub(crate) fn stringify(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        indent: usize,
    ) -> std::fmt::Result {
        if let Some(ty) = &self.ty {
            write!(f, "({})", ty)?;
        }
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        for (key, value) in &self.props {
            f.write_str(" ")?;
            crate::fmt::write_identifier(f, key)?;
            write!(f, "={}", value)?;
        }
        if let Some(children) = &self.children {
            f.write_str(" {\n")?;
            children.stringify(f, indent + 4)?;
            write!(f, "{:indent$}}}", "", indent = indent)?;
        }
        Ok(())
    }

    pub(crate) fn compactify(&self, out: &mut String) {
        use std::fmt::Write;
        if let Some(ty) = &self.ty {
            let _ = write!(out, "({})", ty);
        }
        let _ = write!(out, "{}", self.name);
        for arg in &self.args {
            let _ = write!(out, " {}", arg);
        }
        for (key, value) in &self.props {
            out.push(' ');
            let _ = crate::fmt::write_identifier(out, key);
            let _ = write!(out, "={}", value);
        }
        if let Some(children) = &self.children {
            out.push_str(" { ");
            children.compactify(out);
            out.push_str(" }");
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.stringify(f, 0)
    }
}

impl Index<usize> for Node {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.args[index]
    }
}

impl Index<&str> for Node {
    type Output = Value;

    fn index(&self, key: &str) -> &Self::Output {
        self.get(key).expect("no property with the given key")
    }
}

impl FromStr for Node {
    type Err = ParseFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (maybe_node, errs) = crate::parser::try_parse(crate::parser::standalone_node, s);
        if let (Some(node), true) = (maybe_node, errs.is_empty()) {
            Ok(node)
        } else {
            Err(crate::parser::failure_from_errs(errs, s))
        }
    }
}
