use std::fmt::Display;

use miette::SourceSpan;
use num_bigint::BigInt;
use num_traits::{NumCast, ToPrimitive};

use crate::Identifier;

/// The scalar payload of a [`Value`].
///
/// Decimal integer literals that fit in a signed 64-bit integer become
/// [`Literal::Int`]; larger decimals, and all hexadecimal, octal, and binary
/// literals, become [`Literal::BigInt`]. Narrower integer widths and `f32`
/// are expressed as type annotations over these unbounded variants and
/// validated on access via [`Literal::as_int`].
#[derive(Debug, Clone)]
pub enum Literal {
    /// A KDL string, whether identifier, quoted, raw, or multiline.
    String(String),

    /// A non-float number within signed 64-bit range.
    Int(i64),

    /// An arbitrary-precision integer.
    BigInt(BigInt),

    /// A floating point number, including the `#inf`, `#-inf`, and `#nan`
    /// keywords.
    Float(f64),

    /// `#true` or `#false`.
    Bool(bool),

    /// The `#null` keyword.
    Null,
}

impl Eq for Literal {}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        use Literal::*;
        match (self, other) {
            (String(lhs), String(rhs)) => lhs == rhs,
            (Int(lhs), Int(rhs)) => lhs == rhs,
            (BigInt(lhs), BigInt(rhs)) => lhs == rhs,
            // Numeric equality across representations, so that a canonical
            // re-rendering of a radix literal compares equal to its source.
            (Int(lhs), BigInt(rhs)) | (BigInt(rhs), Int(lhs)) => {
                rhs == &num_bigint::BigInt::from(*lhs)
            }
            (Float(lhs), Float(rhs)) => (lhs.is_nan() && rhs.is_nan()) || lhs == rhs,
            (Bool(lhs), Bool(rhs)) => lhs == rhs,
            (Null, Null) => true,
            _ => false,
        }
    }
}

impl Literal {
    /// Returns `true` if the literal is a [`Literal::String`].
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(..))
    }

    /// Returns `true` if the literal is an integer of either width.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int(..) | Self::BigInt(..))
    }

    /// Returns `true` if the literal is an arbitrary-precision integer.
    pub fn is_big_integer(&self) -> bool {
        matches!(self, Self::BigInt(..))
    }

    /// Returns `true` if the literal is a [`Literal::Float`].
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float(..))
    }

    /// Returns `true` if the literal is a [`Literal::Bool`].
    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(..))
    }

    /// Returns `true` if the literal is [`Literal::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `Some(&str)` for string literals, otherwise `None`.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer as an `i64` if it is one and fits, otherwise
    /// `None`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::BigInt(value) => value.to_i64(),
            _ => None,
        }
    }

    /// Returns any integer literal as a [`BigInt`], otherwise `None`.
    pub fn as_big_integer(&self) -> Option<BigInt> {
        match self {
            Self::Int(value) => Some(BigInt::from(*value)),
            Self::BigInt(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Narrows an integer literal to the requested primitive width,
    /// returning `None` when the value is out of range for `T` or the
    /// literal is not an integer.
    ///
    /// ```
    /// use cuddle::Literal;
    ///
    /// assert_eq!(Literal::Int(255).as_int::<u8>(), Some(255));
    /// assert_eq!(Literal::Int(256).as_int::<u8>(), None);
    /// assert_eq!(Literal::Int(-1).as_int::<u32>(), None);
    /// ```
    pub fn as_int<T: NumCast>(&self) -> Option<T> {
        match self {
            Self::Int(value) => T::from(*value),
            Self::BigInt(value) => value
                .to_i128()
                .and_then(T::from)
                .or_else(|| value.to_u128().and_then(T::from)),
            _ => None,
        }
    }

    /// Returns `Some(f64)` for float literals, otherwise `None`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns `Some(bool)` for boolean literals, otherwise `None`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(value) => {
                if crate::fmt::is_plain_ident(value) {
                    f.write_str(value)
                } else {
                    crate::fmt::write_quoted(f, value)
                }
            }
            Self::Int(value) => write!(f, "{}", value),
            Self::BigInt(value) => write!(f, "{}", value),
            Self::Float(value) => f.write_str(&crate::fmt::format_float(*value)),
            Self::Bool(value) => write!(f, "#{}", value),
            Self::Null => f.write_str("#null"),
        }
    }
}

/// A parsed KDL value: a [`Literal`] together with an optional type
/// annotation and, when it came from the parser, the original source lexeme
/// and span.
///
/// Arguments and property values are both `Value`s; the type annotation of
/// an entry lives on the value it annotates. Equality compares the literal
/// and the type annotation, ignoring lexeme and span.
#[derive(Debug, Clone, Eq)]
pub struct Value {
    pub(crate) ty: Option<Identifier>,
    pub(crate) literal: Literal,
    pub(crate) repr: Option<String>,
    pub(crate) span: SourceSpan,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.literal == other.literal
        // Intentionally omitted: repr and span
    }
}

impl Value {
    /// Creates a new untyped value.
    pub fn new(literal: impl Into<Literal>) -> Self {
        Value {
            ty: None,
            literal: literal.into(),
            repr: None,
            span: SourceSpan::from(0..0),
        }
    }

    /// Gets the value's type annotation, if any.
    pub fn ty(&self) -> Option<&Identifier> {
        self.ty.as_ref()
    }

    /// Sets the value's type annotation.
    pub fn set_ty(&mut self, ty: impl Into<Identifier>) {
        self.ty = Some(ty.into());
    }

    /// Gets the scalar payload.
    pub fn literal(&self) -> &Literal {
        &self.literal
    }

    /// Gets a mutable reference to the scalar payload.
    pub fn literal_mut(&mut self) -> &mut Literal {
        &mut self.literal
    }

    /// Sets the scalar payload, clearing any retained source lexeme.
    pub fn set_literal(&mut self, literal: impl Into<Literal>) {
        self.literal = literal.into();
        self.repr = None;
    }

    /// Gets the original source lexeme of the literal, if this value was
    /// produced by the parser.
    pub fn repr(&self) -> Option<&str> {
        self.repr.as_deref()
    }

    /// Gets this value's span.
    pub fn span(&self) -> SourceSpan {
        self.span
    }

    /// Sets this value's span.
    pub fn set_span(&mut self, span: impl Into<SourceSpan>) {
        self.span = span.into();
    }

    /// See [`Literal::as_string`].
    pub fn as_string(&self) -> Option<&str> {
        self.literal.as_string()
    }

    /// See [`Literal::as_integer`].
    pub fn as_integer(&self) -> Option<i64> {
        self.literal.as_integer()
    }

    /// See [`Literal::as_big_integer`].
    pub fn as_big_integer(&self) -> Option<BigInt> {
        self.literal.as_big_integer()
    }

    /// See [`Literal::as_int`].
    pub fn as_int<T: NumCast>(&self) -> Option<T> {
        self.literal.as_int()
    }

    /// See [`Literal::as_float`].
    pub fn as_float(&self) -> Option<f64> {
        self.literal.as_float()
    }

    /// See [`Literal::as_bool`].
    pub fn as_bool(&self) -> Option<bool> {
        self.literal.as_bool()
    }

    /// Returns `true` if the literal is [`Literal::Null`].
    pub fn is_null(&self) -> bool {
        self.literal.is_null()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ty) = &self.ty {
            write!(f, "({})", ty)?;
        }
        write!(f, "{}", self.literal)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<BigInt> for Literal {
    fn from(value: BigInt) -> Self {
        Literal::BigInt(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl<T> From<Option<T>> for Literal
where
    T: Into<Literal>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Literal::Null,
        }
    }
}

impl<T> From<T> for Value
where
    T: Into<Literal>,
{
    fn from(value: T) -> Self {
        Value::new(value)
    }
}
