//! `cuddle` is a document-oriented parser and API for the [KDL 2.0 Document
//! Language](https://kdl.dev), a node-based, human-friendly configuration
//! and serialization format.
//!
//! The parser consumes a complete UTF-8 buffer and produces a validated
//! document tree, or a set of diagnostics pointing at the offending source.
//! The tree keeps enough formatting hints for canonical pretty-printing
//! (original number/string lexemes, bare-vs-quoted identifier forms,
//! presence of empty children blocks), but it does not aim to reproduce the
//! input byte-for-byte.
//!
//! ## Example
//!
//! ```rust
//! use cuddle::Document;
//!
//! let doc_str = r#"
//! hello 1 2 3
//!
//! // Comment
//! world prop=value {
//!     child 1
//!     child 2
//!     child #inf
//! }
//! "#;
//!
//! let doc: Document = doc_str.parse().expect("failed to parse KDL");
//!
//! assert_eq!(
//!     doc.iter_args("hello").collect::<Vec<_>>(),
//!     vec![&1.into(), &2.into(), &3.into()]
//! );
//!
//! assert_eq!(
//!     doc.get("world").map(|node| &node["prop"]),
//!     Some(&"value".into())
//! );
//! ```
//!
//! ## Error Reporting
//!
//! [`ParseFailure`] implements [`miette::Diagnostic`] and can be used to
//! display detailed, pretty-printed diagnostic messages when using
//! [`miette::Result`] and the `"fancy"` feature flag for `miette`:
//!
//! ```toml
//! # Cargo.toml
//! [dependencies]
//! miette = { version = "x.y.z", features = ["fancy"] }
//! ```
//!
//! ```no_run
//! fn main() -> miette::Result<()> {
//!     "foo 1.".parse::<cuddle::Document>()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Numbers
//!
//! KDL does not specify a representation for numbers, so this crate keeps
//! them lossless:
//!
//! * Decimal integers that fit are interpreted as [`i64`]; anything larger
//!   becomes an arbitrary-precision [`num_bigint::BigInt`].
//! * Hexadecimal, octal, and binary literals always become big integers.
//! * Numbers with a decimal point or exponent are interpreted as [`f64`];
//!   the keywords `#inf`, `#-inf`, and `#nan` evaluate to
//!   [`f64::INFINITY`], [`f64::NEG_INFINITY`], and [`f64::NAN`].
//! * Type annotations like `(u8)` do not change the parsed representation;
//!   narrow with [`Value::as_int`](crate::Value::as_int), which
//!   range-checks.
//!
//! ## Minimum Supported Rust Version
//!
//! You must be at least `1.70.0` tall to get on this ride.
//!
//! ## License
//!
//! The code in this repository is covered by [the Apache-2.0
//! License](LICENSE).

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub use document::*;
pub use error::*;
pub use identifier::*;
pub use node::*;
pub use value::*;

mod document;
mod error;
mod fmt;
mod identifier;
mod node;
mod value;

mod parser;
