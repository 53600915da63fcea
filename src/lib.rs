//! A recfile parser, selection-expression language, and query driver.
//!
//! Parse a recfile into a [`record::RecordSet`] with [`parser::parse`],
//! check it against its own `%rec` descriptors with [`descriptor`], filter
//! and project it with a selection expression compiled by [`sex::compile`],
//! and run the whole pipeline in one call with [`query::query`].
//!
//! ```rust
//! use recrs::parser::parse;
//! use recrs::query::{query, QuerySpec};
//!
//! let set = parse("Name: Alice\nAge: 30\n\nName: Bob\nAge: 41\n").unwrap();
//! let mut spec = QuerySpec::new();
//! spec.with_expression("Age > 35");
//! let result = query(&set, &spec).unwrap();
//! assert_eq!(result.len(), 1);
//! ```

pub mod descriptor;
pub mod error;
pub mod fmt;
pub mod parser;
pub mod query;
pub mod record;
pub mod sex;
pub mod tokenizer;

pub use self::descriptor::{Descriptor, TypeSpec, Violation};
pub use self::error::{EvalErrorKind, ParseError, ParseErrorKind, SexError, SexErrorKind};
pub use self::parser::parse;
pub use self::query::{query, QueryResult, QuerySpec};
pub use self::record::{Field, Location, Record, RecordSet};
pub use self::sex::{compile, evaluate, truthy, Expr, Truthiness, Value};
