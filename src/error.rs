//! Error taxonomies (`spec.md §7`).
//!
//! The spec calls out three disjoint error taxonomies in prose: fatal
//! parse errors, compile-time SEX errors, and in-band evaluation errors.
//! Each gets its own `thiserror`-derived pair, in the teacher's
//! `FooErrorKind` / `FooError` style (a bare kind enum, plus a
//! location-annotated wrapper produced by `.at(loc)`), mirroring
//! `parser.rs`'s `ParseErrorKind` / `ParseError`.

use crate::record::Location;

/// The error type for parsing a recfile (`spec.md §4.1`, `§4.2`).
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
#[error("parse error at {loc}: {kind}")]
pub struct ParseError {
    kind: ParseErrorKind,
    loc: Location,
}

impl ParseError {
    /// Returns the corresponding [`ParseErrorKind`] for this error.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Returns the location from which the error originated.
    pub fn location(&self) -> &Location {
        &self.loc
    }
}

/// The error kind for parsing a recfile (`spec.md §7`).
#[derive(thiserror::Error, Debug, Eq, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// A physical line did not match `name: value` or a continuation form
    /// (`spec.md §4.1` rule 3).
    #[error("malformed field line: {0:?}")]
    MalformedField(String),
    /// A `+`-continuation line appeared with no preceding field
    /// (`spec.md §4.1` rule 4).
    #[error("stray continuation line with no preceding field")]
    StrayContinuation,
    /// Two descriptors in the same `RecordSet` declared the same
    /// `%rec:` type name (`spec.md §3`, Invariants).
    #[error("duplicate descriptor for record type {0:?}")]
    DuplicateDescriptor(String),
    /// A descriptor record's first field was not `%rec`, or `%rec` was
    /// missing entirely (`spec.md §4.2`).
    #[error("descriptor record is missing a leading %rec field")]
    MissingRecField,
    /// A recognized `%`-meta field had a syntactically invalid body (for
    /// example `%type: Age range` with no bounds).
    #[error("malformed descriptor field {0:?}: {1}")]
    BadDescriptorSyntax(String, String),
}

impl ParseErrorKind {
    pub(crate) fn at(self, loc: Location) -> ParseError {
        ParseError { kind: self, loc }
    }
}

/// The error type for compiling a selection expression (`spec.md §4.4`,
/// `§4.5`).
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
#[error("selection expression error at column {column}: {kind}")]
pub struct SexError {
    kind: SexErrorKind,
    column: usize,
}

impl SexError {
    pub fn kind(&self) -> &SexErrorKind {
        &self.kind
    }

    pub fn column(&self) -> usize {
        self.column
    }
}

/// The error kind for compiling a selection expression (`spec.md §7`).
#[derive(thiserror::Error, Debug, Eq, PartialEq, Clone)]
pub enum SexErrorKind {
    #[error("unexpected token: {0:?}")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unknown operator starting at {0:?}")]
    UnknownOperator(String),
    #[error("integer literal {0:?} does not fit in 64 bits")]
    IntegerOverflow(String),
}

impl SexErrorKind {
    pub(crate) fn at(self, column: usize) -> SexError {
        SexError { kind: self, column }
    }
}

/// In-band evaluation errors (`spec.md §4.6`, `§7`).
///
/// These are carried as [`crate::sex::Value::Error`] variants rather than
/// propagated as failures — evaluation is total, per `spec.md §4.6`. The
/// kind still derives `thiserror::Error` purely for a consistent
/// `Display`, matching the teacher's practice of giving every error-like
/// enum a derived message even when it is never returned as a `Result`.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EvalErrorKind {
    #[error("field not present")]
    MissingField,
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("invalid regular expression: {0}")]
    BadRegex(String),
    #[error("division by zero")]
    DivideByZero,
}
