//! Translation diagnostics
//!
//! Every translator boundary returns `Result<_, Diagnostics>`. A diagnostic
//! carries the failure kind, a human-readable message, the source location,
//! and — where relevant — the offending identifier or construct. Non-fatal
//! adjustments are reported as [`Warning`]s alongside the successful output.

use serde::Serialize;
use std::fmt;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// A position in the Oracle source. Lines and columns are 1-based;
/// `offset` is the byte offset from the start of the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    /// Position of the start of a unit, for diagnostics with no better anchor.
    pub fn start() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The closed set of failure kinds the transpiler reports.
///
/// The string form (kebab-case) is what appears in JSON output and in the
/// `recover` list of the configuration file.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Syntax not accepted by the Oracle grammar.
    ParseError,
    /// Name not found in any scope, catalog, or package.
    UnresolvedIdentifier,
    /// Identifier matches more than one category (e.g. both a column and a
    /// package function).
    AmbiguousReference,
    /// Feature recognized but not lowered (AUTONOMOUS_TRANSACTION, compound
    /// triggers, INSERT ALL, statement-level :NEW/:OLD, ...).
    UnsupportedFeature,
    /// `RETURNING ... INTO` on DML.
    UnsupportedReturning,
    /// `(+)` predicates on the same table pair disagree on the outer side.
    AmbiguousOuterJoin,
    /// The member slicer could not reliably split a package or type body.
    SegmentationFailed,
    /// `%TYPE` chain exceeds the depth limit or self-refers.
    CircularTypeReference,
    /// Expression has no consistent inferred type where one is required.
    TypeInferenceConflict,
    /// A `%ROWTYPE` or column reference names an object absent from the catalog.
    MetadataMissing,
    /// Translation was cancelled cooperatively.
    Cancelled,
    /// Catalog I/O or DDL-apply failure surfaced unchanged from the environment.
    EnvironmentError,
}

/// A failed translation. One diagnostic aborts the enclosing unit; there is
/// no partial emission of half-translated bodies.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{kind} at {line}:{column}: {message}")]
pub struct Diagnostics {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// The offending identifier or construct, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

impl Diagnostics {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, pos: Pos) -> Self {
        Self {
            kind,
            message: message.into(),
            line: pos.line,
            column: pos.column,
            object: None,
        }
    }

    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    /// Diagnostic anchored at the start of the unit.
    pub fn at_start(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, Pos::start())
    }
}

/// A single syntax error from the parser facade. The facade returns all
/// errors it can recover past; the translator folds them into one
/// [`Diagnostics`] of kind [`DiagnosticKind::ParseError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxError {
    pub message: String,
    pub pos: Pos,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

/// Fold a non-empty syntax error list into a translation failure.
pub fn parse_failure(errors: &[SyntaxError]) -> Diagnostics {
    let first = errors.first().expect("parse_failure on empty error list");
    let mut message = first.message.clone();
    if errors.len() > 1 {
        message.push_str(&format!(" (and {} more)", errors.len() - 1));
    }
    Diagnostics::new(DiagnosticKind::ParseError, message, first.pos)
}

/// A non-fatal adjustment made during a successful translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub message: String,
    pub line: usize,
}

impl Warning {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// The result of a successful translation: the emitted PostgreSQL text and
/// any warnings produced on the way.
#[derive(Debug, Clone, Serialize)]
pub struct Translated {
    pub sql: String,
    pub warnings: Vec<Warning>,
}

impl Translated {
    pub fn new(sql: String) -> Self {
        Self {
            sql,
            warnings: Vec::new(),
        }
    }
}
