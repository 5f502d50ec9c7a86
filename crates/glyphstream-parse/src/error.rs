//! Error and warning types for the content stream engine.
//!
//! Uses [`thiserror`] for ergonomic error derivation. Errors split into
//! two severities: structural failures that abort the current stream
//! (I/O, unserializable tokens, unrecoverable stream corruption) and
//! operator-local failures that skip one operator and let the stream
//! continue. [`EngineWarning`] carries the non-fatal diagnostics the
//! engine reports through the sink while degrading.

use thiserror::Error;

/// Error type for content stream processing.
#[derive(Debug, Error)]
pub enum EngineError {
    /// I/O failure reading or writing stream bytes. Fatal.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed content stream syntax that tokenization cannot recover
    /// from. Fatal for the current stream.
    #[error("content stream syntax error: {0}")]
    Syntax(String),

    /// A compressed stream could not be decoded at all. Fatal.
    #[error("flate stream error: {0}")]
    Flate(String),

    /// A token of a kind that cannot appear in a content stream was
    /// passed to the serializer. Fatal.
    #[error("unknown token type in content stream: {0}")]
    UnknownToken(String),

    /// An operator was invoked with fewer operands than it consumes.
    /// Operator-local: the operator is skipped, the stream continues.
    #[error("missing operands for operator {operator}: {given} given")]
    MissingOperand {
        /// The operator name.
        operator: String,
        /// How many operands were on the stack.
        given: usize,
    },

    /// `BT` encountered while a text object is already open.
    #[error("nested text object")]
    NestedTextObject,

    /// `ET` (or a text operator requiring `BT`) outside a text object.
    #[error("text object not open for operator {operator}")]
    TextObjectNotOpen {
        /// The operator name.
        operator: String,
    },

    /// A graphics operator that is illegal between `BT` and `ET`.
    #[error("operator {operator} is not allowed inside a text object")]
    NotAllowedInTextObject {
        /// The operator name.
        operator: String,
    },
}

impl EngineError {
    /// Whether this error aborts the whole stream (as opposed to one
    /// operator).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Io(_)
                | EngineError::Syntax(_)
                | EngineError::Flate(_)
                | EngineError::UnknownToken(_)
        )
    }
}

/// Category of a non-fatal engine warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// `Q` with an empty saved-state stack.
    RestoreOnEmptyStack,
    /// A path operator ran without a current point; a moveto was implied.
    ImplicitMoveTo,
    /// An operator the engine does not implement.
    UnsupportedOperator,
    /// A named resource was not present in the resource dictionary.
    MissingResource,
    /// XObject nesting exceeded the recursion cap.
    RecursionLimit,
    /// An operator failed and was skipped.
    OperatorSkipped,
}

/// A non-fatal diagnostic reported through the sink during interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineWarning {
    /// The warning category.
    pub kind: WarningKind,
    /// Human-readable description.
    pub description: String,
    /// The operator being processed, when applicable.
    pub operator: Option<String>,
}

impl EngineWarning {
    /// Create a warning without operator context.
    pub fn new(kind: WarningKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            operator: None,
        }
    }

    /// Create a warning tied to an operator.
    pub fn with_operator(
        kind: WarningKind,
        description: impl Into<String>,
        operator: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            operator: Some(operator.into()),
        }
    }
}
