use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("empty expression")]
    EmptyExpression,
    #[error("invalid expression `{expr}`: {reason}")]
    InvalidExpression { expr: String, reason: String },
    #[error(
        "`{name}` lookup is not registered in `{registry}`; registered lookups are [{registered}]"
    )]
    UnknownLookup {
        name: String,
        registry: String,
        registered: String,
    },
    #[error("invalid arguments for `{lookup}` lookup: {reason}")]
    InvalidArguments { lookup: String, reason: String },
    #[error("unsupported type `{name}` (expected one of int, float, decimal, bool)")]
    UnknownType { name: String },
    #[error("unsupported arithmetic operator `{op}`")]
    UnknownOperator { op: String },
    #[error("invalid template at `{path}`: {reason}")]
    InvalidTemplate { path: String, reason: String },
    #[error("invalid fail mode `{0}` (expected fail, default or skip)")]
    InvalidFailMode(String),
}

/// Failure of a single lookup step. Governed by the owning chain's fail mode,
/// except for [`LookupError::MissingMemo`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("key `{key}` not found")]
    KeyNotFound { key: String },
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("`{key}` is not a valid sequence index")]
    InvalidIndex { key: String },
    #[error("`{lookup}` lookup cannot be applied to {found}")]
    TypeMismatch {
        lookup: &'static str,
        found: &'static str,
    },
    #[error("no element matches all conditions")]
    NotFound,
    #[error("cannot convert {value} to {target}")]
    Conversion { target: &'static str, value: String },
    #[error("arithmetic `{op}` failed: {reason}")]
    Arithmetic { op: &'static str, reason: String },
    #[error("memoized prefix `{key}` is missing from the lookup table")]
    MissingMemo { key: String },
    #[error("nested expression failed: {0}")]
    Nested(Box<EvalError>),
    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("step `{step}` of `{expr}` failed: {source}")]
    Lookup {
        expr: String,
        step: String,
        #[source]
        source: LookupError,
    },
    /// A memo step found nothing to reuse. The optimizer only emits memo steps for
    /// prefixes evaluated earlier in the same call, so this is never recoverable.
    #[error("memoized prefix `{key}` is missing from the lookup table")]
    MissingMemo { key: String },
    #[error("list root `{expr}` evaluated to {found}, expected a sequence")]
    NotASequence { expr: String, found: &'static str },
}

/// Failure of a one-shot [`crate::runtime::map_data`] call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl From<EvalError> for LookupError {
    fn from(err: EvalError) -> Self {
        Self::Nested(Box::new(err))
    }
}
