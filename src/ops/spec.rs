use crate::error::LookupError;
use crate::expression::EvalContext;
use crate::ops::{ArithmeticLookup, AsTypeLookup, FindInListLookup, KeyLookup};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Arguments of a bracketed step, `<name:a,b,key=value>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookupArgs {
    pub positional: Vec<String>,
    pub named: BTreeMap<String, String>,
}

impl LookupArgs {
    pub fn positional<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            positional: args.into_iter().map(Into::into).collect(),
            named: BTreeMap::new(),
        }
    }

    pub fn with_named(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.named.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// Extension point for user lookups registered under a bracket name.
///
/// Configuration happens once in the registered constructor; `evaluate` runs for
/// every mapped record and must be deterministic for a given node and context,
/// otherwise prefix memoization would hand out stale values.
pub trait CustomLookup: fmt::Debug + Send + Sync {
    fn evaluate(&self, node: &Value, ctx: &mut EvalContext<'_>) -> Result<Value, LookupError>;
}

#[derive(Debug, Clone)]
pub enum LookupSpec {
    Key(KeyLookup),
    FindInList(FindInListLookup),
    AsType(AsTypeLookup),
    Arithmetic(ArithmeticLookup),
    /// Reuse of a prefix computed earlier in the same call. Only the optimizer
    /// creates these.
    Memo(MemoLookup),
    Custom(Arc<dyn CustomLookup>),
}

impl LookupSpec {
    pub fn custom(lookup: impl CustomLookup + 'static) -> Self {
        Self::Custom(Arc::new(lookup))
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Key(_) => "key",
            Self::FindInList(_) => "find",
            Self::AsType(_) => "as_type",
            Self::Arithmetic(_) => "arith",
            Self::Memo(_) => "memo",
            Self::Custom(_) => "custom",
        }
    }

    pub fn evaluate(&self, node: &Value, ctx: &mut EvalContext<'_>) -> Result<Value, LookupError> {
        match self {
            Self::Key(lookup) => lookup.evaluate(node),
            Self::FindInList(lookup) => lookup.evaluate(node),
            Self::AsType(lookup) => lookup.evaluate(node),
            Self::Arithmetic(lookup) => lookup.evaluate(node),
            Self::Memo(lookup) => ctx.lut.fetch(lookup.key()),
            Self::Custom(lookup) => lookup.evaluate(node, ctx),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoLookup {
    key: String,
}

impl MemoLookup {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// One configured step of a chain together with its raw identity text.
#[derive(Debug, Clone)]
pub struct Step {
    raw: String,
    spec: LookupSpec,
}

impl Step {
    pub(crate) fn new(raw: impl Into<String>, spec: LookupSpec) -> Self {
        Self {
            raw: raw.into(),
            spec,
        }
    }

    pub(crate) fn memo(prefix: &str) -> Self {
        Self::new(prefix, LookupSpec::Memo(MemoLookup::new(prefix)))
    }

    #[inline]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn spec(&self) -> &LookupSpec {
        &self.spec
    }

    #[inline]
    pub fn is_memo(&self) -> bool {
        matches!(self.spec, LookupSpec::Memo(_))
    }
}
