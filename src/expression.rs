use crate::compile_expr::STEP_DELIMITER;
use crate::error::{EvalError, LookupError};
use crate::ops::{LookupRegistry, Step};
use crate::state::Lut;
use crate::types::FailMode;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Result of evaluating a chain: a value, or nothing because a step failed under
/// [`FailMode::Skip`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Value),
    Skipped,
}

impl Outcome {
    #[inline]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Skipped => None,
        }
    }
}

/// Per-evaluation state handed to every lookup.
///
/// `root` is the data of the current scope (the element inside a list template),
/// `super_root` is always the top-level input of the call.
#[derive(Debug)]
pub struct EvalContext<'a> {
    pub root: &'a Value,
    pub super_root: &'a Value,
    pub lut: &'a mut Lut,
    pub context: &'a Value,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        root: &'a Value,
        super_root: &'a Value,
        lut: &'a mut Lut,
        context: &'a Value,
    ) -> Self {
        Self {
            root,
            super_root,
            lut,
            context,
        }
    }

    /// Evaluates `chain` against `data` with its own lookup table.
    ///
    /// Prefix identities only hold for one piece of data, so a sub-evaluation never
    /// shares the caller's table.
    pub fn evaluate(&self, chain: &ExpressionChain, data: &Value) -> Result<Outcome, EvalError> {
        let mut lut = Lut::new();
        let mut ctx = EvalContext::new(self.root, self.super_root, &mut lut, self.context);
        chain.evaluate(data, &mut ctx)
    }
}

/// Compiled path expression: ordered steps plus the failure policy of the chain.
#[derive(Debug, Clone)]
pub struct ExpressionChain {
    source: String,
    steps: Vec<Step>,
    default: Option<Value>,
    fail_mode: FailMode,
    registry: Arc<LookupRegistry>,
}

impl ExpressionChain {
    pub(crate) fn new(
        source: impl Into<String>,
        steps: Vec<Step>,
        default: Option<Value>,
        fail_mode: FailMode,
        registry: Arc<LookupRegistry>,
    ) -> Self {
        debug_assert!(!steps.is_empty(), "expression chain must have at least one step");
        Self {
            source: source.into(),
            steps,
            default,
            fail_mode,
            registry,
        }
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[inline]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    #[inline]
    pub fn fail_mode(&self) -> FailMode {
        self.fail_mode
    }

    #[inline]
    pub fn registry(&self) -> &Arc<LookupRegistry> {
        &self.registry
    }

    pub fn has_memo(&self) -> bool {
        self.steps.iter().any(Step::is_memo)
    }

    /// Dotted raw-text prefixes, shortest first. A memo step contributes the
    /// prefix it stands for, so rewriting never changes this list.
    pub fn prefixes(&self) -> Vec<String> {
        let mut prefix = String::new();
        self.steps
            .iter()
            .map(|step| {
                if !prefix.is_empty() {
                    prefix.push(STEP_DELIMITER);
                }
                prefix.push_str(step.raw());
                prefix.clone()
            })
            .collect()
    }

    /// Replaces steps `0..=depth` with one memo step reusing their prefix.
    pub(crate) fn memoize_prefix(&mut self, depth: usize) {
        debug_assert!(depth < self.steps.len(), "prefix depth out of range");
        let Some(prefix) = self.prefixes().into_iter().nth(depth) else {
            return;
        };
        let rest = self.steps.split_off(depth + 1);
        self.steps = std::iter::once(Step::memo(&prefix)).chain(rest).collect();
    }

    pub fn evaluate(&self, data: &Value, ctx: &mut EvalContext<'_>) -> Result<Outcome, EvalError> {
        let mut node = Cow::Borrowed(data);
        let mut prefix = String::with_capacity(self.source.len());
        for step in &self.steps {
            if !prefix.is_empty() {
                prefix.push(STEP_DELIMITER);
            }
            prefix.push_str(step.raw());

            let outcome = match ctx.lut.get(&prefix) {
                Some(stored) => stored,
                None => {
                    let outcome = step.spec().evaluate(&node, ctx);
                    if !matches!(outcome, Err(LookupError::MissingMemo { .. })) {
                        ctx.lut.insert(prefix.as_str(), outcome.clone());
                    }
                    outcome
                }
            };
            match outcome {
                Ok(value) => node = Cow::Owned(value),
                Err(err) => return self.recover(step.raw(), err),
            }
        }
        Ok(Outcome::Value(node.into_owned()))
    }

    /// Applies the chain's fail mode to a failed step.
    pub(crate) fn recover(&self, step: &str, err: LookupError) -> Result<Outcome, EvalError> {
        if let LookupError::MissingMemo { key } = err {
            tracing::error!(expr = %self.source, %key, "memoized prefix missing from lookup table");
            return Err(EvalError::MissingMemo { key });
        }
        match (self.fail_mode, &self.default) {
            (FailMode::Skip, _) => {
                tracing::trace!(expr = %self.source, step, error = %err, "skipping failed expression");
                Ok(Outcome::Skipped)
            }
            (FailMode::Default, Some(default)) => {
                tracing::trace!(expr = %self.source, step, error = %err, "using default for failed expression");
                Ok(Outcome::Value(default.clone()))
            }
            (FailMode::Fail, _) | (FailMode::Default, None) => Err(EvalError::Lookup {
                expr: self.source.clone(),
                step: step.to_string(),
                source: err,
            }),
        }
    }
}

impl fmt::Display for ExpressionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
