use crate::compile::compile;
use crate::error::{EvalError, LookupError, MapError};
use crate::expression::{EvalContext, ExpressionChain, Outcome};
use crate::ops::{value_kind, Step};
use crate::plan::{CompileManifest, ConfigNode, ListConfig, NestedConfig};
use crate::state::{Lut, LutStats};
use crate::types::{MapperOptions, Template};
use serde_json::{Map, Value};

/// Compiles `template` and maps `data` through it once.
pub fn map_data(template: &Template, data: &Value, options: &MapperOptions) -> Result<Value, MapError> {
    Ok(compile(template, options)?.evaluate(data)?)
}

pub trait Mapper {
    fn map(&self, data: &Value) -> Result<Value, EvalError>;
    fn map_with_context(&self, data: &Value, context: &Value) -> Result<Value, EvalError>;
}

/// Compiled, immutable mapper. Every call evaluates with its own lookup table,
/// so one instance can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct CompiledMapper {
    config: NestedConfig,
    manifest: CompileManifest,
}

impl Mapper for CompiledMapper {
    fn map(&self, data: &Value) -> Result<Value, EvalError> {
        self.evaluate(data)
    }

    fn map_with_context(&self, data: &Value, context: &Value) -> Result<Value, EvalError> {
        self.evaluate_with_context(data, context)
    }
}

impl CompiledMapper {
    pub(crate) fn new(config: NestedConfig, manifest: CompileManifest) -> Self {
        Self { config, manifest }
    }

    #[inline]
    pub fn config(&self) -> &NestedConfig {
        &self.config
    }

    #[inline]
    pub fn manifest(&self) -> &CompileManifest {
        &self.manifest
    }

    pub fn evaluate(&self, data: &Value) -> Result<Value, EvalError> {
        self.evaluate_with_context(data, &Value::Null)
    }

    /// `context` is handed to custom lookups untouched.
    pub fn evaluate_with_context(&self, data: &Value, context: &Value) -> Result<Value, EvalError> {
        self.evaluate_with_stats(data, context).map(|(value, _)| value)
    }

    /// Also reports lookup-table activity, summed over the call and its list items.
    pub fn evaluate_with_stats(
        &self,
        data: &Value,
        context: &Value,
    ) -> Result<(Value, LutStats), EvalError> {
        let mut visitor = Visitor {
            super_root: data,
            context,
            stats: LutStats::default(),
        };
        let mut lut = Lut::new();
        let value = visitor.visit_nested(&self.config, data, &mut lut)?;
        visitor.stats.merge(lut.stats());
        Ok((value, visitor.stats))
    }
}

struct Visitor<'a> {
    super_root: &'a Value,
    context: &'a Value,
    stats: LutStats,
}

impl Visitor<'_> {
    fn visit_nested(
        &mut self,
        config: &NestedConfig,
        data: &Value,
        lut: &mut Lut,
    ) -> Result<Value, EvalError> {
        let mut out = Map::new();
        for (key, node) in &config.entries {
            if let Outcome::Value(value) = self.visit(node, data, lut)? {
                out.insert(key.clone(), value);
            }
        }
        Ok(Value::Object(out))
    }

    fn visit(&mut self, node: &ConfigNode, data: &Value, lut: &mut Lut) -> Result<Outcome, EvalError> {
        match node {
            ConfigNode::Constant(value) => Ok(Outcome::Value(value.clone())),
            ConfigNode::Expression(chain) => self.visit_chain(chain, data, lut),
            ConfigNode::Nested(nested) => self.visit_nested(nested, data, lut).map(Outcome::Value),
            ConfigNode::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match self.visit(item, data, lut)? {
                        Outcome::Value(value) => out.push(value),
                        Outcome::Skipped => return Ok(Outcome::Skipped),
                    }
                }
                Ok(Outcome::Value(Value::Array(out)))
            }
            ConfigNode::List(list) => self.visit_list(list, data, lut),
        }
    }

    #[inline]
    fn visit_chain(
        &self,
        chain: &ExpressionChain,
        data: &Value,
        lut: &mut Lut,
    ) -> Result<Outcome, EvalError> {
        let mut ctx = EvalContext::new(data, self.super_root, lut, self.context);
        chain.evaluate(data, &mut ctx)
    }

    fn visit_list(
        &mut self,
        list: &ListConfig,
        data: &Value,
        lut: &mut Lut,
    ) -> Result<Outcome, EvalError> {
        let items = match self.visit_chain(&list.root, data, lut)? {
            Outcome::Skipped => return Ok(Outcome::Skipped),
            Outcome::Value(root) => match list_items(&list.root, root)? {
                Some(items) => items,
                None => return Ok(Outcome::Skipped),
            },
        };

        let mut out = Vec::with_capacity(items.len());
        for item in &items {
            // Prefixes in the parent table describe `data`, not the element.
            let mut item_lut = Lut::new();
            out.push(self.visit_nested(&list.template, item, &mut item_lut)?);
            self.stats.merge(item_lut.stats());
        }
        Ok(Outcome::Value(Value::Array(out)))
    }
}

/// Elements of a list root value. `None` means the root chain chose to skip.
fn list_items(root: &ExpressionChain, value: Value) -> Result<Option<Vec<Value>>, EvalError> {
    match value {
        Value::Null => Ok(Some(Vec::new())),
        Value::Array(items) => Ok(Some(items)),
        other => {
            let step = root.steps().last().map(Step::raw).unwrap_or_default();
            let mismatch = LookupError::TypeMismatch {
                lookup: "list",
                found: value_kind(&other),
            };
            match root.recover(step, mismatch)? {
                Outcome::Skipped => Ok(None),
                Outcome::Value(Value::Null) => Ok(Some(Vec::new())),
                Outcome::Value(Value::Array(items)) => Ok(Some(items)),
                Outcome::Value(other) => Err(EvalError::NotASequence {
                    expr: root.source().to_string(),
                    found: value_kind(&other),
                }),
            }
        }
    }
}
