use crate::compile::{compile, compile_expression};
use crate::error::{CompileError, EvalError, LookupError, MapError};
use crate::expression::{EvalContext, ExpressionChain, Outcome};
use crate::ops::{CustomLookup, LookupArgs, LookupRegistry, LookupSpec};
use crate::plan::ConfigNode;
use crate::runtime::{map_data, CompiledMapper};
use crate::state::{Lut, LutStats};
use crate::types::{FailMode, MapperOptions, Template};
use serde_json::{json, Value};
use std::sync::Arc;


fn opts(fail_mode: FailMode) -> MapperOptions {
    MapperOptions::default().with_fail_mode(fail_mode)
}

fn compile_ok(template: &Template, options: &MapperOptions) -> CompiledMapper {
    compile(template, options).expect("compile should succeed")
}

/// Optimized and unoptimized builds of the same template.
fn compile_pair(template: &Template, options: &MapperOptions) -> (CompiledMapper, CompiledMapper) {
    let optimized = compile_ok(template, &options.clone().with_optimize(true));
    let plain = compile_ok(template, &options.clone().with_optimize(false));
    (optimized, plain)
}

fn assert_parity(template: &Template, options: &MapperOptions, data: &Value) -> Value {
    let (optimized, plain) = compile_pair(template, options);
    let lhs = optimized.evaluate(data).expect("optimized evaluate should succeed");
    let rhs = plain.evaluate(data).expect("plain evaluate should succeed");
    assert_eq!(lhs, rhs, "optimizer changed the result");
    lhs
}

fn chain_at<'a>(mapper: &'a CompiledMapper, key: &str) -> &'a ExpressionChain {
    match mapper.config().get(key) {
        Some(ConfigNode::Expression(chain)) => chain,
        other => panic!("`{key}` is not an expression: {other:?}"),
    }
}

fn step_raws(chain: &ExpressionChain) -> Vec<&str> {
    chain.steps().iter().map(|s| s.raw()).collect()
}

fn planets() -> Value {
    json!({
        "example": {
            "greetings": "Hello",
            "planets": [
                {"planet": "Mars", "residents": "martians", "moons": 2},
                {"planet": "Earth", "residents": "people", "moons": 1},
                {"planet": "Space", "residents": "aliens", "moons": 0},
            ],
            "food": null,
        },
        "cool_object": "Space Shuttle",
    })
}

/// Reads a top-level field of the call input, wherever the step runs.
#[derive(Debug)]
struct SuperRootField {
    key: String,
}

impl CustomLookup for SuperRootField {
    fn evaluate(&self, _node: &Value, ctx: &mut EvalContext<'_>) -> Result<Value, LookupError> {
        ctx.super_root
            .get(&self.key)
            .cloned()
            .ok_or_else(|| LookupError::KeyNotFound {
                key: self.key.clone(),
            })
    }
}

/// Reads a field of the ambient context value.
#[derive(Debug)]
struct ContextField {
    key: String,
}

impl CustomLookup for ContextField {
    fn evaluate(&self, _node: &Value, ctx: &mut EvalContext<'_>) -> Result<Value, LookupError> {
        ctx.context
            .get(&self.key)
            .cloned()
            .ok_or_else(|| LookupError::KeyNotFound {
                key: self.key.clone(),
            })
    }
}

/// Evaluates a nested path against the current node.
#[derive(Debug)]
struct SubPath {
    chain: ExpressionChain,
}

impl CustomLookup for SubPath {
    fn evaluate(&self, node: &Value, ctx: &mut EvalContext<'_>) -> Result<Value, LookupError> {
        ctx.evaluate(&self.chain, node)?
            .into_value()
            .ok_or_else(|| LookupError::Custom("sub path skipped".to_string()))
    }
}

fn single_key(lookup: &str, args: &LookupArgs) -> Result<String, CompileError> {
    match args.positional.as_slice() {
        [key] if args.named.is_empty() => Ok(key.clone()),
        _ => Err(CompileError::InvalidArguments {
            lookup: lookup.to_string(),
            reason: "expected exactly one key".to_string(),
        }),
    }
}

fn extended_registry() -> Arc<LookupRegistry> {
    let mut registry = LookupRegistry::with_builtins("test.registry");
    registry
        .register(Some("super"), |args: &LookupArgs| {
            Ok(LookupSpec::custom(SuperRootField {
                key: single_key("super", args)?,
            }))
        })
        .register(Some("ctx"), |args: &LookupArgs| {
            Ok(LookupSpec::custom(ContextField {
                key: single_key("ctx", args)?,
            }))
        })
        .register(Some("sub"), |args: &LookupArgs| {
            let path = single_key("sub", args)?;
            Ok(LookupSpec::custom(SubPath {
                chain: compile_expression(&path, &MapperOptions::default())?,
            }))
        });
    Arc::new(registry)
}
