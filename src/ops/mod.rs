//! Lookup layer entry.
//!
//! Extension path (minimal touch points):
//! 1) implement the lookup in `access.rs` / `cast.rs` / `arith.rs` (or as a `CustomLookup`),
//! 2) add its variant in `spec.rs` and register a constructor in `catalog.rs`,
//! 3) add compile/runtime tests.

use serde_json::Value;

pub mod catalog;
pub mod spec;

mod access;
mod arith;
mod cast;

pub use access::{FindInListLookup, KeyLookup};
pub use arith::{ArithOp, ArithmeticLookup};
pub use cast::{AsTypeLookup, CastTarget};
pub use catalog::{LookupConstructor, LookupRegistry, BUILTIN_REGISTRY_NAME};
pub use spec::{CustomLookup, LookupArgs, LookupSpec, MemoLookup, Step};

/// Short kind name used in type-mismatch diagnostics.
#[inline]
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
