use crate::error::{CompileError, LookupError};
use crate::ops::{value_kind, LookupArgs, LookupSpec};
use serde_json::Value;

/// Field access on mappings, index access on sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLookup {
    key: String,
    index: Option<i64>,
}

impl KeyLookup {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let index = key.trim().parse::<i64>().ok();
        Self { key, index }
    }

    pub(crate) fn from_args(args: &LookupArgs) -> Result<LookupSpec, CompileError> {
        match (args.positional.as_slice(), args.named.is_empty()) {
            ([key], true) => Ok(LookupSpec::Key(Self::new(key.as_str()))),
            _ => Err(CompileError::InvalidArguments {
                lookup: "key".to_string(),
                reason: "expected exactly one positional key".to_string(),
            }),
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn evaluate(&self, node: &Value) -> Result<Value, LookupError> {
        match node {
            Value::Object(fields) => {
                fields
                    .get(&self.key)
                    .cloned()
                    .ok_or_else(|| LookupError::KeyNotFound {
                        key: self.key.clone(),
                    })
            }
            Value::Array(items) => {
                let index = self.index.ok_or_else(|| LookupError::InvalidIndex {
                    key: self.key.clone(),
                })?;
                let len = items.len();
                // negative indices count from the end
                let resolved = if index < 0 {
                    i64::try_from(len).ok().and_then(|len| index.checked_add(len))
                } else {
                    Some(index)
                };
                resolved
                    .and_then(|idx| usize::try_from(idx).ok())
                    .and_then(|idx| items.get(idx))
                    .cloned()
                    .ok_or(LookupError::IndexOutOfRange { index, len })
            }
            other => Err(LookupError::TypeMismatch {
                lookup: "key",
                found: value_kind(other),
            }),
        }
    }
}

/// First element of a sequence whose fields match every condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindInListLookup {
    conditions: Vec<(String, String)>,
}

impl FindInListLookup {
    pub fn new<I, K, V>(conditions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            conditions: conditions
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub(crate) fn from_args(args: &LookupArgs) -> Result<LookupSpec, CompileError> {
        if !args.positional.is_empty() {
            return Err(CompileError::InvalidArguments {
                lookup: "find".to_string(),
                reason: format!(
                    "conditions must be `key=value` pairs, got positional {:?}",
                    args.positional
                ),
            });
        }
        Ok(LookupSpec::FindInList(Self::new(
            args.named.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )))
    }

    #[inline]
    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    pub fn evaluate(&self, node: &Value) -> Result<Value, LookupError> {
        let Value::Array(items) = node else {
            return Err(LookupError::TypeMismatch {
                lookup: "find",
                found: value_kind(node),
            });
        };
        items
            .iter()
            .find(|item| self.matches(item))
            .cloned()
            .ok_or(LookupError::NotFound)
    }

    fn matches(&self, item: &Value) -> bool {
        self.conditions.iter().all(|(key, expected)| {
            item.get(key.as_str())
                .is_some_and(|actual| condition_matches(actual, expected))
        })
    }
}

/// Condition values come from expression text, so scalars compare by their JSON
/// rendering (`id=7` matches both `7` and `"7"`).
fn condition_matches(actual: &Value, expected: &str) -> bool {
    match actual {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => (if *b { "true" } else { "false" }) == expected,
        Value::Null => expected == "null",
        Value::Array(_) | Value::Object(_) => false,
    }
}
