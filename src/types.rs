use crate::error::CompileError;
use crate::expression::ExpressionChain;
use crate::ops::LookupRegistry;
use crate::runtime::CompiledMapper;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const CONSTANT_MARKER: &str = "$value";
const LIST_MARKER: &str = "$list";

/// What a chain does when one of its steps fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Propagate the error.
    #[default]
    Fail,
    /// Substitute the configured default; without one, behave like `Fail`.
    Default,
    /// Drop the value. Inside a mapping the key is omitted.
    Skip,
}

impl FailMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Default => "default",
            Self::Skip => "skip",
        }
    }
}

impl FromStr for FailMode {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "default" => Ok(Self::Default),
            "skip" => Ok(Self::Skip),
            _ => Err(CompileError::InvalidFailMode(s.to_string())),
        }
    }
}

impl fmt::Display for FailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings inherited by every expression compiled from a template.
#[derive(Debug, Clone)]
pub struct MapperOptions {
    /// `Some(Value::Null)` is a real default, distinct from `None`.
    pub default: Option<Value>,
    pub fail_mode: FailMode,
    pub registry: Arc<LookupRegistry>,
    /// Rewrite chains to reuse prefixes computed by earlier siblings.
    pub optimize: bool,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            default: None,
            fail_mode: FailMode::Fail,
            registry: LookupRegistry::builtin(),
            optimize: true,
        }
    }
}

impl MapperOptions {
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_fail_mode(mut self, fail_mode: FailMode) -> Self {
        self.fail_mode = fail_mode;
        self
    }

    pub fn with_registry(mut self, registry: Arc<LookupRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }
}

/// Uncompiled mapper configuration.
#[derive(Debug, Clone)]
pub enum Template {
    /// Path expression compiled with the inherited options.
    Expr(String),
    /// Chain compiled ahead of time, used as is.
    Chain(ExpressionChain),
    Constant(Value),
    Map(Vec<(String, Template)>),
    /// `root` must be an expression, `template` a mapping applied to every element.
    List {
        root: Box<Template>,
        template: Box<Template>,
    },
    Seq(Vec<Template>),
}

impl Template {
    pub fn expr(source: impl Into<String>) -> Self {
        Self::Expr(source.into())
    }

    pub fn constant(value: Value) -> Self {
        Self::Constant(value)
    }

    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Template)>,
        K: Into<String>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list(root: impl Into<Template>, template: Template) -> Self {
        Self::List {
            root: Box::new(root.into()),
            template: Box::new(template),
        }
    }

    pub fn seq(items: impl IntoIterator<Item = Template>) -> Self {
        Self::Seq(items.into_iter().collect())
    }

    /// Reads the JSON form of a template.
    ///
    /// Strings are expressions, arrays sequences and objects mappings.
    /// `{"$value": v}` is the constant `v`, and
    /// `{"$list": {"root": "...", "template": {...}}}` is a list template.
    pub fn from_json(value: &Value) -> Result<Self, CompileError> {
        template_from_json(value, "$")
    }
}

impl From<&str> for Template {
    fn from(source: &str) -> Self {
        Self::Expr(source.to_string())
    }
}

impl From<String> for Template {
    fn from(source: String) -> Self {
        Self::Expr(source)
    }
}

impl From<ExpressionChain> for Template {
    fn from(chain: ExpressionChain) -> Self {
        Self::Chain(chain)
    }
}

fn template_from_json(value: &Value, path: &str) -> Result<Template, CompileError> {
    match value {
        Value::String(source) => Ok(Template::Expr(source.clone())),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| template_from_json(item, &format!("{path}[{idx}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Template::Seq),
        Value::Object(entries) => {
            if entries.len() == 1 {
                if let Some(constant) = entries.get(CONSTANT_MARKER) {
                    return Ok(Template::Constant(constant.clone()));
                }
                if let Some(list) = entries.get(LIST_MARKER) {
                    return list_from_json(list, &format!("{path}.{LIST_MARKER}"));
                }
            }
            entries
                .iter()
                .map(|(key, child)| {
                    template_from_json(child, &format!("{path}.{key}")).map(|t| (key.clone(), t))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Template::Map)
        }
        other => Err(CompileError::InvalidTemplate {
            path: path.to_string(),
            reason: format!(
                "bare {other} is not an expression; wrap constants as {{\"{CONSTANT_MARKER}\": ...}}"
            ),
        }),
    }
}

fn list_from_json(value: &Value, path: &str) -> Result<Template, CompileError> {
    let invalid = |reason: &str| CompileError::InvalidTemplate {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    let body: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| invalid("list template must be an object with `root` and `template`"))?;
    if let Some(unknown) = body.keys().find(|k| !matches!(k.as_str(), "root" | "template")) {
        return Err(invalid(&format!("unknown list template field `{unknown}`")));
    }
    let root = body
        .get("root")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("list root must be an expression string"))?;
    let template = match body.get("template") {
        Some(template @ Value::Object(_)) => template_from_json(template, &format!("{path}.template"))?,
        _ => return Err(invalid("list template body must be an object")),
    };
    Ok(Template::list(root, template))
}

/// Serializable mapper definition.
///
/// ```json
/// {"fail_mode": "default", "default": null, "optimize": true, "config": {"x": "a.b"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperSpec {
    #[serde(default)]
    pub fail_mode: FailMode,
    /// Present `null` deserializes to `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,
    #[serde(default = "default_optimize")]
    pub optimize: bool,
    pub config: Value,
}

impl MapperSpec {
    pub fn options(&self, registry: Arc<LookupRegistry>) -> MapperOptions {
        MapperOptions {
            default: self.default.clone(),
            fail_mode: self.fail_mode,
            registry,
            optimize: self.optimize,
        }
    }

    pub fn compile(&self, registry: Arc<LookupRegistry>) -> Result<CompiledMapper, CompileError> {
        let template = Template::from_json(&self.config)?;
        crate::compile::compile(&template, &self.options(registry))
    }
}

const fn default_optimize() -> bool {
    true
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fail_mode_parses_and_displays() {
        assert_eq!("skip".parse::<FailMode>(), Ok(FailMode::Skip));
        assert_eq!(" Default ".parse::<FailMode>(), Ok(FailMode::Default));
        assert_eq!(
            "ignore".parse::<FailMode>(),
            Err(CompileError::InvalidFailMode("ignore".to_string()))
        );
        assert_eq!(FailMode::Fail.to_string(), "fail");
    }

    #[test]
    fn mapper_spec_distinguishes_null_default_from_absent() {
        let with_null: MapperSpec =
            serde_json::from_value(json!({"fail_mode": "default", "default": null, "config": {}}))
                .expect("spec should deserialize");
        assert_eq!(with_null.default, Some(Value::Null));
        assert!(with_null.optimize);

        let absent: MapperSpec =
            serde_json::from_value(json!({"config": {}})).expect("spec should deserialize");
        assert_eq!(absent.default, None);
        assert_eq!(absent.fail_mode, FailMode::Fail);
    }

    #[test]
    fn json_template_markers() {
        let template = Template::from_json(&json!({
            "name": "a.b",
            "fixed": {"$value": 3},
            "items": {"$list": {"root": "xs", "template": {"v": "value"}}},
            "pair": ["a", "b"],
        }))
        .expect("template should parse");
        let Template::Map(entries) = template else {
            panic!("top level should be a mapping");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["name", "fixed", "items", "pair"]);
        assert!(matches!(entries[0].1, Template::Expr(ref s) if s == "a.b"));
        assert!(matches!(entries[1].1, Template::Constant(ref v) if *v == json!(3)));
        assert!(matches!(entries[2].1, Template::List { .. }));
        assert!(matches!(entries[3].1, Template::Seq(ref items) if items.len() == 2));
    }

    #[test]
    fn json_template_rejects_bare_scalars_with_path() {
        let err = Template::from_json(&json!({"a": {"b": [1]}})).expect_err("bare number");
        assert!(
            matches!(err, CompileError::InvalidTemplate { ref path, .. } if path == "$.a.b[0]"),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn json_list_template_requires_expression_root() {
        let err = Template::from_json(&json!({"l": {"$list": {"root": 1, "template": {}}}}))
            .expect_err("numeric root");
        assert!(matches!(err, CompileError::InvalidTemplate { ref path, .. } if path == "$.l.$list"));
    }
}
