use crate::compile_expr::{parse_path, RawStep, StepAst};
use crate::error::CompileError;
use crate::expression::ExpressionChain;
use crate::ops::{LookupArgs, Step};
use crate::plan::{CompileManifest, ConfigNode, ListConfig, NestedConfig};
use crate::runtime::CompiledMapper;
use crate::types::{MapperOptions, Template};
use std::collections::HashSet;
use std::time::Instant;

/// Compiles one path expression with the options' registry, default and fail mode.
pub fn compile_expression(
    source: &str,
    options: &MapperOptions,
) -> Result<ExpressionChain, CompileError> {
    let steps = parse_path(source)?
        .into_iter()
        .map(|RawStep { raw, ast }| -> Result<Step, CompileError> {
            let spec = match &ast {
                StepAst::Key(key) => options
                    .registry
                    .construct(None, &LookupArgs::positional([key.as_str()]))?,
                StepAst::Call { name, args } => options
                    .registry
                    .construct(Some(name.as_str()), args)?,
            };
            Ok(Step::new(raw, spec))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ExpressionChain::new(
        source,
        steps,
        options.default.clone(),
        options.fail_mode,
        options.registry.clone(),
    ))
}

/// Compiles a mapping template and, unless disabled, rewrites chains to reuse
/// prefixes already computed in their scope.
pub fn compile(template: &Template, options: &MapperOptions) -> Result<CompiledMapper, CompileError> {
    let started_at = Instant::now();
    let Template::Map(entries) = template else {
        return Err(CompileError::InvalidTemplate {
            path: "$".to_string(),
            reason: "top-level template must be a mapping".to_string(),
        });
    };

    let compiler = TemplateCompiler { options };
    let mut config = compiler.compile_map(entries, "$")?;

    let mut manifest = CompileManifest::default();
    if options.optimize {
        Optimizer {
            manifest: &mut manifest,
        }
        .optimize_scope(&mut config);
    }
    count_nested(&config, &mut manifest);
    manifest.compile_time_us = started_at.elapsed().as_micros() as u64;
    tracing::debug!(
        optimize = options.optimize,
        fail_mode = %options.fail_mode,
        registry = options.registry.name(),
        "compiled mapper: {}",
        manifest.summary_line()
    );
    Ok(CompiledMapper::new(config, manifest))
}

struct TemplateCompiler<'a> {
    options: &'a MapperOptions,
}

impl TemplateCompiler<'_> {
    fn compile_map(
        &self,
        entries: &[(String, Template)],
        path: &str,
    ) -> Result<NestedConfig, CompileError> {
        let entries = entries
            .iter()
            .map(|(key, child)| {
                self.compile_node(child, &format!("{path}.{key}"))
                    .map(|node| (key.clone(), node))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NestedConfig { entries })
    }

    fn compile_node(&self, template: &Template, path: &str) -> Result<ConfigNode, CompileError> {
        match template {
            Template::Expr(_) | Template::Chain(_) => {
                self.compile_chain(template, path).map(ConfigNode::Expression)
            }
            Template::Constant(value) => Ok(ConfigNode::Constant(value.clone())),
            Template::Map(entries) => self.compile_map(entries, path).map(ConfigNode::Nested),
            Template::List { root, template } => {
                let root = self.compile_chain(root, &format!("{path}.root"))?;
                let Template::Map(entries) = template.as_ref() else {
                    return Err(invalid_template(
                        &format!("{path}.template"),
                        "list template must be a mapping",
                    ));
                };
                let template = self.compile_map(entries, &format!("{path}.template"))?;
                Ok(ConfigNode::List(ListConfig { root, template }))
            }
            Template::Seq(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| self.compile_node(item, &format!("{path}[{idx}]")))
                .collect::<Result<Vec<_>, _>>()
                .map(ConfigNode::Sequence),
        }
    }

    fn compile_chain(&self, template: &Template, path: &str) -> Result<ExpressionChain, CompileError> {
        match template {
            Template::Expr(source) => compile_expression(source, self.options).inspect_err(|err| {
                tracing::debug!(path, error = %err, "expression failed to compile");
            }),
            Template::Chain(chain) if chain.has_memo() => Err(invalid_template(
                path,
                "precompiled chain must not contain memoized steps",
            )),
            Template::Chain(chain) => Ok(chain.clone()),
            other => Err(invalid_template(
                path,
                &format!("expected an expression, found {}", template_kind(other)),
            )),
        }
    }
}

fn invalid_template(path: &str, reason: &str) -> CompileError {
    CompileError::InvalidTemplate {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn template_kind(template: &Template) -> &'static str {
    match template {
        Template::Expr(_) => "expression",
        Template::Chain(_) => "chain",
        Template::Constant(_) => "constant",
        Template::Map(_) => "mapping",
        Template::List { .. } => "list template",
        Template::Seq(_) => "sequence",
    }
}

/// Shared-prefix pass. Each mapping owns one seen-prefix scope.
struct Optimizer<'m> {
    manifest: &'m mut CompileManifest,
}

impl Optimizer<'_> {
    fn optimize_scope(&mut self, config: &mut NestedConfig) {
        self.manifest.scope_count += 1;
        let mut seen = HashSet::new();
        for (_, node) in &mut config.entries {
            self.optimize_node(node, &mut seen);
        }
    }

    fn optimize_node(&mut self, node: &mut ConfigNode, seen: &mut HashSet<String>) {
        match node {
            ConfigNode::Constant(_) => {}
            ConfigNode::Expression(chain) => self.optimize_chain(chain, seen),
            ConfigNode::Nested(nested) => self.optimize_scope(nested),
            ConfigNode::List(list) => {
                // Root runs against the parent data; the template runs per element.
                self.optimize_chain(&mut list.root, seen);
                self.optimize_scope(&mut list.template);
            }
            ConfigNode::Sequence(items) => {
                // A skipped element aborts the sequence, so prefixes it introduces
                // must not leak to siblings that come after it.
                let mut scoped = seen.clone();
                for item in items {
                    self.optimize_node(item, &mut scoped);
                }
            }
        }
    }

    fn optimize_chain(&mut self, chain: &mut ExpressionChain, seen: &mut HashSet<String>) {
        let prefixes = chain.prefixes();
        if let Some(depth) = prefixes.iter().position(|prefix| seen.contains(prefix)) {
            chain.memoize_prefix(depth);
            self.manifest.memo_rewrite_count += 1;
        }
        seen.extend(prefixes);
    }
}

fn count_nested(config: &NestedConfig, manifest: &mut CompileManifest) {
    manifest.field_count += config.entries.len();
    for (_, node) in &config.entries {
        count_node(node, manifest);
    }
}

fn count_node(node: &ConfigNode, manifest: &mut CompileManifest) {
    match node {
        ConfigNode::Constant(_) => {}
        ConfigNode::Expression(chain) => count_chain(chain, manifest),
        ConfigNode::Nested(nested) => count_nested(nested, manifest),
        ConfigNode::List(list) => {
            manifest.list_count += 1;
            count_chain(&list.root, manifest);
            count_nested(&list.template, manifest);
        }
        ConfigNode::Sequence(items) => {
            for item in items {
                count_node(item, manifest);
            }
        }
    }
}

#[inline]
fn count_chain(chain: &ExpressionChain, manifest: &mut CompileManifest) {
    manifest.chain_count += 1;
    manifest.step_count += chain.len();
}
