use crate::expression::ExpressionChain;
use serde_json::Value;

/// Compiled template node.
#[derive(Debug, Clone)]
pub enum ConfigNode {
    Constant(Value),
    Expression(ExpressionChain),
    Nested(NestedConfig),
    List(ListConfig),
    Sequence(Vec<ConfigNode>),
}

impl ConfigNode {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Constant(_) => "constant",
            Self::Expression(_) => "expression",
            Self::Nested(_) => "nested",
            Self::List(_) => "list",
            Self::Sequence(_) => "sequence",
        }
    }
}

/// Output mapping; entries keep declaration order.
#[derive(Debug, Clone, Default)]
pub struct NestedConfig {
    pub entries: Vec<(String, ConfigNode)>,
}

impl NestedConfig {
    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, node)| node)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps every element of the sequence produced by `root` through `template`.
#[derive(Debug, Clone)]
pub struct ListConfig {
    pub root: ExpressionChain,
    pub template: NestedConfig,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileManifest {
    /// Output keys across all mappings, list templates included.
    pub field_count: usize,
    pub chain_count: usize,
    /// Steps across all chains after optimization.
    pub step_count: usize,
    pub list_count: usize,
    /// Seen-prefix scopes opened by the optimizer.
    pub scope_count: usize,
    /// Chains rewritten to start from a memoized prefix.
    pub memo_rewrite_count: usize,
    /// End-to-end compile latency in microseconds.
    pub compile_time_us: u64,
}

impl CompileManifest {
    #[inline]
    pub fn summary_line(&self) -> String {
        format!(
            "fields={} chains={} steps={} lists={} scopes={} memo_rewrites={} compile_us={}",
            self.field_count,
            self.chain_count,
            self.step_count,
            self.list_count,
            self.scope_count,
            self.memo_rewrite_count,
            self.compile_time_us
        )
    }
}
