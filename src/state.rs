use crate::error::LookupError;
use serde_json::Value;
use std::collections::HashMap;

/// Prefix lookup table: dotted raw-step prefix -> outcome of that prefix.
///
/// Failures are stored as well, so a chain rewritten to reuse a prefix observes
/// the same error its unrewritten form would have produced.
#[derive(Debug, Clone, Default)]
pub struct Lut {
    entries: HashMap<String, Result<Value, LookupError>>,
    reads: usize,
    writes: usize,
}

impl Lut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored outcome for `prefix`; a hit counts as one read.
    pub fn get(&mut self, prefix: &str) -> Option<Result<Value, LookupError>> {
        let hit = self.entries.get(prefix).cloned();
        if hit.is_some() {
            self.reads += 1;
        }
        hit
    }

    pub fn insert(&mut self, prefix: impl Into<String>, outcome: Result<Value, LookupError>) {
        self.writes += 1;
        self.entries.insert(prefix.into(), outcome);
    }

    /// Like [`Lut::get`], but a miss is [`LookupError::MissingMemo`].
    pub fn fetch(&mut self, prefix: &str) -> Result<Value, LookupError> {
        match self.get(prefix) {
            Some(outcome) => outcome,
            None => Err(LookupError::MissingMemo {
                key: prefix.to_string(),
            }),
        }
    }

    #[inline]
    pub fn contains(&self, prefix: &str) -> bool {
        self.entries.contains_key(prefix)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> LutStats {
        LutStats {
            reads: self.reads,
            writes: self.writes,
            entries: self.entries.len(),
        }
    }
}

/// Counters of one or more lookup tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LutStats {
    pub reads: usize,
    pub writes: usize,
    pub entries: usize,
}

impl LutStats {
    pub fn merge(&mut self, other: LutStats) {
        self.reads += other.reads;
        self.writes += other.writes;
        self.entries += other.entries;
    }
}
