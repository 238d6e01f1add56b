use crate::error::CompileError;
use crate::ops::{ArithmeticLookup, AsTypeLookup, FindInListLookup, KeyLookup, LookupArgs, LookupSpec};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Builds a configured lookup from the arguments of one step.
pub type LookupConstructor =
    Arc<dyn Fn(&LookupArgs) -> Result<LookupSpec, CompileError> + Send + Sync>;

pub const BUILTIN_REGISTRY_NAME: &str = "pathmap.registry";

/// Name -> constructor table consulted while compiling expressions.
///
/// The unnamed entry (`None`) handles bare tokens. Registries are filled once and
/// then shared behind an `Arc`; nothing resolves names at evaluation time.
pub struct LookupRegistry {
    name: String,
    constructors: HashMap<Option<String>, LookupConstructor>,
}

static BUILTIN_REGISTRY: OnceLock<Arc<LookupRegistry>> = OnceLock::new();

impl LookupRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructors: HashMap::new(),
        }
    }

    /// Registry holding the bare-key lookup plus `find`, `as_type` and `arith`.
    pub fn with_builtins(name: impl Into<String>) -> Self {
        let mut registry = Self::new(name);
        registry
            .register(None, KeyLookup::from_args)
            .register(Some("find"), FindInListLookup::from_args)
            .register(Some("as_type"), AsTypeLookup::from_args)
            .register(Some("arith"), ArithmeticLookup::from_args);
        registry
    }

    /// Process-wide builtin registry.
    pub fn builtin() -> Arc<Self> {
        BUILTIN_REGISTRY
            .get_or_init(|| Arc::new(Self::with_builtins(BUILTIN_REGISTRY_NAME)))
            .clone()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores `constructor` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: Option<&str>, constructor: F) -> &mut Self
    where
        F: Fn(&LookupArgs) -> Result<LookupSpec, CompileError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.map(str::to_string), Arc::new(constructor));
        self
    }

    pub fn contains(&self, name: Option<&str>) -> bool {
        self.constructors.contains_key(&name.map(str::to_string))
    }

    pub fn resolve(&self, name: Option<&str>) -> Result<&LookupConstructor, CompileError> {
        self.constructors
            .get(&name.map(str::to_string))
            .ok_or_else(|| CompileError::UnknownLookup {
                name: name.unwrap_or("<bare key>").to_string(),
                registry: self.name.clone(),
                registered: self.names().join(", "),
            })
    }

    pub fn construct(
        &self,
        name: Option<&str>,
        args: &LookupArgs,
    ) -> Result<LookupSpec, CompileError> {
        let constructor = self.resolve(name)?;
        constructor(args)
    }

    /// Registered bracket names, sorted. The bare-key entry is not listed.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().flatten().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for LookupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupRegistry")
            .field("name", &self.name)
            .field("bare_key", &self.contains(None))
            .field("lookups", &self.names())
            .finish()
    }
}
