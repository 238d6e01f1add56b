pub mod compile;
mod compile_expr;
pub mod error;
pub mod expression;
pub mod ops;
pub mod plan;
pub mod runtime;
pub mod state;
pub mod types;

pub use compile::{compile, compile_expression};
pub use error::{CompileError, EvalError, LookupError, MapError};
pub use expression::{EvalContext, ExpressionChain, Outcome};
pub use ops::{CustomLookup, LookupArgs, LookupRegistry, LookupSpec};
pub use plan::{CompileManifest, ConfigNode};
pub use runtime::{map_data, CompiledMapper, Mapper};
pub use state::{Lut, LutStats};
pub use types::{FailMode, MapperOptions, MapperSpec, Template};

#[cfg(test)]
mod tests;
