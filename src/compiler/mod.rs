//! Query compilation pipeline
//!
//! Turns an arbitrarily nested filter tree into a flat set of native scans
//! the restricted store can run. The pipeline is staged:
//!
//! 1. [`context`]: validate the request and decide whether the primary-key
//!    exclusion strategy applies
//! 2. [`preprocess`]: push negation down, explode compound lookups, and
//!    substitute emulated lookups with derived-index predicates
//! 3. [`dnf`]: normalize to disjunctive normal form under a branch ceiling
//! 4. [`compile`]: check per-branch restrictions, rewrite ordering, and
//!    assemble the final query set

pub mod compile;
pub mod context;
pub mod dnf;
pub mod errors;
pub mod preprocess;

pub use compile::{CompiledConjunction, CompiledQuerySet, CompilerConfig, QueryCompiler};
pub use context::{exclusion_permitted, FieldCatalog, FilterQuery, MapCatalog};
pub use dnf::Dnf;
pub use errors::{CompileError, CompileResult};
pub use preprocess::{PreTree, PreprocessOutcome, Preprocessor, Substitution};
