//! Herd – a statement runtime for multi-level agent-based simulations
//!
//! This crate executes the statements of agent-based models:
//! - Scoped execution with frames, agent stacks and flow signals
//!   (`break`, `continue`, `return`, `die`)
//! - Loops over counts, ranges, containers and conditions
//! - Remote execution on other agents, sequential or on a worker pool
//! - Agent creation, capture, release and migration between populations
//! - In-place mutation of lists, maps, matrices and graphs
//! - Error containment with `try` / `catch`

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Statement interpreter: values, expressions, statements and builders
pub mod interpreter;

/// Runtime core: scopes, agents, the world and shared services
pub mod runtime;

// Re-export key types for convenience
pub use interpreter::{Model, ModelDesc, Sequence, Statement, Value};
pub use runtime::{ExecutionOutcome, Runtime, RuntimeConfig};

/// Current version of the Herd runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
