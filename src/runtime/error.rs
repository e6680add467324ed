//! Error types for the statement runtime
//!
//! Domain errors are thiserror enums. Foreign failures (native action
//! handlers, create delegates) arrive as `anyhow::Error` and are wrapped into
//! [`ExecError::Foreign`] so callers only ever observe the engine's own type.

use std::io;
use thiserror::Error;

/// Errors raised while executing a statement tree.
///
/// Every variant except the ones produced by containment (`try`) is fatal to
/// the statement that raised it and unwinds to the nearest try-mode boundary
/// or dispatch boundary.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A dispatch target evaluated to nil.
    #[error("{statement}: cannot execute on a nil agent")]
    NilAgent {
        /// Statement that attempted the dispatch
        statement: String,
    },

    /// A dispatch target evaluated to something that is not an agent.
    #[error("{statement}: {found} is not an agent")]
    NotAnAgent {
        /// Statement that attempted the dispatch
        statement: String,
        /// Rendering of the offending value
        found: String,
    },

    /// The scope has no current agent.
    #[error("no agent is available to execute {0}")]
    NoAgent(String),

    /// A variable could not be resolved in any frame nor on the current agent.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// An action could not be resolved on the target species.
    #[error("impossible to find action {action} in {species}")]
    UnknownAction {
        /// Requested action name
        action: String,
        /// Species searched (including its parents)
        species: String,
    },

    /// A species name could not be resolved.
    #[error("unknown species '{0}'")]
    UnknownSpecies(String),

    /// No population of a species is reachable from the executing agent.
    #[error("no population of {species} is accessible in the context of {agent}")]
    NoPopulation {
        /// Species whose population was requested
        species: String,
        /// Executing agent
        agent: String,
    },

    /// Attempt to instantiate an abstract species.
    #[error("{0} is abstract and cannot be instantiated")]
    AbstractSpecies(String),

    /// No create delegate accepts the given source.
    #[error("{0} cannot be used as a source of agents")]
    UnsupportedSource(String),

    /// A container statement resolved something that is not a container.
    #[error("cannot use {expression}, of type {found}, as a container")]
    NotAContainer {
        /// Rendering of the container expression
        expression: String,
        /// Runtime type that was found
        found: String,
    },

    /// An operator received operands it cannot combine.
    #[error("invalid operands for {op}: {detail}")]
    InvalidOperation {
        /// Operator name
        op: String,
        /// Description of the operands
        detail: String,
    },

    /// A bounded loop was given a zero step.
    #[error("the step of a loop cannot be zero")]
    ZeroStep,

    /// Error raised explicitly by the script (`error "..."`).
    #[error("{0}")]
    Raised(String),

    /// Container mutation failure.
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// Failure of the worker pool backing parallel dispatch.
    #[error("worker pool error: {0}")]
    Pool(String),

    /// Foreign error surfaced by embedder code (native actions, delegates).
    #[error("{0}")]
    Foreign(#[from] anyhow::Error),
}

impl ExecError {
    /// Wrap any foreign error into the engine's error type.
    pub fn foreign<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ExecError::Foreign(anyhow::Error::new(error))
    }
}

/// Convenience result alias for statement execution
pub type ExecResult<T> = std::result::Result<T, ExecError>;

/// Container-specific errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContainerError {
    /// Index outside of the container bounds
    #[error("index {index} out of bounds (length {len})")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// Current container length
        len: usize,
    },

    /// Index of the wrong shape for the container
    #[error("{index} is not a valid index for a {container}")]
    InvalidIndex {
        /// Rendering of the index
        index: String,
        /// Container kind
        container: &'static str,
    },

    /// Structural change on a fixed-length container
    #[error("cannot add or remove elements of a {0}")]
    FixedLength(&'static str),

    /// Value that cannot be stored in the container
    #[error("{value} cannot be stored in a {container}")]
    InvalidValue {
        /// Rendering of the value
        value: String,
        /// Container kind
        container: &'static str,
    },

    /// Operation requires an index that was not provided
    #[error("{0} requires an index")]
    MissingIndex(&'static str),

    /// Range whose bounds are reversed
    #[error("invalid range {from}..{to}")]
    InvalidRange {
        /// Start of the range
        from: i64,
        /// End of the range (exclusive)
        to: i64,
    },
}

/// Convenience result alias for container operations
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// Errors raised while building executable statements from descriptions.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A statement is missing a facet it cannot run without
    #[error("{statement}: {detail}")]
    Incomplete {
        /// Statement keyword
        statement: &'static str,
        /// What is missing
        detail: String,
    },

    /// Two facets that cannot be combined were supplied
    #[error("{statement}: '{first}' and '{second}' are not compatible")]
    ConflictingFacets {
        /// Statement keyword
        statement: &'static str,
        /// First facet
        first: &'static str,
        /// Second facet
        second: &'static str,
    },

    /// Add/remove targeting a fixed-length container
    #[error("impossible to add/remove to/from {0}")]
    FixedLengthContainer(String),

    /// Unknown action referenced by a `do`
    #[error("action {action} does not exist in {species}")]
    UnknownAction {
        /// Action name
        action: String,
        /// Species searched
        species: String,
    },

    /// Argument passed to an action that does not declare it
    #[error("action {action} has no argument named {argument}")]
    UnknownArgument {
        /// Action name
        action: String,
        /// Offending argument
        argument: String,
    },

    /// Unknown species referenced by the model
    #[error("unknown species '{0}'")]
    UnknownSpecies(String),

    /// Invalid attribute default
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience result alias for builder operations
pub type BuildResult<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_error_converts() {
        let err: ExecError = ContainerError::FixedLength("matrix").into();
        assert!(matches!(err, ExecError::Container(ContainerError::FixedLength("matrix"))));
        assert_eq!(
            err.to_string(),
            "container error: cannot add or remove elements of a matrix"
        );
    }

    #[test]
    fn test_foreign_error_is_wrapped() {
        let io = io::Error::new(io::ErrorKind::Other, "disk on fire");
        let err = ExecError::foreign(io);
        assert!(matches!(err, ExecError::Foreign(_)));
        assert_eq!(err.to_string(), "disk on fire");
    }
}
