use itertools::Itertools;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while parsing raw input into nodes.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unknown node type '{0}'")]
    UnknownType(String),

    #[error("Unknown choice rule operator '{0}'")]
    UnknownOperator(String),

    #[error("Invalid node shape: {0}")]
    InvalidShape(String),

    #[error("State name '{0}' is used more than once in the same sequence")]
    DuplicateState(String),

    #[error("State '{state}' points at '{target}', which is not part of the same sequence")]
    DanglingReference { state: String, target: String },

    #[error("Expected a {expected} node, but the input resolved to '{found}'")]
    UnexpectedNode {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Failed to construct node of type '{node_type}': {cause}")]
    Construction {
        node_type: &'static str,
        #[source]
        cause: ConstructionCause,
    },
}

/// Why a field set could not build a node variant.
#[derive(Error, Debug)]
pub enum ConstructionCause {
    #[error("field '{0}' is not accepted by this node type")]
    UnexpectedField(String),

    #[error("required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("field '{field}' has an invalid value")]
    InvalidValue {
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by path queries against a data document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("Invalid path '{path}': {message}")]
    Syntax { path: String, message: String },

    #[error("Path '{0}' did not match anything in the data")]
    NoMatch(String),

    #[error("Path '{path}' matched {count} values where exactly one is required")]
    Ambiguous { path: String, count: usize },

    #[error("Path '{0}' does not address a key or index inside an object or array")]
    NotAContainer(String),

    #[error("Path '{0}' can select more than one value and cannot be written to")]
    NotDefinite(String),

    #[error("Path '{path}' could not be evaluated: {message}")]
    Evaluation { path: String, message: String },
}

/// Errors raised when resolving a resource id to a provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("No provider registered for resource '{0}'")]
    NotRegistered(String),
}

/// Errors raised while coercing values inside a choice rule comparison.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("Operator '{operator}' cannot coerce '{found}' to {expected}")]
    Coercion {
        operator: &'static str,
        expected: &'static str,
        found: serde_json::Value,
    },

    #[error("Operator '{operator}' requires a {expected} operand, found '{found}'")]
    Operand {
        operator: &'static str,
        expected: &'static str,
        found: serde_json::Value,
    },

    #[error("Comparison '{0}' has no variable to read")]
    MissingVariable(&'static str),

    #[error("Rule '{0}' has an operand that does not fit its operator")]
    MalformedRule(&'static str),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Errors raised while executing a single state.
#[derive(Error, Debug)]
pub enum StateError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error("Task state has no resource to invoke")]
    MissingResource,

    #[error("Provider for resource '{resource}' failed")]
    Provider {
        resource: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors surfaced by the runner. Every execution-time failure is wrapped once here.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("State '{state}' of type '{state_type}' failed to execute")]
    Execution {
        state: String,
        state_type: &'static str,
        #[source]
        source: StateError,
    },

    #[error(
        "Machine '{machine}' did not finish within {elapsed:?}; last visited states: {}",
        .history.iter().join(" -> ")
    )]
    Timeout {
        machine: String,
        elapsed: Duration,
        history: Vec<String>,
    },
}

/// Errors raised by the pointer-preserving sequence mutations.
#[derive(Error, Debug)]
pub enum EditError {
    #[error("No state points at '{0}', cannot insert before it")]
    NoPredecessor(String),

    #[error("State '{0}' does not exist in this sequence")]
    UnknownState(String),

    #[error("Sequence has no terminal state to append after; the chain is cyclic")]
    NoTerminalState,

    #[error("State '{0}' already exists in this sequence")]
    DuplicateName(String),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
