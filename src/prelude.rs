//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the sfn-builder crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use sfn_builder::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let definition = std::fs::read_to_string("path/to/machine.json")?;
//! let machine = Machine::from_json(&definition)?;
//! println!("{}", machine.dry_run());
//! # Ok(())
//! # }
//! ```

// Node model
pub use crate::node::{parse, with_field, Fields, JsonMap, Node, NodeType, ParsedNode, Raw};

// States and containers
pub use crate::states::{
    ExtraAttributes, Machine, Position, Sequence, State, StateKind, StateSource, Trace,
};

// Choice rules
pub use crate::choice::{ChoiceRule, Operand, Operator, OperatorName};

// Execution
pub use crate::path::JsonPath;
pub use crate::runner::{ResourceManager, ResourceResolver, Runner, RunnerConfig};

// Error types
pub use crate::error::{
    ConditionError, EditError, ParseError, PathError, ResourceError, RunError, StateError,
};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
