//! # sfn-builder - State Machine Definitions as Rust Values
//!
//! **sfn-builder** models, (de)compiles and locally runs workflow definitions written in the
//! JSON-based Amazon States Language. A definition is a graph of named states connected by
//! `Next` pointers: sequential chains, `Choice` branching, structural `Parallel` fan-out and
//! terminal states.
//!
//! ## Core Workflow
//!
//! 1.  **Parse**: Build a [`Machine`](states::Machine) from the full-schema form (`StartAt` +
//!     `States`) or from list notation, where bare strings are step names and a list of lists
//!     is a set of parallel branches.
//! 2.  **Edit**: Insert, remove and append states; `Next` pointers are kept intact.
//! 3.  **Compile**: Turn the machine back into its exact full-schema JSON, optionally letting a
//!     visitor inject extra fields into every compiled state.
//! 4.  **Run**: Step through the machine locally with a [`Runner`](runner::Runner), backed by
//!     caller-supplied resource providers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sfn_builder::prelude::*;
//! use serde_json::json;
//!
//! fn main() -> Result<()> {
//!     // Two chained tasks in list notation, named after their resources.
//!     let mut machine = Machine::parse(json!([{"Resource": "fetch"}, {"Resource": "store"}]))?;
//!     machine.insert(json!({"Resource": "validate"}), Position::before("store"))?;
//!     println!("{}", machine.to_json()?);
//!
//!     let runner = Runner::builder()
//!         .resource_provider("fetch", |_| Ok(json!({"id": 7})))
//!         .resource_provider("validate", |input| Ok(input))
//!         .resource_provider("store", |_| Ok(json!("stored")))
//!         .build();
//!
//!     let (last, output) = runner.run(&machine, json!({}))?;
//!     println!("{} -> {}", last.map(|s| s.name.as_str()).unwrap_or("-"), output);
//!     Ok(())
//! }
//! ```

pub mod choice;
pub mod error;
pub mod node;
pub mod path;
pub mod prelude;
pub mod runner;
pub mod states;
