//! Single-threaded execution of a [`Machine`].
//!
//! The runner starts at the machine's `start_at`, executes one state at a time and follows the
//! successor each state returns. It stops when there is no successor or the successor does not
//! resolve. A bounded history of visited states is kept so that a run exceeding its wall-clock
//! budget can report where it was looping.

use crate::error::RunError;
use crate::states::{Machine, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

mod resources;

pub use resources::{Provider, ProviderError, ResourceManager, ResourceResolver};

/// Runner settings, loadable from JSON. Missing keys take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Wall-clock budget of one run, in milliseconds.
    pub timeout_ms: u64,
    /// Number of trailing state names reported on timeout.
    pub history_len: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            history_len: 10,
        }
    }
}

impl RunnerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Runner {
    resources: ResourceManager,
    config: RunnerConfig,
}

#[derive(Debug, Default)]
pub struct RunnerBuilder {
    resources: ResourceManager,
    config: RunnerConfig,
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resources(mut self, resources: ResourceManager) -> Self {
        self.resources = resources;
        self
    }

    pub fn resource_provider<F>(mut self, id: impl Into<String>, provider: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ProviderError> + Send + Sync + 'static,
    {
        self.resources.register(id, provider);
        self
    }

    pub fn config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn history_len(mut self, history_len: usize) -> Self {
        self.config.history_len = history_len;
        self
    }

    pub fn build(self) -> Runner {
        Runner {
            resources: self.resources,
            config: self.config,
        }
    }
}

impl Runner {
    pub fn new(resources: ResourceManager) -> Self {
        Self {
            resources,
            config: RunnerConfig::default(),
        }
    }

    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// Registers a provider without going through a separate [`ResourceManager`].
    pub fn resource_provider<F>(&mut self, id: impl Into<String>, provider: F) -> &mut Self
    where
        F: Fn(Value) -> Result<Value, ProviderError> + Send + Sync + 'static,
    {
        self.resources.register(id, provider);
        self
    }

    /// Runs `machine` on `input` with the configured timeout.
    pub fn run<'m>(
        &self,
        machine: &'m Machine,
        input: Value,
    ) -> Result<(Option<&'m State>, Value), RunError> {
        self.run_with_timeout(machine, input, self.config.timeout())
    }

    /// Runs `machine` on `input`. Returns the last executed state and the final data.
    pub fn run_with_timeout<'m>(
        &self,
        machine: &'m Machine,
        input: Value,
        timeout: Duration,
    ) -> Result<(Option<&'m State>, Value), RunError> {
        let started = Instant::now();
        info!(machine = %machine.display_name(), ?timeout, "starting run");

        let mut history: VecDeque<String> = VecDeque::with_capacity(self.config.history_len + 1);
        let mut current = machine.start_at.clone();
        let mut last: Option<&'m State> = None;
        let mut data = input;

        while let Some(name) = current {
            let Some(state) = machine.get(&name) else {
                warn!(state = %name, "successor does not resolve, ending run");
                break;
            };

            let (next, output) =
                state
                    .execute(data, &self.resources)
                    .map_err(|source| RunError::Execution {
                        state: state.name.clone(),
                        state_type: state.state_type().as_str(),
                        source,
                    })?;
            debug!(state = %state.name, state_type = %state.state_type(), next = ?next, "executed state");

            data = output;
            current = next;
            last = Some(state);

            history.push_back(state.name.clone());
            if history.len() > self.config.history_len {
                history.pop_front();
            }

            let elapsed = started.elapsed();
            if elapsed > timeout {
                return Err(RunError::Timeout {
                    machine: machine.display_name().to_string(),
                    elapsed,
                    history: history.into_iter().collect(),
                });
            }
        }

        info!(
            machine = %machine.display_name(),
            last_state = ?last.map(|state| state.name.as_str()),
            elapsed = ?started.elapsed(),
            "run finished"
        );
        Ok((last, data))
    }
}
