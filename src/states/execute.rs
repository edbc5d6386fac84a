use super::{State, StateKind};
use crate::error::{PathError, StateError};
use crate::path::JsonPath;
use crate::runner::ResourceResolver;
use serde_json::Value;
use tracing::warn;

/// Successor name (if any) and the data handed to it.
pub type Step = (Option<String>, Value);

impl State {
    /// Executes this state once against `data`.
    pub fn execute(&self, data: Value, resources: &dyn ResourceResolver) -> Result<Step, StateError> {
        match &self.kind {
            StateKind::Pass(spec) => {
                let input = self.filter_input(data.clone())?;
                let result = spec.result.clone().unwrap_or(input);
                let output = self.filter_output(self.apply_result(data, result)?)?;
                Ok((self.next.clone(), output))
            }
            StateKind::Task(_) => {
                let input = self.filter_input(data.clone())?;
                let result = self.invoke(input, resources)?;
                let output = self.filter_output(self.apply_result(data, result)?)?;
                Ok((self.next.clone(), output))
            }
            StateKind::Choice(spec) => {
                for rule in &spec.choices {
                    if rule.matches(&data)? {
                        return Ok((rule.next().map(str::to_string), data));
                    }
                }
                Ok((spec.default.clone(), data))
            }
            StateKind::Wait(_) => {
                let output = self.filter_output(self.filter_input(data)?)?;
                Ok((self.next.clone(), output))
            }
            StateKind::Parallel(spec) => {
                warn!(
                    state = %self.name,
                    branches = spec.branches.len(),
                    "parallel branches are not executed, passing data through"
                );
                let output = self.filter_output(self.filter_input(data)?)?;
                Ok((self.next.clone(), output))
            }
            StateKind::Succeed => Ok((None, self.filter_output(self.filter_input(data)?)?)),
            StateKind::Fail(_) => Ok((None, Value::Null)),
        }
    }

    /// Selects the part of `data` this state works on.
    pub fn filter_input(&self, data: Value) -> Result<Value, PathError> {
        match self.input_path.as_deref().map(JsonPath::parse).transpose()? {
            Some(path) if !path.is_root() => path.first(&data).cloned(),
            _ => Ok(data),
        }
    }

    /// Places `result` into `data`. An absent or root `ResultPath` replaces `data` wholesale.
    pub fn apply_result(&self, data: Value, result: Value) -> Result<Value, PathError> {
        match self.result_path.as_deref().map(JsonPath::parse).transpose()? {
            Some(path) if !path.is_root() => {
                let mut data = data;
                path.set(&mut data, result)?;
                Ok(data)
            }
            _ => Ok(result),
        }
    }

    /// Selects what is handed to the successor. A non-root `OutputPath` must match exactly once.
    pub fn filter_output(&self, data: Value) -> Result<Value, PathError> {
        match self.output_path.as_deref().map(JsonPath::parse).transpose()? {
            Some(path) if !path.is_root() => path.single(&data).cloned(),
            _ => Ok(data),
        }
    }

    fn invoke(&self, input: Value, resources: &dyn ResourceResolver) -> Result<Value, StateError> {
        let resource = self.resource.as_deref().ok_or(StateError::MissingResource)?;
        let provider = resources.resolve(resource)?;
        provider(input).map_err(|source| StateError::Provider {
            resource: resource.to_string(),
            source,
        })
    }
}
