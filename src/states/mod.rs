use crate::choice::ChoiceRule;
use crate::error::ParseError;
use crate::node::{self, CompileContext, FieldReader, Fields, JsonMap, Node, NodeType, ParsedNode, Raw};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

mod editor;
mod execute;
mod sequence;

pub use editor::Position;
pub use execute::Step;
pub use sequence::{Machine, Sequence, Trace};

/// A caller-supplied object a state can be built from.
pub trait StateSource: fmt::Debug + Send + Sync {
    /// The name the resulting state is registered under.
    fn name(&self) -> String;

    /// Probe for the optional extra-attributes capability.
    fn extra_attributes(&self) -> Option<&dyn ExtraAttributes> {
        None
    }
}

/// Supplies external fields merged into a compiled state after its generic fields.
pub trait ExtraAttributes {
    fn state_attributes(&self, state: &State) -> JsonMap;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassSpec {
    pub result: Option<Value>,
}

/// Fields shared by Task and Parallel. Retry and Catch are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSpec {
    pub result: Option<Value>,
    pub retry: Option<Value>,
    pub catch: Option<Value>,
    pub timeout_seconds: Option<u64>,
    pub heartbeat_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChoiceSpec {
    pub choices: Vec<ChoiceRule>,
    pub default: Option<String>,
}

/// Exactly one of the four fields is expected; this is not enforced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaitSpec {
    pub seconds: Option<u64>,
    pub seconds_path: Option<String>,
    pub timestamp: Option<String>,
    pub timestamp_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailSpec {
    pub error: Option<String>,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ParallelSpec {
    pub task: TaskSpec,
    pub branches: Vec<Sequence>,
}

#[derive(Debug, Clone)]
pub enum StateKind {
    Pass(PassSpec),
    Task(TaskSpec),
    Choice(ChoiceSpec),
    Wait(WaitSpec),
    Succeed,
    Fail(FailSpec),
    Parallel(ParallelSpec),
}

impl StateKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            StateKind::Pass(_) => NodeType::Pass,
            StateKind::Task(_) => NodeType::Task,
            StateKind::Choice(_) => NodeType::Choice,
            StateKind::Wait(_) => NodeType::Wait,
            StateKind::Succeed => NodeType::Succeed,
            StateKind::Fail(_) => NodeType::Fail,
            StateKind::Parallel(_) => NodeType::Parallel,
        }
    }

    /// Kinds that continue through `next` and are compiled with `End` when they have none.
    pub fn accepts_next(&self) -> bool {
        matches!(
            self,
            StateKind::Pass(_) | StateKind::Task(_) | StateKind::Wait(_) | StateKind::Parallel(_)
        )
    }
}

/// A named step of a state machine.
#[derive(Debug, Clone)]
pub struct State {
    pub name: String,
    pub comment: Option<String>,
    pub next: Option<String>,
    pub end: Option<bool>,
    pub resource: Option<String>,
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub result_path: Option<String>,
    pub kind: StateKind,
    source: Option<Arc<dyn StateSource>>,
}

impl State {
    pub fn new(name: impl Into<String>, kind: StateKind) -> Self {
        Self {
            name: name.into(),
            comment: None,
            next: None,
            end: None,
            resource: None,
            input_path: None,
            output_path: None,
            result_path: None,
            kind,
            source: None,
        }
    }

    pub fn task(name: impl Into<String>, resource: impl Into<String>) -> Self {
        let mut state = Self::new(name, StateKind::Task(TaskSpec::default()));
        state.resource = Some(resource.into());
        state
    }

    pub fn pass(name: impl Into<String>) -> Self {
        Self::new(name, StateKind::Pass(PassSpec::default()))
    }

    /// A Parallel state with a generated name.
    pub fn parallel(branches: Vec<Sequence>) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            StateKind::Parallel(ParallelSpec {
                task: TaskSpec::default(),
                branches,
            }),
        )
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    /// Parses a state; mappings without a `Type` become Tasks.
    pub fn parse(raw: impl Into<Raw>) -> Result<Self, ParseError> {
        Self::parse_with(raw, Fields::new())
    }

    pub fn parse_with(raw: impl Into<Raw>, overrides: Fields) -> Result<Self, ParseError> {
        node::parse(raw, overrides)?.into_state()
    }

    /// A new state with `overrides` applied; `self` is left untouched.
    pub fn with_overrides(&self, overrides: Fields) -> Result<Self, ParseError> {
        Self::parse_with(self.clone(), overrides)
    }

    pub fn state_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn source(&self) -> Option<&Arc<dyn StateSource>> {
        self.source.as_ref()
    }

    pub(crate) fn from_fields(
        node_type: NodeType,
        fields: Fields,
        source: Option<Arc<dyn StateSource>>,
    ) -> Result<ParsedNode, ParseError> {
        let mut reader = FieldReader::new(node_type, fields)?;
        let kind = match node_type {
            NodeType::Pass => StateKind::Pass(PassSpec {
                result: reader.take_value("result"),
            }),
            NodeType::Task => StateKind::Task(TaskSpec::read(&mut reader)?),
            NodeType::Choice => {
                let choices = reader
                    .take::<Vec<Value>>("choices")?
                    .unwrap_or_default()
                    .into_iter()
                    .map(ChoiceRule::parse)
                    .collect::<Result<_, _>>()?;
                StateKind::Choice(ChoiceSpec {
                    choices,
                    default: reader.take("default")?,
                })
            }
            NodeType::Wait => StateKind::Wait(WaitSpec {
                seconds: reader.take("seconds")?,
                seconds_path: reader.take("seconds_path")?,
                timestamp: reader.take("timestamp")?,
                timestamp_path: reader.take("timestamp_path")?,
            }),
            NodeType::Succeed => StateKind::Succeed,
            NodeType::Fail => StateKind::Fail(FailSpec {
                error: reader.take("error")?,
                cause: reader.take("cause")?,
            }),
            NodeType::Parallel => {
                let branches = reader
                    .take::<Vec<Value>>("branches")?
                    .unwrap_or_default()
                    .into_iter()
                    .map(Sequence::parse)
                    .collect::<Result<_, _>>()?;
                StateKind::Parallel(ParallelSpec {
                    task: TaskSpec::read(&mut reader)?,
                    branches,
                })
            }
            other => {
                return Err(ParseError::UnexpectedNode {
                    expected: "state",
                    found: other.as_str(),
                });
            }
        };

        // A successor supersedes an `End` carried over from a compiled re-parse.
        let next: Option<String> = reader.take("next")?;
        let end = reader.take::<bool>("end")?.filter(|_| next.is_none());

        Ok(ParsedNode::State(State {
            name: reader.require("name")?,
            comment: reader.take("comment")?,
            next,
            end,
            resource: reader.take("resource")?,
            input_path: reader.take("input_path")?,
            output_path: reader.take("output_path")?,
            result_path: reader.take("result_path")?,
            kind,
            source,
        }))
    }
}

impl TaskSpec {
    fn read(reader: &mut FieldReader) -> Result<Self, ParseError> {
        Ok(Self {
            result: reader.take_value("result"),
            retry: reader.take_value("retry"),
            catch: reader.take_value("catch"),
            timeout_seconds: reader.take("timeout_seconds")?,
            heartbeat_seconds: reader.take("heartbeat_seconds")?,
        })
    }

    fn write(&self, attributes: &mut Fields) {
        put(attributes, "result", self.result.clone());
        put(attributes, "retry", self.retry.clone());
        put(attributes, "catch", self.catch.clone());
        put(attributes, "timeout_seconds", self.timeout_seconds);
        put(attributes, "heartbeat_seconds", self.heartbeat_seconds);
    }
}

pub(crate) fn put<T: Into<Value>>(attributes: &mut Fields, attr: &str, value: Option<T>) {
    if let Some(value) = value {
        attributes.insert(attr.to_string(), value.into());
    }
}

impl Node for State {
    fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    fn attributes(&self, ctx: &mut CompileContext<'_>) -> Fields {
        let mut attributes = Fields::new();
        put(&mut attributes, "type", Some(self.state_type().as_str()));
        put(&mut attributes, "comment", self.comment.clone());
        put(&mut attributes, "next", self.next.clone());
        put(&mut attributes, "end", self.end);
        put(&mut attributes, "resource", self.resource.clone());
        put(&mut attributes, "input_path", self.input_path.clone());
        put(&mut attributes, "output_path", self.output_path.clone());
        put(&mut attributes, "result_path", self.result_path.clone());

        match &self.kind {
            StateKind::Pass(spec) => put(&mut attributes, "result", spec.result.clone()),
            StateKind::Task(spec) => spec.write(&mut attributes),
            StateKind::Choice(spec) => {
                let choices = spec
                    .choices
                    .iter()
                    .map(|rule| Value::Object(rule.compile()))
                    .collect::<Vec<_>>();
                put(&mut attributes, "choices", Some(choices));
                put(&mut attributes, "default", spec.default.clone());
            }
            StateKind::Wait(spec) => {
                put(&mut attributes, "seconds", spec.seconds);
                put(&mut attributes, "seconds_path", spec.seconds_path.clone());
                put(&mut attributes, "timestamp", spec.timestamp.clone());
                put(&mut attributes, "timestamp_path", spec.timestamp_path.clone());
            }
            StateKind::Succeed => {}
            StateKind::Fail(spec) => {
                put(&mut attributes, "error", spec.error.clone());
                put(&mut attributes, "cause", spec.cause.clone());
            }
            StateKind::Parallel(spec) => {
                spec.task.write(&mut attributes);
                let branches = spec
                    .branches
                    .iter()
                    .map(|branch| Value::Object(branch.compile_in(ctx)))
                    .collect::<Vec<_>>();
                put(&mut attributes, "branches", Some(branches));
            }
        }
        attributes
    }

    fn compile_hook(&self, compiled: &mut JsonMap) {
        if let Some(extra) = self.source.as_ref().and_then(|s| s.extra_attributes()) {
            compiled.extend(extra.state_attributes(self));
        }
        if self.kind.accepts_next() && !compiled.contains_key("Next") {
            compiled.insert("End".to_string(), Value::Bool(true));
        }
    }

    fn visit(&self, ctx: &mut CompileContext<'_>, compiled: &mut JsonMap) {
        ctx.visit_state(self, compiled);
    }
}
