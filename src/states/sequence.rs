use super::{State, StateKind};
use crate::error::ParseError;
use crate::node::{self, CompileContext, FieldReader, Fields, JsonMap, Node, NodeType, ParsedNode, Raw};
use crate::states::StateSource;
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use serde_json::Value;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A name-keyed chain of states with one designated start.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub name: String,
    pub comment: Option<String>,
    pub start_at: Option<String>,
    pub states: AHashMap<String, State>,
}

/// One entry of a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trace {
    State(String),
    Parallel(Vec<Vec<Trace>>),
}

impl Trace {
    pub fn to_value(&self) -> Value {
        match self {
            Trace::State(name) => Value::String(name.clone()),
            Trace::Parallel(branches) => branches.iter().map(|b| trace_value(b)).collect(),
        }
    }
}

fn trace_value(trace: &[Trace]) -> Value {
    trace.iter().map(Trace::to_value).collect()
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequence {
    /// An empty sequence with a generated name.
    pub fn new() -> Self {
        Self {
            name: uuid::Uuid::new_v4().to_string(),
            comment: None,
            start_at: None,
            states: AHashMap::new(),
        }
    }

    /// Chains `states` in order. A state only receives a successor when its kind accepts one.
    pub fn from_states(states: impl IntoIterator<Item = State>) -> Result<Self, ParseError> {
        let mut states: Vec<State> = states.into_iter().collect();
        for i in 1..states.len() {
            let next = states[i].name.clone();
            let previous = &mut states[i - 1];
            if previous.kind.accepts_next() {
                previous.next = Some(next);
                previous.end = None;
            }
        }

        let mut sequence = Self::new();
        sequence.start_at = states.first().map(|state| state.name.clone());
        for state in states {
            if sequence.states.contains_key(&state.name) {
                return Err(ParseError::DuplicateState(state.name));
            }
            sequence.states.insert(state.name.clone(), state);
        }
        sequence.validate()?;
        Ok(sequence)
    }

    /// Parses list notation or the full-schema form.
    ///
    /// In list notation a list whose items are all lists is one Parallel state with a branch
    /// per item, a nested plain list is spliced into the surrounding chain, and anything else
    /// is a state (Task by default).
    pub fn parse(raw: impl Into<Raw>) -> Result<Self, ParseError> {
        match raw.into() {
            Raw::Json(Value::Array(items)) => {
                let mut states = Vec::new();
                collect_states(items, &mut states)?;
                Self::from_states(states)
            }
            raw => node::parse(raw, node::with_field("type", NodeType::Sequence.as_str()))?
                .into_sequence(),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut State> {
        self.states.get_mut(name)
    }

    pub fn start_at_state(&self) -> Option<&State> {
        self.start_at.as_deref().and_then(|name| self.states.get(name))
    }

    pub fn start_at_state_mut(&mut self) -> Option<&mut State> {
        let name = self.start_at.as_deref()?;
        self.states.get_mut(name)
    }

    /// Branches of the Parallel state called `name`, for editing nested chains.
    pub fn branches_mut(&mut self, name: &str) -> Option<&mut Vec<Sequence>> {
        match &mut self.states.get_mut(name)?.kind {
            StateKind::Parallel(spec) => Some(&mut spec.branches),
            _ => None,
        }
    }

    /// Walks from `start_at` along `next`. A Parallel contributes the traces of its branches.
    /// The walk stops at the first state without a resolvable successor or on a revisit.
    pub fn trace(&self) -> Vec<Trace> {
        let mut trace = Vec::new();
        let mut seen = AHashSet::new();
        let mut current = self.start_at.as_deref();

        while let Some(name) = current {
            if !seen.insert(name) {
                break;
            }
            let Some(state) = self.states.get(name) else {
                break;
            };
            match &state.kind {
                StateKind::Parallel(spec) => {
                    trace.push(Trace::Parallel(spec.branches.iter().map(Sequence::trace).collect()))
                }
                _ => trace.push(Trace::State(name.to_string())),
            }
            current = state.next.as_deref();
        }
        trace
    }

    /// Checks that `start_at` and every `next` key into this sequence.
    pub fn validate(&self) -> Result<(), ParseError> {
        if let Some(start) = &self.start_at {
            if !self.states.contains_key(start) {
                return Err(ParseError::DanglingReference {
                    state: self.name.clone(),
                    target: start.clone(),
                });
            }
        }
        for state in self.states.values() {
            if let Some(next) = &state.next {
                if !self.states.contains_key(next) {
                    return Err(ParseError::DanglingReference {
                        state: state.name.clone(),
                        target: next.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn read(reader: &mut FieldReader) -> Result<Self, ParseError> {
        let raw_states = reader.take::<JsonMap>("states")?.unwrap_or_default();
        let mut states = AHashMap::with_capacity(raw_states.len());
        for (key, raw) in raw_states {
            let state = State::parse_with(raw, node::with_field("name", key.as_str()))?;
            states.insert(key, state);
        }

        let sequence = Self {
            name: reader.require("name")?,
            comment: reader.take("comment")?,
            start_at: reader.take("start_at")?,
            states,
        };
        sequence.validate()?;
        Ok(sequence)
    }

    pub(crate) fn from_fields(
        node_type: NodeType,
        fields: Fields,
        _source: Option<Arc<dyn StateSource>>,
    ) -> Result<ParsedNode, ParseError> {
        let mut reader = FieldReader::new(node_type, fields)?;
        Self::read(&mut reader).map(ParsedNode::Sequence)
    }

    /// State names in the order they are reached from `start_at`, following `next`, choice
    /// targets and defaults. Unreachable states follow by name.
    pub fn reach_order(&self) -> Vec<&str> {
        let mut order = Vec::with_capacity(self.states.len());
        let mut seen = AHashSet::new();
        let mut pending: Vec<&str> = self.start_at.as_deref().into_iter().collect();

        while let Some(name) = pending.pop() {
            let Some((name, state)) = self.states.get_key_value(name) else {
                continue;
            };
            if !seen.insert(name.as_str()) {
                continue;
            }
            order.push(name.as_str());

            let mut successors: Vec<&str> = state.next.as_deref().into_iter().collect();
            if let StateKind::Choice(spec) = &state.kind {
                successors.extend(spec.choices.iter().filter_map(|rule| rule.next()));
                successors.extend(spec.default.as_deref());
            }
            pending.extend(successors.into_iter().rev());
        }

        order.extend(
            self.states
                .keys()
                .map(String::as_str)
                .filter(|name| !seen.contains(name))
                .sorted(),
        );
        order
    }

    fn write(&self, ctx: &mut CompileContext<'_>, attributes: &mut Fields) {
        let mut states = JsonMap::new();
        for name in self.reach_order() {
            if let Some(state) = self.states.get(name) {
                states.insert(name.to_string(), Value::Object(state.compile_in(ctx)));
            }
        }
        if let Some(comment) = &self.comment {
            attributes.insert("comment".to_string(), Value::from(comment.as_str()));
        }
        if let Some(start_at) = &self.start_at {
            attributes.insert("start_at".to_string(), Value::from(start_at.as_str()));
        }
        attributes.insert("states".to_string(), Value::Object(states));
    }
}

fn collect_states(items: Vec<Value>, out: &mut Vec<State>) -> Result<(), ParseError> {
    if !items.is_empty() && items.iter().all(Value::is_array) {
        let branches = items
            .into_iter()
            .map(Sequence::parse)
            .collect::<Result<Vec<_>, _>>()?;
        out.push(State::parallel(branches));
        return Ok(());
    }

    for item in items {
        match item {
            Value::Array(nested) => collect_states(nested, out)?,
            other => out.push(State::parse(other)?),
        }
    }
    Ok(())
}

impl Node for Sequence {
    fn node_type(&self) -> NodeType {
        NodeType::Sequence
    }

    fn attributes(&self, ctx: &mut CompileContext<'_>) -> Fields {
        let mut attributes = Fields::new();
        self.write(ctx, &mut attributes);
        attributes
    }

    fn compile_hook(&self, compiled: &mut JsonMap) {
        compiled.shift_remove("Type");
    }
}

/// The root of a state machine definition.
#[derive(Debug, Clone, Default)]
pub struct Machine {
    pub sequence: Sequence,
    pub version: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl Deref for Machine {
    type Target = Sequence;

    fn deref(&self) -> &Self::Target {
        &self.sequence
    }
}

impl DerefMut for Machine {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.sequence
    }
}

impl From<Sequence> for Machine {
    fn from(sequence: Sequence) -> Self {
        Self {
            sequence,
            version: None,
            timeout_seconds: None,
        }
    }
}

impl Machine {
    pub fn from_states(states: impl IntoIterator<Item = State>) -> Result<Self, ParseError> {
        Sequence::from_states(states).map(Machine::from)
    }

    /// Parses list notation or the full-schema form of a whole machine.
    pub fn parse(raw: impl Into<Raw>) -> Result<Self, ParseError> {
        match raw.into() {
            raw @ Raw::Json(Value::Array(_)) => Sequence::parse(raw).map(Machine::from),
            raw => {
                node::parse(raw, node::with_field("type", NodeType::Machine.as_str()))?.into_machine()
            }
        }
    }

    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        let raw: Value = serde_json::from_str(json)
            .map_err(|err| ParseError::InvalidShape(format!("not a JSON document: {}", err)))?;
        Self::parse(raw)
    }

    /// The comment if there is one, else the name.
    pub fn display_name(&self) -> &str {
        self.comment.as_deref().unwrap_or(&self.name)
    }

    /// The trace of [`Sequence::trace`] as JSON. A machine made of a single Parallel
    /// state yields that Parallel's branch list directly.
    pub fn dry_run(&self) -> Value {
        let mut trace = self.trace();
        let single_parallel = self.len() == 1
            && matches!(
                self.start_at_state().map(|state| &state.kind),
                Some(StateKind::Parallel(_))
            );
        match trace.pop() {
            Some(only) if single_parallel && trace.is_empty() => only.to_value(),
            Some(last) => {
                trace.push(last);
                trace_value(&trace)
            }
            None => Value::Array(Vec::new()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Value::Object(self.compile()))
    }

    /// Like [`Machine::to_json`], calling `visitor` with every compiled state.
    pub fn to_json_with(
        &self,
        visitor: &mut dyn FnMut(&State, &mut JsonMap),
    ) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Value::Object(self.compile_with(visitor)))
    }

    pub(crate) fn from_fields(
        node_type: NodeType,
        fields: Fields,
        _source: Option<Arc<dyn StateSource>>,
    ) -> Result<ParsedNode, ParseError> {
        let mut reader = FieldReader::new(node_type, fields)?;
        let sequence = Sequence::read(&mut reader)?;
        Ok(ParsedNode::Machine(Machine {
            sequence,
            version: reader.take("version")?,
            timeout_seconds: reader.take("timeout_seconds")?,
        }))
    }
}

impl Node for Machine {
    fn node_type(&self) -> NodeType {
        NodeType::Machine
    }

    fn attributes(&self, ctx: &mut CompileContext<'_>) -> Fields {
        let mut attributes = Fields::new();
        self.sequence.write(ctx, &mut attributes);
        if let Some(version) = &self.version {
            attributes.insert("version".to_string(), Value::from(version.as_str()));
        }
        if let Some(timeout) = self.timeout_seconds {
            attributes.insert("timeout_seconds".to_string(), Value::from(timeout));
        }
        attributes
    }

    fn compile_hook(&self, compiled: &mut JsonMap) {
        compiled.shift_remove("Type");
    }
}
