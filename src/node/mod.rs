//! The generic parse/compile primitive shared by every node of a state machine tree.
//!
//! Each node variant owns a flattened [`FieldTable`] that translates between its internal
//! attribute names and the external field names of the States Language. Parsing resolves
//! the variant through a static registry keyed by the `Type` discriminator, collects the
//! recognised fields, runs the variant's parse hook and constructs it. Compiling walks the
//! emitted fields, skips unset values, then applies the variant's compile hook and the
//! caller's state visitor.

use crate::choice::{ChoiceRule, Operator};
use crate::error::ParseError;
use crate::states::{Machine, Sequence, State, StateSource};
use ahash::AHashMap;
use serde_json::Value;
use std::sync::{Arc, LazyLock};

pub mod fields;

pub use fields::{Field, FieldTable, Fields, JsonMap};
pub(crate) use fields::FieldReader;

/// Every node variant known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Pass,
    Task,
    Choice,
    Wait,
    Succeed,
    Fail,
    Parallel,
    Sequence,
    Machine,
    Operator,
    ChoiceRule,
}

type Constructor = fn(NodeType, Fields, Option<Arc<dyn StateSource>>) -> Result<ParsedNode, ParseError>;

struct Registration {
    node_type: NodeType,
    construct: Constructor,
}

static REGISTRY: LazyLock<AHashMap<&'static str, Registration>> = LazyLock::new(|| {
    NodeType::ALL
        .iter()
        .map(|&node_type| {
            let construct: Constructor = match node_type {
                NodeType::Sequence => Sequence::from_fields,
                NodeType::Machine => Machine::from_fields,
                NodeType::Operator => Operator::from_fields,
                NodeType::ChoiceRule => ChoiceRule::from_fields,
                _ => State::from_fields,
            };
            (
                node_type.as_str(),
                Registration {
                    node_type,
                    construct,
                },
            )
        })
        .collect()
});

impl NodeType {
    pub const ALL: [NodeType; 11] = [
        NodeType::Pass,
        NodeType::Task,
        NodeType::Choice,
        NodeType::Wait,
        NodeType::Succeed,
        NodeType::Fail,
        NodeType::Parallel,
        NodeType::Sequence,
        NodeType::Machine,
        NodeType::Operator,
        NodeType::ChoiceRule,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Pass => "Pass",
            NodeType::Task => "Task",
            NodeType::Choice => "Choice",
            NodeType::Wait => "Wait",
            NodeType::Succeed => "Succeed",
            NodeType::Fail => "Fail",
            NodeType::Parallel => "Parallel",
            NodeType::Sequence => "Sequence",
            NodeType::Machine => "Machine",
            NodeType::Operator => "Operator",
            NodeType::ChoiceRule => "ChoiceRule",
        }
    }

    /// Looks a `Type` discriminator up in the registry.
    pub fn from_tag(tag: &str) -> Result<Self, ParseError> {
        REGISTRY
            .get(tag)
            .map(|registration| registration.node_type)
            .ok_or_else(|| ParseError::UnknownType(tag.to_string()))
    }

    fn from_value(tag: &Value) -> Result<Self, ParseError> {
        match tag {
            Value::String(tag) => Self::from_tag(tag),
            other => Err(ParseError::UnknownType(other.to_string())),
        }
    }

    pub fn fields(self) -> &'static FieldTable {
        match self {
            NodeType::Pass => &fields::PASS,
            NodeType::Task => &fields::TASK,
            NodeType::Choice => &fields::CHOICE,
            NodeType::Wait => &fields::WAIT,
            NodeType::Succeed => &fields::STATE,
            NodeType::Fail => &fields::FAIL,
            NodeType::Parallel => &fields::PARALLEL,
            NodeType::Sequence => &fields::SEQUENCE,
            NodeType::Machine => &fields::MACHINE,
            NodeType::Operator | NodeType::ChoiceRule => &fields::OPERATOR,
        }
    }

    pub fn is_state(self) -> bool {
        !matches!(
            self,
            NodeType::Sequence | NodeType::Machine | NodeType::Operator | NodeType::ChoiceRule
        )
    }

    /// Whether nodes of this type carry a `name` that can be inferred from the input.
    fn is_named(self) -> bool {
        !matches!(self, NodeType::Operator | NodeType::ChoiceRule)
    }

    fn construct(
        self,
        fields: Fields,
        source: Option<Arc<dyn StateSource>>,
    ) -> Result<ParsedNode, ParseError> {
        let registration = REGISTRY
            .get(self.as_str())
            .ok_or_else(|| ParseError::UnknownType(self.as_str().to_string()))?;
        (registration.construct)(self, fields, source)
    }

    fn parse_hook(self, raw: &JsonMap, fields: &mut Fields) -> Result<(), ParseError> {
        match self {
            NodeType::Operator | NodeType::ChoiceRule => Operator::parse_hook(raw, fields),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Carries the caller's per-state visitor through a recursive compile.
#[derive(Default)]
pub struct CompileContext<'a> {
    visitor: Option<&'a mut dyn FnMut(&State, &mut JsonMap)>,
}

impl<'a> CompileContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visitor(visitor: &'a mut dyn FnMut(&State, &mut JsonMap)) -> Self {
        Self {
            visitor: Some(visitor),
        }
    }

    pub(crate) fn visit_state(&mut self, state: &State, compiled: &mut JsonMap) {
        if let Some(visitor) = &mut self.visitor {
            (*visitor)(state, compiled);
        }
    }
}

/// The compile half of the node primitive.
pub trait Node {
    fn node_type(&self) -> NodeType;

    /// Internal attribute values of this node. Nested nodes are already compiled.
    fn attributes(&self, ctx: &mut CompileContext<'_>) -> Fields;

    /// Variant-specific adjustments of the compiled mapping.
    fn compile_hook(&self, _compiled: &mut JsonMap) {}

    /// Hands the compiled mapping to the caller's visitor, if this node is visited.
    fn visit(&self, _ctx: &mut CompileContext<'_>, _compiled: &mut JsonMap) {}

    fn compile_in(&self, ctx: &mut CompileContext<'_>) -> JsonMap {
        let mut attributes = self.attributes(ctx);
        let mut compiled = JsonMap::new();
        for field in self.node_type().fields().emitted() {
            match attributes.remove(field.attr) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    compiled.insert(field.key.to_string(), value);
                }
            }
        }
        self.compile_hook(&mut compiled);
        self.visit(ctx, &mut compiled);
        compiled
    }

    fn compile(&self) -> JsonMap {
        self.compile_in(&mut CompileContext::new())
    }

    fn compile_with(&self, visitor: &mut dyn FnMut(&State, &mut JsonMap)) -> JsonMap {
        self.compile_in(&mut CompileContext::with_visitor(visitor))
    }
}

/// Anything that can be parsed into a node.
#[derive(Debug, Clone)]
pub enum Raw {
    /// A scalar name, a mapping in the external schema, or (rejected) a list.
    Json(Value),
    /// A caller-supplied object standing in for a state.
    Source(Arc<dyn StateSource>),
    /// An already parsed node.
    Node(ParsedNode),
}

impl Raw {
    pub fn source(source: impl StateSource + 'static) -> Self {
        Raw::Source(Arc::new(source))
    }
}

impl From<Value> for Raw {
    fn from(value: Value) -> Self {
        Raw::Json(value)
    }
}

impl From<&str> for Raw {
    fn from(name: &str) -> Self {
        Raw::Json(Value::String(name.to_string()))
    }
}

impl From<String> for Raw {
    fn from(name: String) -> Self {
        Raw::Json(Value::String(name))
    }
}

impl From<Arc<dyn StateSource>> for Raw {
    fn from(source: Arc<dyn StateSource>) -> Self {
        Raw::Source(source)
    }
}

impl From<ParsedNode> for Raw {
    fn from(node: ParsedNode) -> Self {
        Raw::Node(node)
    }
}

/// The polymorphic result of [`parse`].
#[derive(Debug, Clone)]
pub enum ParsedNode {
    State(State),
    Sequence(Sequence),
    Machine(Machine),
    Operator(Operator),
    ChoiceRule(ChoiceRule),
}

macro_rules! parsed_node_conversions {
    ( $( ($variant:ident, $ty:ty, $into:ident, $label:expr) ),* $(,)? ) => {
        $(
            impl From<$ty> for ParsedNode {
                fn from(node: $ty) -> Self {
                    ParsedNode::$variant(node)
                }
            }

            impl From<$ty> for Raw {
                fn from(node: $ty) -> Self {
                    Raw::Node(ParsedNode::$variant(node))
                }
            }
        )*

        impl ParsedNode {
            $(
                pub fn $into(self) -> Result<$ty, ParseError> {
                    match self {
                        ParsedNode::$variant(node) => Ok(node),
                        other => Err(ParseError::UnexpectedNode {
                            expected: $label,
                            found: other.node_type().as_str(),
                        }),
                    }
                }
            )*
        }
    };
}

parsed_node_conversions! {
    (State, State, into_state, "state"),
    (Sequence, Sequence, into_sequence, "Sequence"),
    (Machine, Machine, into_machine, "Machine"),
    (Operator, Operator, into_operator, "Operator"),
    (ChoiceRule, ChoiceRule, into_choice_rule, "ChoiceRule"),
}

impl ParsedNode {
    pub fn node_type(&self) -> NodeType {
        match self {
            ParsedNode::State(node) => node.node_type(),
            ParsedNode::Sequence(node) => node.node_type(),
            ParsedNode::Machine(node) => node.node_type(),
            ParsedNode::Operator(node) => node.node_type(),
            ParsedNode::ChoiceRule(node) => node.node_type(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            ParsedNode::State(node) => Some(&node.name),
            ParsedNode::Sequence(node) => Some(&node.name),
            ParsedNode::Machine(node) => Some(&node.name),
            ParsedNode::Operator(_) | ParsedNode::ChoiceRule(_) => None,
        }
    }

    pub fn compile(&self) -> JsonMap {
        match self {
            ParsedNode::State(node) => node.compile(),
            ParsedNode::Sequence(node) => node.compile(),
            ParsedNode::Machine(node) => node.compile(),
            ParsedNode::Operator(node) => node.compile(),
            ParsedNode::ChoiceRule(node) => node.compile(),
        }
    }
}

/// Parses `raw` into a node, applying `overrides` (internal attribute names) on top.
///
/// The variant is taken from the `Type` field of a mapping, else from an override named
/// `type`, else it defaults to `Task`. Re-parsing an existing node without overrides
/// returns it unchanged; with overrides the node is compiled and parsed again.
pub fn parse(raw: impl Into<Raw>, overrides: Fields) -> Result<ParsedNode, ParseError> {
    let mut fields = overrides;
    match raw.into() {
        Raw::Node(node) => {
            if fields.is_empty() {
                return Ok(node);
            }
            fields
                .entry("type")
                .or_insert_with(|| Value::from(node.node_type().as_str()));
            if let Some(name) = node.name() {
                fields
                    .entry("name")
                    .or_insert_with(|| Value::from(name));
            }
            parse(Value::Object(node.compile()), fields)
        }
        Raw::Json(Value::Array(_)) => Err(ParseError::InvalidShape(
            "a list is not a valid atomic node".to_string(),
        )),
        Raw::Json(Value::Object(raw)) => {
            let node_type = resolve_type(raw.get("Type"), &mut fields)?;
            if node_type.is_named() && !fields.contains_key("name") {
                if let Some(name) = ["Name", "Resource", "Comment"]
                    .iter()
                    .find_map(|key| raw.get(*key))
                {
                    fields.insert("name".to_string(), name.clone());
                }
            }
            node_type.fields().read_into(&raw, &mut fields);
            fields.remove("type");
            node_type.parse_hook(&raw, &mut fields)?;
            finish(node_type, fields, None)
        }
        Raw::Json(scalar) => {
            let node_type = resolve_type(None, &mut fields)?;
            let name = match scalar {
                Value::String(name) => name,
                other => other.to_string(),
            };
            fields
                .entry("name")
                .or_insert_with(|| Value::String(name));
            finish(node_type, fields, None)
        }
        Raw::Source(source) => {
            let node_type = resolve_type(None, &mut fields)?;
            fields
                .entry("name")
                .or_insert_with(|| Value::String(source.name()));
            finish(node_type, fields, Some(source))
        }
    }
}

fn resolve_type(discriminator: Option<&Value>, fields: &mut Fields) -> Result<NodeType, ParseError> {
    let hint = fields.remove("type");
    match (discriminator, hint) {
        (Some(tag), _) => NodeType::from_value(tag),
        (None, Some(tag)) => NodeType::from_value(&tag),
        (None, None) => Ok(NodeType::Task),
    }
}

fn finish(
    node_type: NodeType,
    mut fields: Fields,
    source: Option<Arc<dyn StateSource>>,
) -> Result<ParsedNode, ParseError> {
    if node_type.is_named() && !fields.contains_key("name") {
        fields.insert(
            "name".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
    node_type.construct(fields, source)
}

/// Builds a single-entry override set.
pub fn with_field(attr: &str, value: impl Into<Value>) -> Fields {
    let mut fields = Fields::new();
    fields.insert(attr.to_string(), value.into());
    fields
}
