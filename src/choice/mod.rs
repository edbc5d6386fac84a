//! Branching conditions of Choice states.
//!
//! A rule is either a leaf comparison (`Variable` + one comparison operator) or a connective
//! (`And`, `Or`, `Not`) over nested rules. Leaves read their variable from the data document
//! through a [`JsonPath`] and take the first match.

use crate::error::{ConditionError, ConstructionCause, ParseError};
use crate::node::{self, CompileContext, FieldReader, Fields, JsonMap, Node, NodeType, ParsedNode, Raw};
use crate::path::JsonPath;
use crate::states::StateSource;
use serde_json::Value;
use std::sync::Arc;

pub mod operators;

pub use operators::{Coercion, OperatorName};

/// The right-hand side of an operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Literal compared against by a leaf comparison.
    Scalar(Value),
    /// The single child of `Not`.
    Rule(Box<Operator>),
    /// The children of `And` / `Or`, in declared order.
    Rules(Vec<Operator>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub name: OperatorName,
    pub variable: Option<String>,
    pub value: Operand,
    pub next: Option<String>,
}

impl Operator {
    /// A leaf comparison.
    pub fn compare(name: OperatorName, variable: impl Into<String>, operand: impl Into<Value>) -> Self {
        Self {
            name,
            variable: Some(variable.into()),
            value: Operand::Scalar(operand.into()),
            next: None,
        }
    }

    pub fn and(rules: Vec<Operator>) -> Self {
        Self::connective(OperatorName::And, Operand::Rules(rules))
    }

    pub fn or(rules: Vec<Operator>) -> Self {
        Self::connective(OperatorName::Or, Operand::Rules(rules))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(rule: Operator) -> Self {
        Self::connective(OperatorName::Not, Operand::Rule(Box::new(rule)))
    }

    fn connective(name: OperatorName, value: Operand) -> Self {
        Self {
            name,
            variable: None,
            value,
            next: None,
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn parse(raw: impl Into<Raw>) -> Result<Self, ParseError> {
        node::parse(raw, node::with_field("type", NodeType::Operator.as_str()))?.into_operator()
    }

    /// Evaluates this rule against `data`.
    pub fn matches(&self, data: &Value) -> Result<bool, ConditionError> {
        match (self.name, &self.value) {
            (OperatorName::Not, Operand::Rule(rule)) => Ok(!rule.matches(data)?),
            (OperatorName::Or, Operand::Rules(rules)) => {
                for rule in rules {
                    if rule.matches(data)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            (OperatorName::And, Operand::Rules(rules)) => {
                for rule in rules {
                    if !rule.matches(data)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (name, Operand::Scalar(operand)) if !name.is_connective() => {
                let variable = self
                    .variable
                    .as_deref()
                    .ok_or(ConditionError::MissingVariable(name.as_str()))?;
                let value = JsonPath::parse(variable)?.first(data)?;
                name.compare(operand, value)
            }
            (name, _) => Err(ConditionError::MalformedRule(name.as_str())),
        }
    }

    /// Moves the single operator key of a raw rule into the `name` / `value` attributes.
    pub(crate) fn parse_hook(raw: &JsonMap, fields: &mut Fields) -> Result<(), ParseError> {
        let mut found = None;
        for (key, value) in raw {
            if matches!(key.as_str(), "Variable" | "Next" | "Type") {
                continue;
            }
            if found.is_some() {
                return Err(ParseError::Construction {
                    node_type: NodeType::Operator.as_str(),
                    cause: ConstructionCause::UnexpectedField(key.clone()),
                });
            }
            if OperatorName::from_name(key).is_none() {
                return Err(ParseError::UnknownOperator(key.clone()));
            }
            found = Some((key, value));
        }

        if let Some((key, value)) = found {
            fields.insert("name".to_string(), Value::String(key.clone()));
            fields.insert("value".to_string(), value.clone());
        }
        Ok(())
    }

    pub(crate) fn from_fields(
        node_type: NodeType,
        fields: Fields,
        _source: Option<Arc<dyn StateSource>>,
    ) -> Result<ParsedNode, ParseError> {
        let mut reader = FieldReader::new(node_type, fields)?;
        Self::build(&mut reader).map(ParsedNode::Operator)
    }

    fn build(reader: &mut FieldReader) -> Result<Self, ParseError> {
        let tag: String = reader.require("name")?;
        let name = OperatorName::from_name(&tag).ok_or(ParseError::UnknownOperator(tag))?;

        let value = match name {
            OperatorName::And | OperatorName::Or => {
                let rules = reader
                    .require::<Vec<Value>>("value")?
                    .into_iter()
                    .map(Operator::parse)
                    .collect::<Result<_, _>>()?;
                Operand::Rules(rules)
            }
            OperatorName::Not => {
                let rule = reader.take_value("value").ok_or_else(|| reader.missing("value"))?;
                Operand::Rule(Box::new(Operator::parse(rule)?))
            }
            _ => Operand::Scalar(reader.take_value("value").ok_or_else(|| reader.missing("value"))?),
        };

        Ok(Self {
            name,
            variable: reader.take("variable")?,
            value,
            next: reader.take("next")?,
        })
    }

    fn operand(&self) -> Value {
        match &self.value {
            Operand::Scalar(value) => value.clone(),
            Operand::Rule(rule) => Value::Object(rule.compile()),
            Operand::Rules(rules) => rules.iter().map(|rule| Value::Object(rule.compile())).collect(),
        }
    }
}

impl Node for Operator {
    fn node_type(&self) -> NodeType {
        NodeType::Operator
    }

    fn attributes(&self, _ctx: &mut CompileContext<'_>) -> Fields {
        let mut attributes = Fields::new();
        if let Some(variable) = &self.variable {
            attributes.insert("variable".to_string(), Value::from(variable.as_str()));
        }
        if let Some(next) = &self.next {
            attributes.insert("next".to_string(), Value::from(next.as_str()));
        }
        attributes
    }

    fn compile_hook(&self, compiled: &mut JsonMap) {
        compiled.insert(self.name.as_str().to_string(), self.operand());
    }
}

/// One entry of a Choice state's `Choices` list.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceRule {
    pub operator: Operator,
}

impl ChoiceRule {
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    pub fn parse(raw: impl Into<Raw>) -> Result<Self, ParseError> {
        node::parse(raw, node::with_field("type", NodeType::ChoiceRule.as_str()))?.into_choice_rule()
    }

    pub fn next(&self) -> Option<&str> {
        self.operator.next.as_deref()
    }

    pub fn matches(&self, data: &Value) -> Result<bool, ConditionError> {
        self.operator.matches(data)
    }

    pub(crate) fn from_fields(
        node_type: NodeType,
        fields: Fields,
        _source: Option<Arc<dyn StateSource>>,
    ) -> Result<ParsedNode, ParseError> {
        let mut reader = FieldReader::new(node_type, fields)?;
        Operator::build(&mut reader).map(|operator| ParsedNode::ChoiceRule(Self { operator }))
    }
}

impl Node for ChoiceRule {
    fn node_type(&self) -> NodeType {
        NodeType::ChoiceRule
    }

    fn attributes(&self, ctx: &mut CompileContext<'_>) -> Fields {
        self.operator.attributes(ctx)
    }

    fn compile_hook(&self, compiled: &mut JsonMap) {
        self.operator.compile_hook(compiled);
    }
}
