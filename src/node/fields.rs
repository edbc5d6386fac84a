use super::NodeType;
use crate::error::{ConstructionCause, ParseError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Internal attribute values keyed by attribute name.
pub type Fields = Map<String, Value>;

/// A compiled, external-schema mapping keyed by field name.
pub type JsonMap = Map<String, Value>;

/// One row of a field table: internal attribute name and its external field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub attr: &'static str,
    pub key: &'static str,
}

const fn field(attr: &'static str, key: &'static str) -> Field {
    Field { attr, key }
}

/// Flattened bidirectional field table of one node variant.
///
/// `emitted` rows are read on parse and written on compile. `aliases` are read only.
/// `internal` attributes have no external field and are filled by parse hooks.
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    emitted: Vec<Field>,
    aliases: Vec<Field>,
    internal: Vec<&'static str>,
}

impl FieldTable {
    /// Composes `own` onto this table. A row of `own` replaces the inherited row
    /// with the same attribute.
    pub fn extend(&self, own: &[Field]) -> Self {
        let mut table = self.clone();
        for row in own {
            match table.emitted.iter_mut().find(|f| f.attr == row.attr) {
                Some(existing) => *existing = *row,
                None => table.emitted.push(*row),
            }
        }
        table
    }

    pub fn with_aliases(mut self, aliases: &[Field]) -> Self {
        self.aliases.extend_from_slice(aliases);
        self
    }

    pub fn with_internal(mut self, attrs: &[&'static str]) -> Self {
        self.internal.extend_from_slice(attrs);
        self
    }

    pub fn emitted(&self) -> &[Field] {
        &self.emitted
    }

    pub fn key_for(&self, attr: &str) -> Option<&'static str> {
        self.emitted.iter().find(|f| f.attr == attr).map(|f| f.key)
    }

    pub fn attr_for(&self, key: &str) -> Option<&'static str> {
        self.emitted
            .iter()
            .chain(&self.aliases)
            .find(|f| f.key == key)
            .map(|f| f.attr)
    }

    pub fn accepts(&self, attr: &str) -> bool {
        self.emitted
            .iter()
            .chain(&self.aliases)
            .any(|f| f.attr == attr)
            || self.internal.contains(&attr)
    }

    /// Copies every recognised external field of `raw` into `fields`.
    /// Values already present in `fields` are kept.
    pub fn read_into(&self, raw: &JsonMap, fields: &mut Fields) {
        for row in self.emitted.iter().chain(&self.aliases) {
            if let Some(value) = raw.get(row.key) {
                fields
                    .entry(row.attr.to_string())
                    .or_insert_with(|| value.clone());
            }
        }
    }
}

static NODE: LazyLock<FieldTable> = LazyLock::new(FieldTable::default);

pub(super) static STATE: LazyLock<FieldTable> = LazyLock::new(|| {
    NODE.extend(&[
        field("type", "Type"),
        field("comment", "Comment"),
        field("next", "Next"),
        field("end", "End"),
        field("resource", "Resource"),
        field("input_path", "InputPath"),
        field("output_path", "OutputPath"),
        field("result_path", "ResultPath"),
    ])
    .with_aliases(&[field("name", "Name")])
});

pub(super) static PASS: LazyLock<FieldTable> =
    LazyLock::new(|| STATE.extend(&[field("result", "Result")]));

pub(super) static TASK: LazyLock<FieldTable> = LazyLock::new(|| {
    PASS.extend(&[
        field("retry", "Retry"),
        field("catch", "Catch"),
        field("timeout_seconds", "TimeoutSeconds"),
        field("heartbeat_seconds", "HeartbeatSeconds"),
    ])
});

pub(super) static CHOICE: LazyLock<FieldTable> = LazyLock::new(|| {
    STATE.extend(&[field("choices", "Choices"), field("default", "Default")])
});

pub(super) static WAIT: LazyLock<FieldTable> = LazyLock::new(|| {
    STATE.extend(&[
        field("seconds", "Seconds"),
        field("seconds_path", "SecondsPath"),
        field("timestamp", "Timestamp"),
        field("timestamp_path", "TimestampPath"),
    ])
});

pub(super) static FAIL: LazyLock<FieldTable> =
    LazyLock::new(|| STATE.extend(&[field("error", "Error"), field("cause", "Cause")]));

pub(super) static PARALLEL: LazyLock<FieldTable> =
    LazyLock::new(|| TASK.extend(&[field("branches", "Branches")]));

pub(super) static SEQUENCE: LazyLock<FieldTable> = LazyLock::new(|| {
    NODE.extend(&[
        field("type", "Type"),
        field("comment", "Comment"),
        field("start_at", "StartAt"),
        field("states", "States"),
    ])
    .with_aliases(&[field("name", "Name")])
});

pub(super) static MACHINE: LazyLock<FieldTable> = LazyLock::new(|| {
    SEQUENCE.extend(&[
        field("version", "Version"),
        field("timeout_seconds", "TimeoutSeconds"),
    ])
});

pub(super) static OPERATOR: LazyLock<FieldTable> = LazyLock::new(|| {
    NODE.extend(&[field("variable", "Variable"), field("next", "Next")])
        .with_internal(&["name", "value"])
});

/// Consumes a field set while constructing one node variant.
pub(crate) struct FieldReader {
    node_type: NodeType,
    fields: Fields,
}

impl FieldReader {
    /// Rejects any attribute the variant's table does not declare.
    pub(crate) fn new(node_type: NodeType, fields: Fields) -> Result<Self, ParseError> {
        let table = node_type.fields();
        if let Some(unknown) = fields.keys().find(|attr| !table.accepts(attr)) {
            return Err(ParseError::Construction {
                node_type: node_type.as_str(),
                cause: ConstructionCause::UnexpectedField(unknown.clone()),
            });
        }
        Ok(Self { node_type, fields })
    }

    /// Takes an attribute, treating `null` as unset.
    pub(crate) fn take<T: DeserializeOwned>(&mut self, attr: &str) -> Result<Option<T>, ParseError> {
        match self.take_value(attr) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|source| {
                ParseError::Construction {
                    node_type: self.node_type.as_str(),
                    cause: ConstructionCause::InvalidValue {
                        field: attr.to_string(),
                        source,
                    },
                }
            }),
        }
    }

    pub(crate) fn take_value(&mut self, attr: &str) -> Option<Value> {
        self.fields.remove(attr).filter(|value| !value.is_null())
    }

    pub(crate) fn require<T: DeserializeOwned>(&mut self, attr: &'static str) -> Result<T, ParseError> {
        self.take(attr)?.ok_or_else(|| self.missing(attr))
    }

    pub(crate) fn missing(&self, attr: &'static str) -> ParseError {
        ParseError::Construction {
            node_type: self.node_type.as_str(),
            cause: ConstructionCause::MissingField(attr),
        }
    }
}
