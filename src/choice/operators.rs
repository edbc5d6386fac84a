use crate::error::ConditionError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::cmp::Ordering;

/// How a leaf comparison coerces the value read from the data document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Boolean,
    Numeric,
    String,
    Timestamp,
}

impl Coercion {
    fn label(self) -> &'static str {
        match self {
            Coercion::Boolean => "boolean",
            Coercion::Numeric => "number",
            Coercion::String => "string",
            Coercion::Timestamp => "timestamp",
        }
    }
}

macro_rules! define_operators {
    ( $( ($variant:ident, $name:literal, $coercion:ident, $predicate:path) ),* $(,)? ) => {
        /// Every registered choice rule operator, connectives included.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OperatorName {
            And,
            Or,
            Not,
            $( $variant, )*
        }

        impl OperatorName {
            pub const COMPARISONS: &'static [OperatorName] = &[ $( OperatorName::$variant, )* ];

            pub fn as_str(self) -> &'static str {
                match self {
                    OperatorName::And => "And",
                    OperatorName::Or => "Or",
                    OperatorName::Not => "Not",
                    $( OperatorName::$variant => $name, )*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    "And" => Some(OperatorName::And),
                    "Or" => Some(OperatorName::Or),
                    "Not" => Some(OperatorName::Not),
                    $( $name => Some(OperatorName::$variant), )*
                    _ => None,
                }
            }

            /// The coercion of a leaf comparison, `None` for connectives.
            pub fn coercion(self) -> Option<Coercion> {
                match self {
                    OperatorName::And | OperatorName::Or | OperatorName::Not => None,
                    $( OperatorName::$variant => Some(Coercion::$coercion), )*
                }
            }

            fn predicate(self) -> Option<fn(Ordering) -> bool> {
                match self {
                    OperatorName::And | OperatorName::Or | OperatorName::Not => None,
                    $( OperatorName::$variant => Some($predicate as fn(Ordering) -> bool), )*
                }
            }
        }
    };
}

define_operators! {
    (BooleanEquals, "BooleanEquals", Boolean, Ordering::is_eq),

    (NumericEquals, "NumericEquals", Numeric, Ordering::is_eq),
    (NumericGreaterThan, "NumericGreaterThan", Numeric, Ordering::is_gt),
    (NumericGreaterThanEquals, "NumericGreaterThanEquals", Numeric, Ordering::is_ge),
    (NumericLessThan, "NumericLessThan", Numeric, Ordering::is_lt),
    (NumericLessThanEquals, "NumericLessThanEquals", Numeric, Ordering::is_le),

    (StringEquals, "StringEquals", String, Ordering::is_eq),
    (StringGreaterThan, "StringGreaterThan", String, Ordering::is_gt),
    (StringGreaterThanEquals, "StringGreaterThanEquals", String, Ordering::is_ge),
    (StringLessThan, "StringLessThan", String, Ordering::is_lt),
    (StringLessThanEquals, "StringLessThanEquals", String, Ordering::is_le),

    (TimestampEquals, "TimestampEquals", Timestamp, Ordering::is_eq),
    (TimestampGreaterThan, "TimestampGreaterThan", Timestamp, Ordering::is_gt),
    (TimestampGreaterThanEquals, "TimestampGreaterThanEquals", Timestamp, Ordering::is_ge),
    (TimestampLessThan, "TimestampLessThan", Timestamp, Ordering::is_lt),
    (TimestampLessThanEquals, "TimestampLessThanEquals", Timestamp, Ordering::is_le),
}

impl OperatorName {
    pub fn is_connective(self) -> bool {
        self.coercion().is_none()
    }

    /// Applies a leaf comparison: `value` (read from the data) is coerced and compared
    /// against the rule's `operand`. Connectives never compare and always yield `false`.
    pub fn compare(self, operand: &Value, value: &Value) -> Result<bool, ConditionError> {
        let (Some(coercion), Some(predicate)) = (self.coercion(), self.predicate()) else {
            return Ok(false);
        };
        let operator = self.as_str();

        let ordering = match coercion {
            Coercion::Boolean => {
                let expected = operand
                    .as_bool()
                    .ok_or_else(|| operand_error(operator, coercion, operand))?;
                Some(truthy(value).cmp(&expected))
            }
            Coercion::Numeric => {
                let expected = match operand {
                    Value::Number(_) => to_numeric(operand),
                    _ => None,
                }
                .ok_or_else(|| operand_error(operator, coercion, operand))?;
                let actual = to_numeric(value).ok_or_else(|| coercion_error(operator, coercion, value))?;
                actual.partial_cmp(&expected)
            }
            Coercion::String => {
                let expected = operand
                    .as_str()
                    .ok_or_else(|| operand_error(operator, coercion, operand))?;
                Some(to_string(value).as_str().cmp(expected))
            }
            Coercion::Timestamp => {
                let expected = operand
                    .as_str()
                    .and_then(to_timestamp)
                    .ok_or_else(|| operand_error(operator, coercion, operand))?;
                let actual = value
                    .as_str()
                    .and_then(to_timestamp)
                    .ok_or_else(|| coercion_error(operator, coercion, value))?;
                Some(actual.cmp(&expected))
            }
        };

        Ok(ordering.is_some_and(predicate))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Numeric {
    Int(i64),
    Float(f64),
}

impl PartialOrd for Numeric {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => Some(a.cmp(b)),
            (Numeric::Int(a), Numeric::Float(b)) => (*a as f64).partial_cmp(b),
            (Numeric::Float(a), Numeric::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Numeric::Float(a), Numeric::Float(b)) => a.partial_cmp(b),
        }
    }
}

/// Integer first, floating point as fallback. Numeric strings are accepted.
fn to_numeric(value: &Value) -> Option<Numeric> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Numeric::Int)
            .or_else(|| n.as_f64().map(Numeric::Float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Numeric::Int)
                .or_else(|_| s.parse::<f64>().map(Numeric::Float))
                .ok()
        }
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Canonical fixed-width UTC form, so lexicographic order is chronological order.
/// Inputs without an offset are taken as UTC.
pub fn to_timestamp(raw: &str) -> Option<String> {
    let utc = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc()))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })?;
    Some(utc.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

fn operand_error(operator: &'static str, coercion: Coercion, found: &Value) -> ConditionError {
    ConditionError::Operand {
        operator,
        expected: coercion.label(),
        found: found.clone(),
    }
}

fn coercion_error(operator: &'static str, coercion: Coercion, found: &Value) -> ConditionError {
    ConditionError::Coercion {
        operator,
        expected: coercion.label(),
        found: found.clone(),
    }
}
