//! Rooted path queries over a JSON data document.
//!
//! Paths follow the JSONPath grammar of RFC 9535 and are evaluated by `jsonpath-rust`.
//! Writes are narrower: every segment must name a single object key or a non-negative
//! array index, so the target and its parent are both definite.

use crate::error::PathError;
use jsonpath_rust::parser::model::{JpQuery, Segment, Selector};
use jsonpath_rust::parser::parse_json_path;
use jsonpath_rust::query::js_path_process;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One step of a writable path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Key(String),
    Index(usize),
}

/// A parsed path query.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    raw: String,
    query: JpQuery,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let raw = path.trim();
        let query = parse_json_path(raw).map_err(|err| PathError::Syntax {
            path: raw.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            query,
        })
    }

    /// `true` for the bare root selector `$`.
    pub fn is_root(&self) -> bool {
        self.query.segments.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The key and index steps of this path, or `None` when any segment can select
    /// more than one value.
    pub fn steps(&self) -> Option<Vec<Step>> {
        self.query.segments.iter().map(step).collect()
    }

    /// All values matched by this path, in document order.
    pub fn find<'a>(&self, doc: &'a Value) -> Result<Vec<&'a Value>, PathError> {
        let found = js_path_process(&self.query, doc).map_err(|err| PathError::Evaluation {
            path: self.raw.clone(),
            message: err.to_string(),
        })?;
        Ok(found.into_iter().map(|hit| hit.val()).collect())
    }

    /// The first match. Zero matches is an error.
    pub fn first<'a>(&self, doc: &'a Value) -> Result<&'a Value, PathError> {
        self.find(doc)?
            .into_iter()
            .next()
            .ok_or_else(|| PathError::NoMatch(self.raw.clone()))
    }

    /// The only match. Zero or several matches are errors.
    pub fn single<'a>(&self, doc: &'a Value) -> Result<&'a Value, PathError> {
        let mut matches = self.find(doc)?;
        match matches.len() {
            0 => Err(PathError::NoMatch(self.raw.clone())),
            1 => Ok(matches.remove(0)),
            count => Err(PathError::Ambiguous {
                path: self.raw.clone(),
                count,
            }),
        }
    }

    /// Writes `value` at this path.
    ///
    /// The root selector replaces the whole document. An existing target is updated in place;
    /// a missing object key is created on its parent, which must already exist.
    pub fn set(&self, doc: &mut Value, value: Value) -> Result<(), PathError> {
        let steps = self
            .steps()
            .ok_or_else(|| PathError::NotDefinite(self.raw.clone()))?;
        let Some((last, parents)) = steps.split_last() else {
            *doc = value;
            return Ok(());
        };

        let parent = JpQuery::new(self.query.segments[..parents.len()].to_vec());
        let missing = || PathError::NoMatch(render(parents));
        if !js_path_process(&parent, &*doc).is_ok_and(|found| !found.is_empty()) {
            return Err(missing());
        }
        let target = doc.pointer_mut(&pointer(parents)).ok_or_else(missing)?;

        match (last, target) {
            (Step::Key(key), Value::Object(map)) => {
                map.insert(key.clone(), value);
                Ok(())
            }
            (Step::Index(index), Value::Array(items)) => match items.get_mut(*index) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(PathError::NoMatch(self.raw.clone())),
            },
            _ => Err(PathError::NotAContainer(self.raw.clone())),
        }
    }
}

fn step(segment: &Segment) -> Option<Step> {
    match segment {
        Segment::Selector(Selector::Name(name)) => Some(Step::Key(unquote(name).to_string())),
        Segment::Selector(Selector::Index(index)) => usize::try_from(*index).ok().map(Step::Index),
        _ => None,
    }
}

/// Bracketed names keep their quotes after parsing.
fn unquote(name: &str) -> &str {
    ['\'', '"']
        .into_iter()
        .find_map(|quote| name.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(name)
}

/// An RFC 6901 pointer addressing `steps`.
fn pointer(steps: &[Step]) -> String {
    steps
        .iter()
        .map(|step| match step {
            Step::Key(key) => format!("/{}", key.replace('~', "~0").replace('/', "~1")),
            Step::Index(index) => format!("/{}", index),
        })
        .collect()
}

fn render(steps: &[Step]) -> String {
    let mut out = String::from("$");
    for step in steps {
        match step {
            Step::Key(key) => {
                out.push('.');
                out.push_str(key);
            }
            Step::Index(index) => out.push_str(&format!("[{}]", index)),
        }
    }
    out
}

impl FromStr for JsonPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
