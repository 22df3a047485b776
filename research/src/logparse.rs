//! Recovers structured records from logged runs.
//!
//! Each line of a log holds one run as a Python literal mapping, e.g.
//! `{'query': 'tell me about sharks', 'output': '{"topic": "Sharks", ...}'}`.
//! The `output` value is JSON text. Lines are decoded independently and a bad
//! line is reported and skipped without affecting the rest.

use crate::literal;
use serde_json::{Map, Value};
use tracing::{error, warn};

/// The decoded `output` object with the run's `query` added last.
pub type NormalizedRecord = Map<String, Value>;

const EXCERPT_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    /// The line is not a literal mapping.
    Outer(String),
    /// `query` or `output` is absent or empty.
    MissingField(&'static str),
    /// `output` is not a JSON object.
    Inner(String),
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueKind::Outer(reason) => write!(f, "invalid entry: {}", reason),
            IssueKind::MissingField(field) => write!(f, "missing '{}'", field),
            IssueKind::Inner(reason) => write!(f, "invalid output: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineIssue {
    /// 1-based line number in the blob.
    pub line: usize,
    pub excerpt: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Recovery {
    pub records: Vec<NormalizedRecord>,
    pub issues: Vec<LineIssue>,
}

pub fn parse_log(blob: &str) -> Recovery {
    let mut recovery = Recovery::default();

    for (idx, line) in blob.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_entry(line) {
            Ok(record) => recovery.records.push(record),
            Err(kind) => {
                let issue = LineIssue {
                    line: idx + 1,
                    excerpt: line.chars().take(EXCERPT_LEN).collect(),
                    kind,
                };
                match issue.kind {
                    IssueKind::MissingField(_) => warn!(
                        line = issue.line,
                        excerpt = %issue.excerpt,
                        "skipping log entry: {}",
                        issue.kind
                    ),
                    _ => error!(
                        line = issue.line,
                        excerpt = %issue.excerpt,
                        "failed to parse log entry: {}",
                        issue.kind
                    ),
                }
                recovery.issues.push(issue);
            }
        }
    }

    recovery
}

fn parse_entry(line: &str) -> Result<NormalizedRecord, IssueKind> {
    let outer = match literal::parse(line) {
        Ok(Value::Object(outer)) => outer,
        Ok(_) => return Err(IssueKind::Outer("entry is not a mapping".to_string())),
        Err(e) => return Err(IssueKind::Outer(e.to_string())),
    };

    let query = present(&outer, "query")?;
    let output = present(&outer, "output")?;

    let Value::String(output) = output else {
        return Err(IssueKind::Inner("output is not a string".to_string()));
    };
    let inner = match serde_json::from_str::<Value>(output) {
        Ok(Value::Object(inner)) => inner,
        Ok(_) => return Err(IssueKind::Inner("output is not a JSON object".to_string())),
        Err(e) => return Err(IssueKind::Inner(e.to_string())),
    };

    let mut record: NormalizedRecord = inner
        .into_iter()
        .filter(|(key, _)| key != "query")
        .collect();
    record.insert("query".to_string(), query.clone());
    Ok(record)
}

/// Looks up `field`, treating Python-falsy values as absent.
fn present<'a>(map: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, IssueKind> {
    let value = match map.get(field) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::Array(a)) if a.is_empty() => None,
        Some(Value::Object(o)) if o.is_empty() => None,
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => None,
        Some(value) => Some(value),
    };
    value.ok_or(IssueKind::MissingField(field))
}
