//! Per-element resolution outcomes, keyed by source range.

use std::collections::BTreeMap;

use dcl_language::SourceData;
use serde::{Serialize, Serializer};

use super::resolver::{AssignmentRecord, ObjectOrigin, ResolutionError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TraceResult<T> {
    Resolved { result: T },
    Errors { errors: Vec<ResolutionError> },
}

impl<T> TraceResult<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, TraceResult::Resolved { .. })
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            TraceResult::Resolved { result } => Some(result),
            TraceResult::Errors { .. } => None,
        }
    }
}

impl<T: Clone> From<&Result<T, Vec<ResolutionError>>> for TraceResult<T> {
    fn from(result: &Result<T, Vec<ResolutionError>>) -> Self {
        match result {
            Ok(result) => TraceResult::Resolved {
                result: result.clone(),
            },
            Err(errors) => TraceResult::Errors {
                errors: errors.clone(),
            },
        }
    }
}

type SourceKey = (usize, usize);

fn key(source: &SourceData) -> SourceKey {
    (source.start, source.end)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionTrace {
    #[serde(serialize_with = "as_entries")]
    assignments: BTreeMap<SourceKey, TraceResult<AssignmentRecord>>,
    #[serde(serialize_with = "as_entries")]
    expressions: BTreeMap<SourceKey, TraceResult<ObjectOrigin>>,
}

impl ResolutionTrace {
    pub(crate) fn record_assignment(&mut self, source: &SourceData, result: &Result<AssignmentRecord, Vec<ResolutionError>>) {
        self.assignments.insert(key(source), result.into());
    }

    pub(crate) fn record_expression(&mut self, source: &SourceData, result: &Result<ObjectOrigin, Vec<ResolutionError>>) {
        self.expressions.insert(key(source), result.into());
    }

    pub fn assignment(&self, source: &SourceData) -> Option<&TraceResult<AssignmentRecord>> {
        self.assignments.get(&key(source))
    }

    pub fn expression(&self, source: &SourceData) -> Option<&TraceResult<ObjectOrigin>> {
        self.expressions.get(&key(source))
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.expressions.is_empty()
    }
}

#[derive(Serialize)]
struct TraceEntry<'a, T> {
    range: [usize; 2],
    #[serde(flatten)]
    result: &'a TraceResult<T>,
}

fn as_entries<T, S>(map: &BTreeMap<SourceKey, TraceResult<T>>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    serializer.collect_seq(map.iter().map(|(&(start, end), result)| TraceEntry {
        range: [start, end],
        result,
    }))
}
