//! Extension points run by the step runner after resolution.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use dcl_language::SourceData;
use serde::{Deserialize, Serialize};

use super::resolver::{AssignmentRecord, ObjectOrigin, ResolutionResult};
use super::trace::{ResolutionTrace, TraceResult};
use crate::dom::{Document, DocumentNode, NodeId};

/// Tag naming an optional analysis feature. Checks only run when their
/// feature is requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepFeature(pub String);

impl StepFeature {
    pub const SINGLE_BLOCKS: &'static str = "single-blocks";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for StepFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rewrites a resolution result before documents are checked and assignments
/// traced.
pub trait ResolutionResultPostprocessor {
    fn process(&self, result: ResolutionResult) -> ResolutionResult;
}

pub trait DocumentCheck {
    fn feature(&self) -> StepFeature;

    fn detect(&self, document: &ResolvedDocument<'_>) -> Vec<DocumentCheckFailure>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentCheckFailure {
    pub check: StepFeature,
    pub location: SourceData,
    pub reason: DocumentCheckFailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DocumentCheckFailureReason {
    UnexpectedBlock { name: String },
}

impl fmt::Display for DocumentCheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            DocumentCheckFailureReason::UnexpectedBlock { name } => {
                write!(f, "{}: unexpected block `{name}`, only one is allowed", self.location)
            }
        }
    }
}

/// How a document node was resolved.
#[derive(Debug, Clone, Copy)]
pub enum NodeResolution<'d> {
    Element(&'d TraceResult<ObjectOrigin>),
    Property(&'d TraceResult<AssignmentRecord>),
    Error,
    NotTraced,
}

/// A document together with the resolution trace of the tree it came from.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDocument<'d> {
    pub document: &'d Document,
    trace: &'d ResolutionTrace,
}

impl<'d> ResolvedDocument<'d> {
    pub fn new(document: &'d Document, trace: &'d ResolutionTrace) -> Self {
        Self { document, trace }
    }

    pub fn resolution_of(&self, id: NodeId) -> NodeResolution<'d> {
        let lookup = match self.document.node(id) {
            DocumentNode::Element(element) => self.trace.expression(&element.source).map(NodeResolution::Element),
            DocumentNode::Property(property) => self.trace.assignment(&property.source).map(NodeResolution::Property),
            DocumentNode::Error(_) => Some(NodeResolution::Error),
        };
        lookup.unwrap_or(NodeResolution::NotTraced)
    }

    pub fn is_resolved(&self, id: NodeId) -> bool {
        match self.resolution_of(id) {
            NodeResolution::Element(result) => result.is_resolved(),
            NodeResolution::Property(result) => result.is_resolved(),
            NodeResolution::Error | NodeResolution::NotTraced => false,
        }
    }
}

/// Reports every top-level block of a configured kind after the first one.
/// Blocks that failed to resolve are already reported and are not counted.
#[derive(Debug, Clone, Default)]
pub struct SingleBlockCheck {
    block_names: BTreeSet<String>,
}

impl SingleBlockCheck {
    pub fn new<I, S>(block_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            block_names: block_names.into_iter().map(Into::into).collect(),
        }
    }
}

impl DocumentCheck for SingleBlockCheck {
    fn feature(&self) -> StepFeature {
        StepFeature::new(StepFeature::SINGLE_BLOCKS)
    }

    fn detect(&self, document: &ResolvedDocument<'_>) -> Vec<DocumentCheckFailure> {
        let mut seen = HashSet::new();
        let mut failures = Vec::new();
        for (id, node) in document.document.top_level_nodes() {
            let DocumentNode::Element(element) = node else {
                continue;
            };
            if !self.block_names.contains(&element.name) || !document.is_resolved(id) {
                continue;
            }
            if !seen.insert(element.name.as_str()) {
                failures.push(DocumentCheckFailure {
                    check: self.feature(),
                    location: element.source.clone(),
                    reason: DocumentCheckFailureReason::UnexpectedBlock {
                        name: element.name.clone(),
                    },
                });
            }
        }
        failures
    }
}
