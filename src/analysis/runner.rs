//! Analysis step: parse, resolve, post-process, build the document, run
//! checks and trace assignments, collecting failures from every stage.

use std::collections::BTreeSet;

use dcl_language::{parse, FailingResult, LanguageTreeResult, SourceIdentifier};
use serde::Serialize;

use super::assignments::{trace_assignments, AssignmentTrace, AssignmentTraceElement};
use super::checks::{
    DocumentCheck, DocumentCheckFailure, ResolutionResultPostprocessor, ResolvedDocument, StepFeature,
};
use super::resolver::{resolve, ResolutionError, ResolutionResult};
use super::schema::AnalysisSchema;
use super::trace::ResolutionTrace;
use crate::dom::{convert_block_to_document, Document};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageFailure {
    NoSchemaAvailable,
    NoParseResult,
    FailuresInLanguageTree { failures: Vec<FailingResult> },
    FailuresInResolution { errors: Vec<ResolutionError> },
    DocumentCheckFailures { failures: Vec<DocumentCheckFailure> },
    AssignmentErrors { usages: Vec<AssignmentTraceElement> },
}

impl StageFailure {
    pub fn name(&self) -> &'static str {
        match self {
            StageFailure::NoSchemaAvailable => "no_schema_available",
            StageFailure::NoParseResult => "no_parse_result",
            StageFailure::FailuresInLanguageTree { .. } => "failures_in_language_tree",
            StageFailure::FailuresInResolution { .. } => "failures_in_resolution",
            StageFailure::DocumentCheckFailures { .. } => "document_check_failures",
            StageFailure::AssignmentErrors { .. } => "assignment_errors",
        }
    }
}

/// Everything the step managed to compute. Stages that could not run leave
/// their slot empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisStepResult {
    pub language_tree: Option<LanguageTreeResult>,
    pub resolution_result: Option<ResolutionResult>,
    pub resolution_trace: Option<ResolutionTrace>,
    pub document: Option<Document>,
    pub assignment_trace: Option<AssignmentTrace>,
    pub check_failures: Vec<DocumentCheckFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepResult {
    Evaluated {
        result: AnalysisStepResult,
    },
    NotEvaluated {
        stage_failures: Vec<StageFailure>,
        partial_result: AnalysisStepResult,
    },
}

impl StepResult {
    pub fn is_evaluated(&self) -> bool {
        matches!(self, StepResult::Evaluated { .. })
    }

    pub fn stage_failures(&self) -> &[StageFailure] {
        match self {
            StepResult::Evaluated { .. } => &[],
            StepResult::NotEvaluated { stage_failures, .. } => stage_failures,
        }
    }

    /// The full result when evaluated, the partial one otherwise.
    pub fn result(&self) -> &AnalysisStepResult {
        match self {
            StepResult::Evaluated { result } => result,
            StepResult::NotEvaluated { partial_result, .. } => partial_result,
        }
    }
}

#[derive(Default)]
pub struct AnalysisStepRunner {
    schema: Option<AnalysisSchema>,
    postprocessors: Vec<Box<dyn ResolutionResultPostprocessor>>,
    checks: Vec<Box<dyn DocumentCheck>>,
    features: BTreeSet<StepFeature>,
}

impl AnalysisStepRunner {
    pub fn new(schema: Option<AnalysisSchema>) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    pub fn with_postprocessor(mut self, postprocessor: impl ResolutionResultPostprocessor + 'static) -> Self {
        self.postprocessors.push(Box::new(postprocessor));
        self
    }

    pub fn with_check(mut self, check: impl DocumentCheck + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    pub fn with_feature(mut self, feature: StepFeature) -> Self {
        self.features.insert(feature);
        self
    }

    pub fn run_on_text(&self, identifier: &str, text: &str) -> StepResult {
        self.run_on_tree(Some(parse(SourceIdentifier::new(identifier), text)))
    }

    pub fn run_on_tree(&self, tree: Option<LanguageTreeResult>) -> StepResult {
        let mut failures = Vec::new();
        let mut partial = AnalysisStepResult::default();

        if self.schema.is_none() {
            failures.push(StageFailure::NoSchemaAvailable);
        }
        let Some(tree) = tree else {
            failures.push(StageFailure::NoParseResult);
            return finish(failures, partial);
        };

        let tree_failures: Vec<FailingResult> = tree.all_failures().into_iter().cloned().collect();
        if !tree_failures.is_empty() {
            failures.push(StageFailure::FailuresInLanguageTree {
                failures: tree_failures,
            });
        }

        let document = convert_block_to_document(&tree.top_level_block).document;

        if let Some(schema) = &self.schema {
            let (resolution, trace) = resolve(schema, &tree);
            if !resolution.errors.is_empty() {
                failures.push(StageFailure::FailuresInResolution {
                    errors: resolution.errors.clone(),
                });
            }
            let resolution = self
                .postprocessors
                .iter()
                .fold(resolution, |result, postprocessor| postprocessor.process(result));

            let resolved = ResolvedDocument::new(&document, &trace);
            let check_failures: Vec<DocumentCheckFailure> = self
                .checks
                .iter()
                .filter(|check| self.features.contains(&check.feature()))
                .flat_map(|check| check.detect(&resolved))
                .collect();
            if !check_failures.is_empty() {
                failures.push(StageFailure::DocumentCheckFailures {
                    failures: check_failures.clone(),
                });
            }

            let assignment_trace = trace_assignments(&resolution);
            let usages: Vec<AssignmentTraceElement> = assignment_trace.failures().cloned().collect();
            if !usages.is_empty() {
                failures.push(StageFailure::AssignmentErrors { usages });
            }

            partial.resolution_result = Some(resolution);
            partial.resolution_trace = Some(trace);
            partial.assignment_trace = Some(assignment_trace);
            partial.check_failures = check_failures;
        }

        partial.document = Some(document);
        partial.language_tree = Some(tree);
        finish(failures, partial)
    }
}

fn finish(stage_failures: Vec<StageFailure>, result: AnalysisStepResult) -> StepResult {
    if stage_failures.is_empty() {
        tracing::debug!("analysis step evaluated");
        StepResult::Evaluated { result }
    } else {
        tracing::debug!(failures = stage_failures.len(), "analysis step not evaluated");
        StepResult::NotEvaluated {
            stage_failures,
            partial_result: result,
        }
    }
}
