//! Schema-driven analysis of declarative scripts.

mod assignments;
mod checks;
mod resolver;
mod runner;
pub mod schema;
mod trace;

pub use assignments::{trace_assignments, AssignmentFailure, AssignmentTrace, AssignmentTraceElement};
pub use checks::{
    DocumentCheck, DocumentCheckFailure, DocumentCheckFailureReason, NodeResolution,
    ResolutionResultPostprocessor, ResolvedDocument, SingleBlockCheck, StepFeature,
};
pub use resolver::{
    resolve, AssignmentRecord, DataAddition, ErrorReason, ObjectOrigin, PropertyReference,
    ResolutionError, ResolutionResult,
};
pub use runner::{AnalysisStepResult, AnalysisStepRunner, StageFailure, StepResult};
pub use schema::{AnalysisSchema, DataType, SchemaError};
pub use trace::{ResolutionTrace, TraceResult};
