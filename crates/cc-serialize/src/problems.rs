//! Soft serialization problems.
//!
//! Problems do not abort a write or read; they are handed to a listener with
//! the trace of the property that caused them.

use std::fmt;

use crate::trace::PropertyTrace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    /// The declared type of a field cannot be persisted.
    UnsupportedFieldType,
    /// The value codec rejected a field value while writing.
    CannotWrite,
    /// A stored value is not assignable to the field it was read for.
    IncompatibleValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyProblem {
    pub kind: ProblemKind,
    pub trace: PropertyTrace,
    pub message: String,
}

impl fmt::Display for PropertyProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.trace, self.message)
    }
}

pub trait ProblemsListener {
    fn on_problem(&mut self, problem: PropertyProblem);
}

/// Keeps every reported problem.
#[derive(Debug, Default)]
pub struct CollectedProblems {
    problems: Vec<PropertyProblem>,
}

impl CollectedProblems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn problems(&self) -> &[PropertyProblem] {
        &self.problems
    }

    pub fn into_problems(self) -> Vec<PropertyProblem> {
        self.problems
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

impl ProblemsListener for CollectedProblems {
    fn on_problem(&mut self, problem: PropertyProblem) {
        self.problems.push(problem);
    }
}

/// Logs problems as warnings and forgets them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProblems;

impl ProblemsListener for LoggingProblems {
    fn on_problem(&mut self, problem: PropertyProblem) {
        tracing::warn!(kind = ?problem.kind, "{problem}");
    }
}
