//! Language tree model.
//!
//! The tree is a faithful, schema-agnostic representation of what was written
//! in a script. Constructs the language does not support never make it into the
//! tree; they are reported as [`FailingResult`]s in the block they appear in.

use serde::{Deserialize, Serialize};

use crate::result::FailingResult;
use crate::source::SourceData;

/// A brace-delimited sequence of statements (or the whole script).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub content: Vec<BlockElement>,
    pub source: SourceData,
}

impl Block {
    /// Statements of this block that parsed successfully, in source order.
    pub fn statements(&self) -> impl Iterator<Item = &DataStatement> {
        self.content.iter().filter_map(|element| match element {
            BlockElement::Statement(statement) => Some(statement),
            BlockElement::Failure(_) => None,
        })
    }

    /// Failures directly in this block, not including nested lambdas.
    pub fn failures(&self) -> impl Iterator<Item = &FailingResult> {
        self.content.iter().filter_map(|element| match element {
            BlockElement::Failure(failure) => Some(failure),
            BlockElement::Statement(_) => None,
        })
    }

    /// Failures of this block and all blocks nested in lambdas.
    pub fn all_failures(&self) -> Vec<&FailingResult> {
        let mut failures = Vec::new();
        self.collect_failures(&mut failures);
        failures
    }

    fn collect_failures<'a>(&'a self, out: &mut Vec<&'a FailingResult>) {
        for element in &self.content {
            match element {
                BlockElement::Failure(failure) => out.push(failure),
                BlockElement::Statement(statement) => statement.collect_failures(out),
            }
        }
    }
}

/// One entry of a block: either a statement or the failure that replaced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockElement {
    Statement(DataStatement),
    Failure(FailingResult),
}

impl BlockElement {
    pub fn source(&self) -> &SourceData {
        match self {
            BlockElement::Statement(statement) => statement.source(),
            BlockElement::Failure(failure) => &failure.source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataStatement {
    Assignment(Assignment),
    LocalValue(LocalValue),
    Expr(Expr),
}

impl DataStatement {
    pub fn source(&self) -> &SourceData {
        match self {
            DataStatement::Assignment(assignment) => &assignment.source,
            DataStatement::LocalValue(local) => &local.source,
            DataStatement::Expr(expr) => expr.source(),
        }
    }

    fn collect_failures<'a>(&'a self, out: &mut Vec<&'a FailingResult>) {
        match self {
            DataStatement::Assignment(assignment) => assignment.rhs.collect_failures(out),
            DataStatement::LocalValue(local) => local.rhs.collect_failures(out),
            DataStatement::Expr(expr) => expr.collect_failures(out),
        }
    }
}

/// `lhs = rhs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub lhs: PropertyAccess,
    pub rhs: Expr,
    pub source: SourceData,
}

/// `val name = rhs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalValue {
    pub name: String,
    pub rhs: Expr,
    pub source: SourceData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    PropertyAccess(PropertyAccess),
    FunctionCall(FunctionCall),
    This(SourceData),
    Null(SourceData),
}

impl Expr {
    pub fn source(&self) -> &SourceData {
        match self {
            Expr::Literal(literal) => &literal.source,
            Expr::PropertyAccess(access) => &access.source,
            Expr::FunctionCall(call) => &call.source,
            Expr::This(source) | Expr::Null(source) => source,
        }
    }

    fn collect_failures<'a>(&'a self, out: &mut Vec<&'a FailingResult>) {
        match self {
            Expr::PropertyAccess(access) => {
                if let Some(receiver) = &access.receiver {
                    receiver.collect_failures(out);
                }
            }
            Expr::FunctionCall(call) => {
                if let Some(receiver) = &call.receiver {
                    receiver.collect_failures(out);
                }
                for argument in &call.args {
                    match argument {
                        FunctionArgument::Positional { expr, .. }
                        | FunctionArgument::Named { expr, .. } => expr.collect_failures(out),
                        FunctionArgument::Lambda { block, .. } => block.collect_failures(out),
                    }
                }
            }
            Expr::Literal(_) | Expr::This(_) | Expr::Null(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum LiteralValue {
    Int(i32),
    Long(i64),
    Boolean(bool),
    String(String),
}

impl std::fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiteralValue::Int(value) => write!(f, "{value}"),
            LiteralValue::Long(value) => write!(f, "{value}L"),
            LiteralValue::Boolean(value) => write!(f, "{value}"),
            LiteralValue::String(value) => write!(f, "{value:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub value: LiteralValue,
    pub source: SourceData,
}

/// `receiver.name` or a bare `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAccess {
    pub receiver: Option<Box<Expr>>,
    pub name: String,
    pub source: SourceData,
}

impl PropertyAccess {
    /// Returns `["a", "b", "c"]` for `a.b.c`, or `None` when any receiver in
    /// the chain is not itself a property access.
    pub fn as_dotted_names(&self) -> Option<Vec<String>> {
        let mut names = match &self.receiver {
            None => Vec::new(),
            Some(receiver) => match receiver.as_ref() {
                Expr::PropertyAccess(access) => access.as_dotted_names()?,
                _ => return None,
            },
        };
        names.push(self.name.clone());
        Some(names)
    }
}

/// `receiver.name(args)` or `name(args) { ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub receiver: Option<Box<Expr>>,
    pub name: String,
    pub args: Vec<FunctionArgument>,
    pub source: SourceData,
}

impl FunctionCall {
    pub fn lambdas(&self) -> impl Iterator<Item = &Block> {
        self.args.iter().filter_map(|argument| match argument {
            FunctionArgument::Lambda { block, .. } => Some(block),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionArgument {
    Positional { expr: Expr, source: SourceData },
    Named { name: String, expr: Expr, source: SourceData },
    Lambda { block: Block, source: SourceData },
}

impl FunctionArgument {
    pub fn source(&self) -> &SourceData {
        match self {
            FunctionArgument::Positional { source, .. }
            | FunctionArgument::Named { source, .. }
            | FunctionArgument::Lambda { source, .. } => source,
        }
    }
}

/// `import a.b.C`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub name_parts: Vec<String>,
    pub source: SourceData,
}
