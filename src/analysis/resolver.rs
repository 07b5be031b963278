//! Binds a language tree to an [`AnalysisSchema`].
//!
//! Resolution walks the top-level block in program order with a stack of
//! scopes. Each scope has an implicit receiver and its own local values;
//! unqualified names are looked up innermost scope first. Failing statements
//! are reported and skipped, so one bad statement never hides the rest.

use std::collections::HashMap;
use std::fmt;

use dcl_language::{
    Assignment, Block, BlockElement, DataStatement, Expr, FunctionArgument, FunctionCall,
    LanguageTreeResult, LiteralValue, LocalValue, PropertyAccess, SourceData,
};
use serde::Serialize;

use super::schema::{AnalysisSchema, DataClass, DataProperty, DataType, FunctionKind, SchemaFunction};
use super::trace::ResolutionTrace;

/// Where an object or value used by the script comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ObjectOrigin {
    TopLevelReceiver {
        class: String,
    },
    ConfiguringLambdaReceiver {
        receiver: Box<ObjectOrigin>,
        function: String,
        class: String,
    },
    /// An object created by an adding function; each call site is a distinct
    /// object.
    NewObjectFromMemberFunction {
        receiver: Box<ObjectOrigin>,
        function: String,
        class: String,
        arguments: Vec<ObjectOrigin>,
        call_offset: usize,
    },
    Constant {
        value: LiteralValue,
    },
    FromLocalValue {
        name: String,
        assigned: Box<ObjectOrigin>,
    },
    PropertyValue {
        receiver: Box<ObjectOrigin>,
        property: String,
        data_type: DataType,
    },
    ValueFactoryResult {
        factory: String,
        arguments: Vec<ObjectOrigin>,
        returns: DataType,
    },
}

impl ObjectOrigin {
    pub fn data_type(&self) -> DataType {
        match self {
            ObjectOrigin::TopLevelReceiver { class }
            | ObjectOrigin::ConfiguringLambdaReceiver { class, .. }
            | ObjectOrigin::NewObjectFromMemberFunction { class, .. } => DataType::Class(class.clone()),
            ObjectOrigin::Constant { value } => DataType::of_literal(value),
            ObjectOrigin::FromLocalValue { assigned, .. } => assigned.data_type(),
            ObjectOrigin::PropertyValue { data_type, .. } => data_type.clone(),
            ObjectOrigin::ValueFactoryResult { returns, .. } => returns.clone(),
        }
    }
}

/// `receiver.property` as the target of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PropertyReference {
    pub receiver: ObjectOrigin,
    pub property: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentRecord {
    pub lhs: PropertyReference,
    pub rhs: ObjectOrigin,
    pub source: SourceData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataAddition {
    pub container: ObjectOrigin,
    pub data_object: ObjectOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    pub top_level_receiver: ObjectOrigin,
    pub assignments: Vec<AssignmentRecord>,
    pub additions: Vec<DataAddition>,
    pub errors: Vec<ResolutionError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionError {
    pub element: SourceData,
    pub reason: ErrorReason,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.element, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ErrorReason {
    AmbiguousImport { name: String },
    UnresolvedReference { name: String },
    UnresolvedFunctionCall { name: String, arguments: Vec<DataType> },
    UnresolvedValueFactory { name: String },
    ValReassignment { name: String },
    AssignmentTypeMismatch { expected: DataType, actual: DataType },
    UnusedConfigureLambda,
    DuplicateLocalValue { name: String },
    UnresolvedAssignmentLhs { name: String },
    ReadOnlyPropertyAssignment { property: String },
    DanglingPureExpression,
    UnsupportedLanguageConstruct { construct: String },
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorReason::AmbiguousImport { name } => write!(f, "ambiguous import `{name}`"),
            ErrorReason::UnresolvedReference { name } => write!(f, "unresolved reference `{name}`"),
            ErrorReason::UnresolvedFunctionCall { name, arguments } => {
                let arguments: Vec<String> = arguments.iter().map(ToString::to_string).collect();
                write!(f, "no function `{name}` accepts ({})", arguments.join(", "))
            }
            ErrorReason::UnresolvedValueFactory { name } => write!(f, "unresolved value factory `{name}`"),
            ErrorReason::ValReassignment { name } => write!(f, "local value `{name}` cannot be reassigned"),
            ErrorReason::AssignmentTypeMismatch { expected, actual } => {
                write!(f, "type mismatch: expected {expected}, found {actual}")
            }
            ErrorReason::UnusedConfigureLambda => f.write_str("the lambda is not used by this function"),
            ErrorReason::DuplicateLocalValue { name } => write!(f, "local value `{name}` is already declared"),
            ErrorReason::UnresolvedAssignmentLhs { name } => write!(f, "unresolved assignment target `{name}`"),
            ErrorReason::ReadOnlyPropertyAssignment { property } => {
                write!(f, "property `{property}` is read-only")
            }
            ErrorReason::DanglingPureExpression => f.write_str("the value of this expression is never used"),
            ErrorReason::UnsupportedLanguageConstruct { construct } => write!(f, "{construct} is not supported"),
        }
    }
}

type Resolved<T> = Result<T, Vec<ResolutionError>>;

fn error(element: &SourceData, reason: ErrorReason) -> Vec<ResolutionError> {
    vec![ResolutionError {
        element: element.clone(),
        reason,
    }]
}

/// Resolves `tree` against `schema`. Never fails; problems are reported in
/// [`ResolutionResult::errors`] and in the trace.
pub fn resolve(schema: &AnalysisSchema, tree: &LanguageTreeResult) -> (ResolutionResult, ResolutionTrace) {
    let top_level_receiver = ObjectOrigin::TopLevelReceiver {
        class: schema.top_level_receiver.clone(),
    };
    let mut resolver = Resolver {
        schema,
        scopes: Vec::new(),
        assignments: Vec::new(),
        additions: Vec::new(),
        errors: Vec::new(),
        trace: ResolutionTrace::default(),
    };
    resolver.check_imports(tree);
    resolver.with_scope(top_level_receiver.clone(), |resolver| {
        resolver.block(&tree.top_level_block)
    });

    tracing::debug!(
        assignments = resolver.assignments.len(),
        additions = resolver.additions.len(),
        errors = resolver.errors.len(),
        "resolved language tree"
    );
    let result = ResolutionResult {
        top_level_receiver,
        assignments: resolver.assignments,
        additions: resolver.additions,
        errors: resolver.errors,
    };
    (result, resolver.trace)
}

struct Scope {
    receiver: ObjectOrigin,
    locals: HashMap<String, ObjectOrigin>,
}

struct Resolver<'s> {
    schema: &'s AnalysisSchema,
    scopes: Vec<Scope>,
    assignments: Vec<AssignmentRecord>,
    additions: Vec<DataAddition>,
    errors: Vec<ResolutionError>,
    trace: ResolutionTrace,
}

impl<'s> Resolver<'s> {
    fn check_imports(&mut self, tree: &LanguageTreeResult) {
        let mut by_simple_name: HashMap<&str, &[String]> = HashMap::new();
        for import in &tree.imports {
            let Some(simple_name) = import.name_parts.last() else {
                continue;
            };
            match by_simple_name.get(simple_name.as_str()) {
                Some(existing) if *existing != import.name_parts.as_slice() => {
                    self.errors.extend(error(
                        &import.source,
                        ErrorReason::AmbiguousImport {
                            name: import.name_parts.join("."),
                        },
                    ));
                }
                Some(_) => {}
                None => {
                    by_simple_name.insert(simple_name, &import.name_parts);
                }
            }
        }
    }

    fn with_scope(&mut self, receiver: ObjectOrigin, body: impl FnOnce(&mut Self)) {
        self.scopes.push(Scope {
            receiver,
            locals: HashMap::new(),
        });
        body(self);
        self.scopes.pop();
    }

    fn class_of(&self, origin: &ObjectOrigin) -> Option<&'s DataClass> {
        origin
            .data_type()
            .class_name()
            .and_then(|name| self.schema.class(name))
    }

    fn block(&mut self, block: &Block) {
        for element in &block.content {
            // Failures are reported by the parser; resolution skips them.
            if let BlockElement::Statement(statement) = element {
                self.statement(statement);
            }
        }
    }

    fn statement(&mut self, statement: &DataStatement) {
        match statement {
            DataStatement::Assignment(assignment) => self.assignment(assignment),
            DataStatement::LocalValue(local) => self.local_value(local),
            DataStatement::Expr(Expr::FunctionCall(call)) => {
                let result = self.call(call).and_then(|(origin, pure)| {
                    if pure {
                        Err(error(&call.source, ErrorReason::DanglingPureExpression))
                    } else {
                        Ok(origin)
                    }
                });
                self.trace.record_expression(&call.source, &result);
                if let Err(errors) = result {
                    self.errors.extend(errors);
                }
            }
            DataStatement::Expr(expr) => {
                let errors = match self.expr(expr) {
                    Ok(_) => error(expr.source(), ErrorReason::DanglingPureExpression),
                    Err(errors) => errors,
                };
                self.errors.extend(errors);
            }
        }
    }

    fn assignment(&mut self, assignment: &Assignment) {
        let lhs = self.assignment_lhs(&assignment.lhs);
        let rhs = self.expr(&assignment.rhs);
        let result = match (lhs, rhs) {
            (Ok(lhs), Ok(rhs)) => {
                let actual = rhs.data_type();
                if lhs.data_type.accepts(&actual) {
                    Ok(AssignmentRecord {
                        lhs,
                        rhs,
                        source: assignment.source.clone(),
                    })
                } else {
                    Err(error(
                        &assignment.source,
                        ErrorReason::AssignmentTypeMismatch {
                            expected: lhs.data_type,
                            actual,
                        },
                    ))
                }
            }
            (lhs, rhs) => {
                let mut errors = lhs.err().unwrap_or_default();
                errors.extend(rhs.err().unwrap_or_default());
                Err(errors)
            }
        };
        self.trace.record_assignment(&assignment.source, &result);
        match result {
            Ok(record) => self.assignments.push(record),
            Err(errors) => self.errors.extend(errors),
        }
    }

    fn assignment_lhs(&mut self, lhs: &PropertyAccess) -> Resolved<PropertyReference> {
        let (receiver, property) = match &lhs.receiver {
            None => {
                if self.find_local(&lhs.name).is_some() {
                    return Err(error(
                        &lhs.source,
                        ErrorReason::ValReassignment {
                            name: lhs.name.clone(),
                        },
                    ));
                }
                self.find_implicit_property(&lhs.name)
                    .ok_or_else(|| unresolved_lhs(lhs))?
            }
            Some(receiver) => {
                let receiver = self.expr(receiver)?;
                let property = self
                    .class_of(&receiver)
                    .and_then(|class| class.property(&lhs.name))
                    .ok_or_else(|| unresolved_lhs(lhs))?;
                (receiver, property)
            }
        };
        if property.read_only {
            return Err(error(
                &lhs.source,
                ErrorReason::ReadOnlyPropertyAssignment {
                    property: property.name.clone(),
                },
            ));
        }
        Ok(PropertyReference {
            receiver,
            property: property.name.clone(),
            data_type: property.data_type.clone(),
        })
    }

    fn local_value(&mut self, local: &LocalValue) {
        let assigned = match self.expr(&local.rhs) {
            Ok(assigned) => assigned,
            Err(errors) => {
                self.errors.extend(errors);
                return;
            }
        };
        let origin = ObjectOrigin::FromLocalValue {
            name: local.name.clone(),
            assigned: Box::new(assigned),
        };
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.locals.insert(local.name.clone(), origin).is_some() {
            self.errors.extend(error(
                &local.source,
                ErrorReason::DuplicateLocalValue {
                    name: local.name.clone(),
                },
            ));
        }
    }

    fn expr(&mut self, expr: &Expr) -> Resolved<ObjectOrigin> {
        let result = match expr {
            Expr::Literal(literal) => Ok(ObjectOrigin::Constant {
                value: literal.value.clone(),
            }),
            Expr::This(source) => self
                .scopes
                .last()
                .map(|scope| scope.receiver.clone())
                .ok_or_else(|| error(source, ErrorReason::UnresolvedReference { name: "this".to_string() })),
            Expr::Null(source) => Err(error(
                source,
                ErrorReason::UnsupportedLanguageConstruct {
                    construct: "`null`".to_string(),
                },
            )),
            Expr::PropertyAccess(access) => self.property_access(access),
            Expr::FunctionCall(call) => self.call(call).map(|(origin, _)| origin),
        };
        self.trace.record_expression(expr.source(), &result);
        result
    }

    fn property_access(&mut self, access: &PropertyAccess) -> Resolved<ObjectOrigin> {
        let unresolved = || {
            error(
                &access.source,
                ErrorReason::UnresolvedReference {
                    name: access.name.clone(),
                },
            )
        };
        match &access.receiver {
            None => {
                if let Some(local) = self.find_local(&access.name) {
                    return Ok(local.clone());
                }
                let (receiver, property) = self.find_implicit_property(&access.name).ok_or_else(unresolved)?;
                Ok(ObjectOrigin::PropertyValue {
                    receiver: Box::new(receiver),
                    property: property.name.clone(),
                    data_type: property.data_type.clone(),
                })
            }
            Some(receiver) => {
                let receiver = self.expr(receiver)?;
                let property = self
                    .class_of(&receiver)
                    .and_then(|class| class.property(&access.name))
                    .ok_or_else(unresolved)?;
                Ok(ObjectOrigin::PropertyValue {
                    receiver: Box::new(receiver),
                    property: property.name.clone(),
                    data_type: property.data_type.clone(),
                })
            }
        }
    }

    /// Resolves a call to a member function or a value factory. The flag is
    /// true when the call has no effect besides producing its value.
    fn call(&mut self, call: &FunctionCall) -> Resolved<(ObjectOrigin, bool)> {
        let mut errors = Vec::new();
        let mut arguments = Vec::new();
        let mut lambda: Option<&Block> = None;
        for argument in &call.args {
            match argument {
                FunctionArgument::Positional { expr, .. } => match self.expr(expr) {
                    Ok(origin) => arguments.push(origin),
                    Err(argument_errors) => errors.extend(argument_errors),
                },
                FunctionArgument::Named { source, .. } => errors.extend(error(
                    source,
                    ErrorReason::UnsupportedLanguageConstruct {
                        construct: "named argument".to_string(),
                    },
                )),
                FunctionArgument::Lambda { block, source } => {
                    if lambda.is_some() {
                        errors.extend(error(
                            source,
                            ErrorReason::UnsupportedLanguageConstruct {
                                construct: "more than one lambda".to_string(),
                            },
                        ));
                    }
                    lambda = Some(block);
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        let argument_types: Vec<DataType> = arguments.iter().map(ObjectOrigin::data_type).collect();
        let unresolved_call = || {
            error(
                &call.source,
                ErrorReason::UnresolvedFunctionCall {
                    name: call.name.clone(),
                    arguments: argument_types.clone(),
                },
            )
        };

        match call.receiver.as_deref() {
            None => {
                if let Some((receiver, function)) = self.find_implicit_function(&call.name, &argument_types) {
                    return self.invoke(call, receiver, function, arguments, lambda);
                }
                match self.schema.value_factory(&call.name) {
                    Some(_) => self.value_factory(call, call.name.clone(), arguments, lambda),
                    None => Err(unresolved_call()),
                }
            }
            Some(receiver) => {
                let dotted = dotted_name(receiver).map(|mut parts| {
                    parts.push(call.name.clone());
                    parts.join(".")
                });
                if let Some(name) = dotted.clone().filter(|name| self.schema.value_factory(name).is_some()) {
                    return self.value_factory(call, name, arguments, lambda);
                }
                let receiver = match self.expr(receiver) {
                    Ok(receiver) => receiver,
                    Err(_) if dotted.is_some() => {
                        return Err(error(
                            &call.source,
                            ErrorReason::UnresolvedValueFactory {
                                name: dotted.unwrap_or_default(),
                            },
                        ))
                    }
                    Err(receiver_errors) => return Err(receiver_errors),
                };
                let function = self
                    .class_of(&receiver)
                    .and_then(|class| matching_function(class, &call.name, &argument_types))
                    .ok_or_else(unresolved_call)?;
                self.invoke(call, receiver, function, arguments, lambda)
            }
        }
    }

    fn invoke(
        &mut self,
        call: &FunctionCall,
        receiver: ObjectOrigin,
        function: &'s SchemaFunction,
        arguments: Vec<ObjectOrigin>,
        lambda: Option<&Block>,
    ) -> Resolved<(ObjectOrigin, bool)> {
        let origin = match function.kind {
            FunctionKind::Configuring => ObjectOrigin::ConfiguringLambdaReceiver {
                receiver: Box::new(receiver),
                function: function.name.clone(),
                class: function.block.clone().unwrap_or_default(),
            },
            FunctionKind::Adding => {
                let origin = ObjectOrigin::NewObjectFromMemberFunction {
                    receiver: Box::new(receiver.clone()),
                    function: function.name.clone(),
                    class: function.returns.clone().unwrap_or_default(),
                    arguments,
                    call_offset: call.source.start,
                };
                self.additions.push(DataAddition {
                    container: receiver,
                    data_object: origin.clone(),
                });
                origin
            }
        };

        if let Some(block) = lambda {
            if function.block.is_none() {
                return Err(error(&call.source, ErrorReason::UnusedConfigureLambda));
            }
            self.with_scope(origin.clone(), |resolver| resolver.block(block));
        }
        Ok((origin, false))
    }

    fn value_factory(
        &mut self,
        call: &FunctionCall,
        name: String,
        arguments: Vec<ObjectOrigin>,
        lambda: Option<&Block>,
    ) -> Resolved<(ObjectOrigin, bool)> {
        if lambda.is_some() {
            return Err(error(&call.source, ErrorReason::UnusedConfigureLambda));
        }
        let argument_types: Vec<DataType> = arguments.iter().map(ObjectOrigin::data_type).collect();
        let factory = self
            .schema
            .value_factory(&name)
            .filter(|factory| parameters_accept(&factory.parameters, &argument_types))
            .ok_or_else(|| {
                error(
                    &call.source,
                    ErrorReason::UnresolvedFunctionCall {
                        name: name.clone(),
                        arguments: argument_types.clone(),
                    },
                )
            })?;
        Ok((
            ObjectOrigin::ValueFactoryResult {
                factory: name,
                arguments,
                returns: factory.returns.clone(),
            },
            true,
        ))
    }

    fn find_local(&self, name: &str) -> Option<&ObjectOrigin> {
        self.scopes.iter().rev().find_map(|scope| scope.locals.get(name))
    }

    fn find_implicit_property(&self, name: &str) -> Option<(ObjectOrigin, &'s DataProperty)> {
        self.scopes.iter().rev().find_map(|scope| {
            self.class_of(&scope.receiver)
                .and_then(|class| class.property(name))
                .map(|property| (scope.receiver.clone(), property))
        })
    }

    fn find_implicit_function(&self, name: &str, argument_types: &[DataType]) -> Option<(ObjectOrigin, &'s SchemaFunction)> {
        self.scopes.iter().rev().find_map(|scope| {
            self.class_of(&scope.receiver)
                .and_then(|class| matching_function(class, name, argument_types))
                .map(|function| (scope.receiver.clone(), function))
        })
    }
}

fn matching_function<'c>(class: &'c DataClass, name: &str, argument_types: &[DataType]) -> Option<&'c SchemaFunction> {
    class
        .functions
        .iter()
        .find(|function| function.name == name && parameters_accept(&function.parameters, argument_types))
}

fn parameters_accept(parameters: &[DataType], arguments: &[DataType]) -> bool {
    parameters.len() == arguments.len()
        && parameters
            .iter()
            .zip(arguments)
            .all(|(parameter, argument)| parameter.accepts(argument))
}

fn dotted_name(expr: &Expr) -> Option<Vec<String>> {
    match expr {
        Expr::PropertyAccess(access) => access.as_dotted_names(),
        _ => None,
    }
}

fn unresolved_lhs(lhs: &PropertyAccess) -> Vec<ResolutionError> {
    error(
        &lhs.source,
        ErrorReason::UnresolvedAssignmentLhs {
            name: lhs.name.clone(),
        },
    )
}
