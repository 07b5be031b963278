//! Replays resolved assignments in program order, replacing property reads
//! with the values assigned to those properties.

use std::collections::HashMap;

use dcl_language::SourceData;
use serde::Serialize;

use super::resolver::{ObjectOrigin, PropertyReference, ResolutionResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignmentTraceElement {
    RecordedAssignment {
        lhs: PropertyReference,
        rhs: ObjectOrigin,
        source: SourceData,
    },
    FailedToRecordAssignment {
        lhs: PropertyReference,
        rhs: ObjectOrigin,
        source: SourceData,
        reason: AssignmentFailure,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AssignmentFailure {
    /// The value of a property was read before anything was assigned to it.
    UnassignedValueUsed { property: PropertyReference },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssignmentTrace {
    pub elements: Vec<AssignmentTraceElement>,
}

impl AssignmentTrace {
    pub fn failures(&self) -> impl Iterator<Item = &AssignmentTraceElement> {
        self.elements
            .iter()
            .filter(|element| matches!(element, AssignmentTraceElement::FailedToRecordAssignment { .. }))
    }

    /// Final value of every successfully assigned property.
    pub fn resolved_assignments(&self) -> HashMap<&PropertyReference, &ObjectOrigin> {
        self.elements
            .iter()
            .filter_map(|element| match element {
                AssignmentTraceElement::RecordedAssignment { lhs, rhs, .. } => Some((lhs, rhs)),
                AssignmentTraceElement::FailedToRecordAssignment { .. } => None,
            })
            .collect()
    }
}

pub fn trace_assignments(result: &ResolutionResult) -> AssignmentTrace {
    let mut assigned: HashMap<PropertyReference, ObjectOrigin> = HashMap::new();
    let mut elements = Vec::with_capacity(result.assignments.len());

    for assignment in &result.assignments {
        let lhs = resolve_reference(&assignment.lhs, &assigned);
        let rhs = lhs.and_then(|lhs| Ok((lhs, resolve_origin(&assignment.rhs, &assigned)?)));
        let element = match rhs {
            Ok((lhs, rhs)) => {
                assigned.insert(lhs.clone(), rhs.clone());
                AssignmentTraceElement::RecordedAssignment {
                    lhs,
                    rhs,
                    source: assignment.source.clone(),
                }
            }
            Err(property) => AssignmentTraceElement::FailedToRecordAssignment {
                lhs: assignment.lhs.clone(),
                rhs: assignment.rhs.clone(),
                source: assignment.source.clone(),
                reason: AssignmentFailure::UnassignedValueUsed { property },
            },
        };
        elements.push(element);
    }
    AssignmentTrace { elements }
}

fn resolve_reference(
    reference: &PropertyReference,
    assigned: &HashMap<PropertyReference, ObjectOrigin>,
) -> Result<PropertyReference, PropertyReference> {
    Ok(PropertyReference {
        receiver: resolve_origin(&reference.receiver, assigned)?,
        property: reference.property.clone(),
        data_type: reference.data_type.clone(),
    })
}

/// Substitutes assigned values for property reads inside `origin`. Fails with
/// the first property that has no value yet.
fn resolve_origin(
    origin: &ObjectOrigin,
    assigned: &HashMap<PropertyReference, ObjectOrigin>,
) -> Result<ObjectOrigin, PropertyReference> {
    let resolve_all = |origins: &[ObjectOrigin]| -> Result<Vec<ObjectOrigin>, PropertyReference> {
        origins.iter().map(|o| resolve_origin(o, assigned)).collect()
    };
    match origin {
        ObjectOrigin::PropertyValue {
            receiver,
            property,
            data_type,
        } => {
            let reference = PropertyReference {
                receiver: resolve_origin(receiver, assigned)?,
                property: property.clone(),
                data_type: data_type.clone(),
            };
            match assigned.get(&reference) {
                Some(value) => Ok(value.clone()),
                None => Err(reference),
            }
        }
        ObjectOrigin::FromLocalValue { assigned: value, .. } => resolve_origin(value, assigned),
        ObjectOrigin::ValueFactoryResult {
            factory,
            arguments,
            returns,
        } => Ok(ObjectOrigin::ValueFactoryResult {
            factory: factory.clone(),
            arguments: resolve_all(arguments)?,
            returns: returns.clone(),
        }),
        ObjectOrigin::TopLevelReceiver { .. }
        | ObjectOrigin::ConfiguringLambdaReceiver { .. }
        | ObjectOrigin::NewObjectFromMemberFunction { .. }
        | ObjectOrigin::Constant { .. } => Ok(origin.clone()),
    }
}
