//! Framework base types shared by task beans.

use std::collections::BTreeMap;

use super::descriptor::{blank, Bean, BeanType, FieldModifiers, Instantiation, Opaque};
use super::field_type::FieldType;
use super::value::BeanValue;

/// Base types whose declared fields never take part in serialization.
pub const IRRELEVANT_TYPES: &[&str] = &[
    "Object",
    "GroovyObjectSupport",
    "TaskInternal",
    "DefaultTask",
    "ConventionTask",
];

/// Name of the task base type whose fields are excluded except for
/// [`ABSTRACT_TASK_RELEVANT_FIELDS`].
pub const ABSTRACT_TASK_NAME: &str = "AbstractTask";

pub const ABSTRACT_TASK_RELEVANT_FIELDS: &[&str] = &["description", "enabled", "group", "timeout_millis"];

#[derive(Debug)]
pub struct AbstractTask {
    pub name: String,
    pub description: Option<String>,
    pub group: Option<String>,
    pub enabled: bool,
    pub timeout_millis: Option<i64>,
    pub did_work: bool,
    pub project: Opaque,
}

impl Default for AbstractTask {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            group: None,
            enabled: true,
            timeout_millis: None,
            did_work: false,
            project: Opaque("Project"),
        }
    }
}

pub static ABSTRACT_TASK: BeanType = BeanType {
    name: ABSTRACT_TASK_NAME,
    superclass: None,
    fields: &[
        crate::bean_field!(AbstractTask, name: String, FieldType::String),
        crate::bean_field!(AbstractTask, description: Option<String>, FieldType::String),
        crate::bean_field!(AbstractTask, group: Option<String>, FieldType::String),
        crate::bean_field!(AbstractTask, enabled: bool, FieldType::Boolean),
        crate::bean_field!(AbstractTask, timeout_millis: Option<i64>, FieldType::BoxedLong),
        crate::bean_field!(AbstractTask, did_work: bool, FieldType::Boolean, FieldModifiers::TRANSIENT),
        crate::bean_field!(AbstractTask, project: Opaque, FieldType::Named("Project")),
    ],
    instantiation: Instantiation::Blank(blank::<AbstractTask>),
    convention: None,
};

crate::impl_bean!(AbstractTask, ABSTRACT_TASK);

#[derive(Debug, Default)]
pub struct DefaultTask {
    pub task: AbstractTask,
}

pub static DEFAULT_TASK: BeanType = BeanType {
    name: "DefaultTask",
    superclass: Some(&ABSTRACT_TASK),
    fields: &[],
    instantiation: Instantiation::Blank(blank::<DefaultTask>),
    convention: None,
};

crate::impl_bean!(DefaultTask, DEFAULT_TASK, task);

/// Task whose unset properties fall back to convention values.
///
/// A subtype pairs a field `x` with a `bool` field named `__x__` that records
/// whether `x` was set explicitly. While the flag is false, the convention
/// value registered under `"x"` is persisted instead of the field.
#[derive(Debug, Default)]
pub struct ConventionTask {
    pub task: DefaultTask,
    pub conventions: BTreeMap<String, BeanValue>,
}

impl ConventionTask {
    pub fn convention(&mut self, field: impl Into<String>, value: BeanValue) -> &mut Self {
        self.conventions.insert(field.into(), value);
        self
    }
}

fn convention_value(bean: &dyn Bean, field: &str) -> Option<BeanValue> {
    bean.declared_part(&CONVENTION_TASK)?
        .downcast_ref::<ConventionTask>()?
        .conventions
        .get(field)
        .cloned()
}

pub static CONVENTION_TASK: BeanType = BeanType {
    name: "ConventionTask",
    superclass: Some(&DEFAULT_TASK),
    fields: &[],
    instantiation: Instantiation::Blank(blank::<ConventionTask>),
    convention: Some(convention_value),
};

crate::impl_bean!(ConventionTask, CONVENTION_TASK, task);

/// Name of the field recording whether `field` was set explicitly.
pub fn explicit_flag_name(field: &str) -> String {
    format!("__{field}__")
}

pub fn is_irrelevant(ty: &BeanType) -> bool {
    IRRELEVANT_TYPES.contains(&ty.name)
}
