//! Selection of the fields that take part in serialization.

use std::collections::HashSet;
use std::ptr;

use globset::{Glob, GlobSet, GlobSetBuilder};

use super::descriptor::{BeanType, FieldDescriptor};
use super::framework::{
    explicit_flag_name, is_irrelevant, ABSTRACT_TASK_NAME, ABSTRACT_TASK_RELEVANT_FIELDS,
};

/// Fields excluded by configuration, matched as `Type.field` globs.
#[derive(Debug, Clone)]
pub struct IgnoredFields {
    patterns: Vec<String>,
    set: GlobSet,
}

impl IgnoredFields {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern.as_ref())?);
        }
        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            set: builder.build()?,
        })
    }

    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_ignored(&self, type_name: &str, field: &str) -> bool {
        !self.set.is_empty() && self.set.is_match(format!("{type_name}.{field}"))
    }
}

impl Default for IgnoredFields {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelevantField {
    pub declaring: &'static BeanType,
    pub field: &'static FieldDescriptor,
    /// Name of the declared type when it cannot be persisted.
    pub unsupported: Option<&'static str>,
    /// The `__name__` flag recording whether the field was set explicitly.
    pub explicit_flag: Option<&'static FieldDescriptor>,
}

impl RelevantField {
    pub fn name(&self) -> &'static str {
        self.field.name
    }
}

/// Serializable fields of `ty`, superclass fields first and sorted by name
/// within each declaring type.
pub fn relevant_fields_of(ty: &'static BeanType, ignored: &IgnoredFields) -> Vec<RelevantField> {
    let convention_aware = ty.convention_source().is_some();
    let mut hierarchy: Vec<&'static BeanType> = ty.hierarchy().filter(|ty| !is_irrelevant(ty)).collect();
    hierarchy.reverse();

    let mut seen = HashSet::new();
    let mut relevant = Vec::new();
    for declaring in hierarchy {
        let mut fields: Vec<&'static FieldDescriptor> = declaring
            .fields
            .iter()
            .filter(|field| !field.modifiers.is_static && !field.modifiers.is_transient)
            .filter(|field| {
                declaring.name != ABSTRACT_TASK_NAME || ABSTRACT_TASK_RELEVANT_FIELDS.contains(&field.name)
            })
            .filter(|field| !ignored.is_ignored(declaring.name, field.name))
            .collect();
        fields.sort_by_key(|field| field.name);

        for field in fields {
            if !seen.insert((declaring as *const BeanType, field.name)) {
                continue;
            }
            let explicit_flag = if convention_aware {
                declaring.declared_field(&explicit_flag_name(field.name))
            } else {
                None
            };
            relevant.push(RelevantField {
                declaring,
                field,
                unsupported: field.field_type.unsupported(),
                explicit_flag,
            });
        }
    }
    tracing::trace!(bean = ty.name, fields = relevant.len(), "computed relevant fields");
    relevant
}

/// Returns the relevant field of `ty` declared by `declaring` with `name`.
pub fn find_relevant<'f>(fields: &'f [RelevantField], declaring: &BeanType, name: &str) -> Option<&'f RelevantField> {
    fields
        .iter()
        .find(|field| ptr::eq(field.declaring, declaring) && field.field.name == name)
}
