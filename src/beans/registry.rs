use std::collections::HashMap;

use super::descriptor::BeanType;
use super::framework::{ABSTRACT_TASK, CONVENTION_TASK, DEFAULT_TASK};
use super::value::EnumType;

/// Types a reader may encounter, by the name written to the stream.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    beans: HashMap<&'static str, &'static BeanType>,
    enums: HashMap<&'static str, &'static EnumType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that already knows the framework task types.
    pub fn with_framework_types() -> Self {
        let mut registry = Self::new();
        registry
            .register_bean(&ABSTRACT_TASK)
            .register_bean(&DEFAULT_TASK)
            .register_bean(&CONVENTION_TASK);
        registry
    }

    pub fn register_bean(&mut self, ty: &'static BeanType) -> &mut Self {
        if let Some(previous) = self.beans.insert(ty.name, ty) {
            if !std::ptr::eq(previous, ty) {
                tracing::warn!(bean = ty.name, "replacing registered bean type with the same name");
            }
        }
        self
    }

    pub fn register_enum(&mut self, ty: &'static EnumType) -> &mut Self {
        self.enums.insert(ty.name, ty);
        self
    }

    pub fn bean_type(&self, name: &str) -> Option<&'static BeanType> {
        self.beans.get(name).copied()
    }

    pub fn enum_type(&self, name: &str) -> Option<&'static EnumType> {
        self.enums.get(name).copied()
    }
}
