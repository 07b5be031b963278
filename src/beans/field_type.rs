use std::fmt;

use super::descriptor::BeanType;
use super::value::{BeanValue, EnumType};

/// Framework types whose instances are tied to a single build and must never
/// be persisted.
pub const UNSUPPORTED_TYPES: &[&str] = &[
    "Project",
    "Gradle",
    "Settings",
    "TaskContainer",
    "ConfigurationContainer",
    "SourceSetContainer",
    "DependencyHandler",
    "Thread",
    "ClassLoader",
    "Socket",
    "InputStream",
    "OutputStream",
    "Executor",
];

/// Declared type of a bean field.
#[derive(Clone, Copy)]
pub enum FieldType {
    Boolean,
    Int,
    Long,
    Double,
    BoxedBoolean,
    BoxedInt,
    BoxedLong,
    BoxedDouble,
    String,
    List,
    Enum(&'static EnumType),
    Bean(&'static BeanType),
    /// A type known only by name; see [`UNSUPPORTED_TYPES`].
    Named(&'static str),
    Any,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::BoxedBoolean => "Boolean",
            FieldType::BoxedInt => "Integer",
            FieldType::BoxedLong => "Long",
            FieldType::BoxedDouble => "Double",
            FieldType::String => "String",
            FieldType::List => "List",
            FieldType::Enum(ty) => ty.name,
            FieldType::Bean(ty) => ty.name,
            FieldType::Named(name) => *name,
            FieldType::Any => "Object",
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            FieldType::Boolean | FieldType::Int | FieldType::Long | FieldType::Double
        )
    }

    /// Name of the type if it is on the deny-list.
    pub fn unsupported(&self) -> Option<&'static str> {
        let name = match self {
            FieldType::Named(name) => *name,
            FieldType::Bean(ty) => ty.name,
            _ => return None,
        };
        UNSUPPORTED_TYPES.contains(&name).then_some(name)
    }

    /// Whether `value` may be stored in a field of this type. Primitive and
    /// boxed scalars are interchangeable except that primitives reject null.
    pub fn accepts(&self, value: &BeanValue) -> bool {
        use FieldType as T;
        match value {
            BeanValue::Null => !self.is_primitive(),
            BeanValue::Boolean(_) => matches!(self, T::Boolean | T::BoxedBoolean | T::Any),
            BeanValue::Int(_) => matches!(self, T::Int | T::BoxedInt | T::Any),
            BeanValue::Long(_) => matches!(self, T::Long | T::BoxedLong | T::Any),
            BeanValue::Double(_) => matches!(self, T::Double | T::BoxedDouble | T::Any),
            BeanValue::String(_) => matches!(self, T::String | T::Any),
            BeanValue::List(_) => matches!(self, T::List | T::Any),
            BeanValue::Enum(constant) => match self {
                T::Enum(ty) => ty.name == constant.enum_name,
                T::Any => true,
                _ => false,
            },
            BeanValue::Bean(bean) => match self {
                T::Bean(ty) => bean
                    .try_borrow()
                    .map(|bean| bean.bean_type().is_subtype_of(ty))
                    .unwrap_or(false),
                T::Any => true,
                _ => false,
            },
            BeanValue::Opaque(name) => match self {
                T::Named(expected) => expected == name,
                T::Any => true,
                _ => false,
            },
        }
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::framework::{AbstractTask, ABSTRACT_TASK, DEFAULT_TASK};
    use crate::beans::value::bean_ref;

    #[test]
    fn test_primitive_and_boxed_equivalence() {
        assert!(FieldType::Int.accepts(&BeanValue::Int(1)));
        assert!(FieldType::BoxedInt.accepts(&BeanValue::Int(1)));
        assert!(FieldType::BoxedInt.accepts(&BeanValue::Null));
        assert!(!FieldType::Int.accepts(&BeanValue::Null));
        assert!(!FieldType::Int.accepts(&BeanValue::Long(1)));
        assert!(FieldType::Any.accepts(&BeanValue::Double(1.0)));
    }

    #[test]
    fn test_bean_fields_accept_subtypes() {
        let task = BeanValue::Bean(bean_ref(AbstractTask::default()));
        assert!(FieldType::Bean(&ABSTRACT_TASK).accepts(&task));
        assert!(!FieldType::Bean(&DEFAULT_TASK).accepts(&task));
    }

    #[test]
    fn test_unsupported_types() {
        assert_eq!(FieldType::Named("Project").unsupported(), Some("Project"));
        assert_eq!(FieldType::Named("File").unsupported(), None);
        assert_eq!(FieldType::String.unsupported(), None);
        assert!(FieldType::Named("Thread").accepts(&BeanValue::Opaque("Thread")));
    }
}
