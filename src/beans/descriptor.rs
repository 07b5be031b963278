//! Static type descriptors.
//!
//! Every serializable type has a `static` [`BeanType`] listing the fields it
//! declares, with a getter/setter pair per field generated by [`bean_field!`].
//! Descriptors must be `static` items, never `const`: types are compared by
//! address.
//!
//! [`bean_field!`]: crate::bean_field

use std::any::Any;
use std::fmt;
use std::ptr;
use std::rc::Rc;

use super::field_type::FieldType;
use super::value::{BeanRef, BeanValue, EnumConstant};

/// An object whose state can be written field by field.
///
/// A type built by embedding its superclass part answers
/// [`declared_part`](Bean::declared_part) for every type in its hierarchy.
pub trait Bean: Any + 'static {
    fn bean_type(&self) -> &'static BeanType;

    /// The part of `self` whose fields are declared by `declaring`.
    fn declared_part(&self, declaring: &'static BeanType) -> Option<&dyn Any>;

    fn declared_part_mut(&mut self, declaring: &'static BeanType) -> Option<&mut dyn Any>;
}

/// Prints the type name only; graphs may be cyclic.
impl fmt::Debug for dyn Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bean_type().name)
    }
}

/// Supplies the convention value of a field when it was not set explicitly.
pub type ConventionSource = fn(&dyn Bean, &str) -> Option<BeanValue>;

/// How a reader creates the instance it fills.
#[derive(Clone, Copy)]
pub enum Instantiation {
    /// An instance with every field at its zero value; no user initialization
    /// runs.
    Blank(fn() -> Box<dyn Bean>),
    /// Generated subtypes are created by the configured instantiation scheme.
    Generated,
}

/// Creates a blank `B`.
pub fn blank<B: Bean + Default>() -> Box<dyn Bean> {
    Box::new(B::default())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldModifiers {
    pub is_static: bool,
    pub is_transient: bool,
}

impl FieldModifiers {
    pub const NONE: FieldModifiers = FieldModifiers {
        is_static: false,
        is_transient: false,
    };
    pub const STATIC: FieldModifiers = FieldModifiers {
        is_static: true,
        is_transient: false,
    };
    pub const TRANSIENT: FieldModifiers = FieldModifiers {
        is_static: false,
        is_transient: true,
    };
}

pub struct FieldDescriptor {
    pub name: &'static str,
    pub field_type: FieldType,
    pub modifiers: FieldModifiers,
    /// Reads the field from the declaring part; `None` if the part has the
    /// wrong type.
    pub get: fn(&dyn Any) -> Option<BeanValue>,
    /// Stores a value; `false` if the part or the value has the wrong type.
    pub set: fn(&mut dyn Any, BeanValue) -> bool,
}

impl FieldDescriptor {
    pub const fn new(
        name: &'static str,
        field_type: FieldType,
        modifiers: FieldModifiers,
        get: fn(&dyn Any) -> Option<BeanValue>,
        set: fn(&mut dyn Any, BeanValue) -> bool,
    ) -> Self {
        Self {
            name,
            field_type,
            modifiers,
            get,
            set,
        }
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("modifiers", &self.modifiers)
            .finish_non_exhaustive()
    }
}

pub struct BeanType {
    pub name: &'static str,
    pub superclass: Option<&'static BeanType>,
    /// Fields declared by this type only.
    pub fields: &'static [FieldDescriptor],
    pub instantiation: Instantiation,
    pub convention: Option<ConventionSource>,
}

impl BeanType {
    /// This type followed by its superclasses.
    pub fn hierarchy(&'static self) -> impl Iterator<Item = &'static BeanType> {
        std::iter::successors(Some(self), |ty| ty.superclass)
    }

    pub fn is_subtype_of(&'static self, other: &BeanType) -> bool {
        self.hierarchy().any(|ty| ptr::eq(ty, other))
    }

    /// Convention source of this type or the nearest superclass declaring one.
    pub fn convention_source(&'static self) -> Option<ConventionSource> {
        self.hierarchy().find_map(|ty| ty.convention)
    }

    pub fn declared_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }
}

impl fmt::Debug for BeanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanType")
            .field("name", &self.name)
            .field("superclass", &self.superclass.map(|ty| ty.name))
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Conversion between a Rust field and a [`BeanValue`].
pub trait FieldValue: Sized {
    fn to_bean_value(&self) -> BeanValue;

    fn from_bean_value(value: BeanValue) -> Option<Self>;
}

macro_rules! scalar_field_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn to_bean_value(&self) -> BeanValue {
                    BeanValue::$variant(self.clone())
                }

                fn from_bean_value(value: BeanValue) -> Option<Self> {
                    match value {
                        BeanValue::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

scalar_field_value! {
    bool => Boolean,
    i32 => Int,
    i64 => Long,
    f64 => Double,
    String => String,
    &'static EnumConstant => Enum,
    BeanRef => Bean,
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_bean_value(&self) -> BeanValue {
        match self {
            Some(value) => value.to_bean_value(),
            None => BeanValue::Null,
        }
    }

    fn from_bean_value(value: BeanValue) -> Option<Self> {
        match value {
            BeanValue::Null => Some(None),
            value => T::from_bean_value(value).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn to_bean_value(&self) -> BeanValue {
        BeanValue::List(self.iter().map(FieldValue::to_bean_value).collect())
    }

    fn from_bean_value(value: BeanValue) -> Option<Self> {
        match value {
            BeanValue::List(items) => items.into_iter().map(T::from_bean_value).collect(),
            _ => None,
        }
    }
}

impl FieldValue for BeanValue {
    fn to_bean_value(&self) -> BeanValue {
        self.clone()
    }

    fn from_bean_value(value: BeanValue) -> Option<Self> {
        Some(value)
    }
}

/// Field holding a runtime object of the named type, such as a thread or a
/// project handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opaque(pub &'static str);

impl FieldValue for Opaque {
    fn to_bean_value(&self) -> BeanValue {
        BeanValue::Opaque(self.0)
    }

    fn from_bean_value(value: BeanValue) -> Option<Self> {
        match value {
            BeanValue::Opaque(name) => Some(Opaque(name)),
            _ => None,
        }
    }
}

/// Returns `true` if both handles point at the same bean.
pub fn same_bean(a: &BeanRef, b: &BeanRef) -> bool {
    Rc::ptr_eq(a, b)
}

/// Builds the [`FieldDescriptor`] of `$owner.$field`.
///
/// ```ignore
/// static FIELDS: &[FieldDescriptor] = &[
///     bean_field!(Compile, source_dir: Option<String>, FieldType::String),
///     bean_field!(Compile, cache: Opaque, FieldType::Named("Cache"), FieldModifiers::TRANSIENT),
/// ];
/// ```
#[macro_export]
macro_rules! bean_field {
    ($owner:ty, $field:ident : $ty:ty, $field_type:expr) => {
        $crate::bean_field!($owner, $field: $ty, $field_type, $crate::beans::FieldModifiers::NONE)
    };
    ($owner:ty, $field:ident : $ty:ty, $field_type:expr, $modifiers:expr) => {
        $crate::beans::FieldDescriptor::new(
            stringify!($field),
            $field_type,
            $modifiers,
            |part: &dyn ::std::any::Any| -> Option<$crate::beans::BeanValue> {
                part.downcast_ref::<$owner>()
                    .map(|owner| $crate::beans::FieldValue::to_bean_value(&owner.$field))
            },
            |part: &mut dyn ::std::any::Any, value: $crate::beans::BeanValue| -> bool {
                let Some(owner) = part.downcast_mut::<$owner>() else {
                    return false;
                };
                match <$ty as $crate::beans::FieldValue>::from_bean_value(value) {
                    Some(value) => {
                        owner.$field = value;
                        true
                    }
                    None => false,
                }
            },
        )
    };
}

/// Implements [`Bean`] for a type described by a `static` descriptor. With a
/// third argument, parts declared by superclasses are found in that embedded
/// field.
#[macro_export]
macro_rules! impl_bean {
    ($ty:ty, $descriptor:path) => {
        impl $crate::beans::Bean for $ty {
            fn bean_type(&self) -> &'static $crate::beans::BeanType {
                &$descriptor
            }

            fn declared_part(
                &self,
                declaring: &'static $crate::beans::BeanType,
            ) -> Option<&dyn ::std::any::Any> {
                if ::std::ptr::eq(declaring, &$descriptor) {
                    Some(self)
                } else {
                    None
                }
            }

            fn declared_part_mut(
                &mut self,
                declaring: &'static $crate::beans::BeanType,
            ) -> Option<&mut dyn ::std::any::Any> {
                if ::std::ptr::eq(declaring, &$descriptor) {
                    Some(self)
                } else {
                    None
                }
            }
        }
    };
    ($ty:ty, $descriptor:path, $parent:ident) => {
        impl $crate::beans::Bean for $ty {
            fn bean_type(&self) -> &'static $crate::beans::BeanType {
                &$descriptor
            }

            fn declared_part(
                &self,
                declaring: &'static $crate::beans::BeanType,
            ) -> Option<&dyn ::std::any::Any> {
                if ::std::ptr::eq(declaring, &$descriptor) {
                    Some(self)
                } else {
                    $crate::beans::Bean::declared_part(&self.$parent, declaring)
                }
            }

            fn declared_part_mut(
                &mut self,
                declaring: &'static $crate::beans::BeanType,
            ) -> Option<&mut dyn ::std::any::Any> {
                if ::std::ptr::eq(declaring, &$descriptor) {
                    Some(self)
                } else {
                    $crate::beans::Bean::declared_part_mut(&mut self.$parent, declaring)
                }
            }
        }
    };
}
