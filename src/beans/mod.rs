//! Bean property serialization.
//!
//! Types describe their fields with static descriptors. The relevant fields of
//! each type are computed once, then written and read field by field through a
//! [`ValueCodec`]. Fields that cannot be persisted become soft problems instead
//! of failing the whole graph.

mod cache;
mod codec;
mod descriptor;
mod field_type;
pub mod framework;
mod property;
mod registry;
mod relevant_fields;
mod value;

pub use cache::BeanStateCache;
pub use codec::{DefaultValueCodec, ValueCodec};
pub use descriptor::{
    blank, same_bean, Bean, BeanType, ConventionSource, FieldDescriptor, FieldModifiers, FieldValue,
    Instantiation, Opaque,
};
pub use field_type::{FieldType, UNSUPPORTED_TYPES};
pub use property::{
    BeanPropertyReader, BeanPropertyWriter, BeanStateReader, BeanStateWriter, InstantiationScheme,
    FIELD_PRESENT, FIELD_SKIPPED,
};
pub use registry::TypeRegistry;
pub use relevant_fields::{find_relevant, relevant_fields_of, IgnoredFields, RelevantField};
pub use value::{bean_ref, BeanRef, BeanValue, EnumConstant, EnumType};
