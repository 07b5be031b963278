use std::cell::RefCell;
use std::fmt;
use std::ptr;
use std::rc::Rc;

use super::descriptor::Bean;

/// Shared, mutable handle to a bean in an object graph.
pub type BeanRef = Rc<RefCell<Box<dyn Bean>>>;

pub fn bean_ref(bean: impl Bean) -> BeanRef {
    let bean: Box<dyn Bean> = Box::new(bean);
    Rc::new(RefCell::new(bean))
}

/// Address used to recognize an already written bean.
pub(crate) fn bean_address(bean: &BeanRef) -> usize {
    Rc::as_ptr(bean) as usize
}

#[derive(Debug)]
pub struct EnumType {
    pub name: &'static str,
    pub constants: &'static [EnumConstant],
}

impl EnumType {
    pub fn constant(&'static self, ordinal: u32) -> Option<&'static EnumConstant> {
        self.constants.get(ordinal as usize)
    }
}

/// Enum constants are singletons: values refer to them by `'static`
/// reference and compare by address.
#[derive(Debug)]
pub struct EnumConstant {
    pub enum_name: &'static str,
    pub name: &'static str,
    pub ordinal: u32,
}

/// A value held by a bean field.
#[derive(Clone)]
pub enum BeanValue {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    List(Vec<BeanValue>),
    Enum(&'static EnumConstant),
    Bean(BeanRef),
    /// A runtime object of the named type that has no persistent form.
    Opaque(&'static str),
}

impl BeanValue {
    pub fn kind(&self) -> &'static str {
        match self {
            BeanValue::Null => "null",
            BeanValue::Boolean(_) => "boolean",
            BeanValue::Int(_) => "int",
            BeanValue::Long(_) => "long",
            BeanValue::Double(_) => "double",
            BeanValue::String(_) => "string",
            BeanValue::List(_) => "list",
            BeanValue::Enum(_) => "enum",
            BeanValue::Bean(_) => "bean",
            BeanValue::Opaque(name) => name,
        }
    }

    pub fn as_bean(&self) -> Option<&BeanRef> {
        match self {
            BeanValue::Bean(bean) => Some(bean),
            _ => None,
        }
    }
}

/// Beans and enum constants compare by identity, everything else by value.
impl PartialEq for BeanValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BeanValue::Null, BeanValue::Null) => true,
            (BeanValue::Boolean(a), BeanValue::Boolean(b)) => a == b,
            (BeanValue::Int(a), BeanValue::Int(b)) => a == b,
            (BeanValue::Long(a), BeanValue::Long(b)) => a == b,
            (BeanValue::Double(a), BeanValue::Double(b)) => a.to_bits() == b.to_bits(),
            (BeanValue::String(a), BeanValue::String(b)) => a == b,
            (BeanValue::List(a), BeanValue::List(b)) => a == b,
            (BeanValue::Enum(a), BeanValue::Enum(b)) => ptr::eq(*a, *b),
            (BeanValue::Bean(a), BeanValue::Bean(b)) => Rc::ptr_eq(a, b),
            (BeanValue::Opaque(a), BeanValue::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for BeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanValue::Null => f.write_str("Null"),
            BeanValue::Boolean(value) => write!(f, "Boolean({value})"),
            BeanValue::Int(value) => write!(f, "Int({value})"),
            BeanValue::Long(value) => write!(f, "Long({value})"),
            BeanValue::Double(value) => write!(f, "Double({value})"),
            BeanValue::String(value) => write!(f, "String({value:?})"),
            BeanValue::List(items) => f.debug_tuple("List").field(items).finish(),
            BeanValue::Enum(constant) => write!(f, "Enum({}.{})", constant.enum_name, constant.name),
            // Graphs may be cyclic; only the type is printed.
            BeanValue::Bean(bean) => match bean.try_borrow() {
                Ok(bean) => write!(f, "Bean({})", bean.bean_type().name),
                Err(_) => f.write_str("Bean(<borrowed>)"),
            },
            BeanValue::Opaque(name) => write!(f, "Opaque({name})"),
        }
    }
}
