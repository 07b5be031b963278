//! Where in the object graph a value was found.

use std::fmt;

/// Path from the graph root to the value currently being written or read.
///
/// Rendered innermost first: ``field `bar` of `Foo` bean found in graph``.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PropertyTrace {
    #[default]
    Unknown,
    Root(String),
    Bean {
        type_name: String,
        trace: Box<PropertyTrace>,
    },
    Field {
        name: String,
        trace: Box<PropertyTrace>,
    },
    Element {
        index: usize,
        trace: Box<PropertyTrace>,
    },
}

impl PropertyTrace {
    pub fn root(name: impl Into<String>) -> Self {
        PropertyTrace::Root(name.into())
    }

    pub fn bean(&self, type_name: impl Into<String>) -> Self {
        PropertyTrace::Bean {
            type_name: type_name.into(),
            trace: Box::new(self.clone()),
        }
    }

    pub fn field(&self, name: impl Into<String>) -> Self {
        PropertyTrace::Field {
            name: name.into(),
            trace: Box::new(self.clone()),
        }
    }

    pub fn element(&self, index: usize) -> Self {
        PropertyTrace::Element {
            index,
            trace: Box::new(self.clone()),
        }
    }
}

impl fmt::Display for PropertyTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyTrace::Unknown => f.write_str("unknown location"),
            PropertyTrace::Root(name) => f.write_str(name),
            PropertyTrace::Bean { type_name, trace } => {
                write!(f, "`{type_name}` bean found in {trace}")
            }
            PropertyTrace::Field { name, trace } => match trace.as_ref() {
                PropertyTrace::Bean { type_name, trace } => {
                    write!(f, "field `{name}` of `{type_name}` bean found in {trace}")
                }
                other => write!(f, "field `{name}` of {other}"),
            },
            PropertyTrace::Element { index, trace } => write!(f, "element {index} of {trace}"),
        }
    }
}
