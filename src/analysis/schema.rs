//! Analysis schema: the classes, properties, functions and value factories a
//! script may use.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use dcl_language::LiteralValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read schema {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schema: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid schema: {0}")]
    Invalid(String),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Type of a property, parameter or value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    Int,
    Long,
    String,
    Boolean,
    Class(String),
}

impl DataType {
    pub fn of_literal(value: &LiteralValue) -> Self {
        match value {
            LiteralValue::Int(_) => DataType::Int,
            LiteralValue::Long(_) => DataType::Long,
            LiteralValue::Boolean(_) => DataType::Boolean,
            LiteralValue::String(_) => DataType::String,
        }
    }

    /// Whether a value of type `actual` may be stored where `self` is expected.
    /// Int values widen to long.
    pub fn accepts(&self, actual: &DataType) -> bool {
        self == actual || (*self == DataType::Long && *actual == DataType::Int)
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            DataType::Class(name) => Some(name),
            _ => None,
        }
    }
}

impl From<String> for DataType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "int" => DataType::Int,
            "long" => DataType::Long,
            "string" => DataType::String,
            "boolean" => DataType::Boolean,
            _ => DataType::Class(name),
        }
    }
}

impl From<DataType> for String {
    fn from(data_type: DataType) -> Self {
        data_type.to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => f.write_str("int"),
            DataType::Long => f.write_str("long"),
            DataType::String => f.write_str("string"),
            DataType::Boolean => f.write_str("boolean"),
            DataType::Class(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    /// Configures an object owned by the receiver through the lambda.
    Configuring,
    /// Adds a new object of the `returns` class to the receiver.
    Adding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFunction {
    pub name: String,
    pub kind: FunctionKind,
    #[serde(default)]
    pub parameters: Vec<DataType>,
    /// Class created by an adding function.
    #[serde(default)]
    pub returns: Option<String>,
    /// Receiver class of the lambda, if the function accepts one.
    #[serde(default)]
    pub block: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataClass {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<DataProperty>,
    #[serde(default)]
    pub functions: Vec<SchemaFunction>,
}

impl DataClass {
    pub fn property(&self, name: &str) -> Option<&DataProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn functions_named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s SchemaFunction> {
        self.functions.iter().filter(move |f| f.name == name)
    }
}

/// `a.b.file(string): File`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFactory {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<DataType>,
    pub returns: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSchema {
    pub top_level_receiver: String,
    #[serde(default)]
    pub classes: Vec<DataClass>,
    #[serde(default)]
    pub value_factories: Vec<ValueFactory>,
}

impl AnalysisSchema {
    pub fn from_toml_str(text: &str) -> SchemaResult<Self> {
        let schema: AnalysisSchema = toml::from_str(text)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn load(path: &Path) -> SchemaResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let schema = Self::from_toml_str(&text)?;
        tracing::debug!(
            path = %path.display(),
            classes = schema.classes.len(),
            factories = schema.value_factories.len(),
            "loaded analysis schema"
        );
        Ok(schema)
    }

    pub fn class(&self, name: &str) -> Option<&DataClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn value_factory(&self, dotted_name: &str) -> Option<&ValueFactory> {
        self.value_factories.iter().find(|f| f.name == dotted_name)
    }

    /// Every class referenced anywhere in the schema must be declared, and
    /// class names must be unique.
    pub fn validate(&self) -> SchemaResult<()> {
        let mut declared = HashMap::new();
        for class in &self.classes {
            if declared.insert(class.name.as_str(), class).is_some() {
                return Err(SchemaError::Invalid(format!("class `{}` is declared twice", class.name)));
            }
        }

        let check = |name: &str, context: &str| -> SchemaResult<()> {
            if declared.contains_key(name) {
                Ok(())
            } else {
                Err(SchemaError::Invalid(format!("{context} refers to unknown class `{name}`")))
            }
        };
        let check_type = |data_type: &DataType, context: &str| match data_type.class_name() {
            Some(name) => check(name, context),
            None => Ok(()),
        };

        check(&self.top_level_receiver, "top-level receiver")?;
        for class in &self.classes {
            for property in &class.properties {
                check_type(&property.data_type, &format!("property `{}.{}`", class.name, property.name))?;
            }
            for function in &class.functions {
                let context = format!("function `{}.{}`", class.name, function.name);
                for parameter in &function.parameters {
                    check_type(parameter, &context)?;
                }
                if let Some(block) = &function.block {
                    check(block, &context)?;
                }
                match (function.kind, &function.returns) {
                    (FunctionKind::Adding, Some(returns)) => check(returns, &context)?,
                    (FunctionKind::Adding, None) => {
                        return Err(SchemaError::Invalid(format!("{context} adds an object but declares no `returns`")))
                    }
                    (FunctionKind::Configuring, _) if function.block.is_none() => {
                        return Err(SchemaError::Invalid(format!("{context} configures an object but declares no `block`")))
                    }
                    (FunctionKind::Configuring, _) => {}
                }
            }
        }
        for factory in &self.value_factories {
            let context = format!("value factory `{}`", factory.name);
            for parameter in &factory.parameters {
                check_type(parameter, &context)?;
            }
            check_type(&factory.returns, &context)?;
        }
        Ok(())
    }
}
