//! Function descriptors and parameter schemas

use super::error::{RegistryError, RegistryResult};
use crate::protocol::{Arguments, ProtocolError, ProtocolResult, ValidationIssue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of a function parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// String value
    String,
    /// Integer value
    Integer,
    /// Any number; integers qualify
    Number,
    /// Boolean value
    Boolean,
    /// Array of values
    Array,
    /// Object/map of values
    Object,
}

impl ParamType {
    /// Check whether a JSON value conforms to this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    /// Name of the JSON type of `value`, for error messages
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_f64() => "number",
            Value::Number(_) => "integer",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::String => write!(f, "string"),
            ParamType::Integer => write!(f, "integer"),
            ParamType::Number => write!(f, "number"),
            ParamType::Boolean => write!(f, "boolean"),
            ParamType::Array => write!(f, "array"),
            ParamType::Object => write!(f, "object"),
        }
    }
}

/// Schema entry for a single parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Declared type
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Whether callers must supply it
    #[serde(default)]
    pub required: bool,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Description of an invocable function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Unique name within the registry
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Parameter schema keyed by parameter name
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,

    /// Whether invocations consume upstream API quota
    #[serde(default)]
    pub rate_limited: bool,
}

impl FunctionDescriptor {
    /// Create a descriptor with no parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
            rate_limited: false,
        }
    }

    /// Build a descriptor from a type map and a list of required names
    pub fn from_parts<I, S>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: BTreeMap<String, ParamType>,
        required: I,
    ) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut descriptor = Self::new(name, description);
        descriptor.parameters = parameters
            .into_iter()
            .map(|(name, param_type)| {
                (
                    name,
                    ParameterSpec {
                        param_type,
                        required: false,
                        description: String::new(),
                    },
                )
            })
            .collect();

        for required_name in required {
            let required_name = required_name.as_ref();
            match descriptor.parameters.get_mut(required_name) {
                Some(spec) => spec.required = true,
                None => {
                    return Err(RegistryError::InvalidSchema {
                        function: descriptor.name,
                        reason: format!(
                            "required parameter '{}' is not declared in the schema",
                            required_name
                        ),
                    })
                }
            }
        }

        descriptor.check()?;
        Ok(descriptor)
    }

    /// Add a required parameter
    pub fn with_param(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.parameters.insert(
            name.into(),
            ParameterSpec {
                param_type,
                required: true,
                description: description.into(),
            },
        );
        self
    }

    /// Add an optional parameter
    pub fn with_optional_param(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.parameters.insert(
            name.into(),
            ParameterSpec {
                param_type,
                required: false,
                description: description.into(),
            },
        );
        self
    }

    /// Mark invocations as consuming upstream quota
    pub fn rate_limited(mut self) -> Self {
        self.rate_limited = true;
        self
    }

    /// Names of the required parameters, in alphabetical order
    pub fn required_parameters(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }

    /// Structural checks applied at registration time
    pub fn check(&self) -> RegistryResult<()> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::InvalidSchema {
                function: self.name.clone(),
                reason: "function name must not be empty".to_string(),
            });
        }
        if let Some(empty) = self.parameters.keys().find(|k| k.trim().is_empty()) {
            return Err(RegistryError::InvalidSchema {
                function: self.name.clone(),
                reason: format!("parameter name '{}' must not be empty", empty),
            });
        }
        Ok(())
    }

    /// Validate call arguments against this schema
    ///
    /// Reports missing required parameters first, then unknown parameters,
    /// then type mismatches; each group in alphabetical order.
    pub fn validate_arguments(&self, arguments: &Arguments) -> ProtocolResult<()> {
        let fail = |parameter: &str, issue: ValidationIssue| ProtocolError::Validation {
            function: self.name.clone(),
            parameter: parameter.to_string(),
            issue,
        };

        for name in self.required_parameters() {
            if arguments.get(name).map_or(true, Value::is_null) {
                return Err(fail(name, ValidationIssue::MissingParameter));
            }
        }

        let mut supplied: Vec<&String> = arguments.keys().collect();
        supplied.sort();

        if let Some(unknown) = supplied
            .iter()
            .find(|name| !self.parameters.contains_key(name.as_str()))
        {
            return Err(fail(unknown, ValidationIssue::UnknownParameter));
        }

        for name in supplied {
            let value = &arguments[name.as_str()];
            let spec = &self.parameters[name.as_str()];
            // null stands for "not supplied" on optional parameters
            if value.is_null() && !spec.required {
                continue;
            }
            if !spec.param_type.matches(value) {
                return Err(fail(
                    name,
                    ValidationIssue::TypeMismatch {
                        expected: spec.param_type,
                        actual: ParamType::describe(value),
                    },
                ));
            }
        }

        Ok(())
    }
}
