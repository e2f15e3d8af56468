//! Tool calling and function descriptor types.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Describes a single property in a function parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Property {
    /// The JSON type (e.g., "string", "number").
    #[serde(rename = "type")]
    pub prop_type: String,
    /// Human-readable description of this property.
    pub description: String,
    /// Allowed enum values for this property.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl Property {
    /// Creates a string property.
    #[must_use]
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            prop_type: "string".to_string(),
            description: description.into(),
            enum_values: None,
        }
    }

    /// Creates a number property.
    #[must_use]
    pub fn number(description: impl Into<String>) -> Self {
        Self {
            prop_type: "number".to_string(),
            description: description.into(),
            enum_values: None,
        }
    }

    /// Creates a string property with allowed enum values.
    #[must_use]
    pub fn string_enum(description: impl Into<String>, values: Vec<&str>) -> Self {
        Self {
            prop_type: "string".to_string(),
            description: description.into(),
            enum_values: Some(values.into_iter().map(String::from).collect()),
        }
    }
}

/// Defines the parameter schema for a function using JSON Schema conventions.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Parameters {
    /// The JSON type, typically "object".
    #[serde(rename = "type")]
    pub param_type: String,
    /// Map of parameter names to their property definitions.
    pub properties: HashMap<String, Property>,
    /// List of required parameter names.
    pub required: Vec<String>,
}

impl Parameters {
    /// Creates a new `Parameters` with type "object".
    #[must_use]
    pub fn new(properties: HashMap<String, Property>, required: Vec<String>) -> Self {
        Self {
            param_type: "object".to_string(),
            properties,
            required,
        }
    }
}

impl From<Parameters> for serde_json::Value {
    fn from(params: Parameters) -> Self {
        // Parameters is composed entirely of String, HashMap, and Vec fields,
        // all of which serialize infallibly. The Err arm is unreachable in
        // practice but we log rather than silently returning Null.
        match serde_json::to_value(params) {
            Ok(value) => value,
            Err(e) => {
                warn!("Parameters serialization unexpectedly failed: {e}");
                Self::Null
            }
        }
    }
}

/// Describes a function that can be called by an LLM.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Function {
    /// The name of the function.
    pub name: String,
    /// Human-readable description of what the function does.
    pub description: String,
    /// JSON Schema definition of the function's parameters.
    pub parameters: serde_json::Value,
}

/// A tool available to the LLM, wrapping a function definition.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, Eq, PartialEq)]
pub struct Tool {
    /// The type of tool (defaults to "function").
    #[serde(rename = "type")]
    #[builder(default = "function".to_string())]
    pub r#type: String,
    /// The function definition.
    pub function: Function,
}

/// An invocation of a function with serialized arguments.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    /// The name of the function being called.
    pub name: String,
    /// The arguments as a single JSON string, passed through from the
    /// provider as-is.
    pub arguments: String,
}

impl FunctionCall {
    /// Returns the arguments as a JSON string slice.
    ///
    /// Returns `"{}"` if the arguments string is empty.
    #[must_use]
    pub fn arguments_json(&self) -> &str {
        if self.arguments.is_empty() {
            "{}"
        } else {
            &self.arguments
        }
    }
}

/// A complete tool call from an LLM, including ID and function details.
///
/// Arguments are not validated here; parsing happens at execution time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Unique identifier for this tool call.
    pub id: String,
    /// The function being invoked.
    pub function: FunctionCall,
    /// The type of call, typically "function".
    pub call_type: String,
}

impl ToolCall {
    /// Creates a new tool call with a generated ID.
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
            call_type: "function".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn test_property_creation() {
        let prop = Property::string("The user's name");

        assert_eq!(prop.prop_type, "string");
        assert_eq!(prop.description, "The user's name");
        assert!(prop.enum_values.is_none());
    }

    #[test]
    fn test_property_string_enum() {
        let prop = Property::string_enum("Units", vec!["metric", "imperial"]);

        let json = serde_json::to_value(&prop).expect("Failed to serialize");
        assert_eq!(json["type"], "string");
        assert_eq!(json["enum"], serde_json::json!(["metric", "imperial"]));

        let deserialized: Property = serde_json::from_value(json).expect("Failed to deserialize");
        assert_eq!(prop, deserialized);
    }

    #[test]
    fn test_property_serialization_omits_empty_enum() {
        let prop = Property::number("Age in years");

        let json = serde_json::to_value(&prop).expect("Failed to serialize");
        assert_eq!(json["type"], "number");
        assert!(json.get("enum").is_none());
    }

    #[test]
    fn test_parameters_into_value() {
        let mut properties = HashMap::new();
        properties.insert("x".to_string(), Property::number("A number"));
        let params = Parameters::new(properties, vec!["x".to_string()]);

        let value: serde_json::Value = params.into();
        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"]["x"]["type"], "number");
        assert_eq!(value["required"], serde_json::json!(["x"]));
    }

    #[test]
    fn test_tool_builder() {
        let tool = Tool::builder()
            .function(Function {
                name: "get_weather".to_string(),
                description: "Get weather for a location".to_string(),
                parameters: serde_json::json!({}),
            })
            .build();

        assert_eq!(tool.r#type, "function");
        assert_eq!(tool.function.name, "get_weather");
    }

    #[test]
    fn test_tool_call_new() {
        let call = ToolCall::new("get_weather", r#"{"city":"NYC"}"#);

        assert!(!call.id.is_empty());
        assert_eq!(call.function.name, "get_weather");
        assert_eq!(call.function.arguments, r#"{"city":"NYC"}"#);
        assert_eq!(call.call_type, "function");
    }

    #[test]
    fn test_tool_call_empty_args() {
        let call = ToolCall::new("no_args_func", "");

        assert!(call.function.arguments.is_empty());
        assert_eq!(call.function.arguments_json(), "{}");
    }

    #[test]
    fn test_tool_call_unique_ids() {
        let call1 = ToolCall::new("func", "");
        let call2 = ToolCall::new("func", "");

        assert_ne!(call1.id, call2.id);
    }
}
