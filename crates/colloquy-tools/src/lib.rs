//! # colloquy-tools
//!
//! Tool registry and execution for the colloquy chat backend.
//!
//! Tools are registered once at process start and are immutable for the
//! process lifetime. The model requests a tool by name with serialized JSON
//! arguments; the executor resolves the name, parses the arguments, and
//! invokes the tool. The executor never interprets tool output — in-band
//! error strings produced by a tool (e.g. a division-by-zero message) are
//! returned unchanged.
//!
//! ## Example
//!
//! ```rust
//! use colloquy_tools::{ToolImplementation, ToolRegistry, ToolExecutor};
//! use colloquy_common::tools::{Tool, Function, ToolCall};
//! use serde_json::{json, Value};
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use std::sync::Arc;
//!
//! struct GreetingTool;
//!
//! #[async_trait]
//! impl ToolImplementation for GreetingTool {
//!     fn definition(&self) -> Tool {
//!         Tool {
//!             r#type: "function".to_string(),
//!             function: Function {
//!                 name: "greet".to_string(),
//!                 description: "Greet a person by name".to_string(),
//!                 parameters: json!({
//!                     "type": "object",
//!                     "properties": {
//!                         "name": { "type": "string", "description": "The person's name" }
//!                     },
//!                     "required": ["name"]
//!                 }),
//!             },
//!         }
//!     }
//!
//!     async fn execute(&self, args: &Value) -> Result<String> {
//!         let name = args["name"].as_str().unwrap_or("stranger");
//!         Ok(format!("Hello, {}!", name))
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let registry = ToolRegistry::new();
//! registry.register(Arc::new(GreetingTool));
//!
//! let executor = ToolExecutor::new(registry);
//! let call = ToolCall::new("greet", r#"{"name": "Ada"}"#);
//! let result = executor.execute_tool(&call).await?;
//! assert_eq!(result, "Hello, Ada!");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

use colloquy_common::tools::{FunctionCall, Tool, ToolCall};

pub mod builtin;

pub use builtin::{CalculatorTool, CurrentDateTool, WeatherTool};

/// Errors produced by tool resolution and execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The model requested a tool name that is not registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The serialized arguments were not valid JSON.
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    /// The tool itself failed.
    #[error(transparent)]
    Execution(#[from] anyhow::Error),
}

/// A callable capability exposed to the model.
///
/// Implementations own any external I/O they perform, including timeout
/// policy for outbound requests.
#[async_trait]
pub trait ToolImplementation: Send + Sync {
    /// The tool's definition in the provider's function-calling format.
    fn definition(&self) -> Tool;

    /// Executes the tool with parsed JSON arguments.
    async fn execute(&self, args: &Value) -> Result<String>;
}

/// Thread-safe registry of tools keyed by name.
///
/// The last registration for a given name wins; there is no duplicate
/// detection. Cloning is cheap and shares the underlying map.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn ToolImplementation>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: Arc::new(DashMap::new()),
        }
    }

    /// Registers a tool under its declared name.
    pub fn register(&self, tool: Arc<dyn ToolImplementation>) {
        let name = tool.definition().function.name;
        self.tools.insert(name, tool);
    }

    /// Looks up a tool by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolImplementation>> {
        self.tools.get(name).map(|r| r.value().clone())
    }

    /// Returns all registered tool definitions. Order is not significant.
    #[must_use]
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Returns whether a tool with the given name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the registry holds no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Resolves and executes tool calls against a registry.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: ToolRegistry,
}

impl ToolExecutor {
    /// Creates an executor over the given registry.
    #[must_use]
    pub const fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Returns all tool definitions for inclusion in a chat request.
    #[must_use]
    pub fn definitions(&self) -> Vec<Tool> {
        self.registry.definitions()
    }

    /// Returns whether the underlying registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Executes a tool call, returning the tool's textual output.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] if no tool matches the requested
    /// name, [`ToolError::InvalidArguments`] if the serialized arguments do
    /// not parse, or [`ToolError::Execution`] if the tool itself fails.
    pub async fn execute_tool(&self, tool_call: &ToolCall) -> Result<String, ToolError> {
        let function = &tool_call.function;

        let tool = self
            .registry
            .get(&function.name)
            .ok_or_else(|| ToolError::UnknownTool(function.name.clone()))?;

        let args = Self::parse_arguments(function)?;

        Ok(tool.execute(&args).await?)
    }

    fn parse_arguments(function: &FunctionCall) -> Result<Value, serde_json::Error> {
        serde_json::from_str(function.arguments_json())
    }
}
