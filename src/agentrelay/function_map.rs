//! Registered functions an agent may execute on request.
//!
//! A [`FunctionMap`] associates a function name with a Rust callable (sync or async) and a
//! [`FunctionSpec`] describing its parameters. The spec list is handed to reply generators so a
//! model-backed generator can advertise the functions; the callables are executed by the agent
//! itself when it receives a matching [`FunctionCall`](crate::message::FunctionCall).
//!
//! # Example
//!
//! ```
//! use agentrelay::function_map::{FunctionMap, FunctionParameter, FunctionSpec, ParameterType};
//! use std::sync::Arc;
//!
//! let map = FunctionMap::new().with_function(
//!     FunctionSpec::new("shout", "Upper-case the input")
//!         .with_parameter(FunctionParameter::new("text", ParameterType::String).required()),
//!     Arc::new(|args| {
//!         let text = args["text"].as_str().unwrap_or_default();
//!         Ok(text.to_uppercase())
//!     }),
//! );
//!
//! assert!(map.contains("shout"));
//! assert_eq!(map.specs().len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Synchronous function body: JSON arguments in, text out.
pub type SyncFunction =
    Arc<dyn Fn(JsonValue) -> Result<String, Box<dyn Error + Send + Sync>> + Send + Sync>;

/// Asynchronous function body, for callables backed by I/O (databases, files).
pub type AsyncFunction = Arc<
    dyn Fn(
            JsonValue,
        ) -> Pin<Box<dyn Future<Output = Result<String, Box<dyn Error + Send + Sync>>> + Send>>
        + Send
        + Sync,
>;

/// JSON-schema style type of a function parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

/// One parameter of a registered function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub description: Option<String>,
    pub required: bool,
}

impl FunctionParameter {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
        }
    }

    /// Add a human readable description that will surface in generated schemas.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the argument as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Name, description and parameters of a registered function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<FunctionParameter>,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter definition.
    pub fn with_parameter(mut self, param: FunctionParameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Render the spec in the OpenAI-style `functions` schema shape.
    pub fn to_json_schema(&self) -> JsonValue {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut property = serde_json::Map::new();
            property.insert(
                "type".to_string(),
                serde_json::to_value(&param.param_type).unwrap_or(JsonValue::Null),
            );
            if let Some(description) = &param.description {
                property.insert("description".to_string(), JsonValue::from(description.clone()));
            }
            properties.insert(param.name.clone(), JsonValue::Object(property));
            if param.required {
                required.push(JsonValue::from(param.name.clone()));
            }
        }

        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}

/// Failure while executing a registered function.
#[derive(Debug, Clone)]
pub enum FunctionError {
    /// No function with this name is registered.
    NotFound(String),
    /// Arguments were missing or had the wrong shape.
    InvalidArguments(String),
    /// The function body returned an error.
    ExecutionFailed(String),
}

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionError::NotFound(name) => write!(f, "Function not found: {}", name),
            FunctionError::InvalidArguments(msg) => write!(f, "Invalid arguments: {}", msg),
            FunctionError::ExecutionFailed(msg) => write!(f, "Function execution failed: {}", msg),
        }
    }
}

impl Error for FunctionError {}

/// Fetch a required string argument, failing with [`FunctionError::InvalidArguments`].
pub fn string_arg<'a>(args: &'a JsonValue, name: &str) -> Result<&'a str, FunctionError> {
    args.get(name)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| FunctionError::InvalidArguments(format!("missing string '{}'", name)))
}

#[derive(Clone)]
enum Callable {
    Sync(SyncFunction),
    Async(AsyncFunction),
}

#[derive(Clone)]
struct Entry {
    spec: FunctionSpec,
    callable: Callable,
}

/// Name → callable registry owned by an [`Agent`](crate::agent::Agent).
///
/// Registration order is kept so [`FunctionMap::specs`] is deterministic.
#[derive(Clone, Default)]
pub struct FunctionMap {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
}

impl FunctionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous function (builder pattern).
    pub fn with_function(mut self, spec: FunctionSpec, function: SyncFunction) -> Self {
        self.register(spec, function);
        self
    }

    /// Register an asynchronous function (builder pattern).
    pub fn with_async_function(mut self, spec: FunctionSpec, function: AsyncFunction) -> Self {
        self.register_async(spec, function);
        self
    }

    /// Register a synchronous function. Re-registering a name replaces the previous entry.
    pub fn register(&mut self, spec: FunctionSpec, function: SyncFunction) {
        self.insert(spec, Callable::Sync(function));
    }

    /// Register an asynchronous function. Re-registering a name replaces the previous entry.
    pub fn register_async(&mut self, spec: FunctionSpec, function: AsyncFunction) {
        self.insert(spec, Callable::Async(function));
    }

    fn insert(&mut self, spec: FunctionSpec, callable: Callable) {
        let name = spec.name.clone();
        if !self.entries.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.entries.insert(name, Entry { spec, callable });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Function names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Specs in registration order.
    pub fn specs(&self) -> Vec<FunctionSpec> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .map(|entry| entry.spec.clone())
            .collect()
    }

    /// Execute `name` with `arguments`.
    pub async fn call(&self, name: &str, arguments: JsonValue) -> Result<String, FunctionError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| FunctionError::NotFound(name.to_string()))?;

        let outcome = match &entry.callable {
            Callable::Sync(function) => function(arguments),
            Callable::Async(function) => function(arguments).await,
        };

        outcome.map_err(|e| match e.downcast::<FunctionError>() {
            Ok(function_error) => *function_error,
            Err(other) => FunctionError::ExecutionFailed(other.to_string()),
        })
    }
}

impl fmt::Debug for FunctionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionMap")
            .field("functions", &self.order)
            .finish()
    }
}
