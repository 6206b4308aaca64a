use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::LLMError;

pub mod http;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: FunctionParameters,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: FunctionParameters::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn add_parameter(&mut self, parameter: FunctionParameter) {
        let FunctionParameter {
            name,
            mut schema,
            description,
            required,
            default,
        } = parameter;

        if let Some(object) = schema.as_object_mut() {
            if let Some(description) = description {
                object.insert("description".to_string(), Value::String(description));
            }
            if let Some(default) = default {
                object.insert("default".to_string(), default);
            }
        }

        if required {
            self.parameters.required.push(name.clone());
        }

        self.parameters.properties.insert(name, schema);
    }
}

/// JSON schema of a function's argument object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionParameters {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
}

impl Default for FunctionParameters {
    fn default() -> Self {
        Self {
            kind: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: Some(false),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionParameter {
    pub name: String,
    pub schema: Value,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
}

impl FunctionParameter {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            description: None,
            required: true,
            default: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: ToolType,
    pub function: FunctionDefinition,
}

impl From<FunctionDefinition> for Tool {
    fn from(function: FunctionDefinition) -> Self {
        Self {
            kind: ToolType::Function,
            function,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Function,
}

#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
    pub raw_arguments: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            raw_arguments: None,
        }
    }
}

/// A model-requested tool invocation, in the chat-completions wire shape
/// (`arguments` travel as a JSON-encoded string).
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: Option<String>,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(function: FunctionCall) -> Self {
        Self { id: None, function }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl Serialize for ToolCall {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let arguments = match &self.function.raw_arguments {
            Some(raw) => raw.clone(),
            None => serde_json::to_string(&self.function.arguments)
                .map_err(serde::ser::Error::custom)?,
        };

        let mut state = serializer.serialize_struct("ToolCall", 3)?;
        if let Some(id) = &self.id {
            state.serialize_field("id", id)?;
        }
        state.serialize_field("type", "function")?;
        state.serialize_field(
            "function",
            &WireFunctionCall {
                name: self.function.name.clone(),
                arguments,
            },
        )?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ToolCall {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct WireToolCall {
            id: Option<String>,
            #[serde(rename = "type", default = "default_call_type")]
            kind: String,
            function: WireFunctionCall,
        }

        let wire = WireToolCall::deserialize(deserializer)?;
        if wire.kind != "function" {
            return Err(serde::de::Error::custom(format!(
                "unsupported tool call type '{}'",
                wire.kind
            )));
        }

        let arguments = if wire.function.arguments.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&wire.function.arguments).map_err(|error| {
                serde::de::Error::custom(format!("failed to parse function arguments: {error}"))
            })?
        };

        Ok(Self {
            id: wire.id,
            function: FunctionCall {
                name: wire.function.name,
                arguments,
                raw_arguments: Some(wire.function.arguments),
            },
        })
    }
}

fn default_call_type() -> String {
    "function".to_string()
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[async_trait]
pub trait KernelFunction: Send + Sync {
    fn definition(&self) -> FunctionDefinition;

    async fn invoke(&self, arguments: &Value) -> Result<Value, LLMError>;
}

pub type DynKernelFunction = Arc<dyn KernelFunction>;

/// Tools an agent may call, keyed by function name.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, DynKernelFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: DynKernelFunction) {
        let name = function.definition().name;
        self.functions.insert(name, function);
    }

    pub fn get(&self, name: &str) -> Option<&DynKernelFunction> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn definitions(&self) -> Vec<FunctionDefinition> {
        self.functions
            .values()
            .map(|function| function.definition())
            .collect()
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.definitions().into_iter().map(Tool::from).collect()
    }

    pub async fn invoke(&self, call: &FunctionCall) -> Result<Value, LLMError> {
        let function = self
            .get(&call.name)
            .ok_or_else(|| LLMError::UnknownFunction(call.name.clone()))?;
        function.invoke(&call.arguments).await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    None,
    Auto,
    Required,
}
