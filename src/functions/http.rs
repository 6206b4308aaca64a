//! Tools backed by plain HTTP endpoints, such as a mock environment server.
//!
//! A tools file is YAML:
//!
//! ```yaml
//! tools:
//!   - name: email_search
//!     description: Search the mailbox
//!     method: GET
//!     url: http://localhost:8000/email/search
//!     query:
//!       query: { type: string, description: Free-text search }
//! ```

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::error::LLMError;
use crate::functions::{FunctionDefinition, FunctionParameter, FunctionRegistry, KernelFunction};

#[derive(Debug, Error)]
pub enum HttpToolError {
    #[error("failed to read http tool spec: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse http tool spec: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid http tool spec: {0}")]
    Invalid(String),
    #[error("missing env var {0} for bearer auth")]
    MissingEnv(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    Bearer,
    Header,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSpec {
    #[serde(rename = "type")]
    kind: AuthKind,
    #[serde(default)]
    env: Option<String>,
    #[serde(default)]
    header: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default, rename = "enum")]
    enum_values: Option<Vec<Value>>,
}

impl ParamSpec {
    fn to_schema(&self) -> Value {
        let mut schema = json!({ "type": self.ty });
        if let (Some(values), Some(object)) = (&self.enum_values, schema.as_object_mut()) {
            if !values.is_empty() {
                object.insert("enum".to_string(), Value::Array(values.clone()));
            }
        }
        schema
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub auth: Option<AuthSpec>,
    #[serde(default)]
    pub query: HashMap<String, ParamSpec>,
    #[serde(default)]
    pub body: HashMap<String, ParamSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsFile {
    #[serde(default)]
    pub tools: Vec<HttpToolSpec>,
}

pub fn parse_http_tools(content: &str) -> Result<FunctionRegistry, HttpToolError> {
    let file: ToolsFile = serde_yaml::from_str(content)?;
    let mut registry = FunctionRegistry::new();

    for spec in file.tools {
        if spec.name.trim().is_empty() {
            return Err(HttpToolError::Invalid("tool name must not be empty".into()));
        }
        Method::from_bytes(spec.method.to_uppercase().as_bytes())
            .map_err(|_| HttpToolError::Invalid(format!("unsupported method '{}'", spec.method)))?;
        if registry.get(&spec.name).is_some() {
            return Err(HttpToolError::Invalid(format!("duplicate tool '{}'", spec.name)));
        }
        registry.register(Arc::new(HttpFunction::new(spec)));
    }

    Ok(registry)
}

pub fn load_http_tools(path: impl AsRef<Path>) -> Result<FunctionRegistry, HttpToolError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_http_tools(&content)
}

#[derive(Clone)]
pub struct HttpFunction {
    definition: FunctionDefinition,
    spec: HttpToolSpec,
    client: reqwest::Client,
}

impl HttpFunction {
    pub fn new(spec: HttpToolSpec) -> Self {
        let definition = build_definition(&spec);
        Self {
            definition,
            spec,
            client: reqwest::Client::new(),
        }
    }

    fn apply_auth(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, HttpToolError> {
        let Some(auth) = &self.spec.auth else {
            return Ok(request);
        };

        match auth.kind {
            AuthKind::Bearer => {
                let env_key = auth
                    .env
                    .clone()
                    .ok_or_else(|| HttpToolError::Invalid("bearer auth requires env key".into()))?;
                let token = env::var(&env_key).map_err(|_| HttpToolError::MissingEnv(env_key))?;
                Ok(request.bearer_auth(token))
            }
            AuthKind::Header => {
                let header = auth
                    .header
                    .clone()
                    .ok_or_else(|| HttpToolError::Invalid("header auth requires header name".into()))?;
                let value = auth
                    .value
                    .clone()
                    .ok_or_else(|| HttpToolError::Invalid("header auth requires value".into()))?;
                Ok(request.header(header, value))
            }
        }
    }

    fn execution_error(&self, message: impl Into<String>) -> LLMError {
        LLMError::FunctionExecution {
            function: self.definition.name.clone(),
            message: message.into(),
        }
    }
}

fn build_definition(spec: &HttpToolSpec) -> FunctionDefinition {
    let mut definition = FunctionDefinition::new(spec.name.clone());
    if let Some(description) = &spec.description {
        definition = definition.with_description(description.clone());
    }

    // HashMap order is unstable; sort so the advertised schema is reproducible.
    let mut params: Vec<(&String, &ParamSpec)> = spec.query.iter().chain(spec.body.iter()).collect();
    params.sort_by(|a, b| a.0.cmp(b.0));

    for (name, meta) in params {
        let mut parameter = FunctionParameter::new(name, meta.to_schema());
        if let Some(description) = &meta.description {
            parameter = parameter.with_description(description.clone());
        }
        if !meta.required.unwrap_or(true) {
            parameter = parameter.optional();
        }
        if let Some(default) = &meta.default {
            parameter = parameter.with_default(default.clone());
        }
        definition.add_parameter(parameter);
    }

    definition
}

#[async_trait]
impl KernelFunction for HttpFunction {
    fn definition(&self) -> FunctionDefinition {
        self.definition.clone()
    }

    async fn invoke(&self, arguments: &Value) -> Result<Value, LLMError> {
        let method = Method::from_bytes(self.spec.method.to_uppercase().as_bytes())
            .map_err(|e| LLMError::InvalidFunctionArguments(e.to_string()))?;
        let mut request = self.client.request(method, &self.spec.url);

        for (key, value) in &self.spec.headers {
            request = request.header(key, value);
        }
        request = self
            .apply_auth(request)
            .map_err(|e| self.execution_error(e.to_string()))?;

        let args = arguments
            .as_object()
            .ok_or_else(|| LLMError::InvalidFunctionArguments("arguments must be an object".into()))?;

        let pairs: Vec<(&str, String)> = self
            .spec
            .query
            .keys()
            .filter_map(|key| {
                args.get(key).map(|value| match value.as_str() {
                    Some(text) => (key.as_str(), text.to_string()),
                    None => (key.as_str(), value.to_string()),
                })
            })
            .collect();
        if !pairs.is_empty() {
            request = request.query(&pairs);
        }

        if !self.spec.body.is_empty() {
            let body: serde_json::Map<String, Value> = self
                .spec
                .body
                .keys()
                .filter_map(|key| args.get(key).map(|value| (key.clone(), value.clone())))
                .collect();
            request = request.json(&Value::Object(body));
        }

        let response = request.send().await?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .is_some_and(|content_type| content_type.contains("application/json"));

        if is_json {
            let body: Value = response.json().await?;
            Ok(json!({ "status": status.as_u16(), "body": body }))
        } else {
            let body = response.text().await?;
            Ok(json!({ "status": status.as_u16(), "body": body }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_http_tools, HttpToolError};

    const TOOLS: &str = r#"
tools:
  - name: email_search
    description: Search the mailbox
    method: get
    url: http://localhost:8000/email/search
    query:
      query: { type: string, description: Free-text search }
      limit: { type: integer, required: false, default: 10 }
  - name: slack_post
    method: POST
    url: http://localhost:8000/slack/messages
    body:
      channel: { type: string, enum: [general, random] }
      text: { type: string }
"#;

    #[test]
    fn loads_tools_into_registry() {
        let registry = parse_http_tools(TOOLS).expect("tools should parse");
        assert_eq!(registry.len(), 2);

        let search = registry.get("email_search").expect("email_search registered");
        let definition = search.definition();
        assert_eq!(definition.description.as_deref(), Some("Search the mailbox"));
        assert_eq!(definition.parameters.required, vec!["query".to_string()]);
        assert_eq!(definition.parameters.properties["limit"]["default"], 10);

        let post = registry.get("slack_post").expect("slack_post registered");
        let channel = &post.definition().parameters.properties["channel"];
        assert_eq!(channel["enum"][0], "general");
    }

    #[test]
    fn rejects_duplicate_names() {
        let yaml = r#"
tools:
  - { name: a, method: GET, url: "http://x" }
  - { name: a, method: GET, url: "http://y" }
"#;
        let error = parse_http_tools(yaml).err().expect("duplicate should fail");
        assert!(matches!(error, HttpToolError::Invalid(message) if message.contains("duplicate")));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let error = parse_http_tools("tools: [ {name: 3").err().expect("should fail");
        assert!(matches!(error, HttpToolError::Parse(_)));
    }
}
