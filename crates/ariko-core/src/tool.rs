//! Tool System
//!
//! Tools are the only way the agent changes the project. A tool receives
//! arguments that were already checked against its schema and reports every
//! outcome, failures included, as a human-readable string.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ApiKeys, ProviderKind, Settings, WorkMode};
use crate::error::AgentError;
use crate::provider::ChatClient;
use crate::tools::{
    CreateFileTool, CreateGameObjectTool, DeleteFileTool, DeleteGameObjectTool, ModifyFileTool,
    ReadFileTool, ToolHost,
};

/// A tool call proposed by the model, awaiting confirmation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The model's stated reason for the step
    #[serde(default)]
    pub thought: String,

    /// Registered tool name
    pub tool_name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// JSON type of a tool parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
}

impl ParamType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human-readable description (shown to the LLM)
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
}

impl ParameterSchema {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Tool definition schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Whether the tool deletes project content
    #[serde(default)]
    pub destructive: bool,
}

impl ToolSchema {
    /// Check arguments against the parameter definitions.
    ///
    /// Returns the first violation; it displays as an `Error: ...` string.
    pub fn check_arguments(&self, arguments: &Map<String, Value>) -> Result<(), AgentError> {
        for param in &self.parameters {
            match arguments.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "Missing required parameter '{}'.",
                        param.name
                    )));
                }
                Some(value) if !value.is_null() && !param.param_type.accepts(value) => {
                    return Err(AgentError::ToolValidation(format!(
                        "Parameter '{}' must be a {}.",
                        param.name, param.param_type
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// What a tool sees when it runs
pub struct ToolContext<'a> {
    /// Arguments, already checked against the schema
    pub arguments: &'a Map<String, Value>,

    /// Provider/model active for this turn (for tools that call the LLM)
    pub provider: ProviderKind,
    pub model: &'a str,

    pub settings: &'a Settings,
    pub keys: &'a ApiKeys,
    pub client: &'a dyn ChatClient,
}

impl ToolContext<'_> {
    /// A string argument, or an `Error: ...` string naming the parameter
    pub fn require_str(&self, name: &str) -> Result<&str, String> {
        match self.arguments.get(name) {
            Some(Value::String(value)) if !value.trim().is_empty() => Ok(value),
            Some(Value::String(_)) => Err(format!("Error: Parameter '{name}' must not be empty.")),
            Some(_) => Err(format!("Error: Parameter '{name}' must be a string.")),
            None => Err(format!("Error: Missing required parameter '{name}'.")),
        }
    }

    /// A string argument that may be empty (e.g. file content)
    pub fn require_text(&self, name: &str) -> Result<&str, String> {
        match self.arguments.get(name) {
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(format!("Error: Parameter '{name}' must be a string.")),
            None => Err(format!("Error: Missing required parameter '{name}'.")),
        }
    }

    /// An optional string argument; blank values count as absent
    pub fn optional_str(&self, name: &str) -> Option<&str> {
        self.arguments
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema
    fn schema(&self) -> ToolSchema;

    /// Run the tool. Never panics or errors past this boundary: failures
    /// come back as `Error: ...` strings.
    async fn execute(&self, ctx: &ToolContext<'_>) -> String;
}

/// Tools available in the current work mode, in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry for `settings.work_mode`.
    ///
    /// Ask mode yields no tools. Agent mode yields the non-destructive set,
    /// plus the delete tools when `enable_delete_tools` is set.
    pub fn for_settings(settings: &Settings, host: &ToolHost) -> Self {
        let mut registry = Self::new();
        if settings.work_mode != WorkMode::Agent {
            return registry;
        }

        registry.register(CreateFileTool::new(host.layout.clone()));
        registry.register(ModifyFileTool::new(host.layout.clone()));
        registry.register(ReadFileTool::new(host.layout.clone()));
        registry.register(CreateGameObjectTool::new(host.scene.clone()));

        if settings.enable_delete_tools {
            registry.register(DeleteFileTool::new(host.layout.clone()));
            registry.register(DeleteGameObjectTool::new(host.scene.clone()));
        }

        tracing::debug!(tools = registry.len(), mode = %settings.work_mode, "Tool registry built");
        registry
    }

    /// Register a new tool; a tool with the same name is replaced in place
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        if let Some(slot) = self.tools.iter_mut().find(|t| t.schema().name == name) {
            *slot = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.schema().name == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether the named tool deletes project content; unknown names are not
    pub fn is_destructive(&self, name: &str) -> bool {
        self.get(name).is_some_and(|tool| tool.schema().destructive)
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.schema().name).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool catalog included verbatim in the agent system prompt
    pub fn render_catalog_for_prompt(&self) -> String {
        let mut prompt = String::from("## Available Tools\n");

        for tool in &self.tools {
            let schema = tool.schema();
            let params = schema
                .parameters
                .iter()
                .map(|p| format!("{} ({})", p.name, p.description))
                .collect::<Vec<_>>()
                .join(", ");

            prompt.push_str(&format!("\nTool: {}\n", schema.name));
            prompt.push_str(&format!("Description: {}\n", schema.description));
            prompt.push_str(&format!("Parameters: {params}\n"));
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "Echo".into(),
                description: "Repeats the text".into(),
                parameters: vec![
                    ParameterSchema::required("text", ParamType::String, "Text to repeat"),
                    ParameterSchema::optional("times", ParamType::Number, "Repeat count"),
                ],
                destructive: false,
            }
        }

        async fn execute(&self, ctx: &ToolContext<'_>) -> String {
            match ctx.require_str("text") {
                Ok(text) => text.to_string(),
                Err(e) => e,
            }
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_check_arguments() {
        let schema = EchoTool.schema();
        assert!(schema.check_arguments(&args(json!({"text": "hi"}))).is_ok());
        assert!(schema.check_arguments(&args(json!({"text": "hi", "times": 2}))).is_ok());

        let missing = schema.check_arguments(&args(json!({}))).unwrap_err();
        assert!(matches!(missing, AgentError::ToolValidation(_)));
        assert_eq!(missing.to_string(), "Error: Missing required parameter 'text'.");

        let wrong = schema
            .check_arguments(&args(json!({"text": "hi", "times": "two"})))
            .unwrap_err();
        assert!(wrong.to_string().contains("'times' must be a number"));
    }

    #[test]
    fn test_registry_lookup_and_order() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(EchoTool);

        assert_eq!(registry.len(), 1);
        assert!(registry.get("Echo").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_catalog_format() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let catalog = registry.render_catalog_for_prompt();

        assert!(catalog.contains("Tool: Echo\n"));
        assert!(catalog.contains("Description: Repeats the text\n"));
        assert!(catalog.contains("Parameters: text (Text to repeat), times (Repeat count)\n"));
        assert_eq!(catalog, registry.render_catalog_for_prompt());
    }
}
