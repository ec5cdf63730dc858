//! Game Object Tools

use std::sync::Arc;

use async_trait::async_trait;

use super::scene::SceneGraph;
use crate::tool::{ParamType, ParameterSchema, Tool, ToolContext, ToolSchema};

/// Creates an empty game object in the open scene
pub struct CreateGameObjectTool {
    scene: Arc<dyn SceneGraph>,
}

impl CreateGameObjectTool {
    pub fn new(scene: Arc<dyn SceneGraph>) -> Self {
        Self { scene }
    }
}

#[async_trait]
impl Tool for CreateGameObjectTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "CreateGameObject".into(),
            description: "Creates a new empty GameObject in the open scene.".into(),
            parameters: vec![
                ParameterSchema::required("objectName", ParamType::String, "Name of the new GameObject"),
                ParameterSchema::optional(
                    "parentName",
                    ParamType::String,
                    "Hierarchy path of an existing parent, e.g. Environment/Props",
                ),
            ],
            destructive: false,
        }
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> String {
        let name = match ctx.require_str("objectName") {
            Ok(name) => name,
            Err(e) => return e,
        };
        let parent = ctx.optional_str("parentName");

        if let Some(parent) = parent {
            if !self.scene.exists(parent) {
                return format!("Error: Parent GameObject '{parent}' was not found.");
            }
        }

        match self.scene.create_object(name, parent) {
            Ok(path) => {
                tracing::info!(object = %path, "GameObject created");
                format!("Created GameObject '{path}'.")
            }
            Err(e) => format!("Error: Could not create GameObject: {e}"),
        }
    }
}

/// Deletes a game object and its children
pub struct DeleteGameObjectTool {
    scene: Arc<dyn SceneGraph>,
}

impl DeleteGameObjectTool {
    pub fn new(scene: Arc<dyn SceneGraph>) -> Self {
        Self { scene }
    }
}

#[async_trait]
impl Tool for DeleteGameObjectTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "DeleteGameObject".into(),
            description: "Deletes a GameObject and all of its children from the open scene.".into(),
            parameters: vec![ParameterSchema::required(
                "objectName",
                ParamType::String,
                "Hierarchy path of the GameObject to delete",
            )],
            destructive: true,
        }
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> String {
        let path = match ctx.require_str("objectName") {
            Ok(path) => path,
            Err(e) => return e,
        };

        if !self.scene.exists(path) {
            return format!("Error: GameObject '{path}' was not found.");
        }

        match self.scene.delete_object(path) {
            Ok(()) => {
                tracing::info!(object = %path, "GameObject deleted");
                format!("Deleted GameObject '{path}'.")
            }
            Err(e) => format!("Error: Could not delete GameObject: {e}"),
        }
    }
}
