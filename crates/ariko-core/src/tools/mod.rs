//! Built-in Tools
//!
//! File tools act on the project's content folder; game-object tools act on
//! the host scene graph. Both collaborators are injected through [`ToolHost`].

mod files;
mod game_objects;
mod project;
mod scene;

use std::sync::Arc;

pub use files::{CreateFileTool, DeleteFileTool, ModifyFileTool, ReadFileTool};
pub use game_objects::{CreateGameObjectTool, DeleteGameObjectTool};
pub use project::{ProjectLayout, replace_file, write_new_file};
pub use scene::{InMemorySceneGraph, SceneGraph};

/// Host primitives the tools are built on
#[derive(Clone)]
pub struct ToolHost {
    pub layout: ProjectLayout,
    pub scene: Arc<dyn SceneGraph>,
}

impl ToolHost {
    pub fn new(layout: ProjectLayout, scene: Arc<dyn SceneGraph>) -> Self {
        Self { layout, scene }
    }
}
