//! Scene Graph
//!
//! Object-lookup primitives the host supplies to the game-object tools.

use std::collections::BTreeSet;
use std::sync::RwLock;

/// Host scene/object graph
///
/// Objects are addressed by hierarchy path (`Parent/Child`).
pub trait SceneGraph: Send + Sync {
    /// Whether an object exists at `path`
    fn exists(&self, path: &str) -> bool;

    /// Create an object named `name` under `parent`, returning its path
    fn create_object(&self, name: &str, parent: Option<&str>) -> Result<String, String>;

    /// Delete the object at `path` together with its children
    fn delete_object(&self, path: &str) -> Result<(), String>;
}

/// Scene graph held in memory
#[derive(Default)]
pub struct InMemorySceneGraph {
    objects: RwLock<BTreeSet<String>>,
}

impl InMemorySceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// All object paths, sorted
    pub fn paths(&self) -> Vec<String> {
        self.objects
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl SceneGraph for InMemorySceneGraph {
    fn exists(&self, path: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(path.trim_matches('/'))
    }

    fn create_object(&self, name: &str, parent: Option<&str>) -> Result<String, String> {
        let name = name.trim();
        if name.is_empty() || name.contains('/') {
            return Err(format!("invalid object name '{name}'"));
        }

        let mut objects = self
            .objects
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let path = match parent.map(|p| p.trim_matches('/')) {
            Some(parent) if !parent.is_empty() => {
                if !objects.contains(parent) {
                    return Err(format!("parent object '{parent}' not found"));
                }
                format!("{parent}/{name}")
            }
            _ => name.to_string(),
        };

        if !objects.insert(path.clone()) {
            return Err(format!("object '{path}' already exists"));
        }
        Ok(path)
    }

    fn delete_object(&self, path: &str) -> Result<(), String> {
        let path = path.trim_matches('/');
        let mut objects = self
            .objects
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !objects.remove(path) {
            return Err(format!("object '{path}' not found"));
        }
        let prefix = format!("{path}/");
        objects.retain(|p| !p.starts_with(&prefix));
        Ok(())
    }
}
