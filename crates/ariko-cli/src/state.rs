//! Shell State

use std::sync::Arc;

use ariko_core::{AgentOrchestrator, ProjectLayout, Settings, SettingsFile, StaticContext};

use crate::render::Renderer;

/// Everything the interactive loop works on
pub struct Shell {
    /// The agent loop
    pub orchestrator: AgentOrchestrator,

    /// Event sink of the orchestrator
    pub renderer: Renderer,

    /// Where settings changes are saved
    pub settings_file: SettingsFile,

    /// Used to resolve `/attach` paths
    pub layout: ProjectLayout,

    /// Files attached to the next requests
    pub context: Arc<StaticContext>,
}

impl Shell {
    /// Apply a settings change to the orchestrator and persist it
    pub fn update_settings(&mut self, change: impl FnOnce(&mut Settings)) {
        let mut settings = self.orchestrator.settings().clone();
        change(&mut settings);
        if let Err(e) = self.settings_file.save(&settings) {
            tracing::warn!(path = %self.settings_file.path().display(), "Could not save settings: {}", e);
        }
        self.orchestrator.update_settings(settings);
    }
}
