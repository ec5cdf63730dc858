//! File Tools
//!
//! Create, modify, read and delete files under the content root. Each tool
//! checks, in order: parameters, path safety, target existence. Only then
//! does it touch the disk.

use async_trait::async_trait;
use tokio::fs;

use super::project::{ProjectLayout, replace_file, write_new_file};
use crate::message::ChatMessage;
use crate::provider::ChatRequest;
use crate::tool::{ParamType, ParameterSchema, Tool, ToolContext, ToolSchema};

/// Longest file content returned by ReadFile
const MAX_READ_CHARS: usize = 60_000;

const FILE_PATH_DESCRIPTION: &str = "Path of the file, e.g. Assets/Scripts/Player.cs";

const MODIFY_SYSTEM_PROMPT: &str = "You are a precise code editor. Apply the requested change to the file below. \
Reply with the complete updated file content only: no explanations and no commentary.";

fn file_path_param() -> ParameterSchema {
    ParameterSchema::required("filePath", ParamType::String, FILE_PATH_DESCRIPTION)
}

/// Strip one surrounding markdown code fence, if present
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim_end_matches('\n')
}

/// Creates a new file
pub struct CreateFileTool {
    layout: ProjectLayout,
}

impl CreateFileTool {
    pub const fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl Tool for CreateFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "CreateFile".into(),
            description: "Creates a new file in the project with the given content. Fails if the file already exists.".into(),
            parameters: vec![
                file_path_param(),
                ParameterSchema::required("content", ParamType::String, "Complete text of the new file"),
            ],
            destructive: false,
        }
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> String {
        let raw_path = match ctx.require_str("filePath") {
            Ok(path) => path,
            Err(e) => return e,
        };
        let content = match ctx.require_text("content") {
            Ok(content) => content,
            Err(e) => return e,
        };
        let path = match self.layout.resolve(raw_path) {
            Ok(path) => path,
            Err(e) => return e,
        };
        let shown = self.layout.display(&path);

        if fs::try_exists(&path).await.unwrap_or(false) {
            return format!("Error: File '{shown}' already exists. Use ModifyFile to change it.");
        }

        match write_new_file(&path, content).await {
            Ok(()) => {
                tracing::info!(path = %shown, "File created");
                format!("Created file '{shown}' ({} characters).", content.chars().count())
            }
            Err(e) => format!("Error: Could not create '{shown}': {e}"),
        }
    }
}

/// Rewrites an existing file by asking the active model for the new content
pub struct ModifyFileTool {
    layout: ProjectLayout,
}

impl ModifyFileTool {
    pub const fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl Tool for ModifyFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "ModifyFile".into(),
            description: "Changes an existing file. The AI rewrites the file according to the instructions.".into(),
            parameters: vec![
                file_path_param(),
                ParameterSchema::required(
                    "instructions",
                    ParamType::String,
                    "Precise description of the change to make",
                ),
            ],
            destructive: false,
        }
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> String {
        let raw_path = match ctx.require_str("filePath") {
            Ok(path) => path,
            Err(e) => return e,
        };
        let instructions = match ctx.require_str("instructions") {
            Ok(text) => text,
            Err(e) => return e,
        };
        let path = match self.layout.resolve(raw_path) {
            Ok(path) => path,
            Err(e) => return e,
        };
        let shown = self.layout.display(&path);

        if !fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            return format!("Error: File '{shown}' does not exist.");
        }

        let original = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => return format!("Error: Could not read '{shown}': {e}"),
        };

        let messages = [
            ChatMessage::system(MODIFY_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "File: {shown}\n```\n{original}\n```\n\nChange request: {instructions}"
            )),
        ];
        let request = ChatRequest {
            messages: &messages,
            provider: ctx.provider,
            model: ctx.model,
            settings: ctx.settings,
            keys: ctx.keys,
        };

        let rewritten = match ctx.client.send_chat(request).await {
            Ok(text) => text,
            Err(e) => return format!("Error: AI modification failed: {}", e.user_message()),
        };
        let rewritten = strip_code_fence(&rewritten);
        if rewritten.trim().is_empty() {
            return format!("Error: The model returned no content; '{shown}' was not changed.");
        }

        match replace_file(&path, rewritten).await {
            Ok(()) => {
                tracing::info!(path = %shown, "File modified");
                format!("Modified file '{shown}'.")
            }
            Err(e) => format!("Error: Could not write '{shown}', original content kept: {e}"),
        }
    }
}

/// Returns a file's content
pub struct ReadFileTool {
    layout: ProjectLayout,
}

impl ReadFileTool {
    pub const fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "ReadFile".into(),
            description: "Reads the content of an existing file in the project.".into(),
            parameters: vec![file_path_param()],
            destructive: false,
        }
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> String {
        let raw_path = match ctx.require_str("filePath") {
            Ok(path) => path,
            Err(e) => return e,
        };
        let path = match self.layout.resolve(raw_path) {
            Ok(path) => path,
            Err(e) => return e,
        };
        let shown = self.layout.display(&path);

        if !fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            return format!("Error: File '{shown}' does not exist.");
        }

        match fs::read_to_string(&path).await {
            Ok(content) if content.chars().count() > MAX_READ_CHARS => {
                let head: String = content.chars().take(MAX_READ_CHARS).collect();
                format!("Content of '{shown}' (truncated to {MAX_READ_CHARS} characters):\n```\n{head}\n```")
            }
            Ok(content) => format!("Content of '{shown}':\n```\n{content}\n```"),
            Err(e) => format!("Error: Could not read '{shown}': {e}"),
        }
    }
}

/// Deletes a file and its `.meta` sidecar
pub struct DeleteFileTool {
    layout: ProjectLayout,
}

impl DeleteFileTool {
    pub const fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "DeleteFile".into(),
            description: "Permanently deletes a file from the project.".into(),
            parameters: vec![file_path_param()],
            destructive: true,
        }
    }

    async fn execute(&self, ctx: &ToolContext<'_>) -> String {
        let raw_path = match ctx.require_str("filePath") {
            Ok(path) => path,
            Err(e) => return e,
        };
        let path = match self.layout.resolve(raw_path) {
            Ok(path) => path,
            Err(e) => return e,
        };
        let shown = self.layout.display(&path);

        if !fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            return format!("Error: File '{shown}' does not exist.");
        }

        if let Err(e) = fs::remove_file(&path).await {
            return format!("Error: Could not delete '{shown}': {e}");
        }

        let mut meta = path.clone().into_os_string();
        meta.push(".meta");
        let _ = fs::remove_file(&meta).await;

        tracing::info!(path = %shown, "File deleted");
        format!("Deleted file '{shown}'.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKeys, ProviderKind, Settings};
    use crate::testing::ScriptedClient;
    use serde_json::{Map, Value, json};
    use std::path::Path;

    struct Fixture {
        dir: tempfile::TempDir,
        layout: ProjectLayout,
        settings: Settings,
        keys: ApiKeys,
        client: ScriptedClient,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("Assets")).unwrap();
            let layout = ProjectLayout::new(dir.path(), "Assets");
            Self {
                dir,
                layout,
                settings: Settings::default(),
                keys: ApiKeys::default(),
                client: ScriptedClient::new(Vec::<&str>::new()),
            }
        }

        fn file(&self, rel: &str) -> std::path::PathBuf {
            self.dir.path().join(rel)
        }

        async fn run(&self, tool: &dyn Tool, args: Value) -> String {
            let arguments: Map<String, Value> = args.as_object().cloned().unwrap();
            let ctx = ToolContext {
                arguments: &arguments,
                provider: ProviderKind::OpenAi,
                model: "gpt-4o",
                settings: &self.settings,
                keys: &self.keys,
                client: &self.client,
            };
            tool.execute(&ctx).await
        }
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```csharp\nclass A {}\n```"), "class A {}");
        assert_eq!(strip_code_fence("plain"), "plain");
        assert_eq!(strip_code_fence("```\na\nb\n```\n"), "a\nb");
    }

    #[tokio::test]
    async fn test_create_file() {
        let fx = Fixture::new();
        let tool = CreateFileTool::new(fx.layout.clone());

        let out = fx
            .run(&tool, json!({"filePath": "Assets/Scripts/Hello.cs", "content": "hi"}))
            .await;
        assert!(out.starts_with("Created file 'Assets/Scripts/Hello.cs'"), "{out}");
        assert_eq!(read(&fx.file("Assets/Scripts/Hello.cs")), "hi");

        let again = fx
            .run(&tool, json!({"filePath": "Assets/Scripts/Hello.cs", "content": "x"}))
            .await;
        assert!(again.starts_with("Error:") && again.contains("already exists"));
        assert_eq!(read(&fx.file("Assets/Scripts/Hello.cs")), "hi");
    }

    #[tokio::test]
    async fn test_validation_order() {
        let fx = Fixture::new();
        let tool = CreateFileTool::new(fx.layout.clone());

        let missing = fx.run(&tool, json!({"content": "x"})).await;
        assert!(missing.contains("'filePath'"));

        let wrong_type = fx.run(&tool, json!({"filePath": 42, "content": "x"})).await;
        assert!(wrong_type.contains("must be a string"));

        let escape = fx
            .run(&tool, json!({"filePath": "../outside.txt", "content": "x"}))
            .await;
        assert!(escape.starts_with("Error:") && escape.contains("outside"));
        assert!(!fx.dir.path().parent().unwrap().join("outside.txt").exists());
    }

    #[tokio::test]
    async fn test_read_file() {
        let fx = Fixture::new();
        std::fs::write(fx.file("Assets/notes.txt"), "remember").unwrap();
        let tool = ReadFileTool::new(fx.layout.clone());

        let out = fx.run(&tool, json!({"filePath": "Assets/notes.txt"})).await;
        assert!(out.contains("remember"));

        let missing = fx.run(&tool, json!({"filePath": "Assets/none.txt"})).await;
        assert_eq!(missing, "Error: File 'Assets/none.txt' does not exist.");
    }

    #[tokio::test]
    async fn test_delete_file_removes_meta() {
        let fx = Fixture::new();
        std::fs::write(fx.file("Assets/old.cs"), "x").unwrap();
        std::fs::write(fx.file("Assets/old.cs.meta"), "guid").unwrap();
        let tool = DeleteFileTool::new(fx.layout.clone());

        let out = fx.run(&tool, json!({"filePath": "old.cs"})).await;
        assert_eq!(out, "Deleted file 'Assets/old.cs'.");
        assert!(!fx.file("Assets/old.cs").exists());
        assert!(!fx.file("Assets/old.cs.meta").exists());
    }

    #[tokio::test]
    async fn test_modify_file_uses_model_output() {
        let mut fx = Fixture::new();
        std::fs::write(fx.file("Assets/A.cs"), "class A {}").unwrap();
        fx.client = ScriptedClient::new(["```csharp\nclass A { int x; }\n```"]);
        let tool = ModifyFileTool::new(fx.layout.clone());

        let out = fx
            .run(&tool, json!({"filePath": "Assets/A.cs", "instructions": "add a field"}))
            .await;
        assert_eq!(out, "Modified file 'Assets/A.cs'.");
        assert_eq!(read(&fx.file("Assets/A.cs")), "class A { int x; }");

        let requests = fx.client.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].last().unwrap().content.contains("add a field"));
    }

    #[tokio::test]
    async fn test_modify_file_keeps_original_when_model_fails() {
        let mut fx = Fixture::new();
        std::fs::write(fx.file("Assets/A.cs"), "class A {}").unwrap();
        fx.client = ScriptedClient::failing(crate::error::RequestError::network("offline"));
        let tool = ModifyFileTool::new(fx.layout.clone());

        let out = fx
            .run(&tool, json!({"filePath": "Assets/A.cs", "instructions": "x"}))
            .await;
        assert!(out.starts_with("Error: AI modification failed"));
        assert_eq!(read(&fx.file("Assets/A.cs")), "class A {}");
    }
}
