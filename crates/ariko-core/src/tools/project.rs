//! Project Layout
//!
//! Path resolution scoped to the project's content root, plus the write
//! disciplines used by the file tools.

use std::path::{Component, Path, PathBuf};

use tokio::fs;

/// Project root and the content directory tools may touch
#[derive(Clone, Debug)]
pub struct ProjectLayout {
    project_root: PathBuf,
    content_dir: String,
}

impl ProjectLayout {
    pub fn new(project_root: impl Into<PathBuf>, content_dir: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            content_dir: content_dir.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn content_root(&self) -> PathBuf {
        self.project_root.join(&self.content_dir)
    }

    /// Resolve a tool-supplied path to a location inside the content root.
    ///
    /// `Assets/Scripts/A.cs` resolves against the project root; any other
    /// relative path resolves against the content root. Resolution is
    /// lexical: `..` segments that climb out of the content root are
    /// rejected, as are absolute paths outside it.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, String> {
        let raw = raw.trim().replace('\\', "/");
        if raw.is_empty() {
            return Err("Error: File path is empty.".into());
        }

        let requested = Path::new(&raw);
        let content_root = normalize(&self.content_root())
            .ok_or_else(|| "Error: Project content root is invalid.".to_string())?;

        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            let starts_with_content_dir = requested
                .components()
                .find(|c| !matches!(c, Component::CurDir))
                .is_some_and(|c| c.as_os_str() == self.content_dir.as_str());
            if starts_with_content_dir {
                self.project_root.join(requested)
            } else {
                self.content_root().join(requested)
            }
        };

        match normalize(&joined) {
            Some(path) if path.starts_with(&content_root) && path != content_root => Ok(path),
            _ => Err(format!(
                "Error: Path '{raw}' is outside the project's {} folder.",
                self.content_dir
            )),
        }
    }

    /// Path relative to the project root with `/` separators, for messages
    pub fn display(&self, path: &Path) -> String {
        let relative = normalize(&self.project_root)
            .and_then(|root| path.strip_prefix(root).ok().map(Path::to_path_buf))
            .unwrap_or_else(|| path.to_path_buf());
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Lexically normalize `path`; `None` when `..` climbs above the root
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.ariko-{suffix}"))
}

/// Write a new file: parents are created, content is staged then renamed in
pub async fn write_new_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let staged = sibling(path, "tmp");
    if let Err(e) = fs::write(&staged, content).await {
        let _ = fs::remove_file(&staged).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(&staged, path).await {
        let _ = fs::remove_file(&staged).await;
        return Err(e);
    }
    Ok(())
}

/// Replace an existing file's content.
///
/// The original is copied to a backup first. The backup is removed only
/// after the new content is in place; if the swap fails the original is
/// restored from the backup before the error is returned.
pub async fn replace_file(path: &Path, content: &str) -> std::io::Result<()> {
    let backup = sibling(path, "bak");
    let staged = sibling(path, "tmp");

    fs::copy(path, &backup).await?;

    let swap = async {
        fs::write(&staged, content).await?;
        fs::rename(&staged, path).await
    }
    .await;

    match swap {
        Ok(()) => {
            if let Err(e) = fs::remove_file(&backup).await {
                tracing::warn!(path = %backup.display(), "Could not remove backup: {}", e);
            }
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&staged).await;
            match fs::copy(&backup, path).await {
                Ok(_) => {
                    let _ = fs::remove_file(&backup).await;
                }
                Err(restore) => {
                    tracing::warn!(
                        path = %path.display(),
                        backup = %backup.display(),
                        "Restoring original content failed: {}",
                        restore
                    );
                }
            }
            Err(e)
        }
    }
}
