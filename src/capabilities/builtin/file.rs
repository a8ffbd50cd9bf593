//! File access confined to a workspace directory.
//!
//! Every path is resolved relative to the workspace root. Absolute paths and
//! paths that climb out of the root (lexically, or through a symlink that
//! already exists) are rejected before any I/O happens.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::capabilities::{Capability, optional_str, require_str, unknown_action};
use crate::error::CapabilityError;
use crate::plan::Parameters;

const NAME: &str = "file";

/// Maximum file size for reading (1MB).
const MAX_READ_SIZE: u64 = 1024 * 1024;

/// Maximum content size for writing (5MB).
const MAX_WRITE_SIZE: usize = 5 * 1024 * 1024;

/// Maximum directory listing entries.
const MAX_DIR_ENTRIES: usize = 500;

/// Resolve `.` and `..` lexically, without touching the filesystem.
fn normalize_lexical(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if components
                    .last()
                    .is_some_and(|c| matches!(c, Component::Normal(_)))
                {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Canonicalize the deepest ancestor of `path` that exists and re-append the
/// components below it. `path` must already be lexically normalized.
fn canonicalize_existing(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        let existing = if ancestor.as_os_str().is_empty() {
            Path::new(".")
        } else {
            ancestor
        };
        if let Ok(real) = existing.canonicalize() {
            return match path.strip_prefix(ancestor) {
                Ok(rest) => real.join(rest),
                Err(_) => real,
            };
        }
    }
    path.to_path_buf()
}

fn failed(reason: impl Into<String>) -> CapabilityError {
    CapabilityError::Failed {
        capability: NAME.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone)]
pub struct FileCapability {
    workspace: PathBuf,
}

impl FileCapability {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Map a workspace-relative path to a real path inside the workspace.
    fn resolve(&self, raw: &str) -> Result<PathBuf, CapabilityError> {
        let relative = Path::new(raw.trim());
        if relative.is_absolute() || relative.has_root() {
            return Err(failed(format!("path must be relative to the workspace: {raw}")));
        }

        let root = normalize_lexical(&self.workspace);
        let resolved = normalize_lexical(&root.join(relative));
        if !resolved.starts_with(&root) {
            return Err(failed(format!("path escapes the workspace: {raw}")));
        }

        // A symlink inside the workspace may still point outside of it, and
        // the target of a write usually does not exist yet.
        let real_root = canonicalize_existing(&root);
        if !canonicalize_existing(&resolved).starts_with(&real_root) {
            return Err(failed(format!("path escapes the workspace: {raw}")));
        }

        Ok(resolved)
    }

    async fn read(&self, raw: &str) -> Result<String, CapabilityError> {
        let path = self.resolve(raw)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| failed(format!("cannot read {raw}: {e}")))?;
        if !metadata.is_file() {
            return Err(failed(format!("{raw} is not a file")));
        }
        if metadata.len() > MAX_READ_SIZE {
            return Err(failed(format!(
                "{raw} is {} bytes, larger than the {MAX_READ_SIZE} byte read limit",
                metadata.len()
            )));
        }
        fs::read_to_string(&path)
            .await
            .map_err(|e| failed(format!("cannot read {raw}: {e}")))
    }

    async fn write(&self, raw: &str, content: &str) -> Result<String, CapabilityError> {
        if content.len() > MAX_WRITE_SIZE {
            return Err(failed(format!(
                "content is {} bytes, larger than the {MAX_WRITE_SIZE} byte write limit",
                content.len()
            )));
        }
        let path = self.resolve(raw)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(format!("cannot create directory for {raw}: {e}")))?;
        }
        fs::write(&path, content)
            .await
            .map_err(|e| failed(format!("cannot write {raw}: {e}")))?;

        tracing::debug!(path = %path.display(), bytes = content.len(), "Wrote file");
        Ok(format!("Wrote {} bytes to {raw}", content.len()))
    }

    async fn list(&self, raw: &str) -> Result<String, CapabilityError> {
        let path = self.resolve(raw)?;
        let mut dir = fs::read_dir(&path)
            .await
            .map_err(|e| failed(format!("cannot list {raw}: {e}")))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| failed(format!("cannot list {raw}: {e}")))?
        {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                name.push('/');
            }
            entries.push(name);
            if entries.len() >= MAX_DIR_ENTRIES {
                break;
            }
        }
        entries.sort();

        if entries.is_empty() {
            Ok(format!("{raw} is empty"))
        } else {
            Ok(entries.join("\n"))
        }
    }
}

#[async_trait]
impl Capability for FileCapability {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read (path), write (path, content) or list (path) files inside the workspace"
    }

    fn actions(&self) -> &[&'static str] {
        &["read", "write", "list"]
    }

    async fn invoke(&self, action: &str, params: &Parameters) -> Result<String, CapabilityError> {
        match action {
            "read" => self.read(require_str(NAME, params, "path")?).await,
            "write" => {
                let path = require_str(NAME, params, "path")?;
                let content = require_str(NAME, params, "content")?;
                self.write(path, content).await
            }
            "list" => self.list(optional_str(params, "path").unwrap_or(".")).await,
            other => Err(unknown_action(NAME, other)),
        }
    }
}
