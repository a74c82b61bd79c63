//! Modules backed by executables in the modules directory
//!
//! An external module is an executable invoked as `<module> metadata` to list
//! its actions, and as `<module> <action>` with the JSON parameters on stdin
//! to run one. A successful action exits with status 0 and prints its JSON
//! result on stdout.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ActionError;
use crate::registry::{Action, ActionContext, Module, ModuleRegistry};

#[derive(Debug, Deserialize)]
struct ModuleMetadata {
    #[serde(default)]
    description: Option<String>,
    actions: Vec<ActionMetadata>,
}

#[derive(Debug, Deserialize)]
struct ActionMetadata {
    name: String,
}

/// One action of an external module
pub struct ExternalAction {
    executable: PathBuf,
    action: String,
}

#[async_trait]
impl Action for ExternalAction {
    async fn invoke(&self, params: &Value, context: &ActionContext) -> Result<Value, ActionError> {
        debug!(
            "Running {:?} {} for transaction {}",
            self.executable, self.action, context.transaction_id
        );

        let input = serde_json::to_vec(params).map_err(|e| ActionError::InvalidParams(e.to_string()))?;
        let output = run(&self.executable, &self.action, Some(&input))
            .await
            .map_err(|e| ActionError::Failed(format!("failed to execute {:?}: {}", self.executable, e)))?;

        if !output.status.success() {
            return Err(ActionError::Execution {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            ActionError::InvalidOutput(format!("{} {} did not print JSON: {}", display_name(&self.executable), self.action, e))
        })
    }
}

/// Load the module implemented by `executable`
pub async fn load_module(executable: &Path) -> Result<Module> {
    let name = display_name(executable);

    let output = run(executable, "metadata", None)
        .await
        .with_context(|| format!("Failed to run metadata for module {}", name))?;
    if !output.status.success() {
        bail!(
            "Metadata of module {} exited with {}: {}",
            name,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let metadata: ModuleMetadata = serde_json::from_slice(&output.stdout)
        .with_context(|| format!("Invalid metadata for module {}", name))?;
    if let Some(description) = &metadata.description {
        debug!("Module {}: {}", name, description);
    }

    let mut module = Module::new(name);
    for action in metadata.actions {
        let external = ExternalAction {
            executable: executable.to_path_buf(),
            action: action.name.clone(),
        };
        module.add_action(action.name, std::sync::Arc::new(external));
    }
    Ok(module)
}

/// Register every loadable executable in `dir`.
///
/// Executables whose metadata cannot be loaded are skipped; a name clash with
/// an already registered module is an error.
pub async fn load_modules_dir(dir: &Path, registry: &mut ModuleRegistry) -> Result<usize> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read modules directory {:?}", dir))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await.context("Failed to read modules directory entry")? {
        let path = entry.path();
        if is_module_candidate(&path).await {
            candidates.push(path);
        }
    }
    candidates.sort();

    let mut loaded = 0;
    for path in candidates {
        match load_module(&path).await {
            Ok(module) => {
                info!("Loaded external module {} from {:?}", module.name(), path);
                registry.register(module)?;
                loaded += 1;
            }
            Err(e) => warn!("Skipping module {:?}: {:#}", path, e),
        }
    }
    Ok(loaded)
}

async fn is_module_candidate(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    if hidden {
        return false;
    }

    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => is_executable(&metadata),
        _ => false,
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

/// Module name: the full file name, extension included
fn display_name(executable: &Path) -> String {
    executable
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Run `executable arg`, feeding `stdin` and capturing both output streams
async fn run(executable: &Path, arg: &str, stdin: Option<&[u8]>) -> std::io::Result<Output> {
    let mut cmd = Command::new(executable);
    cmd.arg(arg)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;

    if let Some(mut child_stdin) = child.stdin.take() {
        if let Some(data) = stdin {
            if let Err(e) = child_stdin.write_all(data).await {
                warn!("Failed to write to {:?} stdin: {}", executable, e);
            }
        }
        drop(child_stdin);
    }

    child.wait_with_output().await
}
