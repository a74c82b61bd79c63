//! Error types for the agent

use thiserror::Error;

/// Job result store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// An entry for the job id already exists
    #[error("Duplicate job id: {0}")]
    DuplicateJobId(String),

    /// No entry for the job id
    #[error("Unknown job id: {0}")]
    NotFound(String),

    /// Job id cannot be used as a spool entry name
    #[error("Invalid job id: {0:?}")]
    InvalidJobId(String),

    /// Status artifact holds something other than a known status
    #[error("Invalid status {value:?} recorded for job {job_id}")]
    InvalidStatus {
        /// Job whose entry is damaged
        job_id: String,
        /// Content of the status artifact
        value: String,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Module registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A module with this name is already registered
    #[error("Module already registered: {0}")]
    DuplicateModule(String),

    /// No module with this name
    #[error("Unknown module: {0}")]
    ModuleNotFound(String),

    /// Module exists but does not expose the action
    #[error("Unknown action '{action}' for module '{module}'")]
    ActionNotFound {
        /// Module name
        module: String,
        /// Requested action
        action: String,
    },
}

/// Failure signalled by an action
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Parameters do not fit the action
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Action failed
    #[error("Action failed: {0}")]
    Failed(String),

    /// External executable exited unsuccessfully
    #[error("Execution failed: {stderr}")]
    Execution {
        /// Exit code, if the process exited normally
        exit_code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// Action produced output that is not valid JSON
    #[error("Invalid action output: {0}")]
    InvalidOutput(String),
}

impl ActionError {
    /// Exit code to record for a failed job
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Execution { exit_code: Some(code), .. } => *code,
            _ => 1,
        }
    }

    /// Text to record as the job's stderr
    pub fn stderr(&self) -> String {
        match self {
            Self::Execution { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}
