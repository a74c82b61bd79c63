//! `status` module: queries the outcome of non-blocking jobs

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{ActionError, StoreError};
use crate::registry::{Action, ActionContext, Module};
use crate::store::JobStore;

/// Reads a job's spool entry.
///
/// Never fails for an unknown or unreadable job: the problem is reported in
/// the `error` field of an otherwise successful result.
pub struct QueryAction {
    store: Arc<JobStore>,
}

impl QueryAction {
    /// Query jobs of `store`
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for QueryAction {
    async fn invoke(&self, params: &Value, _context: &ActionContext) -> Result<Value, ActionError> {
        let job_id = params
            .get("job_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidParams("missing string parameter 'job_id'".to_string()))?;

        match self.store.read_result(job_id).await {
            Ok(result) => {
                debug!("Job {} is {}", job_id, result.status);
                Ok(result.to_json())
            }
            Err(StoreError::NotFound(_) | StoreError::InvalidJobId(_)) => {
                debug!("Status requested for unknown job {}", job_id);
                Ok(json!({ "error": format!("unknown job id {}", job_id) }))
            }
            Err(e) => {
                error!("Failed to read result of job {}: {}", job_id, e);
                Ok(json!({ "error": format!("failed to retrieve the status of job {}", job_id) }))
            }
        }
    }
}

/// The `status` module
pub fn module(store: Arc<JobStore>) -> Module {
    Module::new("status").with_action("query", QueryAction::new(store))
}
