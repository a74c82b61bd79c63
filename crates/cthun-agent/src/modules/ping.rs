//! `ping` module

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ActionError;
use crate::registry::{Action, ActionContext, Module};

/// Health check answering with the current time
pub struct PingAction;

#[async_trait]
impl Action for PingAction {
    async fn invoke(&self, _params: &Value, context: &ActionContext) -> Result<Value, ActionError> {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let response_timestamp = u64::try_from(millis).unwrap_or(u64::MAX);

        Ok(json!({
            "response_timestamp": response_timestamp,
            "sender": context.sender,
        }))
    }
}

/// The `ping` module
pub fn module() -> Module {
    Module::new("ping").with_action("ping", PingAction)
}
