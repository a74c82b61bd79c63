//! `echo` module

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ActionError;
use crate::registry::{Action, ActionContext, Module};

/// Returns its `argument` parameter as the outcome
pub struct EchoAction;

#[async_trait]
impl Action for EchoAction {
    async fn invoke(&self, params: &Value, _context: &ActionContext) -> Result<Value, ActionError> {
        let argument = params
            .get("argument")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidParams("missing string parameter 'argument'".to_string()))?;

        Ok(json!({ "outcome": argument }))
    }
}

/// The `echo` module
pub fn module() -> Module {
    Module::new("echo").with_action("echo", EchoAction)
}
