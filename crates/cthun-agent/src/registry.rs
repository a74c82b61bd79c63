//! Module registry and action dispatch

use async_trait::async_trait;
use cthun_proto::ActionRequest;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ActionError, RegistryError};

/// What an action gets to know about the request invoking it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    /// Transaction id of the request
    pub transaction_id: String,
    /// Sender URI of the request
    pub sender: String,
}

impl ActionContext {
    /// Context of `request`
    pub fn from_request(request: &ActionRequest) -> Self {
        Self {
            transaction_id: request.transaction_id().to_string(),
            sender: request.sender().to_string(),
        }
    }
}

/// A named operation exposed by a module
#[async_trait]
pub trait Action: Send + Sync {
    /// Invoke the action with the request parameters
    async fn invoke(&self, params: &Value, context: &ActionContext) -> Result<Value, ActionError>;
}

/// A named set of actions
#[derive(Clone)]
pub struct Module {
    name: String,
    actions: HashMap<String, Arc<dyn Action>>,
}

impl Module {
    /// Create a module without actions
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: HashMap::new(),
        }
    }

    /// Builder-style [`Module::add_action`]
    pub fn with_action(mut self, name: impl Into<String>, action: impl Action + 'static) -> Self {
        self.add_action(name, Arc::new(action));
        self
    }

    /// Expose `action` under `name`, replacing any previous binding
    pub fn add_action(&mut self, name: impl Into<String>, action: Arc<dyn Action>) {
        self.actions.insert(name.into(), action);
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an action
    pub fn action(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    /// Sorted action names
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("actions", &self.action_names())
            .finish()
    }
}

/// Modules by name; built at startup, read-only afterwards
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Module>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under its name
    pub fn register(&mut self, module: Module) -> Result<(), RegistryError> {
        if self.modules.contains_key(module.name()) {
            return Err(RegistryError::DuplicateModule(module.name().to_string()));
        }
        debug!("Registered module {} with actions {:?}", module.name(), module.action_names());
        self.modules.insert(module.name().to_string(), module);
        Ok(())
    }

    /// Resolve a (module, action) pair
    pub fn resolve(&self, module: &str, action: &str) -> Result<Arc<dyn Action>, RegistryError> {
        let found = self
            .modules
            .get(module)
            .ok_or_else(|| RegistryError::ModuleNotFound(module.to_string()))?;

        found.action(action).ok_or_else(|| RegistryError::ActionNotFound {
            module: module.to_string(),
            action: action.to_string(),
        })
    }

    /// Sorted module names
    pub fn module_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
