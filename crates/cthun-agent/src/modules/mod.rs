//! Built-in and external modules

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::AgentConfig;
use crate::error::RegistryError;
use crate::registry::ModuleRegistry;
use crate::store::JobStore;

pub mod echo;
pub mod external;
pub mod ping;
pub mod status;

/// Register the modules compiled into the agent
pub fn register_builtins(registry: &mut ModuleRegistry, store: Arc<JobStore>) -> Result<(), RegistryError> {
    registry.register(echo::module())?;
    registry.register(ping::module())?;
    registry.register(status::module(store))?;
    Ok(())
}

/// Registry with the built-in modules plus those of the configured modules directory
pub async fn build_registry(config: &AgentConfig, store: Arc<JobStore>) -> Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    register_builtins(&mut registry, store)?;

    if let Some(dir) = &config.modules_dir {
        let loaded = external::load_modules_dir(dir, &mut registry).await?;
        info!("Loaded {} external modules from {:?}", loaded, dir);
    }

    info!("Registered modules: {:?}", registry.module_names());
    Ok(registry)
}
