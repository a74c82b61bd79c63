//! # Cthun Agent
//!
//! Request processing and execution engine of the remote-execution agent:
//! validates inbound RPC requests, dispatches them to module actions and
//! answers either inline (blocking) or through persisted jobs (non-blocking).

#![warn(missing_docs)]

/// Agent main loop
pub mod agent;

/// Agent configuration
pub mod config;

/// Line-oriented connector
pub mod connector;

/// Error types for the agent
pub mod error;

/// Job id generation
pub mod ids;

/// Built-in and external modules
pub mod modules;

/// Request validation and dispatch
pub mod processor;

/// Module registry
pub mod registry;

/// Job result store
pub mod store;

pub use agent::AgentLoop;
pub use config::AgentConfig;
pub use connector::StreamConnector;
pub use error::{ActionError, RegistryError, StoreError};
pub use ids::{JobIdGenerator, UuidGenerator};
pub use processor::RequestProcessor;
pub use registry::{Action, ActionContext, Module, ModuleRegistry};
pub use store::{JobResult, JobStatus, JobStore};
