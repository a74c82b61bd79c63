//! Shared fixtures for processor integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cthun_agent::modules::{self, external};
use cthun_agent::{
    Action, ActionContext, ActionError, JobIdGenerator, JobStore, Module, ModuleRegistry, RequestProcessor,
};
use cthun_proto::{ActionRequest, Connector, ParsedChunks, RequestOrigin};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// One call made on the connector
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    CthunError {
        destination: String,
        message_id: Option<String>,
        description: String,
        debug: Vec<Value>,
    },
    RpcError {
        transaction_id: Option<String>,
        description: String,
    },
    Blocking {
        transaction_id: String,
        results: Value,
    },
    Provisional {
        transaction_id: String,
        job_id: String,
        metadata: Value,
    },
    NonBlocking {
        transaction_id: String,
        job_id: String,
        results: Value,
        /// Status artifact on disk at the time the notification was sent
        stored_status: Option<String>,
    },
}

/// Connector recording every call instead of sending it
pub struct RecordingConnector {
    sent: Mutex<Vec<Sent>>,
    spool_dir: PathBuf,
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingConnector {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn send_cthun_error(&self, destination: &str, message_id: Option<&str>, description: &str, debug: &[Value]) {
        self.record(Sent::CthunError {
            destination: destination.to_string(),
            message_id: message_id.map(str::to_string),
            description: description.to_string(),
            debug: debug.to_vec(),
        });
    }

    async fn send_rpc_error(&self, origin: &RequestOrigin, description: &str) {
        self.record(Sent::RpcError {
            transaction_id: origin.transaction_id.clone(),
            description: description.to_string(),
        });
    }

    async fn send_blocking_response(&self, request: &ActionRequest, results: &Value) {
        self.record(Sent::Blocking {
            transaction_id: request.transaction_id().to_string(),
            results: results.clone(),
        });
    }

    async fn send_provisional_response(&self, request: &ActionRequest, job_id: &str, metadata: &Value) {
        self.events.lock().unwrap().push(format!("provisional:{}", request.transaction_id()));
        self.record(Sent::Provisional {
            transaction_id: request.transaction_id().to_string(),
            job_id: job_id.to_string(),
            metadata: metadata.clone(),
        });
    }

    async fn send_non_blocking_response(&self, request: &ActionRequest, results: &Value, job_id: &str) {
        let stored_status = std::fs::read_to_string(self.spool_dir.join(job_id).join("status")).ok();
        self.record(Sent::NonBlocking {
            transaction_id: request.transaction_id().to_string(),
            job_id: job_id.to_string(),
            results: results.clone(),
            stored_status,
        });
    }
}

/// Reverses its `argument` parameter
pub struct ReverseAction;

#[async_trait]
impl Action for ReverseAction {
    async fn invoke(&self, params: &Value, _context: &ActionContext) -> Result<Value, ActionError> {
        let argument = params
            .get("argument")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidParams("missing argument".to_string()))?;
        // Give concurrent jobs a chance to interleave
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(json!({ "outcome": argument.chars().rev().collect::<String>() }))
    }
}

/// Always fails
pub struct BrokenAction;

#[async_trait]
impl Action for BrokenAction {
    async fn invoke(&self, _params: &Value, _context: &ActionContext) -> Result<Value, ActionError> {
        Err(ActionError::Failed("broken action".to_string()))
    }
}

/// Records that it ran
pub struct RecordAction {
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Action for RecordAction {
    async fn invoke(&self, _params: &Value, context: &ActionContext) -> Result<Value, ActionError> {
        self.events.lock().unwrap().push(format!("executed:{}", context.transaction_id));
        Ok(json!({}))
    }
}

/// Deletes every spool entry, its own included, before succeeding
pub struct WipeSpoolAction {
    spool_dir: PathBuf,
}

#[async_trait]
impl Action for WipeSpoolAction {
    async fn invoke(&self, _params: &Value, _context: &ActionContext) -> Result<Value, ActionError> {
        for entry in std::fs::read_dir(&self.spool_dir).unwrap() {
            std::fs::remove_dir_all(entry.unwrap().path()).unwrap();
        }
        Ok(json!({ "outcome": "wiped" }))
    }
}

/// Hands out the same job id every time
pub struct FixedIds(pub &'static str);

impl JobIdGenerator for FixedIds {
    fn next_id(&self) -> String {
        self.0.to_string()
    }
}

pub struct Harness {
    pub processor: RequestProcessor,
    pub connector: Arc<RecordingConnector>,
    pub store: Arc<JobStore>,
    pub events: Arc<Mutex<Vec<String>>>,
    _temp_dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(None, None).await
    }

    pub async fn with_ids(ids: Arc<dyn JobIdGenerator>) -> Self {
        Self::build(Some(ids), None).await
    }

    /// Also register the executables of `modules_dir`
    pub async fn with_modules_dir(modules_dir: &Path) -> Self {
        Self::build(None, Some(modules_dir)).await
    }

    async fn build(ids: Option<Arc<dyn JobIdGenerator>>, modules_dir: Option<&Path>) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(JobStore::open(temp_dir.path().join("spool")).await.unwrap());
        let events = Arc::new(Mutex::new(Vec::new()));

        let mut registry = ModuleRegistry::new();
        registry
            .register(Module::new("reverse_valid").with_action("string", ReverseAction))
            .unwrap();
        registry
            .register(Module::new("failures_test").with_action("broken_action", BrokenAction))
            .unwrap();
        registry
            .register(Module::new("recorder").with_action(
                "record",
                RecordAction {
                    events: Arc::clone(&events),
                },
            ))
            .unwrap();
        registry
            .register(Module::new("wipe").with_action(
                "spool",
                WipeSpoolAction {
                    spool_dir: store.spool_dir().to_path_buf(),
                },
            ))
            .unwrap();
        registry.register(modules::status::module(Arc::clone(&store))).unwrap();
        if let Some(dir) = modules_dir {
            external::load_modules_dir(dir, &mut registry).await.unwrap();
        }

        let connector = Arc::new(RecordingConnector {
            sent: Mutex::new(Vec::new()),
            spool_dir: store.spool_dir().to_path_buf(),
            events: Arc::clone(&events),
        });

        let mut processor = RequestProcessor::new(connector.clone(), Arc::new(registry), Arc::clone(&store));
        if let Some(ids) = ids {
            processor = processor.with_id_generator(ids);
        }

        Self {
            processor,
            connector,
            store,
            events,
            _temp_dir: temp_dir,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

pub fn valid_envelope() -> Value {
    json!({
        "id": "123456",
        "message_type": "test_test_test",
        "expires": "2015-06-26T22:57:09Z",
        "targets": ["cth://agent/test_agent"],
        "sender": "cth://controller/test_controller",
        "destination_report": false
    })
}

pub fn request_chunks(data: Value) -> ParsedChunks {
    ParsedChunks::new(valid_envelope(), Some(data))
}
