//! Request validation, dispatch and response orchestration
//!
//! Each inbound message goes through
//! `Received → EnvelopeValidated → ActionResolved → {BlockingInvoked |
//! NonBlockingDispatched}`. Any validation failure ends the flow with exactly
//! one error response: a Cthun error when the envelope is unusable, an RPC
//! error otherwise.

use cthun_proto::{ActionRequest, Connector, ParsedChunks, ProtocolError, RequestOrigin, RequestType};
use serde_json::json;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::ids::{JobIdGenerator, UuidGenerator};
use crate::registry::{Action, ActionContext, ModuleRegistry};
use crate::store::{JobResult, JobStore};

/// Drives one handling flow per inbound request
pub struct RequestProcessor {
    connector: Arc<dyn Connector>,
    registry: Arc<ModuleRegistry>,
    store: Arc<JobStore>,
    ids: Arc<dyn JobIdGenerator>,
    jobs: TaskTracker,
}

impl RequestProcessor {
    /// Create a processor issuing UUID job ids
    pub fn new(connector: Arc<dyn Connector>, registry: Arc<ModuleRegistry>, store: Arc<JobStore>) -> Self {
        Self {
            connector,
            registry,
            store,
            ids: Arc::new(UuidGenerator),
            jobs: TaskTracker::new(),
        }
    }

    /// Replace the job id source
    pub fn with_id_generator(mut self, ids: Arc<dyn JobIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Number of non-blocking jobs still executing
    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Wait for every spawned job to finish; jobs are never cancelled
    pub async fn shutdown(&self) {
        self.jobs.close();
        self.jobs.wait().await;
        self.jobs.reopen();
    }

    /// Validate, dispatch and answer one request
    pub async fn process_request(&self, request_type: RequestType, chunks: ParsedChunks) {
        let envelope = match chunks.envelope() {
            Ok(envelope) => envelope,
            Err(e) => return self.reject_message(&chunks, &e).await,
        };

        let Some(data) = chunks.data.as_ref() else {
            return self.reject_message(&chunks, &ProtocolError::MissingData).await;
        };

        let request = match ActionRequest::parse(request_type, &envelope, data) {
            Ok(request) => request,
            Err(e) => {
                let origin = RequestOrigin::recover(&envelope, data);
                warn!("Invalid {} request from {}: {}", request_type, origin.sender, e);
                self.connector
                    .send_rpc_error(&origin, &format!("Invalid request: {}", e))
                    .await;
                return;
            }
        };

        let action = match self.registry.resolve(request.module(), request.action()) {
            Ok(action) => action,
            Err(e) => {
                warn!(
                    "Rejecting transaction {} from {}: {}",
                    request.transaction_id(),
                    request.sender(),
                    e
                );
                self.connector.send_rpc_error(&request.origin(), &e.to_string()).await;
                return;
            }
        };

        info!(
            "Processing {} request {} {}/{} from {}",
            request.request_type(),
            request.transaction_id(),
            request.module(),
            request.action(),
            request.sender()
        );

        match request.request_type() {
            RequestType::Blocking => self.process_blocking(&request, action).await,
            RequestType::NonBlocking => self.process_non_blocking(request, action).await,
        }
    }

    async fn reject_message(&self, chunks: &ParsedChunks, error: &ProtocolError) {
        let destination = chunks.sender_hint();
        let message_id = chunks.message_id_hint();
        warn!("Rejecting message {:?} from {:?}: {}", message_id, destination, error);
        self.connector
            .send_cthun_error(&destination, message_id.as_deref(), &error.to_string(), &chunks.debug)
            .await;
    }

    async fn process_blocking(&self, request: &ActionRequest, action: Arc<dyn Action>) {
        let context = ActionContext::from_request(request);

        match action.invoke(request.params(), &context).await {
            Ok(results) => {
                debug!("Transaction {} completed", request.transaction_id());
                self.connector.send_blocking_response(request, &results).await;
            }
            Err(e) => {
                warn!(
                    "Action {}/{} failed for transaction {}: {}",
                    request.module(),
                    request.action(),
                    request.transaction_id(),
                    e
                );
                self.connector.send_rpc_error(&request.origin(), &e.to_string()).await;
            }
        }
    }

    async fn process_non_blocking(&self, request: ActionRequest, action: Arc<dyn Action>) {
        let job_id = self.ids.next_id();

        if let Err(e) = self.store.create_entry(&job_id).await {
            error!("Failed to create spool entry for job {}: {}", job_id, e);
            self.connector
                .send_rpc_error(&request.origin(), &format!("Failed to initialize job: {}", e))
                .await;
            return;
        }

        let metadata = json!({
            "module": request.module(),
            "action": request.action(),
            "notify_outcome": request.notify_outcome(),
        });
        self.connector
            .send_provisional_response(&request, &job_id, &metadata)
            .await;

        debug!("Dispatching job {} for transaction {}", job_id, request.transaction_id());
        self.jobs.spawn(execute_job(
            Arc::clone(&self.connector),
            Arc::clone(&self.store),
            request,
            action,
            job_id,
        ));
    }
}

/// Body of a non-blocking execution task
async fn execute_job(
    connector: Arc<dyn Connector>,
    store: Arc<JobStore>,
    request: ActionRequest,
    action: Arc<dyn Action>,
    job_id: String,
) {
    info!("Starting job {} ({}/{})", job_id, request.module(), request.action());
    let context = ActionContext::from_request(&request);

    let (result, results) = match action.invoke(request.params(), &context).await {
        Ok(output) => (JobResult::completed(&job_id, output.to_string()), output),
        Err(e) => {
            warn!("Job {} failed: {}", job_id, e);
            let results = json!({ "error": e.to_string() });
            (JobResult::failed(&job_id, e.stderr(), e.exit_code()), results)
        }
    };

    if let Err(e) = store.write_result(&result).await {
        error!("Failed to store the result of job {}: {}", job_id, e);
        return;
    }
    info!("Job {} finished: {}", job_id, result.status);

    if request.notify_outcome() {
        connector
            .send_non_blocking_response(&request, &results, &job_id)
            .await;
    }
}
