//! Outbound half of the transport, as seen by the request processor

use async_trait::async_trait;
use serde_json::Value;

use crate::message::{ActionRequest, RequestOrigin};

/// Sends protocol responses and errors.
///
/// All operations are fire-and-forget: delivery failures are the
/// implementation's concern and are never reported back to the caller.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Transport-level error for a message whose envelope was unusable.
    ///
    /// `message_id` is the id of the offending message, when it could be recovered.
    async fn send_cthun_error(&self, destination: &str, message_id: Option<&str>, description: &str, debug: &[Value]);

    /// RPC-level error for a request with a valid envelope
    async fn send_rpc_error(&self, origin: &RequestOrigin, description: &str);

    /// Result of a blocking request
    async fn send_blocking_response(&self, request: &ActionRequest, results: &Value);

    /// Acknowledgment of a non-blocking request, sent before execution starts
    async fn send_provisional_response(&self, request: &ActionRequest, job_id: &str, metadata: &Value);

    /// Completion notification of a non-blocking request
    async fn send_non_blocking_response(&self, request: &ActionRequest, results: &Value, job_id: &str);
}
