//! Connector writing outbound messages as JSON lines

use async_trait::async_trait;
use cthun_proto::{ActionRequest, Connector, OutboundMessage, RequestOrigin};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Serializes every outbound message onto one line of `W`
pub struct StreamConnector<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> StreamConnector<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a connector writing to `writer`
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    async fn send(&self, message: OutboundMessage) {
        let mut line = match serde_json::to_vec(&message) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize {} message: {}", message.message_type, e);
                return;
            }
        };
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.write_all(&line).await {
            error!("Failed to write {} message: {}", message.message_type, e);
            return;
        }
        if let Err(e) = writer.flush().await {
            error!("Failed to flush {} message: {}", message.message_type, e);
            return;
        }

        debug!("Sent {} to {:?}", message.message_type, message.targets);
    }
}

#[async_trait]
impl<W> Connector for StreamConnector<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_cthun_error(&self, destination: &str, message_id: Option<&str>, description: &str, debug: &[Value]) {
        self.send(OutboundMessage::cthun_error(
            destination,
            message_id.map(str::to_string),
            description,
            debug,
        ))
        .await;
    }

    async fn send_rpc_error(&self, origin: &RequestOrigin, description: &str) {
        self.send(OutboundMessage::rpc_error(origin, description)).await;
    }

    async fn send_blocking_response(&self, request: &ActionRequest, results: &Value) {
        self.send(OutboundMessage::blocking_response(request, results)).await;
    }

    async fn send_provisional_response(&self, request: &ActionRequest, job_id: &str, metadata: &Value) {
        self.send(OutboundMessage::provisional_response(request, job_id, metadata))
            .await;
    }

    async fn send_non_blocking_response(&self, request: &ActionRequest, results: &Value, job_id: &str) {
        self.send(OutboundMessage::non_blocking_response(request, results, job_id))
            .await;
    }
}
