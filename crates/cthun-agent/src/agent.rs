//! Agent main loop: reads inbound messages and hands them to the processor

use anyhow::{Context, Result};
use cthun_proto::{ParsedChunks, RequestType};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::processor::RequestProcessor;

/// Reads one JSON-encoded [`ParsedChunks`] per line and spawns a handling
/// flow for each
pub struct AgentLoop<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Inbound message lines (typically stdin)
    lines: Lines<BufReader<R>>,
    /// Request processor shared by all handling flows
    processor: Arc<RequestProcessor>,
    /// Handling flows still in progress
    flows: TaskTracker,
    /// Shutdown signal receiver
    shutdown_rx: Option<oneshot::Receiver<()>>,
    /// Shutdown signal sender (kept for graceful shutdown)
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl<R> AgentLoop<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Create an agent loop reading from `reader`
    pub fn new(reader: R, processor: Arc<RequestProcessor>) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        Self {
            lines: BufReader::new(reader).lines(),
            processor,
            flows: TaskTracker::new(),
            shutdown_rx: Some(shutdown_rx),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get shutdown sender for graceful shutdown
    pub fn shutdown_sender(&mut self) -> Option<oneshot::Sender<()>> {
        self.shutdown_tx.take()
    }

    /// Run until the input closes or shutdown is signalled, then drain
    /// in-flight requests and jobs
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting agent loop");

        let mut shutdown_rx = self
            .shutdown_rx
            .take()
            .context("Shutdown receiver already taken")?;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Received shutdown signal, stopping agent loop");
                    break;
                }

                line = self.lines.next_line() => {
                    match line {
                        Ok(Some(line)) => self.dispatch_line(&line),
                        Ok(None) => {
                            info!("Input stream closed, stopping agent loop");
                            break;
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                            error!("Skipping undecodable input line: {}", e);
                        }
                        Err(e) => {
                            error!("Error reading input: {}", e);
                            break;
                        }
                    }
                }
            }
        }

        self.flows.close();
        self.flows.wait().await;
        debug!("All handling flows finished, waiting for {} jobs", self.processor.active_jobs());
        self.processor.shutdown().await;

        info!("Agent loop stopped");
        Ok(())
    }

    /// Decode one inbound line and spawn its handling flow
    fn dispatch_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let chunks: ParsedChunks = match serde_json::from_str(line) {
            Ok(chunks) => chunks,
            Err(e) => {
                error!("Failed to decode inbound message: {}", e);
                return;
            }
        };

        let request_type = match chunks.envelope.get("message_type").and_then(Value::as_str) {
            Some(message_type) => match RequestType::from_message_type(message_type) {
                Some(request_type) => request_type,
                None => {
                    warn!("Ignoring message of unsupported type {}", message_type);
                    return;
                }
            },
            // Envelope validation reports the problem to the sender
            None => RequestType::Blocking,
        };

        let processor = Arc::clone(&self.processor);
        self.flows.spawn(async move {
            processor.process_request(request_type, chunks).await;
        });
    }
}
