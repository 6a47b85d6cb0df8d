//! The channel: owns one streaming connection to a running kernel and lets
//! any number of concurrent code submissions share it. One writer task
//! serializes request frames, one receiver task fans inbound messages out to
//! the per-execution queues.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::execution::{Execution, Registry};
use crate::output::Output;
use crate::receiver;
use crate::transport::{self, FrameSink, FrameSource};
use crate::wire;
use crate::{ChannelError, ExecuteError};

/// Capacity of each execution's output queue. A full queue of a live
/// consumer blocks the shared receiver loop until drained.
const OUTPUT_QUEUE_CAPACITY: usize = 10;

/// Capacity of the outgoing frame queue feeding the writer task.
const OUTGOING_QUEUE_CAPACITY: usize = 16;

/// Execution flags carried in the request envelope's content.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Suppress eager output (no execute_result is published).
    pub silent: bool,
    /// Record the code in the kernel's input history.
    pub store_history: bool,
    /// Allow the kernel to request interactive input. This client never
    /// answers input requests, so leave it off.
    pub allow_stdin: bool,
    /// Abort queued executions after the first error.
    pub stop_on_error: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            silent: false,
            store_history: true,
            allow_stdin: false,
            stop_on_error: true,
        }
    }
}

pub struct Channel {
    session_id: String,
    outgoing: mpsc::Sender<String>,
    registry: Arc<Registry>,
    errors: watch::Receiver<Option<ChannelError>>,
    shutdown: CancellationToken,
}

impl Channel {
    /// Dials `ws(s)://.../api/kernels/<kernel>/channels?session_id=<session>`
    /// within `timeout` and starts the channel tasks.
    pub async fn connect(
        url: &str,
        session_id: &str,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let (sink, source) = tokio::time::timeout(timeout, transport::ws_connect(url))
            .await
            .map_err(|_| ChannelError::Timeout(timeout))?
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        info!(%url, %session_id, "kernel channel connected");
        Ok(Self::open(sink, source, session_id))
    }

    /// Starts a channel over an already established transport. The seam the
    /// tests drive with in-memory frames.
    pub fn open<S, R>(sink: S, source: R, session_id: &str) -> Self
    where
        S: FrameSink,
        R: FrameSource,
    {
        let registry = Arc::new(Registry::default());
        let (outgoing, outgoing_receiver) = mpsc::channel(OUTGOING_QUEUE_CAPACITY);
        let (error_sender, errors) = watch::channel(None);
        let shutdown = CancellationToken::new();

        task::spawn(run_writer(sink, outgoing_receiver, shutdown.clone()));
        task::spawn(receiver::run(
            source,
            registry.clone(),
            error_sender,
            shutdown.clone(),
        ));

        Self {
            session_id: session_id.to_owned(),
            outgoing,
            registry,
            errors,
            shutdown,
        }
    }

    /// Stops the receiver and writer tasks and releases the connection.
    /// Idempotent; in-flight gathers observe [`ChannelError::Closed`].
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// The connection-level failure that stopped the channel, if any.
    /// Streaming consumers check this when their execution stops yielding.
    pub fn error(&self) -> Option<ChannelError> {
        self.errors.borrow().clone()
    }

    /// Submits `code` and gathers every output until the execution
    /// terminates. On cancellation or a connection-level failure the outputs
    /// collected so far ride along with the error. The execution is
    /// deregistered on every exit path.
    pub async fn execute(
        &self,
        code: &str,
        opts: ExecuteOptions,
        cancel: CancellationToken,
    ) -> Result<Vec<Output>, ExecuteError> {
        let mut execution = self.submit(code, &opts).await.map_err(|e| {
            ExecuteError::Channel {
                source: e,
                partial: Vec::new(),
            }
        })?;

        let mut errors = self.errors.clone();
        let mut outputs = Vec::new();

        loop {
            tokio::select! {
                // Biased with the queue first: the error branch can only
                // run once every output delivered before the failure has
                // been drained.
                biased;

                output = execution.recv() => match output {
                    Some(output) => outputs.push(output),
                    None => return Ok(outputs),
                },
                _ = cancel.cancelled() => {
                    return Err(ExecuteError::Cancelled { partial: outputs });
                }
                changed = errors.changed() => {
                    let source = match changed {
                        Ok(()) => match errors.borrow_and_update().clone() {
                            Some(source) => source,
                            None => continue,
                        },
                        // Receiver loop ended without reporting: the peer
                        // closed cleanly or the channel was closed locally.
                        Err(_) => ChannelError::Closed,
                    };

                    return Err(ExecuteError::Channel {
                        source,
                        partial: outputs,
                    });
                }
            }
        }
    }

    /// Submits `code` and returns the execution handle immediately. The
    /// caller drains the handle at its own pace and deregisters it by
    /// dropping it; there is no implicit termination wait.
    pub async fn execute_streaming(
        &self,
        code: &str,
        opts: ExecuteOptions,
    ) -> Result<Execution, ChannelError> {
        self.submit(code, &opts).await
    }

    /// Allocates a correlation id, registers the execution, and writes the
    /// request envelope.
    async fn submit(&self, code: &str, opts: &ExecuteOptions) -> Result<Execution, ChannelError> {
        let msg_id = Uuid::new_v4().to_string();
        let request = wire::execute_request(&msg_id, &self.session_id, code, opts);
        let frame = serde_json::to_string(&request)
            .map_err(|e| ChannelError::Encode(e.to_string()))?;

        let queue = self.registry.register(&msg_id, OUTPUT_QUEUE_CAPACITY);
        if self.outgoing.send(frame).await.is_err() {
            self.registry.remove(&msg_id);
            return Err(ChannelError::Closed);
        }

        debug!(%msg_id, "execution submitted");
        Ok(Execution::new(msg_id, queue, self.registry.clone()))
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Sole owner of the write half; serializes the frames of all concurrent
/// submissions.
async fn run_writer<S: FrameSink>(
    mut sink: S,
    mut outgoing: mpsc::Receiver<String>,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = outgoing.recv() => frame,
        };

        match frame {
            Some(frame) => {
                if let Err(e) = sink.send(frame).await {
                    debug!(error = %e, "kernel channel write failed");
                    break;
                }
            }
            None => break,
        }
    }

    sink.close().await;
}
