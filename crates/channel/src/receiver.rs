//! The receiver loop: the sole reader of the streaming connection. Decodes
//! every inbound frame and fans the events out to the matching execution's
//! queue by the parent correlation id.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::execution::{Event, Registry};
use crate::output::Output;
use crate::transport::FrameSource;
use crate::wire::{Body, ExecutionState, KernelMessage, ReplyStatus, StreamName};
use crate::ChannelError;

pub(crate) async fn run<R: FrameSource>(
    mut source: R,
    registry: Arc<Registry>,
    errors: watch::Sender<Option<ChannelError>>,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = source.next() => frame,
        };

        match frame {
            // Clean closure; waiters observe it through the dropped signal.
            None => break,
            Some(Err(e)) => {
                warn!(error = %e, "kernel channel read failed");
                let _ = errors.send(Some(ChannelError::Connection(e.to_string())));
                break;
            }
            Some(Ok(text)) => {
                if let Err(e) = process_frame(&registry, &text).await {
                    warn!(error = %e, "undecodable kernel message, closing channel");
                    let _ = errors.send(Some(e));
                    break;
                }
            }
        }
    }
}

/// Decodes one frame and dispatches it. A decode failure is fatal to the
/// channel; the stream framing can no longer be trusted.
async fn process_frame(registry: &Registry, text: &str) -> Result<(), ChannelError> {
    let message: KernelMessage =
        serde_json::from_str(text).map_err(|e| ChannelError::Decode(e.to_string()))?;

    let body = match message
        .body()
        .map_err(|e| ChannelError::Decode(e.to_string()))?
    {
        Some(body) => body,
        None => {
            debug!(msg_type = %message.msg_type, "ignoring unhandled message type");
            return Ok(());
        }
    };

    let msg_id = &message.parent_header.msg_id;
    if registry.sender(msg_id).is_none() {
        // Completed, deregistered, or another client's execution.
        debug!(%msg_id, msg_type = %message.msg_type, "dropping message for unknown execution");
        return Ok(());
    }

    dispatch(registry, msg_id, &message, body).await;
    Ok(())
}

async fn dispatch(registry: &Registry, msg_id: &str, message: &KernelMessage, body: Body) {
    match body {
        Body::Error(content) => {
            if registry.mark_errored(msg_id) {
                let traceback = content.joined_traceback();
                let output = Output::error(content.ename, content.evalue, traceback);
                deliver(registry, msg_id, Event::Output(output)).await;
            }
        }
        Body::Stream(content) => {
            let timestamp = message.header.date.as_str();
            let output = match content.name {
                StreamName::Stdout => Output::stdout(timestamp, content.text),
                StreamName::Stderr => Output::stderr(timestamp, content.text),
                StreamName::Other => return,
            };
            deliver(registry, msg_id, Event::Output(output)).await;
        }
        Body::DisplayData(content) | Body::ExecuteResult(content) => {
            deliver(registry, msg_id, Event::Output(Output::result(content.data))).await;
        }
        Body::Status(content) => match content.execution_state {
            ExecutionState::Busy => registry.mark_input_accepted(msg_id),
            ExecutionState::Idle => {
                // A bare idle also precedes the execution; only one observed
                // after the kernel went busy for this request means done.
                if registry.input_accepted(msg_id) {
                    deliver(registry, msg_id, Event::EndOfExecution).await;
                }
            }
            ExecutionState::Error => {
                let traceback = content.joined_traceback();
                let output = Output::error(content.ename, content.evalue, traceback);
                deliver(registry, msg_id, Event::Output(output)).await;
                deliver(registry, msg_id, Event::EndOfExecution).await;
            }
            ExecutionState::Other => {}
        },
        Body::ExecuteReply(content) => match content.status {
            ReplyStatus::Error => {
                if registry.mark_errored(msg_id) {
                    let traceback = content.joined_traceback();
                    let output = Output::error(content.ename, content.evalue, traceback);
                    deliver(registry, msg_id, Event::Output(output)).await;
                }
            }
            ReplyStatus::Abort => {
                let output = Output::error("aborted", "execution was aborted", "");
                deliver(registry, msg_id, Event::Output(output)).await;
            }
            ReplyStatus::Ok | ReplyStatus::Other => {}
        },
        Body::ExecuteInput => registry.mark_input_accepted(msg_id),
    }
}

/// Pushes one event into an execution's queue. Blocks while the queue is
/// full and its consumer is alive, stalling the whole channel's fan-out; an
/// abandoned execution (handle dropped, queue closed) is deregistered instead
/// so it cannot wedge the receiver.
async fn deliver(registry: &Registry, msg_id: &str, event: Event) {
    let Some(sender) = registry.sender(msg_id) else {
        return;
    };

    if sender.send(event).await.is_err() {
        debug!(%msg_id, "execution abandoned, deregistering");
        registry.remove(msg_id);
    }
}
