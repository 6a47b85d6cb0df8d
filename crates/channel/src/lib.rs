pub mod channel;
pub mod execution;
pub mod output;
pub mod transport;
pub mod wire;

mod receiver;

use std::time::Duration;

use thiserror::Error;

pub use channel::{Channel, ExecuteOptions};
pub use execution::Execution;
pub use output::{MimeBundle, Output};

/// A failure of the channel as a whole. Once one of these is reported the
/// receiver loop has stopped and no further messages will be delivered to
/// any execution on the channel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("websocket connect failed: {0}")]
    Connect(String),
    #[error("websocket connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("websocket read failed: {0}")]
    Connection(String),
    #[error("malformed kernel message: {0}")]
    Decode(String),
    #[error("could not encode request: {0}")]
    Encode(String),
    #[error("channel is closed")]
    Closed,
}

/// A failure of one blocking code execution. The outputs collected before
/// the failure ride along with the error.
#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("execution cancelled")]
    Cancelled { partial: Vec<Output> },
    #[error("channel failed during execution: {source}")]
    Channel {
        source: ChannelError,
        partial: Vec<Output>,
    },
}

impl ExecuteError {
    /// Outputs that were collected before the execution failed.
    pub fn partial_outputs(&self) -> &[Output] {
        match self {
            ExecuteError::Cancelled { partial } => partial,
            ExecuteError::Channel { partial, .. } => partial,
        }
    }
}
