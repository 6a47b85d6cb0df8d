//! The envelope format of the kernel messaging protocol: the outgoing
//! `execute_request` and the inbound messages the receiver loop consumes.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::ExecuteOptions;
use crate::output::MimeBundle;

pub const PROTOCOL_VERSION: &str = "5.3";
const USERNAME: &str = "sluice";

#[derive(Debug, Serialize)]
pub struct ExecuteRequest {
    pub header: RequestHeader,
    pub parent_header: serde_json::Map<String, Value>,
    pub metadata: RequestMetadata,
    pub content: ExecuteContent,
    pub buffers: Vec<Value>,
    pub channel: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RequestHeader {
    pub msg_id: String,
    pub msg_type: &'static str,
    pub username: &'static str,
    pub session: String,
    pub date: String,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RequestMetadata {
    pub trusted: bool,
    #[serde(rename = "deletedCells")]
    pub deleted_cells: Vec<Value>,
    #[serde(rename = "recordTiming")]
    pub record_timing: bool,
    #[serde(rename = "cellId")]
    pub cell_id: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteContent {
    pub code: String,
    pub silent: bool,
    pub store_history: bool,
    pub user_expressions: serde_json::Map<String, Value>,
    pub allow_stdin: bool,
    pub stop_on_error: bool,
}

/// Builds the `execute_request` envelope sent on the shell channel.
pub fn execute_request(
    msg_id: &str,
    session: &str,
    code: &str,
    opts: &ExecuteOptions,
) -> ExecuteRequest {
    ExecuteRequest {
        header: RequestHeader {
            msg_id: msg_id.to_owned(),
            msg_type: "execute_request",
            username: USERNAME,
            session: session.to_owned(),
            date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            version: PROTOCOL_VERSION,
        },
        parent_header: serde_json::Map::new(),
        metadata: RequestMetadata {
            trusted: true,
            deleted_cells: Vec::new(),
            record_timing: false,
            cell_id: uuid::Uuid::new_v4().to_string(),
        },
        content: ExecuteContent {
            code: code.to_owned(),
            silent: opts.silent,
            store_history: opts.store_history,
            user_expressions: serde_json::Map::new(),
            allow_stdin: opts.allow_stdin,
            stop_on_error: opts.stop_on_error,
        },
        buffers: Vec::new(),
        channel: "shell",
    }
}

/// An inbound message as read off the wire. The content stays loosely typed
/// until [`KernelMessage::body`] resolves it against `msg_type`.
#[derive(Debug, Deserialize)]
pub struct KernelMessage {
    #[serde(default)]
    pub header: ResponseHeader,
    #[serde(default)]
    pub parent_header: ParentHeader,
    #[serde(default)]
    pub msg_type: String,
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseHeader {
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ParentHeader {
    /// The correlation key: the `msg_id` of the request this message answers.
    #[serde(default)]
    pub msg_id: String,
}

/// The closed set of message bodies the receiver loop dispatches on.
#[derive(Debug)]
pub enum Body {
    Error(ErrorContent),
    Stream(StreamContent),
    DisplayData(DisplayContent),
    ExecuteResult(DisplayContent),
    Status(StatusContent),
    ExecuteReply(ReplyContent),
    ExecuteInput,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorContent {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

impl ErrorContent {
    pub fn joined_traceback(&self) -> String {
        self.traceback.join("\n")
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamContent {
    pub name: StreamName,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DisplayContent {
    pub data: MimeBundle,
}

#[derive(Debug, Deserialize)]
pub struct StatusContent {
    pub execution_state: ExecutionState,
    #[serde(default)]
    pub ename: String,
    #[serde(default)]
    pub evalue: String,
    #[serde(default)]
    pub traceback: Vec<String>,
}

impl StatusContent {
    pub fn joined_traceback(&self) -> String {
        self.traceback.join("\n")
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Busy,
    Idle,
    Error,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ReplyContent {
    #[serde(default)]
    pub status: ReplyStatus,
    #[serde(default)]
    pub ename: String,
    #[serde(default)]
    pub evalue: String,
    #[serde(default)]
    pub traceback: Vec<String>,
}

impl ReplyContent {
    pub fn joined_traceback(&self) -> String {
        self.traceback.join("\n")
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    #[default]
    Ok,
    Error,
    #[serde(alias = "aborted")]
    Abort,
    #[serde(other)]
    Other,
}

impl KernelMessage {
    /// Resolves the loosely typed content into a [`Body`] keyed on `msg_type`.
    ///
    /// Messages of a type this client does not consume resolve to `None` and
    /// are dropped by the receiver loop; a known type whose content does not
    /// decode is an error, fatal to the whole channel.
    pub fn body(&self) -> Result<Option<Body>, serde_json::Error> {
        let content = self.content.clone();
        let body = match self.msg_type.as_str() {
            "error" => Body::Error(serde_json::from_value(content)?),
            "stream" => Body::Stream(serde_json::from_value(content)?),
            "display_data" => Body::DisplayData(serde_json::from_value(content)?),
            "execute_result" => Body::ExecuteResult(serde_json::from_value(content)?),
            "status" => Body::Status(serde_json::from_value(content)?),
            "execute_reply" => Body::ExecuteReply(serde_json::from_value(content)?),
            "execute_input" => Body::ExecuteInput,
            _ => return Ok(None),
        };

        Ok(Some(body))
    }
}
