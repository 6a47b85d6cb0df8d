#![allow(dead_code)]

//! Builders for the response frames a kernel sends back over the channel.

use serde_json::json;

pub const DATE: &str = "2024-05-01T10:00:00Z";

fn frame(parent_id: &str, msg_type: &str, content: serde_json::Value) -> String {
    json!({
        "header": {"date": DATE, "msg_type": msg_type},
        "parent_header": {"msg_id": parent_id},
        "msg_type": msg_type,
        "content": content,
        "channel": "iopub",
    })
    .to_string()
}

pub fn status(parent_id: &str, state: &str) -> String {
    frame(parent_id, "status", json!({"execution_state": state}))
}

pub fn status_error(parent_id: &str, ename: &str, evalue: &str) -> String {
    frame(
        parent_id,
        "status",
        json!({"execution_state": "error", "ename": ename, "evalue": evalue, "traceback": []}),
    )
}

pub fn stream(parent_id: &str, name: &str, text: &str) -> String {
    frame(parent_id, "stream", json!({"name": name, "text": text}))
}

pub fn execute_result(parent_id: &str, text_plain: &str) -> String {
    frame(
        parent_id,
        "execute_result",
        json!({"data": {"text/plain": text_plain}, "execution_count": 1}),
    )
}

pub fn display_data(parent_id: &str, mime: &str, representation: &str) -> String {
    frame(parent_id, "display_data", json!({"data": {mime: representation}}))
}

pub fn error(parent_id: &str, ename: &str, evalue: &str, traceback: &[&str]) -> String {
    frame(
        parent_id,
        "error",
        json!({"ename": ename, "evalue": evalue, "traceback": traceback}),
    )
}

pub fn execute_reply(parent_id: &str, status: &str) -> String {
    frame(parent_id, "execute_reply", json!({"status": status}))
}

pub fn execute_reply_error(parent_id: &str, ename: &str, evalue: &str) -> String {
    frame(
        parent_id,
        "execute_reply",
        json!({"status": "error", "ename": ename, "evalue": evalue, "traceback": []}),
    )
}

pub fn execute_input(parent_id: &str, code: &str) -> String {
    frame(parent_id, "execute_input", json!({"code": code, "execution_count": 1}))
}

/// The frame sequence of a successful execution: busy, the given payload
/// frames, ok reply, idle.
pub fn completed(parent_id: &str, payload: Vec<String>) -> Vec<String> {
    let mut frames = vec![status(parent_id, "busy")];
    frames.extend(payload);
    frames.push(execute_reply(parent_id, "ok"));
    frames.push(status(parent_id, "idle"));
    frames
}
