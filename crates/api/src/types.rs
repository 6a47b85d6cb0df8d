use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Notebook,
    Console,
    Terminal,
    File,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub session_type: Option<SessionType>,
    pub kernel: Kernel,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Kernel {
    pub id: String,
    pub name: String,
    pub last_activity: String,
    pub execution_state: String,
    pub connections: f64,
}

/// Body of a session create/update request.
#[derive(Debug, Clone, Serialize)]
pub struct NewSession {
    pub name: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub path: String,
    pub kernel: KernelSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct KernelSpec {
    pub name: String,
}

impl NewSession {
    /// A console session backed by the named kernel, e.g. `python3`.
    pub fn console(name: impl Into<String>, kernel_name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            session_type: SessionType::Console,
            kernel: KernelSpec {
                name: kernel_name.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Version {
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[googletest::test]
    fn session_decodes_the_kernel_id_pair() {
        let raw = r#"{
            "id": "sess-1",
            "name": "scratch",
            "path": "scratch.ipynb",
            "type": "notebook",
            "kernel": {
                "id": "kern-1",
                "name": "python3",
                "last_activity": "2024-05-01T10:00:00Z",
                "execution_state": "idle",
                "connections": 1
            }
        }"#;

        let session: Session = serde_json::from_str(raw).unwrap();
        expect_that!(session.id, eq("sess-1"));
        expect_that!(session.kernel.id, eq("kern-1"));
        expect_that!(session.session_type, some(eq(SessionType::Notebook)));
    }

    #[googletest::test]
    fn new_session_serializes_the_type_field() {
        let body = NewSession::console("scratch", "python3");
        let json: serde_json::Value = serde_json::to_value(&body).unwrap();

        expect_that!(json["type"].as_str(), some(eq("console")));
        expect_that!(json["kernel"]["name"].as_str(), some(eq("python3")));
    }
}
