use serde::Serialize;

/// Mime-type to representation mapping of a rendered result, e.g.
/// `{"text/plain": "2"}`.
pub type MimeBundle = serde_json::Map<String, serde_json::Value>;

/// One output event of a code execution, in the order the kernel produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    Stdout { timestamp: String, data: String },
    Stderr { timestamp: String, data: String },
    Result { data: MimeBundle },
    Error {
        name: String,
        value: String,
        traceback: String,
    },
}

impl Output {
    pub fn stdout(timestamp: impl Into<String>, data: impl Into<String>) -> Self {
        Output::Stdout {
            timestamp: timestamp.into(),
            data: data.into(),
        }
    }

    pub fn stderr(timestamp: impl Into<String>, data: impl Into<String>) -> Self {
        Output::Stderr {
            timestamp: timestamp.into(),
            data: data.into(),
        }
    }

    pub fn result(data: MimeBundle) -> Self {
        Output::Result { data }
    }

    /// Builds an error output; `traceback` is the original traceback lines
    /// joined with newlines.
    pub fn error(
        name: impl Into<String>,
        value: impl Into<String>,
        traceback: impl Into<String>,
    ) -> Self {
        Output::Error {
            name: name.into(),
            value: value.into(),
            traceback: traceback.into(),
        }
    }
}
