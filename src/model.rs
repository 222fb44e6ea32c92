use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::io::Cursor;
use std::str::FromStr;
use crate::error::{Result, SandboxError};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTaskId {
    Number(u64),
    Text(String),
}

/// Identifier the sandbox assigns to a task. Integers on the wire are kept as their decimal text.
#[derive(Eq, PartialEq, Hash, Clone, Debug)]
pub struct TaskId(pub String);

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawTaskId::deserialize(deserializer)? {
            RawTaskId::Number(n) => Self(n.to_string()),
            RawTaskId::Text(s) => Self(s),
        })
    }
}

impl From<u64> for TaskId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl FromStr for TaskId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task state as reported by the sandbox. Unknown states are kept verbatim in `Other`.
#[derive(Eq, PartialEq, Clone, Debug)]
pub enum TaskState {
    Pending,
    Running,
    Processing,
    Reported,
    Failed(String),
    Other(String),
}

impl TaskState {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "pending" => Self::Pending,
            "running" => Self::Running,
            // the API says "completed" where the web UI says "processing"
            "completed" | "processing" => Self::Processing,
            "reported" => Self::Reported,
            failed if failed.starts_with("failed") => Self::Failed(failed.to_owned()),
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Processing => "processing",
            Self::Reported => "reported",
            Self::Failed(s) | Self::Other(s) => s.as_str(),
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Reported | Self::Failed(_))
    }
}

impl Display for TaskState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every JSON answer of the API is wrapped in this.
#[derive(Deserialize, Debug)]
pub struct Envelope {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub error_value: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn into_data(self) -> Result<Value> {
        if self.error {
            let message = self.error_value.unwrap_or_else(|| "unspecified error".to_owned());
            return Err(SandboxError::Service(message));
        }

        Ok(self.data)
    }
}

#[derive(Deserialize)]
pub struct CreatedTasks {
    pub task_ids: Vec<TaskId>,
}

#[derive(Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
}

#[derive(Eq, PartialEq, Clone, Debug, Default)]
pub enum ReportFormat {
    #[default]
    Json,
    Pdf,
    Other(String),
}

impl ReportFormat {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Json => "json",
            Self::Pdf => "pdf",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "pdf" => Self::Pdf,
            other => Self::Other(other.to_owned()),
        })
    }
}

impl Display for ReportFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum Report {
    Json(Value),
    Pdf(Cursor<Vec<u8>>),
    Raw(Vec<u8>),
}
