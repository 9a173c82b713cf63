//! Request and response types for the resource endpoints
//!
//! Only the fields callers commonly need are typed; everything else a
//! response carries is kept in `extra`.

use std::collections::HashMap;

use base64::Engine;
use serde::{Deserialize, Serialize};

// =============================================================================
// Jobs
// =============================================================================

/// Entry of `GET /v1/jobs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobListStub {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(rename = "Type")]
    pub job_type: String,
    #[serde(default)]
    pub priority: i32,
    pub status: String,
    #[serde(default)]
    pub status_description: String,
    #[serde(default)]
    pub parameterized_job: bool,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default)]
    pub modify_index: u64,
    #[serde(default)]
    pub job_modify_index: u64,
}

/// Options for listing jobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobListOptions {
    /// Only return jobs whose ID starts with this prefix
    pub prefix: Option<String>,
}

impl JobListOptions {
    pub(crate) fn params(&self) -> Vec<(String, String)> {
        self.prefix
            .iter()
            .map(|prefix| ("prefix".to_string(), prefix.clone()))
            .collect()
    }
}

/// Task group summary inside a [`Job`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskGroup {
    pub name: String,
    #[serde(default)]
    pub count: i64,
}

/// Response of `GET /v1/job/:id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(rename = "Type")]
    pub job_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub task_groups: Vec<TaskGroup>,
    #[serde(default)]
    pub modify_index: u64,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Body of `POST /v1/job/:id/dispatch`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchRequest {
    /// Opaque input, sent base64 encoded
    pub payload: Vec<u8>,
    pub meta: HashMap<String, String>,
}

impl DispatchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub(crate) fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "Payload": base64::engine::general_purpose::STANDARD.encode(&self.payload),
            "Meta": self.meta,
        })
    }
}

/// Response of `POST /v1/job/:id/dispatch`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobDispatchResponse {
    #[serde(rename = "DispatchedJobID")]
    pub dispatched_job_id: String,
    #[serde(rename = "EvalID", default)]
    pub eval_id: String,
    #[serde(default)]
    pub eval_create_index: u64,
    #[serde(default)]
    pub job_create_index: u64,
    #[serde(default)]
    pub index: u64,
}

/// Body of `POST /v1/job/:id/scale`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleRequest {
    /// Task group to scale
    pub group: String,
    /// New count; `None` only records a scaling event
    pub count: Option<i64>,
    pub message: Option<String>,
    /// Record the event as an error instead of a change
    pub error: bool,
    pub meta: HashMap<String, String>,
}

impl ScaleRequest {
    pub fn new(group: impl Into<String>, count: i64) -> Self {
        Self {
            group: group.into(),
            count: Some(count),
            message: None,
            error: false,
            meta: HashMap::new(),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub(crate) fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "Count": self.count,
            "Target": { "Group": self.group },
            "Message": self.message.clone().unwrap_or_default(),
            "Error": self.error,
            "Meta": self.meta,
        })
    }
}

/// Response of job mutations such as scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobRegisterResponse {
    #[serde(rename = "EvalID", default)]
    pub eval_id: String,
    #[serde(default)]
    pub eval_create_index: u64,
    #[serde(default)]
    pub job_modify_index: u64,
    #[serde(default)]
    pub warnings: String,
    #[serde(default)]
    pub index: u64,
}

// =============================================================================
// Allocations
// =============================================================================

/// Entry of `GET /v1/evaluation/:id/allocations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllocationListStub {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "EvalID", default)]
    pub eval_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(rename = "NodeID", default)]
    pub node_id: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(rename = "JobID", default)]
    pub job_id: String,
    #[serde(default)]
    pub task_group: String,
    #[serde(default)]
    pub desired_status: String,
    #[serde(default)]
    pub client_status: String,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default)]
    pub modify_index: u64,
}

/// Which log of a task to read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    #[default]
    Stdout,
    Stderr,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl std::str::FromStr for LogType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            other => Err(format!("unknown log type: {}", other)),
        }
    }
}

/// Options for `GET /v1/client/fs/logs/:alloc_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub task: String,
    pub log_type: LogType,
    /// Ask for raw text instead of JSON frames
    pub plain: bool,
}

impl LogOptions {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            log_type: LogType::default(),
            plain: true,
        }
    }

    pub fn log_type(mut self, log_type: LogType) -> Self {
        self.log_type = log_type;
        self
    }

    pub(crate) fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("task".to_string(), self.task.clone()),
            ("type".to_string(), self.log_type.as_str().to_string()),
        ];
        if self.plain {
            params.push(("plain".to_string(), "true".to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_list_stub_decoding() {
        let stub: JobListStub = serde_json::from_value(json!({
            "ID": "example",
            "Name": "example",
            "Namespace": "default",
            "Type": "service",
            "Priority": 50,
            "Status": "running",
            "StatusDescription": "",
            "CreateIndex": 52,
            "ModifyIndex": 59,
            "JobModifyIndex": 52,
            "JobSummary": {"Summary": {}}
        }))
        .unwrap();

        assert_eq!(stub.id, "example");
        assert_eq!(stub.job_type, "service");
        assert_eq!(stub.modify_index, 59);
        assert!(!stub.parameterized_job);
    }

    #[test]
    fn test_job_keeps_unknown_fields() {
        let job: Job = serde_json::from_value(json!({
            "ID": "cache",
            "Name": "cache",
            "Type": "service",
            "TaskGroups": [{"Name": "redis", "Count": 3, "Tasks": []}],
            "Datacenters": ["dc1"]
        }))
        .unwrap();

        assert_eq!(job.task_groups[0].count, 3);
        assert_eq!(job.extra["Datacenters"], json!(["dc1"]));
    }

    #[test]
    fn test_dispatch_body_encodes_payload() {
        let body = DispatchRequest::new()
            .payload("hello")
            .meta("owner", "ops")
            .to_body();
        assert_eq!(body["Payload"], "aGVsbG8=");
        assert_eq!(body["Meta"]["owner"], "ops");

        let empty = DispatchRequest::new().to_body();
        assert_eq!(empty["Payload"], "");
    }

    #[test]
    fn test_scale_body() {
        let body = ScaleRequest::new("web", 4).message("load test").to_body();
        assert_eq!(body["Count"], 4);
        assert_eq!(body["Target"]["Group"], "web");
        assert_eq!(body["Message"], "load test");
        assert_eq!(body["Error"], false);
    }

    #[test]
    fn test_log_params() {
        let opts = LogOptions::new("server").log_type(LogType::Stderr);
        assert_eq!(
            opts.params(),
            vec![
                ("task".to_string(), "server".to_string()),
                ("type".to_string(), "stderr".to_string()),
                ("plain".to_string(), "true".to_string()),
            ]
        );
        assert_eq!("STDOUT".parse::<LogType>(), Ok(LogType::Stdout));
        assert!("journal".parse::<LogType>().is_err());
    }
}
