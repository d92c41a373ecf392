//! REST API types.
//!
//! The process endpoint returns the registration payload as written to
//! `dados-YYYYMMDD.json`, plus the rejected records with their reasons.

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::export::RegistrationPayload;
use crate::models::DetachedRecord;
use crate::transform::pipeline::{MemorySink, RunStats};

/// Response sent after processing an upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready" when nothing was rejected, "warning" otherwise
    pub status: String,

    /// Registration payload, one object per accepted customer
    pub customers: Vec<RegistrationPayload>,

    /// Rejected customers with `detach_reason`
    pub rejected: Vec<DetachedRecord>,

    /// Run counters
    pub metadata: ResponseMetadata,
}

/// Counters of the processed batch
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub incoming_rows: usize,
    pub system_rows: usize,
    pub accepted: usize,
    pub inserts: usize,
    pub updates: usize,
    pub rejected: usize,
}

impl From<&RunStats> for ResponseMetadata {
    fn from(stats: &RunStats) -> Self {
        Self {
            incoming_rows: stats.incoming_rows,
            system_rows: stats.system_rows,
            accepted: stats.accepted,
            inserts: stats.inserts,
            updates: stats.alterations,
            rejected: stats.rejected,
        }
    }
}

impl ProcessResponse {
    pub fn new(stats: &RunStats, outputs: MemorySink) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: if outputs.rejected.is_empty() { "ready" } else { "warning" }.to_string(),
            customers: outputs.payload,
            rejected: outputs.rejected,
            metadata: ResponseMetadata::from(stats),
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "customers": [],
        "rejected": [],
        "metadata": null
    })
}
