use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one case run within a batch.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Ok,
    Fail,
    Error,
    Skip,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Pending,
    Running,
    Done,
}

/// How a batch was started; kept on the report for display.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Manual,
    Plan,
}

/// Aggregated outcome record of one case set run against one environment.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Report {
    pub id: i64,
    pub executor: i64,
    pub env: i64,
    pub mode: RunMode,
    pub plan_id: Option<i64>,
    pub ok: usize,
    pub fail: usize,
    pub error: usize,
    pub skip: usize,
    pub state: ReportState,
    pub cost: String,
    pub start_at: DateTime<Utc>,
}

/// One persisted case result row, one per (case, dataset row) execution.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CaseResult {
    pub report_id: i64,
    pub case_id: i64,
    pub case_name: String,
    pub status: CaseStatus,
    pub dataset_name: String,
    pub request_params: String,
    pub url: String,
    pub request_method: String,
    pub request_headers: String,
    pub body: Option<String>,
    pub status_code: u16,
    pub response: String,
    pub response_headers: String,
    pub cookies: String,
    pub asserts: String,
    pub logs: Option<String>,
    pub start_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cost: String,
}

/// Per environment summary handed to the notifier after a plan run.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EnvSummary {
    pub env: String,
    pub report_id: i64,
    pub success: usize,
    pub failed: usize,
    pub error: usize,
    pub skip: usize,
    pub total: usize,
    pub cost: String,
    pub executor: i64,
    pub start_time: String,
    pub passed: bool,
}
