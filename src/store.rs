use crate::assertion::model::Assertion;
use crate::case::model::TestCase;
use crate::constructor::model::Constructor;
use crate::errors::EngineError;
use crate::plan::model::{PlanState, TestPlan};
use crate::report::model::{CaseResult, EnvSummary, Report, ReportState, RunMode};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type tag of a stored global config value, selecting its decoder.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    String,
    Json,
    Yaml,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GlobalConfig {
    pub value: String,
    pub kind: ConfigKind,
}

/// One named parameter row of a case's dataset; params is JSON text of the
/// request params seeded into the run.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DatasetRow {
    pub name: String,
    pub params: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Environment {
    pub id: i64,
    pub name: String,
    pub deleted: bool,
}

/// Test case data access. Implementations live outside the engine; everything
/// is fetched fresh per run so in-place rewriting never leaks across runs.
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn fetch_case(&self, case_id: i64) -> Result<TestCase, EngineError>;
    async fn fetch_constructors(&self, case_id: i64) -> Result<Vec<Constructor>, EngineError>;
    async fn fetch_assertions(&self, case_id: i64) -> Result<Vec<Assertion>, EngineError>;
    async fn fetch_dataset_rows(&self, env: i64, case_id: i64)
        -> Result<Vec<DatasetRow>, EngineError>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Option<GlobalConfig>, EngineError>;
}

#[async_trait]
pub trait EnvStore: Send + Sync {
    async fn fetch_env(&self, env: i64) -> Result<Option<Environment>, EngineError>;
}

/// External actions available to constructors: SQL against a named database,
/// a cache command against a named connection, and script execution with the
/// run context visible to the snippet.
#[async_trait]
pub trait SetupBackend: Send + Sync {
    async fn run_sql(&self, env: i64, database: &str, sql: &str) -> Result<Value, EngineError>;
    async fn run_cache_op(&self, env: i64, name: &str, command: &str)
        -> Result<Value, EngineError>;
    async fn run_script(&self, env: i64, code: &str, context: Value) -> Result<Value, EngineError>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn start(
        &self,
        executor: i64,
        env: i64,
        mode: RunMode,
        plan_id: Option<i64>,
    ) -> Result<i64, EngineError>;
    async fn update_state(&self, report_id: i64, state: ReportState) -> Result<(), EngineError>;
    #[allow(clippy::too_many_arguments)]
    async fn end(
        &self,
        report_id: i64,
        ok: usize,
        fail: usize,
        error: usize,
        skip: usize,
        state: ReportState,
        cost: String,
    ) -> Result<Report, EngineError>;
    async fn insert_result(&self, result: CaseResult) -> Result<(), EngineError>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn fetch_plan(&self, plan_id: i64) -> Result<Option<TestPlan>, EngineError>;
    async fn update_state(&self, plan_id: i64, state: PlanState) -> Result<(), EngineError>;
    async fn persist(&self, plan: &TestPlan) -> Result<(), EngineError>;
}

/// Notification rendering and delivery, both collaborator concerns.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn render(&self, plan_name: &str, summary: &EnvSummary) -> Result<String, EngineError>;
    async fn send(
        &self,
        subject: &str,
        document: &str,
        receivers: &[i64],
    ) -> Result<(), EngineError>;
}
