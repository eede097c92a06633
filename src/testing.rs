//! In-memory fakes for every collaborator trait, shared by the unit tests.

use crate::assertion::model::Assertion;
use crate::case::model::TestCase;
use crate::constructor::model::Constructor;
use crate::engine::Engine;
use crate::errors::EngineError;
use crate::http::{InvokeResult, RequestInvoker, RequestSpec};
use crate::plan::model::{PlanState, TestPlan};
use crate::report::model::{CaseResult, EnvSummary, Report, ReportState, RunMode};
use crate::store::{
    CaseStore, ConfigKind, ConfigStore, DatasetRow, EnvStore, Environment, GlobalConfig, Notifier,
    PlanStore, ReportStore, SetupBackend,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct WorldState {
    cases: HashMap<i64, TestCase>,
    constructors: HashMap<i64, Vec<Constructor>>,
    assertions: HashMap<i64, Vec<Assertion>>,
    datasets: HashMap<i64, Vec<DatasetRow>>,
    configs: HashMap<String, GlobalConfig>,
    envs: HashMap<i64, Environment>,
    plans: HashMap<i64, TestPlan>,
    response_status: u16,
    response_body: String,
    invoked_urls: Vec<String>,
    sql_value: Value,
    cache_value: Value,
    script_value: Value,
    sql_fail_substring: Option<String>,
    sql_calls: usize,
    script_contexts: Vec<Value>,
    reports: HashMap<i64, Report>,
    next_report_id: i64,
    results: Vec<CaseResult>,
    notifications: Vec<(String, Vec<i64>)>,
}

impl Default for WorldState {
    fn default() -> Self {
        WorldState {
            cases: HashMap::new(),
            constructors: HashMap::new(),
            assertions: HashMap::new(),
            datasets: HashMap::new(),
            configs: HashMap::new(),
            envs: HashMap::new(),
            plans: HashMap::new(),
            response_status: 200,
            response_body: "{}".to_string(),
            invoked_urls: Vec::new(),
            sql_value: Value::Null,
            cache_value: Value::Null,
            script_value: Value::Null,
            sql_fail_substring: None,
            sql_calls: 0,
            script_contexts: Vec::new(),
            reports: HashMap::new(),
            next_report_id: 1,
            results: Vec::new(),
            notifications: Vec::new(),
        }
    }
}

/// One shared fixture playing every collaborator role at once. Clones share
/// state, so the same handle seeds data and inspects what the engine did.
#[derive(Clone, Default)]
pub struct TestWorld {
    state: Arc<Mutex<WorldState>>,
}

/// Builds an engine whose every collaborator is the given world.
pub fn engine_with(world: &TestWorld) -> Engine {
    Engine::new(
        Arc::new(world.clone()),
        Arc::new(world.clone()),
        Arc::new(world.clone()),
        Arc::new(world.clone()),
        Arc::new(world.clone()),
        Arc::new(world.clone()),
        Arc::new(world.clone()),
        Arc::new(world.clone()),
    )
}

impl TestWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_case(&self, case: TestCase) {
        self.state.lock().unwrap().cases.insert(case.id, case);
    }

    pub fn put_constructor(&self, case_id: i64, constructor: Constructor) {
        self.state
            .lock()
            .unwrap()
            .constructors
            .entry(case_id)
            .or_default()
            .push(constructor);
    }

    pub fn put_assertion(&self, case_id: i64, id: i64, assert_type: &str, expected: &str, actually: &str) {
        self.state
            .lock()
            .unwrap()
            .assertions
            .entry(case_id)
            .or_default()
            .push(Assertion {
                id,
                name: format!("assertion {}", id),
                assert_type: assert_type.to_string(),
                expected: expected.to_string(),
                actually: actually.to_string(),
            });
    }

    pub fn put_dataset_row(&self, case_id: i64, name: &str, params: &str) {
        self.state
            .lock()
            .unwrap()
            .datasets
            .entry(case_id)
            .or_default()
            .push(DatasetRow {
                name: name.to_string(),
                params: params.to_string(),
            });
    }

    pub fn put_string_config(&self, key: &str, value: &str) {
        self.state.lock().unwrap().configs.insert(
            key.to_string(),
            GlobalConfig {
                value: value.to_string(),
                kind: ConfigKind::String,
            },
        );
    }

    pub fn put_env(&self, id: i64, name: &str) {
        self.state.lock().unwrap().envs.insert(
            id,
            Environment {
                id,
                name: name.to_string(),
                deleted: false,
            },
        );
    }

    pub fn put_deleted_env(&self, id: i64, name: &str) {
        self.state.lock().unwrap().envs.insert(
            id,
            Environment {
                id,
                name: name.to_string(),
                deleted: true,
            },
        );
    }

    pub fn put_plan(&self, plan: TestPlan) {
        self.state.lock().unwrap().plans.insert(plan.id, plan);
    }

    pub fn respond_with(&self, status: u16, body: Value) {
        let mut state = self.state.lock().unwrap();
        state.response_status = status;
        state.response_body = body.to_string();
    }

    pub fn sql_returns(&self, value: Value) {
        self.state.lock().unwrap().sql_value = value;
    }

    pub fn cache_returns(&self, value: Value) {
        self.state.lock().unwrap().cache_value = value;
    }

    pub fn script_returns(&self, value: Value) {
        self.state.lock().unwrap().script_value = value;
    }

    pub fn fail_sql_containing(&self, needle: &str) {
        self.state.lock().unwrap().sql_fail_substring = Some(needle.to_string());
    }

    pub fn invocation_count(&self) -> usize {
        self.state.lock().unwrap().invoked_urls.len()
    }

    pub fn invoked_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().invoked_urls.clone()
    }

    pub fn sql_call_count(&self) -> usize {
        self.state.lock().unwrap().sql_calls
    }

    pub fn last_script_context(&self) -> Option<Value> {
        self.state.lock().unwrap().script_contexts.last().cloned()
    }

    pub fn results(&self) -> Vec<CaseResult> {
        self.state.lock().unwrap().results.clone()
    }

    pub fn result_count(&self) -> usize {
        self.state.lock().unwrap().results.len()
    }

    pub fn report_count(&self) -> usize {
        self.state.lock().unwrap().reports.len()
    }

    pub fn notifications(&self) -> Vec<(String, Vec<i64>)> {
        self.state.lock().unwrap().notifications.clone()
    }

    pub fn plan_state(&self, plan_id: i64) -> Option<PlanState> {
        self.state
            .lock()
            .unwrap()
            .plans
            .get(&plan_id)
            .map(|plan| plan.state)
    }
}

#[async_trait]
impl CaseStore for TestWorld {
    async fn fetch_case(&self, case_id: i64) -> Result<TestCase, EngineError> {
        self.state
            .lock()
            .unwrap()
            .cases
            .get(&case_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("case {}", case_id)))
    }

    async fn fetch_constructors(&self, case_id: i64) -> Result<Vec<Constructor>, EngineError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .constructors
            .get(&case_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_assertions(&self, case_id: i64) -> Result<Vec<Assertion>, EngineError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .assertions
            .get(&case_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_dataset_rows(
        &self,
        _env: i64,
        case_id: i64,
    ) -> Result<Vec<DatasetRow>, EngineError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .datasets
            .get(&case_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ConfigStore for TestWorld {
    async fn fetch(&self, key: &str) -> Result<Option<GlobalConfig>, EngineError> {
        Ok(self.state.lock().unwrap().configs.get(key).cloned())
    }
}

#[async_trait]
impl EnvStore for TestWorld {
    async fn fetch_env(&self, env: i64) -> Result<Option<Environment>, EngineError> {
        Ok(self.state.lock().unwrap().envs.get(&env).cloned())
    }
}

#[async_trait]
impl SetupBackend for TestWorld {
    async fn run_sql(&self, _env: i64, _database: &str, sql: &str) -> Result<Value, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.sql_calls += 1;
        if let Some(needle) = &state.sql_fail_substring {
            if sql.contains(needle.as_str()) {
                return Err(EngineError::Collaborator(format!(
                    "sql rejected: {}",
                    sql
                )));
            }
        }
        Ok(state.sql_value.clone())
    }

    async fn run_cache_op(
        &self,
        _env: i64,
        _name: &str,
        _command: &str,
    ) -> Result<Value, EngineError> {
        Ok(self.state.lock().unwrap().cache_value.clone())
    }

    async fn run_script(
        &self,
        _env: i64,
        _code: &str,
        context: Value,
    ) -> Result<Value, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.script_contexts.push(context);
        Ok(state.script_value.clone())
    }
}

#[async_trait]
impl RequestInvoker for TestWorld {
    async fn invoke(&self, spec: RequestSpec) -> Result<InvokeResult, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.invoked_urls.push(spec.url);
        Ok(InvokeResult {
            status_code: state.response_status,
            response: state.response_body.clone(),
            response_headers: Map::new(),
            cookies: Map::new(),
        })
    }
}

#[async_trait]
impl ReportStore for TestWorld {
    async fn start(
        &self,
        executor: i64,
        env: i64,
        mode: RunMode,
        plan_id: Option<i64>,
    ) -> Result<i64, EngineError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_report_id;
        state.next_report_id += 1;
        state.reports.insert(
            id,
            Report {
                id,
                executor,
                env,
                mode,
                plan_id,
                ok: 0,
                fail: 0,
                error: 0,
                skip: 0,
                state: ReportState::Pending,
                cost: String::new(),
                start_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn update_state(&self, report_id: i64, state: ReportState) -> Result<(), EngineError> {
        let mut world = self.state.lock().unwrap();
        let report = world
            .reports
            .get_mut(&report_id)
            .ok_or_else(|| EngineError::NotFound(format!("report {}", report_id)))?;
        report.state = state;
        Ok(())
    }

    async fn end(
        &self,
        report_id: i64,
        ok: usize,
        fail: usize,
        error: usize,
        skip: usize,
        state: ReportState,
        cost: String,
    ) -> Result<Report, EngineError> {
        let mut world = self.state.lock().unwrap();
        let report = world
            .reports
            .get_mut(&report_id)
            .ok_or_else(|| EngineError::NotFound(format!("report {}", report_id)))?;
        report.ok = ok;
        report.fail = fail;
        report.error = error;
        report.skip = skip;
        report.state = state;
        report.cost = cost;
        Ok(report.clone())
    }

    async fn insert_result(&self, result: CaseResult) -> Result<(), EngineError> {
        self.state.lock().unwrap().results.push(result);
        Ok(())
    }
}

#[async_trait]
impl PlanStore for TestWorld {
    async fn fetch_plan(&self, plan_id: i64) -> Result<Option<TestPlan>, EngineError> {
        Ok(self.state.lock().unwrap().plans.get(&plan_id).cloned())
    }

    async fn update_state(&self, plan_id: i64, state: PlanState) -> Result<(), EngineError> {
        let mut world = self.state.lock().unwrap();
        let plan = world
            .plans
            .get_mut(&plan_id)
            .ok_or_else(|| EngineError::NotFound(format!("plan {}", plan_id)))?;
        plan.state = state;
        Ok(())
    }

    async fn persist(&self, plan: &TestPlan) -> Result<(), EngineError> {
        self.state
            .lock()
            .unwrap()
            .plans
            .insert(plan.id, plan.clone());
        Ok(())
    }
}

#[async_trait]
impl Notifier for TestWorld {
    async fn render(&self, plan_name: &str, summary: &EnvSummary) -> Result<String, EngineError> {
        Ok(format!(
            "{}: {} passed, {} failed, {} errored out of {}",
            plan_name, summary.success, summary.failed, summary.error, summary.total
        ))
    }

    async fn send(
        &self,
        subject: &str,
        _document: &str,
        receivers: &[i64],
    ) -> Result<(), EngineError> {
        self.state
            .lock()
            .unwrap()
            .notifications
            .push((subject.to_string(), receivers.to_vec()));
        Ok(())
    }
}
