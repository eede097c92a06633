use crate::engine::Engine;
use crate::errors::EngineError;
use crate::execution::Executor;
use crate::plan::model::PlanState;
use crate::report::model::{CaseResult, CaseStatus, EnvSummary, Report, ReportState, RunMode};
use crate::store::DatasetRow;
use chrono::Utc;
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Per case set tally, written concurrently by the dataset fan-out. Each run
/// appends one status to its own case's list.
type StatusAccumulator = Arc<Mutex<HashMap<i64, Vec<CaseStatus>>>>;

/// Runs one case against one dataset row and persists the result row. Never
/// fails the batch; every outcome folds into a status.
async fn run_with_dataset(
    engine: &Engine,
    env: i64,
    report_id: i64,
    case_id: i64,
    row: DatasetRow,
    accumulator: &StatusAccumulator,
) {
    let mut request_params: Map<String, Value> = if row.params.trim().is_empty() {
        Map::new()
    } else {
        match serde_json::from_str(&row.params) {
            Ok(map) => map,
            Err(err) => {
                warn!(
                    "dataset [{}] of case {} holds invalid params: {}",
                    row.name, case_id, err
                );
                Map::new()
            }
        }
    };
    let start_at = Utc::now();
    let started = Instant::now();
    let executor = Executor::new(engine.clone());
    let (info, failure) = executor
        .run(env, case_id, &mut Map::new(), &mut request_params, "main case")
        .await;
    let status = match &failure {
        Some(_) => CaseStatus::Error,
        None if info.status => CaseStatus::Ok,
        None => CaseStatus::Fail,
    };
    let result = CaseResult {
        report_id,
        case_id,
        case_name: info.case_name.clone(),
        status,
        dataset_name: row.name,
        request_params: row.params,
        url: info.url.clone(),
        request_method: info.request_method.clone(),
        request_headers: Value::Object(info.request_headers.clone()).to_string(),
        body: info.request_data.clone(),
        status_code: info.status_code,
        response: info.response.clone(),
        response_headers: Value::Object(info.response_headers.clone()).to_string(),
        cookies: Value::Object(info.cookies.clone()).to_string(),
        asserts: serde_json::to_string(&info.asserts).unwrap_or_default(),
        logs: info.logs.clone(),
        start_at,
        finished_at: Utc::now(),
        cost: format!("{:.2}", started.elapsed().as_secs_f64()),
    };
    if let Err(err) = engine.reports.insert_result(result).await {
        error!("failed to persist result of case {}: {}", case_id, err);
    }
    accumulator
        .lock()
        .await
        .entry(case_id)
        .or_default()
        .push(status);
}

/// Fans one case out over its dataset rows for the given environment, all rows
/// concurrently. A case without rows runs zero times and contributes nothing
/// to the tally.
async fn run_single(
    engine: &Engine,
    env: i64,
    report_id: i64,
    case_id: i64,
    accumulator: &StatusAccumulator,
) {
    let rows = match engine.cases.fetch_dataset_rows(env, case_id).await {
        Ok(rows) => rows,
        Err(err) => {
            warn!("failed to fetch dataset of case {}: {}", case_id, err);
            accumulator
                .lock()
                .await
                .entry(case_id)
                .or_default()
                .push(CaseStatus::Error);
            return;
        }
    };
    if rows.is_empty() {
        info!("case {} has no dataset rows, nothing to run", case_id);
        return;
    }
    join_all(
        rows.into_iter()
            .map(|row| run_with_dataset(engine, env, report_id, case_id, row, accumulator)),
    )
    .await;
}

/// Runs a set of cases against one environment under a fresh report.
/// Environments that are gone are skipped without a report. In ordered mode
/// cases run strictly one after another; otherwise they run concurrently.
pub async fn run_case_set(
    engine: &Engine,
    executor: i64,
    env: i64,
    case_ids: &[i64],
    mode: RunMode,
    plan_id: Option<i64>,
    ordered: bool,
) -> Result<Option<(Report, EnvSummary)>, EngineError> {
    let environment = match engine.envs.fetch_env(env).await? {
        Some(environment) if !environment.deleted => environment,
        _ => {
            warn!("environment {} is gone, skipping the run", env);
            return Ok(None);
        }
    };
    let report_id = engine.reports.start(executor, env, mode, plan_id).await?;
    engine
        .reports
        .update_state(report_id, ReportState::Running)
        .await?;
    info!(
        "report {} started against [{}], {} cases",
        report_id,
        environment.name,
        case_ids.len()
    );

    let started = Instant::now();
    let accumulator = StatusAccumulator::default();
    if ordered {
        for &case_id in case_ids {
            run_single(engine, env, report_id, case_id, &accumulator).await;
        }
    } else {
        join_all(
            case_ids
                .iter()
                .map(|&case_id| run_single(engine, env, report_id, case_id, &accumulator)),
        )
        .await;
    }

    let tally = accumulator.lock().await;
    let statuses: Vec<CaseStatus> = tally.values().flatten().copied().collect();
    let ok = statuses.iter().filter(|s| **s == CaseStatus::Ok).count();
    let fail = statuses.iter().filter(|s| **s == CaseStatus::Fail).count();
    let error = statuses.iter().filter(|s| **s == CaseStatus::Error).count();
    let skip = statuses.iter().filter(|s| **s == CaseStatus::Skip).count();
    let cost = format!("{:.2}", started.elapsed().as_secs_f64());
    let report = engine
        .reports
        .end(report_id, ok, fail, error, skip, ReportState::Done, cost.clone())
        .await?;

    let summary = EnvSummary {
        env: environment.name,
        report_id,
        success: ok,
        failed: fail,
        error,
        skip,
        total: statuses.len(),
        cost,
        executor,
        start_time: report.start_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        passed: fail == 0 && error == 0,
    };
    Ok(Some((report, summary)))
}

/// Runs a whole plan: its case list against each of its environments, all
/// environments concurrently. A plan already in flight is rejected; the
/// registry entry and the stored state are released on every exit path.
pub async fn run_plan(engine: &Engine, plan_id: i64, executor: i64) -> Result<(), EngineError> {
    let _guard = engine.plan_locks.acquire(plan_id)?;
    let mut plan = match engine.plans.fetch_plan(plan_id).await? {
        Some(plan) => plan,
        None => {
            warn!("plan {} does not exist, nothing to run", plan_id);
            return Ok(());
        }
    };
    engine
        .plans
        .update_state(plan_id, PlanState::Running)
        .await?;
    info!("plan [{}] started, envs: {:?}", plan.name, plan.env);

    let outcomes = join_all(plan.env.iter().map(|&env| {
        run_case_set(
            engine,
            executor,
            env,
            &plan.case_list,
            RunMode::Plan,
            Some(plan_id),
            plan.ordered,
        )
    }))
    .await;

    plan.state = PlanState::Idle;
    if let Err(err) = engine.plans.persist(&plan).await {
        error!("failed to mark plan {} idle: {}", plan_id, err);
    }

    for outcome in outcomes {
        let summary = match outcome {
            Ok(Some((_report, summary))) => summary,
            Ok(None) => continue,
            Err(err) => {
                error!("plan [{}] env run failed: {}", plan.name, err);
                continue;
            }
        };
        for _msg_type in &plan.msg_types {
            let document = match engine.notifier.render(&plan.name, &summary).await {
                Ok(document) => document,
                Err(err) => {
                    warn!("failed to render report of plan [{}]: {}", plan.name, err);
                    continue;
                }
            };
            let subject = format!("{} execution report", plan.name);
            if let Err(err) = engine
                .notifier
                .send(&subject, &document, &plan.receiver)
                .await
            {
                warn!("failed to deliver report of plan [{}]: {}", plan.name, err);
            }
        }
    }
    Ok(())
}
