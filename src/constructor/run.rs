use crate::assertion::model::Assertion;
use crate::case::model::TestCase;
use crate::constructor::model::{
    CachePayload, CasePayload, Constructor, ConstructorKind, ScriptPayload, SqlPayload,
};
use crate::errors::EngineError;
use crate::execution::Executor;
use serde_json::{json, Map, Value};

/// Runs every constructor of a case in ascending order. After each step the
/// full rewrite pass runs again so later steps (and the case fields
/// themselves) can consume outputs of earlier ones. One failing step aborts
/// the whole pipeline.
#[allow(clippy::too_many_arguments)]
pub async fn execute_all(
    executor: &Executor,
    env: i64,
    path: &str,
    case: &mut TestCase,
    case_params: &mut Map<String, Value>,
    request_params: &mut Map<String, Value>,
    constructors: &mut Vec<Constructor>,
    asserts: &mut Vec<Assertion>,
) -> Result<(), EngineError> {
    if constructors.is_empty() {
        executor
            .logger()
            .append("no constructors, skipping the setup phase");
        return Ok(());
    }
    for position in 0..constructors.len() {
        let constructor = constructors[position].clone();
        run_one(
            executor,
            env,
            position + 1,
            path,
            case_params,
            request_params,
            &constructor,
        )
        .await?;
        executor.rewrite_all(case_params, case, constructors, asserts);
    }
    Ok(())
}

async fn run_one(
    executor: &Executor,
    env: i64,
    index: usize,
    path: &str,
    case_params: &mut Map<String, Value>,
    request_params: &mut Map<String, Value>,
    constructor: &Constructor,
) -> Result<(), EngineError> {
    if !constructor.enabled {
        executor.logger().append(format!(
            "path: {}, constructor [{}] is disabled, skipping",
            path, constructor.name
        ));
        return Ok(());
    }
    executor.logger().append(format!(
        "path: {}, running constructor #{} [{}]",
        path, index, constructor.name
    ));
    match constructor.kind {
        ConstructorKind::TestCase => {
            run_nested_case(executor, env, index, path, case_params, request_params, constructor)
                .await
        }
        ConstructorKind::Sql => run_sql(executor, env, index, path, case_params, constructor).await,
        ConstructorKind::Cache => {
            run_cache(executor, env, index, path, case_params, constructor).await
        }
        ConstructorKind::Script => {
            run_script(
                executor,
                env,
                index,
                path,
                case_params,
                request_params,
                constructor,
            )
            .await
        }
        ConstructorKind::Unknown => {
            // Configuration problem, not a run problem.
            executor.logger().append(format!(
                "constructor [{}] has an unsupported kind, skipping",
                constructor.name
            ));
            Ok(())
        }
    }
}

fn step_error(path: &str, index: usize, name: &str, detail: impl Into<String>) -> EngineError {
    EngineError::Constructor {
        path: path.to_string(),
        index,
        name: name.to_string(),
        detail: detail.into(),
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    constructor: &Constructor,
    path: &str,
    index: usize,
) -> Result<T, EngineError> {
    serde_json::from_str(&constructor.payload).map_err(|err| {
        step_error(
            path,
            index,
            &constructor.name,
            format!("invalid payload: {}", err),
        )
    })
}

/// Recursively runs another case. The nested executor shares this run's log
/// sink and parameter pools; it suspends the parent until it finishes.
async fn run_nested_case(
    executor: &Executor,
    env: i64,
    index: usize,
    path: &str,
    case_params: &mut Map<String, Value>,
    request_params: &mut Map<String, Value>,
    constructor: &Constructor,
) -> Result<(), EngineError> {
    let payload: CasePayload = parse_payload(constructor, path, index)?;
    if let Some(params) = &payload.params {
        let extra: Map<String, Value> = serde_json::from_str(params).map_err(|err| {
            step_error(
                path,
                index,
                &constructor.name,
                format!("invalid nested params: {}", err),
            )
        })?;
        for (key, value) in extra {
            request_params.insert(key, value);
        }
    }
    let nested_case = executor
        .engine()
        .cases
        .fetch_case(payload.case_id)
        .await
        .map_err(|err| step_error(path, index, &constructor.name, err.to_string()))?;
    let sub_path = format!("{} -> {}", path, nested_case.name);
    let nested = Executor::nested(executor.engine().clone(), executor.logger().clone());
    let (result, err) = nested
        .run(env, payload.case_id, case_params, request_params, &sub_path)
        .await;
    if let Some(err) = err {
        return Err(step_error(path, index, &constructor.name, err));
    }
    if !result.status {
        let verdicts = serde_json::to_string(&result.asserts).unwrap_or_default();
        return Err(step_error(
            path,
            index,
            &constructor.name,
            format!("nested case assertions failed: {}", verdicts),
        ));
    }
    let value = serde_json::to_value(&result)
        .map_err(|err| step_error(path, index, &constructor.name, err.to_string()))?;
    store_output(executor, case_params, constructor, value);
    Ok(())
}

async fn run_sql(
    executor: &Executor,
    env: i64,
    index: usize,
    path: &str,
    case_params: &mut Map<String, Value>,
    constructor: &Constructor,
) -> Result<(), EngineError> {
    let payload: SqlPayload = parse_payload(constructor, path, index)?;
    executor.logger().append(format!(
        "constructor type is sql, database: {}\nsql: {}",
        payload.database, payload.sql
    ));
    let value = executor
        .engine()
        .backends
        .run_sql(env, &payload.database, &payload.sql)
        .await
        .map_err(|err| step_error(path, index, &constructor.name, err.to_string()))?;
    store_output(executor, case_params, constructor, value);
    Ok(())
}

async fn run_cache(
    executor: &Executor,
    env: i64,
    index: usize,
    path: &str,
    case_params: &mut Map<String, Value>,
    constructor: &Constructor,
) -> Result<(), EngineError> {
    let payload: CachePayload = parse_payload(constructor, path, index)?;
    executor.logger().append(format!(
        "constructor type is cache, connection: {}\ncommand: {}",
        payload.name, payload.command
    ));
    let value = executor
        .engine()
        .backends
        .run_cache_op(env, &payload.name, &payload.command)
        .await
        .map_err(|err| step_error(path, index, &constructor.name, err.to_string()))?;
    store_output(executor, case_params, constructor, value);
    Ok(())
}

async fn run_script(
    executor: &Executor,
    env: i64,
    index: usize,
    path: &str,
    case_params: &mut Map<String, Value>,
    request_params: &mut Map<String, Value>,
    constructor: &Constructor,
) -> Result<(), EngineError> {
    let payload: ScriptPayload = parse_payload(constructor, path, index)?;
    let context = json!({
        "case_params": Value::Object(case_params.clone()),
        "request_params": Value::Object(request_params.clone()),
    });
    let value = executor
        .engine()
        .backends
        .run_script(env, &payload.code, context)
        .await
        .map_err(|err| step_error(path, index, &constructor.name, err.to_string()))?;
    store_output(executor, case_params, constructor, value);
    Ok(())
}

fn store_output(
    executor: &Executor,
    case_params: &mut Map<String, Value>,
    constructor: &Constructor,
    value: Value,
) {
    executor.logger().append(format!(
        "constructor [{}] stored variable [{}]:\n{}",
        constructor.name, constructor.out_name, value
    ));
    case_params.insert(constructor.out_name.clone(), value);
}
