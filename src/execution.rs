use crate::assertion::check;
use crate::assertion::model::{Assertion, AssertionVerdict};
use crate::case::model::{BodyKind, TestCase};
use crate::constructor;
use crate::constructor::model::Constructor;
use crate::engine::Engine;
use crate::errors::EngineError;
use crate::expression::{decode_config, extract_tokens, rewrite_text};
use crate::http::{HttpMethod, RequestSpec};
use crate::logbook::CaseLog;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::error;
use uuid::Uuid;

/// The terminal artifact of one case run. Serialized, this is also the tree
/// assertion expressions resolve against, so field names are part of the
/// expression language (`${response.data.id}`, `${status_code}`).
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResponseInfo {
    pub case_id: i64,
    pub case_name: String,
    pub request_method: String,
    pub url: String,
    pub request_headers: Map<String, Value>,
    pub request_data: Option<String>,
    pub status_code: u16,
    pub response: String,
    pub response_headers: Map<String, Value>,
    pub cookies: Map<String, Value>,
    pub asserts: BTreeMap<String, AssertionVerdict>,
    pub status: bool,
    /// Joined log text, attached by the outermost run only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

/// Runs one test case. `new` marks the outermost run which owns the log;
/// nested runs created through the constructor pipeline share the parent's
/// sink via `nested`.
pub struct Executor {
    engine: Engine,
    logger: CaseLog,
    run_id: Uuid,
    main: bool,
}

impl Executor {
    pub fn new(engine: Engine) -> Self {
        Executor {
            engine,
            logger: CaseLog::new(),
            run_id: Uuid::new_v4(),
            main: true,
        }
    }

    pub fn nested(engine: Engine, logger: CaseLog) -> Self {
        Executor {
            engine,
            logger,
            run_id: Uuid::new_v4(),
            main: false,
        }
    }

    pub fn logger(&self) -> &CaseLog {
        &self.logger
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Executes the whole case state machine. Every error raised anywhere in
    /// the sequence is caught here and folded into the result pair; nothing
    /// escapes a top level run. Boxed because nested case constructors
    /// re-enter this function.
    pub fn run<'a>(
        &'a self,
        env: i64,
        case_id: i64,
        case_params: &'a mut Map<String, Value>,
        request_params: &'a mut Map<String, Value>,
        path: &'a str,
    ) -> BoxFuture<'a, (ResponseInfo, Option<String>)> {
        async move {
            let mut info = ResponseInfo::default();
            let outcome = self
                .run_inner(env, case_id, case_params, request_params, path, &mut info)
                .await;
            match outcome {
                Ok(()) => {
                    if self.main {
                        info.logs = Some(self.logger.join());
                    }
                    (info, None)
                }
                Err(err) => {
                    let message = format!("case execution failed: {}", err);
                    error!("{}", message);
                    self.logger.append(&message);
                    if self.main {
                        info.logs = Some(self.logger.join());
                    }
                    (info, Some(message))
                }
            }
        }
        .boxed()
    }

    async fn run_inner(
        &self,
        env: i64,
        case_id: i64,
        case_params: &mut Map<String, Value>,
        request_params: &mut Map<String, Value>,
        path: &str,
        info: &mut ResponseInfo,
    ) -> Result<(), EngineError> {
        self.logger.append(format!(
            "run {} started, path: {}",
            self.run_id, path
        ));
        let mut case = self.engine.cases.fetch_case(case_id).await?;
        info.case_id = case.id;
        info.case_name = case.name.clone();
        let method =
            HttpMethod::from_str(&case.request_method).map_err(EngineError::InvalidCase)?;
        info.request_method = method.to_string();

        // Step 1: global config variables, must-succeed.
        self.resolve_globals(&mut case).await?;
        self.logger.append("global variables resolved");

        // Step 2/3: constructors and assertions, fetched fresh per run.
        let mut constructors = self.engine.cases.fetch_constructors(case_id).await?;
        constructors.sort_by_key(|c| c.index);
        let mut asserts = self.engine.cases.fetch_assertions(case_id).await?;

        // Step 4: seed fields from caller supplied request params.
        self.rewrite_all(request_params, &mut case, &mut constructors, &mut asserts);

        // Step 5: the setup pipeline, which re-rewrites after each step.
        constructor::run::execute_all(
            self,
            env,
            path,
            &mut case,
            case_params,
            request_params,
            &mut constructors,
            &mut asserts,
        )
        .await?;

        info.url = case.url.clone();

        // Step 6: constructor outputs flow into the main request fields.
        self.rewrite_all(case_params, &mut case, &mut constructors, &mut asserts);

        let headers: Map<String, Value> = if case.request_headers.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&case.request_headers).map_err(|err| {
                EngineError::InvalidCase(format!("request headers are not a JSON object: {}", err))
            })?
        };
        let body = if case.body.is_empty() {
            None
        } else {
            Some(case.body.clone())
        };
        let body = self.replace_body(request_params, body, case.body_kind);

        // Step 7: the one HTTP call of this run.
        let spec = RequestSpec {
            url: case.url.clone(),
            method,
            headers: headers.clone(),
            body: body.clone(),
            body_kind: case.body_kind,
        };
        let result = self.engine.invoker.invoke(spec).await?;
        self.logger.append(format!(
            "http call finished\n\nRequest Method: {}\nUrl: {}\nBody:\n{}\n\nStatus: {}\nResponse:\n{}",
            info.request_method,
            case.url,
            body.as_deref().unwrap_or(""),
            result.status_code,
            result.response
        ));

        info.url = case.url.clone();
        info.request_headers = headers;
        info.request_data = body;
        info.status_code = result.status_code;
        info.response = result.response;
        info.response_headers = result.response_headers;
        info.cookies = result.cookies;

        // Step 8: assertions against the accumulated response tree.
        let tree =
            serde_json::to_value(&*info).map_err(|err| EngineError::InvalidCase(err.to_string()))?;
        let (verdicts, passed) = check::evaluate(&asserts, &tree, &self.logger)?;
        info.asserts = verdicts;
        info.status = passed;
        Ok(())
    }

    /// Replaces `${key.path}` tokens whose first segment is a global config
    /// key. Unlike context rewriting, a config entry that fails to decode or
    /// walk aborts the run.
    async fn resolve_globals(&self, case: &mut TestCase) -> Result<(), EngineError> {
        for field in TestCase::REWRITE_FIELDS {
            let mut text = case.field(field).to_string();
            for token in extract_tokens(&text) {
                let key = token.split('.').next().unwrap_or(token.as_str());
                let found = self
                    .engine
                    .configs
                    .fetch(key)
                    .await
                    .map_err(|err| EngineError::Config(err.to_string()))?;
                if let Some(config) = found {
                    let value = decode_config(&config, &token)?;
                    let from = format!("${{{}}}", token);
                    self.logger.append(format!(
                        "global variable replaced in [{}]: [{}] -> [{}]",
                        field.name(),
                        from,
                        value
                    ));
                    text = text.replace(&from, &value);
                }
            }
            case.set_field(field, text);
        }
        Ok(())
    }

    /// One full context rewrite pass: case fields, every constructor payload,
    /// every assertion's expected expression.
    pub(crate) fn rewrite_all(
        &self,
        params: &Map<String, Value>,
        case: &mut TestCase,
        constructors: &mut [Constructor],
        asserts: &mut [Assertion],
    ) {
        if params.is_empty() {
            return;
        }
        for field in TestCase::REWRITE_FIELDS {
            if let Some(text) = rewrite_text(case.field(field), params, &self.logger) {
                self.logger
                    .append(format!("variables replaced in case field [{}]", field.name()));
                case.set_field(field, text);
            }
        }
        for constructor in constructors.iter_mut() {
            if let Some(text) = rewrite_text(&constructor.payload, params, &self.logger) {
                self.logger.append(format!(
                    "variables replaced in constructor [{}] payload",
                    constructor.name
                ));
                constructor.payload = text;
            }
        }
        for assertion in asserts.iter_mut() {
            if let Some(text) = rewrite_text(&assertion.expected, params, &self.logger) {
                self.logger.append(format!(
                    "variables replaced in assertion [{}] expected",
                    assertion.name
                ));
                assertion.expected = text;
            }
        }
    }

    /// Overwrites existing top level keys of a JSON body with matching
    /// request params. Non JSON bodies pass through unchanged.
    fn replace_body(
        &self,
        request_params: &Map<String, Value>,
        body: Option<String>,
        body_kind: BodyKind,
    ) -> Option<String> {
        if body_kind != BodyKind::Json {
            self.logger.append("body is not JSON, skipping rewrite");
            return body;
        }
        let text = match body {
            None => {
                self.logger.append("empty body, skipping rewrite");
                return None;
            }
            Some(text) => text,
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(mut map)) => {
                for (key, value) in request_params {
                    if map.contains_key(key) {
                        map.insert(key.clone(), value.clone());
                    }
                }
                Some(Value::Object(map).to_string())
            }
            Ok(_) => Some(text),
            Err(err) => {
                self.logger
                    .append(format!("failed to rewrite request body: {}", err));
                Some(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::model::CaseField;
    use crate::testing::{engine_with, TestWorld};
    use serde_json::json;

    fn sample_case(id: i64) -> TestCase {
        TestCase {
            id,
            name: format!("case {}", id),
            url: "https://api.example.com/items".to_string(),
            request_method: "POST".to_string(),
            request_headers: "{\"Content-Type\": \"application/json\"}".to_string(),
            body: "{\"item\": \"widget\", \"count\": 1}".to_string(),
            body_kind: BodyKind::Json,
        }
    }

    #[tokio::test]
    async fn plain_case_run_passes_with_zero_assertions() {
        let world = TestWorld::new();
        world.put_case(sample_case(1));
        world.respond_with(200, json!({"ok": true}));
        let engine = engine_with(&world);

        let executor = Executor::new(engine);
        let mut case_params = Map::new();
        let mut request_params = Map::new();
        let (info, err) = executor
            .run(1, 1, &mut case_params, &mut request_params, "main case")
            .await;
        assert!(err.is_none());
        assert!(info.status);
        assert_eq!(info.status_code, 200);
        assert!(info.logs.is_some());
    }

    #[tokio::test]
    async fn global_config_is_resolved_into_url() {
        let world = TestWorld::new();
        let mut case = sample_case(1);
        case.url = "${base_url}/items".to_string();
        world.put_case(case);
        world.put_string_config("base_url", "https://api.example.com");
        world.respond_with(200, json!({"ok": true}));
        let engine = engine_with(&world);

        let (info, err) = Executor::new(engine)
            .run(1, 1, &mut Map::new(), &mut Map::new(), "main case")
            .await;
        assert!(err.is_none());
        assert_eq!(info.url, "https://api.example.com/items");
    }

    #[tokio::test]
    async fn request_params_rewrite_body_top_level_keys() {
        let world = TestWorld::new();
        world.put_case(sample_case(1));
        world.respond_with(200, json!({"ok": true}));
        let engine = engine_with(&world);

        let mut request_params = Map::new();
        request_params.insert("count".to_string(), json!(5));
        let (info, err) = Executor::new(engine)
            .run(1, 1, &mut Map::new(), &mut request_params, "main case")
            .await;
        assert!(err.is_none());
        let sent: Value = serde_json::from_str(info.request_data.as_deref().unwrap()).unwrap();
        assert_eq!(sent["count"], json!(5));
        assert_eq!(sent["item"], json!("widget"));
    }

    #[tokio::test]
    async fn assertions_run_against_the_response() {
        let world = TestWorld::new();
        world.put_case(sample_case(1));
        world.put_assertion(1, 10, "equal", "${response.data.id}", "7");
        world.respond_with(200, json!({"data": {"id": 7}}));
        let engine = engine_with(&world);

        let (info, err) = Executor::new(engine)
            .run(1, 1, &mut Map::new(), &mut Map::new(), "main case")
            .await;
        assert!(err.is_none());
        assert!(info.status);
        assert!(info.asserts["10"].passed);
    }

    #[tokio::test]
    async fn failed_assertion_is_a_recorded_outcome_not_an_error() {
        let world = TestWorld::new();
        world.put_case(sample_case(1));
        world.put_assertion(1, 10, "equal", "${response.data.id}", "8");
        world.respond_with(200, json!({"data": {"id": 7}}));
        let engine = engine_with(&world);

        let (info, err) = Executor::new(engine)
            .run(1, 1, &mut Map::new(), &mut Map::new(), "main case")
            .await;
        assert!(err.is_none());
        assert!(!info.status);
        assert!(!info.asserts["10"].passed);
    }

    #[tokio::test]
    async fn missing_case_short_circuits_before_any_request() {
        let world = TestWorld::new();
        let engine = engine_with(&world);
        let (_info, err) = Executor::new(engine)
            .run(1, 99, &mut Map::new(), &mut Map::new(), "main case")
            .await;
        assert!(err.is_some());
        assert_eq!(world.invocation_count(), 0);
    }

    #[test]
    fn field_accessor_table_round_trips() {
        let mut case = sample_case(1);
        for field in TestCase::REWRITE_FIELDS {
            let original = case.field(field).to_string();
            case.set_field(field, format!("{}!", original));
            assert_eq!(case.field(field), format!("{}!", original));
        }
        assert_eq!(CaseField::Url.name(), "url");
    }
}
