use crate::case::model::BodyKind;
use crate::errors::EngineError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    POST,
    GET,
    PUT,
    PATCH,
    DELETE,
}

impl ToString for HttpMethod {
    fn to_string(&self) -> String {
        match self {
            HttpMethod::POST => "POST".to_string(),
            HttpMethod::GET => "GET".to_string(),
            HttpMethod::PUT => "PUT".to_string(),
            HttpMethod::PATCH => "PATCH".to_string(),
            HttpMethod::DELETE => "DELETE".to_string(),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "POST" => Ok(HttpMethod::POST),
            "GET" => Ok(HttpMethod::GET),
            "PUT" => Ok(HttpMethod::PUT),
            "PATCH" => Ok(HttpMethod::PATCH),
            "DELETE" => Ok(HttpMethod::DELETE),
            _ => Err(format!("Invalid HTTP method: {}", s)),
        }
    }
}

/// The single resolved HTTP call of a case run.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Map<String, Value>,
    pub body: Option<String>,
    pub body_kind: BodyKind,
}

/// Everything the engine keeps from the response; the status code is data for
/// assertions, never a run failure by itself.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct InvokeResult {
    pub status_code: u16,
    pub response: String,
    pub response_headers: Map<String, Value>,
    pub cookies: Map<String, Value>,
}

/// The one suspension point of a case run that leaves the process.
#[async_trait]
pub trait RequestInvoker: Send + Sync {
    async fn invoke(&self, spec: RequestSpec) -> Result<InvokeResult, EngineError>;
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn build_reqwest(&self, spec: &RequestSpec) -> Result<RequestBuilder, EngineError> {
        let url = Url::parse(&spec.url).map_err(|err| {
            EngineError::Collaborator(format!("invalid url {}: {}", spec.url, err))
        })?;
        let method = match spec.method {
            HttpMethod::POST => Method::POST,
            HttpMethod::GET => Method::GET,
            HttpMethod::PUT => Method::PUT,
            HttpMethod::PATCH => Method::PATCH,
            HttpMethod::DELETE => Method::DELETE,
        };

        let mut headers = HeaderMap::new();
        for (key, value) in &spec.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
                EngineError::Collaborator(format!("invalid header {}: {}", key, err))
            })?;
            let text = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            let value = HeaderValue::from_str(&text).map_err(|err| {
                EngineError::Collaborator(format!("invalid header {}: {}", key, err))
            })?;
            headers.insert(name, value);
        }

        let mut req = self.client.request(method, url).headers(headers);
        if let Some(body) = &spec.body {
            match spec.body_kind {
                BodyKind::Json => match serde_json::from_str::<Value>(body) {
                    Ok(parsed) => req = req.json(&parsed),
                    Err(_) => req = req.body(body.clone()),
                },
                BodyKind::Form => match serde_json::from_str::<Value>(body) {
                    Ok(parsed) => req = req.form(&parsed),
                    Err(_) => req = req.body(body.clone()),
                },
                BodyKind::None => {}
            }
        }
        Ok(req)
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestInvoker for ApiClient {
    async fn invoke(&self, spec: RequestSpec) -> Result<InvokeResult, EngineError> {
        info!("invoking {} {}", spec.method.to_string(), spec.url);
        let req = self.build_reqwest(&spec)?;
        let response = req
            .send()
            .await
            .map_err(|err| EngineError::Collaborator(format!("http request failed: {}", err)))?;
        let status_code = response.status().as_u16();
        info!("http request executed, status_code: {}", status_code);

        let mut response_headers = Map::new();
        for (name, value) in response.headers() {
            response_headers.insert(
                name.to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).to_string()),
            );
        }
        let mut cookies = Map::new();
        for cookie in response.cookies() {
            cookies.insert(
                cookie.name().to_string(),
                Value::String(cookie.value().to_string()),
            );
        }
        let body = response.text().await.map_err(|err| {
            EngineError::Collaborator(format!("failed to read response: {}", err))
        })?;
        Ok(InvokeResult {
            status_code,
            response: body,
            response_headers,
            cookies,
        })
    }
}
