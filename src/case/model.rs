use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    None,
    Json,
    Form,
}

/// One HTTP test case as fetched from the case store. Fields holding EL
/// tokens are rewritten in place during a run, which is why the instance is
/// owned exclusively by one executor invocation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TestCase {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub request_method: String,
    /// Header map serialized as JSON text; empty string means no headers.
    pub request_headers: String,
    pub body: String,
    pub body_kind: BodyKind,
}

/// Fields subject to variable rewriting, addressed by a fixed accessor table
/// instead of reflection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaseField {
    Url,
    RequestHeaders,
    Body,
}

impl CaseField {
    pub fn name(&self) -> &'static str {
        match self {
            CaseField::Url => "url",
            CaseField::RequestHeaders => "request_headers",
            CaseField::Body => "body",
        }
    }
}

impl TestCase {
    pub const REWRITE_FIELDS: [CaseField; 3] =
        [CaseField::Url, CaseField::RequestHeaders, CaseField::Body];

    pub fn field(&self, field: CaseField) -> &str {
        match field {
            CaseField::Url => &self.url,
            CaseField::RequestHeaders => &self.request_headers,
            CaseField::Body => &self.body,
        }
    }

    pub fn set_field(&mut self, field: CaseField, value: String) {
        match field {
            CaseField::Url => self.url = value,
            CaseField::RequestHeaders => self.request_headers = value,
            CaseField::Body => self.body = value,
        }
    }
}
