use serde::{Deserialize, Serialize};

/// Constructor kinds carried as string tags by the store. A tag added by a
/// newer store version lands on Unknown and is skipped at run time instead of
/// failing the pipeline.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorKind {
    TestCase,
    Sql,
    Cache,
    Script,
    #[serde(other)]
    Unknown,
}

/// A typed setup step run before the main request. The payload is opaque JSON
/// text interpreted by the handler for the kind; it is rewritten in place like
/// case fields so later steps can reference earlier outputs.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Constructor {
    pub id: i64,
    /// Ascending execution order within the case.
    pub index: usize,
    pub kind: ConstructorKind,
    pub name: String,
    pub enabled: bool,
    pub payload: String,
    /// Name under which the step's result lands in `case_params`.
    pub out_name: String,
}

#[derive(Deserialize, Debug)]
pub struct CasePayload {
    pub case_id: i64,
    /// Extra request params as JSON text, merged over the parent's.
    pub params: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SqlPayload {
    pub database: String,
    pub sql: String,
}

#[derive(Deserialize, Debug)]
pub struct CachePayload {
    /// Configured cache connection name.
    pub name: String,
    pub command: String,
}

#[derive(Deserialize, Debug)]
pub struct ScriptPayload {
    pub code: String,
}
