use thiserror::Error;

/// Crate wide error type. Case level failures are caught at the top of the
/// executor and folded into the run result; batch code maps them to an error
/// status and keeps going.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("global variable resolution failed: {0}")]
    Config(String),

    #[error("{path} -> {name} constructor #{index} failed: {detail}")]
    Constructor {
        path: String,
        index: usize,
        name: String,
        detail: String,
    },

    #[error("assertion evaluation crashed for [{expression}]: {detail}")]
    AssertionCrash { expression: String, detail: String },

    #[error("invalid case data: {0}")]
    InvalidCase(String),

    #[error("collaborator call failed: {0}")]
    Collaborator(String),

    #[error("test plan {0} is already running")]
    PlanBusy(i64),

    #[error("{0} not found")]
    NotFound(String),
}
