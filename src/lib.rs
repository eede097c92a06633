pub mod assertion;
pub mod batch;
pub mod case;
pub mod constructor;
pub mod engine;
pub mod errors;
pub mod execution;
pub mod expression;
pub mod http;
pub mod json_compare;
pub mod logbook;
pub mod plan;
pub mod report;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;

pub use engine::Engine;
pub use errors::EngineError;
pub use execution::{Executor, ResponseInfo};

use tracing::Level;

/// Installs a plain fmt subscriber at INFO. Embedders that bring their own
/// subscriber skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
}
