use crate::errors::EngineError;
use crate::http::RequestInvoker;
use crate::store::{
    CaseStore, ConfigStore, EnvStore, Notifier, PlanStore, ReportStore, SetupBackend,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Registry of in-flight plan ids. Starting a plan that is already running is
/// rejected; the guard releases the id on drop, so every exit path unlocks.
#[derive(Clone, Default)]
pub struct PlanLocks {
    running: Arc<Mutex<HashSet<i64>>>,
}

impl PlanLocks {
    pub fn acquire(&self, plan_id: i64) -> Result<PlanGuard, EngineError> {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !running.insert(plan_id) {
            return Err(EngineError::PlanBusy(plan_id));
        }
        Ok(PlanGuard {
            plan_id,
            locks: self.clone(),
        })
    }
}

pub struct PlanGuard {
    plan_id: i64,
    locks: PlanLocks,
}

impl Drop for PlanGuard {
    fn drop(&mut self) {
        let mut running = self
            .locks
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        running.remove(&self.plan_id);
    }
}

/// All collaborator handles one execution needs, shared across concurrent
/// runs. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    pub cases: Arc<dyn CaseStore>,
    pub configs: Arc<dyn ConfigStore>,
    pub envs: Arc<dyn EnvStore>,
    pub backends: Arc<dyn SetupBackend>,
    pub invoker: Arc<dyn RequestInvoker>,
    pub reports: Arc<dyn ReportStore>,
    pub plans: Arc<dyn PlanStore>,
    pub notifier: Arc<dyn Notifier>,
    pub(crate) plan_locks: PlanLocks,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cases: Arc<dyn CaseStore>,
        configs: Arc<dyn ConfigStore>,
        envs: Arc<dyn EnvStore>,
        backends: Arc<dyn SetupBackend>,
        invoker: Arc<dyn RequestInvoker>,
        reports: Arc<dyn ReportStore>,
        plans: Arc<dyn PlanStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Engine {
            cases,
            configs,
            envs,
            backends,
            invoker,
            reports,
            plans,
            notifier,
            plan_locks: PlanLocks::default(),
        }
    }
}
