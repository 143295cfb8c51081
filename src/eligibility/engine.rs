use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    eligibility::rules::{self, DanglingPrerequisite, ProgressSummary},
    error::{PlanError, Result},
    plan::{Course, Plan, RawPlan},
    store::DocumentStore,
};

#[derive(Default)]
struct PlanState {
    plan: Option<Plan>,
    /// Bumped whenever `plan` is replaced wholesale
    generation: u64,
}

/// Holds the current plan snapshot and mediates every change to it.
///
/// Readers get clones or derived values; the only writers are the
/// operations below. Locks are never held across a store call, so several
/// toggles may be in flight at once. Two toggles on the same code are not
/// ordered: whichever response resolves last decides the local value.
pub struct EligibilityEngine {
    store: Arc<dyn DocumentStore>,
    state: RwLock<PlanState>,
    request_timeout: Duration,
}

impl EligibilityEngine {
    pub fn new(store: Arc<dyn DocumentStore>, request_timeout: Duration) -> Self {
        Self {
            store,
            state: RwLock::new(PlanState::default()),
            request_timeout,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, PlanState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PlanState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PlanError::Timeout(self.request_timeout)),
        }
    }

    /// Install a snapshot, superseding whatever was held before.
    pub fn replace_snapshot(&self, plan: Plan) -> u64 {
        let mut state = self.write();
        state.generation += 1;
        debug!(
            "Installing snapshot {} ({} courses), generation {}",
            plan.doc_id,
            plan.len(),
            state.generation
        );
        state.plan = Some(plan);
        state.generation
    }

    pub fn clear(&self) {
        let mut state = self.write();
        state.generation += 1;
        state.plan = None;
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Adopt a snapshot fetched by a call that started at `generation`,
    /// unless another snapshot was installed meanwhile.
    fn adopt(&self, raw: RawPlan, generation: u64) -> Result<Plan> {
        let plan = Plan::from_raw(&raw)?;
        let mut state = self.write();
        if state.generation != generation {
            warn!("Discarding snapshot {}: replaced while in flight", plan.doc_id);
            return Err(PlanError::StaleSnapshot { doc_id: plan.doc_id });
        }
        state.generation += 1;
        state.plan = Some(plan.clone());
        Ok(plan)
    }

    pub async fn load(&self, doc_id: &str) -> Result<Plan> {
        info!("Loading plan {}", doc_id);
        let generation = self.generation();
        let raw = self.bounded(self.store.fetch(doc_id)).await?;
        self.adopt(raw, generation)
    }

    pub async fn load_by_name(&self, name: &str) -> Result<Plan> {
        info!("Loading plan named {}", name);
        let generation = self.generation();
        let raw = self.bounded(self.store.fetch_by_name(name)).await?;
        self.adopt(raw, generation)
    }

    /// Re-fetch the held plan from the store.
    pub async fn refresh(&self) -> Result<Plan> {
        let (doc_id, generation) = {
            let state = self.read();
            let plan = state.plan.as_ref().ok_or(PlanError::NoPlanLoaded)?;
            (plan.doc_id.clone(), state.generation)
        };
        let raw = self.bounded(self.store.fetch(&doc_id)).await?;
        self.adopt(raw, generation)
    }

    pub async fn upload_pdf(&self, file_name: &str, bytes: Vec<u8>) -> Result<Plan> {
        let generation = self.generation();
        let raw = self.bounded(self.store.upload_pdf(file_name, bytes)).await?;
        let plan = self.adopt(raw, generation)?;
        info!("Processed {} into plan {}", file_name, plan.doc_id);
        Ok(plan)
    }

    pub async fn upload_plan(&self, raw: &RawPlan) -> Result<Plan> {
        let generation = self.generation();
        let stored = self.bounded(self.store.upload_plan(raw)).await?;
        self.adopt(stored, generation)
    }

    /// Rename the held plan; the local name changes once the store accepts.
    pub async fn rename(&self, name: &str) -> Result<()> {
        let doc_id = self.doc_id().ok_or(PlanError::NoPlanLoaded)?;

        self.bounded(self.store.rename(&doc_id, name)).await?;

        let mut state = self.write();
        match state.plan.as_mut() {
            Some(plan) if plan.doc_id == doc_id => {
                plan.set_name(name.to_string());
                info!("Renamed {} to {}", doc_id, name);
                Ok(())
            }
            _ => Err(PlanError::StaleSnapshot { doc_id }),
        }
    }

    /// Set a course's passed flag in the store, then locally.
    ///
    /// Nothing changes locally until the store confirms. On failure the held
    /// collection is untouched and the error is `StatusUpdateFailed` (or
    /// `Timeout`). No retry is attempted. A confirmed change is applied to
    /// whatever snapshot of the same document is held when it resolves, so a
    /// refresh racing the call does not lose it.
    pub async fn toggle_status(&self, doc_id: &str, code: &str, passed: bool) -> Result<Vec<Course>> {
        {
            let state = self.read();
            let plan = state.plan.as_ref().ok_or(PlanError::NoPlanLoaded)?;
            if plan.doc_id != doc_id {
                return Err(PlanError::StaleSnapshot {
                    doc_id: doc_id.to_string(),
                });
            }
            if !plan.contains(code) {
                return Err(PlanError::UnknownCourse(code.to_string()));
            }
        }

        debug!("Setting {}={} on {}", code, passed, doc_id);
        self.bounded(self.store.set_course_status(doc_id, code, passed))
            .await
            .map_err(|e| {
                warn!("Status update for {} failed: {}", code, e);
                e.into_status_failure(code)
            })?;

        let mut state = self.write();
        let plan = match state.plan.as_mut() {
            Some(plan) if plan.doc_id == doc_id => plan,
            _ => {
                warn!("Dropping status response for {}: {} no longer held", code, doc_id);
                return Err(PlanError::StaleSnapshot {
                    doc_id: doc_id.to_string(),
                });
            }
        };
        if plan.set_passed(code, passed) {
            info!("✓ {} marked {}", code, if passed { "passed" } else { "not passed" });
        } else {
            warn!("{} vanished from {} while its status was in flight", code, doc_id);
        }

        Ok(plan.courses().to_vec())
    }

    pub fn snapshot(&self) -> Option<Plan> {
        self.read().plan.clone()
    }

    pub fn doc_id(&self) -> Option<String> {
        self.read().plan.as_ref().map(|p| p.doc_id.clone())
    }

    pub fn courses(&self) -> Vec<Course> {
        self.read()
            .plan
            .as_ref()
            .map(|p| p.courses().to_vec())
            .unwrap_or_default()
    }

    pub fn passed_set(&self) -> HashSet<String> {
        self.read()
            .plan
            .as_ref()
            .map(|p| p.passed_set().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn eligible(&self) -> Vec<String> {
        self.read()
            .plan
            .as_ref()
            .map(|p| p.eligible().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> Option<ProgressSummary> {
        self.read()
            .plan
            .as_ref()
            .map(|p| ProgressSummary::from_courses(p.courses()))
    }

    pub fn dangling_prerequisites(&self) -> Vec<DanglingPrerequisite> {
        self.read()
            .plan
            .as_ref()
            .map(|p| rules::dangling_prerequisites(p.courses()))
            .unwrap_or_default()
    }
}
