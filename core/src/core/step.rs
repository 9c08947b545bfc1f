// core/src/core/step.rs

//! Step definitions: name, policy and skip condition.

use super::ContextData;
use std::sync::Arc;

/// Evaluated right before a step runs; returning `true` skips the step.
pub type SkipCondition<TData> = Arc<dyn Fn(ContextData<TData>) -> bool + Send + Sync + 'static>;

/// How the engine treats a step's handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
  /// The step must have at least one handler and any handler error aborts the run.
  Required,
  /// The step may have no handlers; a handler error still aborts the run.
  Optional,
  /// The step may have no handlers; a handler error is logged at `warn` and the
  /// run carries on with the next step.
  BestEffort,
}

impl StepPolicy {
  pub fn requires_handlers(self) -> bool {
    matches!(self, StepPolicy::Required)
  }
}

#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  pub policy: StepPolicy,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: 'static + Send + Sync> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("policy", &self.policy)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}
