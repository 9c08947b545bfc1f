// src/lib.rs

//! mandi-flow: the async step-pipeline engine behind the Mandi commerce backend.
//!
//! A pipeline is an ordered list of named steps. Each step can carry `before`,
//! `on` and `after` handlers that operate on a shared, lockable context
//! ([`ContextData`]). Steps are governed by a [`StepPolicy`]:
//!  - `Required` steps must have handlers and abort the run on error.
//!  - `Optional` steps may be left without handlers.
//!  - `BestEffort` steps log handler failures and let the run continue.
//!
//! Pipelines are registered in a [`FlowRegistry`] keyed by their context type, so
//! callers run a workflow by handing the registry a populated context.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::handler::Handler;
pub use crate::core::step::{SkipCondition, StepDef, StepPolicy};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{FlowError, FlowResult};

pub use crate::registry::FlowRegistry;

/*
    Typical use:
    1. Define a context struct `Ctx` holding the inputs and the intermediate state.
    2. Build a `Pipeline<Ctx, AppError>` from `(name, StepPolicy, skip_if)` tuples.
    3. Attach async handlers with `.on_step()`, `.before_step()`, `.after_step()`.
       Handlers must drop lock guards before every `.await`.
    4. Register the pipeline with a `FlowRegistry<AppError>`.
    5. Run it with `registry.run(ContextData::new(ctx)).await` and read results
       back out of the same `ContextData` afterwards.
*/
