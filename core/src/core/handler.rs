// core/src/core/handler.rs

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// A boxed async step handler.
///
/// The handler receives a clone of the pipeline's `ContextData<TData>` and resolves to
/// a `PipelineControl` or the pipeline's error type. Lock guards taken on the context
/// must be released before any `.await` inside the handler.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;
