// server/src/pipelines/common_steps.rs

//! Steps shared by every ledger pipeline: opening and committing the transactional scope.

use crate::errors::Result;
use crate::pipelines::contexts::{DispatchCtxData, PaymentEventCtxData, PlaceOrderCtxData, TxSlot};
use crate::state::AppState;
use mandi_flow::{ContextData, PipelineControl};
use tracing::{event, instrument, Level};

/// Context types that carry a ledger transaction slot.
pub trait LedgerScoped: Send + Sync + 'static {
  fn app_state(&self) -> &AppState;
  fn tx_slot(&self) -> &TxSlot;
}

macro_rules! ledger_scoped {
  ($($ctx:ty),* $(,)?) => {
    $(
      impl LedgerScoped for $ctx {
        fn app_state(&self) -> &AppState {
          &self.app_state
        }

        fn tx_slot(&self) -> &TxSlot {
          &self.tx
        }
      }
    )*
  };
}

ledger_scoped!(PlaceOrderCtxData, DispatchCtxData, PaymentEventCtxData);

#[instrument(name = "common_step::open_scope", skip_all, err(Display))]
pub async fn open_scope<T: LedgerScoped>(ctx_data: ContextData<T>) -> Result<PipelineControl> {
  let store = ctx_data.read().app_state().store.clone();
  let tx = store.begin().await?;
  ctx_data.read().tx_slot().put(tx);
  event!(Level::DEBUG, "Ledger scope opened.");
  Ok(PipelineControl::Continue)
}

#[instrument(name = "common_step::commit_scope", skip_all, err(Display))]
pub async fn commit_scope<T: LedgerScoped>(ctx_data: ContextData<T>) -> Result<PipelineControl> {
  let tx = ctx_data.read().tx_slot().take()?;
  tx.commit().await?;
  event!(Level::DEBUG, "Ledger scope committed.");
  Ok(PipelineControl::Continue)
}
