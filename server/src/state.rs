// server/src/state.rs
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::pipelines;
use crate::services::gateway::{GatewayClient, PaytmClient};
use crate::services::notifier::{BuyerNotifier, PostPaymentHook};
use crate::services::renderer::{ArtifactStore, InvoiceRenderer, LocalArtifactStore, TextPdfRenderer};
use crate::store::{LedgerStore, MemoryLedgerStore, PgLedgerStore};
use mandi_flow::FlowRegistry;
use std::sync::Arc;

/// External collaborators the pipelines talk to.
#[derive(Clone)]
pub struct Services {
  pub store: Arc<dyn LedgerStore>,
  pub gateway: Arc<dyn GatewayClient>,
  pub renderer: Arc<dyn InvoiceRenderer>,
  pub artifacts: Arc<dyn ArtifactStore>,
  pub post_payment: Arc<dyn PostPaymentHook>,
}

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn LedgerStore>,
  pub gateway: Arc<dyn GatewayClient>,
  pub renderer: Arc<dyn InvoiceRenderer>,
  pub artifacts: Arc<dyn ArtifactStore>,
  pub post_payment: Arc<dyn PostPaymentHook>,
  pub flows: Arc<FlowRegistry<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Wires the services together and registers every pipeline.
  pub fn new(config: Arc<AppConfig>, services: Services) -> Self {
    let flows = Arc::new(FlowRegistry::<AppError>::new());
    pipelines::register_all_pipelines(&flows);
    tracing::info!("Ledger pipelines registered.");

    Self {
      store: services.store,
      gateway: services.gateway,
      renderer: services.renderer,
      artifacts: services.artifacts,
      post_payment: services.post_payment,
      flows,
      config,
    }
  }

  /// Production wiring: Postgres (or the in-memory store for `memory://`), Paytm,
  /// the text PDF renderer, local artifacts and the buyer notifier.
  pub async fn from_config(config: AppConfig) -> Result<Self> {
    let store: Arc<dyn LedgerStore> = if config.uses_memory_store() {
      tracing::warn!("Using the in-memory ledger store; data is lost on restart.");
      Arc::new(MemoryLedgerStore::new())
    } else {
      Arc::new(PgLedgerStore::connect(&config.database_url).await?)
    };

    let services = Services {
      store: store.clone(),
      gateway: Arc::new(PaytmClient::new(config.paytm.clone())?),
      renderer: Arc::new(TextPdfRenderer),
      artifacts: Arc::new(LocalArtifactStore::new(config.invoice_dir.clone(), config.app_base_url.clone())),
      post_payment: Arc::new(BuyerNotifier::new(store)),
    };
    Ok(Self::new(Arc::new(config), services))
  }
}
