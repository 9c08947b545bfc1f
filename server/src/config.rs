// server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Scheme of `DATABASE_URL` that selects the in-process ledger store.
pub const MEMORY_STORE_URL_PREFIX: &str = "memory://";

#[derive(Debug, Clone)]
pub struct PaytmConfig {
  pub merchant_id: String,
  pub merchant_key: String,
  pub base_url: String,
  pub timeout: Duration,
}

/// Seller of record printed on invoice documents.
#[derive(Debug, Clone)]
pub struct CompanyProfile {
  pub name: String,
  pub gstin: Option<String>,
  pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub app_base_url: String,
  pub paytm: PaytmConfig,
  pub invoice_dir: PathBuf,
  pub company: CompanyProfile,
  pub json_logs: bool,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the config from any variable source; `from_env` passes the process environment.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

    let server_host = get_or("SERVER_HOST", "127.0.0.1");
    let server_port = get_or("SERVER_PORT", "8080")
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url =
      lookup("DATABASE_URL").ok_or_else(|| AppError::Config("Missing environment variable 'DATABASE_URL'".to_string()))?;
    let app_base_url = lookup("APP_BASE_URL").unwrap_or_else(|| format!("http://{}:{}", server_host, server_port));

    let timeout_secs = get_or("GATEWAY_TIMEOUT_SECS", "10")
      .parse::<u64>()
      .map_err(|e| AppError::Config(format!("Invalid GATEWAY_TIMEOUT_SECS: {}", e)))?;
    let paytm = PaytmConfig {
      merchant_id: get_or("PAYTM_MID", ""),
      merchant_key: get_or("PAYTM_MERCHANT_KEY", ""),
      base_url: get_or("PAYTM_BASE_URL", "https://securegw-stage.paytm.in"),
      timeout: Duration::from_secs(timeout_secs),
    };
    if paytm.merchant_key.is_empty() {
      tracing::warn!("PAYTM_MERCHANT_KEY is not set; every gateway callback will fail signature verification.");
    }

    let company = CompanyProfile {
      name: get_or("COMPANY_NAME", "Mandi Traders"),
      gstin: lookup("COMPANY_GSTIN").filter(|v| !v.is_empty()),
      address: lookup("COMPANY_ADDRESS").filter(|v| !v.is_empty()),
    };

    let json_logs = get_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json");

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      app_base_url: app_base_url.trim_end_matches('/').to_string(),
      paytm,
      invoice_dir: PathBuf::from(get_or("INVOICE_DIR", "./invoices")),
      company,
      json_logs,
    })
  }

  pub fn uses_memory_store(&self) -> bool {
    self.database_url.starts_with(MEMORY_STORE_URL_PREFIX)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |name| map.get(name).cloned()
  }

  #[test]
  fn defaults_apply_when_only_database_url_is_set() {
    let cfg = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "memory://")])).unwrap();
    assert_eq!(cfg.server_port, 8080);
    assert_eq!(cfg.app_base_url, "http://127.0.0.1:8080");
    assert_eq!(cfg.paytm.timeout, Duration::from_secs(10));
    assert_eq!(cfg.paytm.base_url, "https://securegw-stage.paytm.in");
    assert!(cfg.uses_memory_store());
    assert!(!cfg.json_logs);
  }

  #[test]
  fn missing_database_url_is_a_config_error() {
    assert!(matches!(AppConfig::from_lookup(lookup_from(&[])), Err(AppError::Config(_))));
  }

  #[test]
  fn invalid_timeout_is_rejected() {
    let res = AppConfig::from_lookup(lookup_from(&[
      ("DATABASE_URL", "postgres://localhost/mandi"),
      ("GATEWAY_TIMEOUT_SECS", "soon"),
    ]));
    assert!(matches!(res, Err(AppError::Config(_))));
  }

  #[test]
  fn base_url_trailing_slash_is_trimmed() {
    let cfg = AppConfig::from_lookup(lookup_from(&[
      ("DATABASE_URL", "postgres://localhost/mandi"),
      ("APP_BASE_URL", "https://mandi.example/"),
      ("LOG_FORMAT", "JSON"),
    ]))
    .unwrap();
    assert_eq!(cfg.app_base_url, "https://mandi.example");
    assert!(!cfg.uses_memory_store());
    assert!(cfg.json_logs);
  }
}
