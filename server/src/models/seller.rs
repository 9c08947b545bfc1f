// server/src/models/seller.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Seller {
  pub id: Uuid,
  pub name: String,
  pub gstin: Option<String>,
  pub address: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSeller {
  pub name: String,
  pub gstin: Option<String>,
  pub address: Option<String>,
}

impl NewSeller {
  pub fn into_seller(self) -> Seller {
    Seller {
      id: Uuid::new_v4(),
      name: self.name,
      gstin: self.gstin,
      address: self.address,
      created_at: Utc::now(),
    }
  }
}
