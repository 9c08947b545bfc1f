// server/src/models/buyer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShopAddress {
  pub line1: String,
  pub line2: Option<String>,
  pub city: String,
  pub state: String,
  pub pincode: String,
}

impl ShopAddress {
  /// Single-line rendering for documents.
  pub fn one_line(&self) -> String {
    let mut parts = vec![self.line1.as_str()];
    if let Some(line2) = self.line2.as_deref().filter(|l| !l.is_empty()) {
      parts.push(line2);
    }
    parts.push(&self.city);
    parts.push(&self.state);
    format!("{} - {}", parts.join(", "), self.pincode)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Buyer {
  pub id: Uuid,
  pub name: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub gstin: Option<String>,
  pub shop_address: Option<ShopAddress>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBuyer {
  pub name: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub gstin: Option<String>,
  pub shop_address: Option<ShopAddress>,
}

impl NewBuyer {
  pub fn into_buyer(self) -> Buyer {
    let now = Utc::now();
    Buyer {
      id: Uuid::new_v4(),
      name: self.name,
      email: self.email,
      phone: self.phone,
      gstin: self.gstin,
      shop_address: self.shop_address,
      created_at: now,
      updated_at: now,
    }
  }
}
