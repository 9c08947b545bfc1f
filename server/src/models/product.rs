// server/src/models/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub brand: Option<String>,
  pub seller_id: Option<Uuid>,
  pub final_price: Option<Decimal>,
  pub list_price: Option<Decimal>,
  pub purchase_price: Option<Decimal>,
  pub gst_rate: Decimal,
  pub created_at: DateTime<Utc>,
}

impl Product {
  /// Sale price: the first non-zero of final, list and purchase price, else zero.
  pub fn effective_price(&self) -> Decimal {
    [self.final_price, self.list_price, self.purchase_price]
      .into_iter()
      .flatten()
      .find(|price| !price.is_zero())
      .unwrap_or(Decimal::ZERO)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
  pub name: String,
  pub brand: Option<String>,
  pub seller_id: Option<Uuid>,
  pub final_price: Option<Decimal>,
  pub list_price: Option<Decimal>,
  pub purchase_price: Option<Decimal>,
  pub gst_rate: Option<Decimal>,
}

impl NewProduct {
  pub fn into_product(self) -> Product {
    Product {
      id: Uuid::new_v4(),
      name: self.name,
      brand: self.brand.filter(|b| !b.trim().is_empty()),
      seller_id: self.seller_id,
      final_price: self.final_price,
      list_price: self.list_price,
      purchase_price: self.purchase_price,
      gst_rate: self.gst_rate.unwrap_or(Decimal::ZERO),
      created_at: Utc::now(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn priced(final_price: Option<i64>, list_price: Option<i64>, purchase_price: Option<i64>) -> Product {
    NewProduct {
      name: "Basmati 5kg".to_string(),
      brand: None,
      seller_id: None,
      final_price: final_price.map(Decimal::from),
      list_price: list_price.map(Decimal::from),
      purchase_price: purchase_price.map(Decimal::from),
      gst_rate: None,
    }
    .into_product()
  }

  #[test]
  fn effective_price_prefers_first_non_zero() {
    assert_eq!(priced(Some(450), Some(500), Some(400)).effective_price(), Decimal::from(450));
    assert_eq!(priced(Some(0), Some(500), Some(400)).effective_price(), Decimal::from(500));
    assert_eq!(priced(None, None, Some(400)).effective_price(), Decimal::from(400));
    assert_eq!(priced(None, Some(0), None).effective_price(), Decimal::ZERO);
  }
}
