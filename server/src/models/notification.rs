// server/src/models/notification.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub id: Uuid,
  pub buyer_id: Uuid,
  pub title: String,
  pub body: String,
  pub created_at: DateTime<Utc>,
}

impl Notification {
  pub fn new(buyer_id: Uuid, title: impl Into<String>, body: impl Into<String>) -> Self {
    Self {
      id: Uuid::new_v4(),
      buyer_id,
      title: title.into(),
      body: body.into(),
      created_at: Utc::now(),
    }
  }
}
