// server/src/models/actor.rs

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Roles known to the ledger. Token issuance lives outside this service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
  Buyer,
  Seller,
  Staff,
  Admin,
  Superadmin,
}

impl ActorRole {
  /// Roles allowed to dispatch orders and change their status.
  pub fn handles_fulfilment(self) -> bool {
    matches!(self, ActorRole::Staff | ActorRole::Seller | ActorRole::Admin | ActorRole::Superadmin)
  }
}

impl FromStr for ActorRole {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "buyer" => Ok(ActorRole::Buyer),
      "seller" => Ok(ActorRole::Seller),
      "staff" => Ok(ActorRole::Staff),
      "admin" => Ok(ActorRole::Admin),
      "superadmin" => Ok(ActorRole::Superadmin),
      other => Err(format!("unknown role '{}'", other)),
    }
  }
}

/// Who is performing an operation; recorded in audit trails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
  pub id: String,
  pub role: ActorRole,
}

impl Actor {
  pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
    Self { id: id.into(), role }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_roles_case_insensitively() {
    assert_eq!("Staff".parse::<ActorRole>(), Ok(ActorRole::Staff));
    assert_eq!(" superadmin ".parse::<ActorRole>(), Ok(ActorRole::Superadmin));
    assert!("courier".parse::<ActorRole>().is_err());
  }

  #[test]
  fn buyers_cannot_fulfil() {
    assert!(!ActorRole::Buyer.handles_fulfilment());
    assert!(ActorRole::Seller.handles_fulfilment());
    assert!(ActorRole::Admin.handles_fulfilment());
  }
}
