//! Consumer/worker credential entity with an explicit role tag.
//!
//! The role is stored on the entity; it is never inferred from which optional
//! fields happen to be present.

use serde::{Deserialize, Serialize};

/// Role tag for a points-earning account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerRole {
    Consumer,
    Worker,
}

impl OwnerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerRole::Consumer => "consumer",
            OwnerRole::Worker => "worker",
        }
    }
}

impl std::fmt::Display for OwnerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OwnerRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consumer" => Ok(OwnerRole::Consumer),
            "worker" => Ok(OwnerRole::Worker),
            _ => Err(()),
        }
    }
}

/// Consumer or worker profile with the running points total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    /// Opaque unique identifier (also used as document ID)
    pub id: String,
    /// Stored role tag
    pub role: OwnerRole,
    /// Full name
    pub full_name: String,
    /// Email address
    pub email: String,
    /// Running reward-points total; mutated only by the ledger updater
    pub total_points: u64,
    /// When the account was created
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!(OwnerRole::from_str("consumer"), Ok(OwnerRole::Consumer));
        assert_eq!(OwnerRole::from_str("worker"), Ok(OwnerRole::Worker));
        assert!(OwnerRole::from_str("admin").is_err());
        assert_eq!(OwnerRole::Worker.as_str(), "worker");
    }
}
