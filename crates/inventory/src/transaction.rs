use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use solderp_core::{DomainError, Ipn};

/// Kind of ledger movement recorded in the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Receive,
    Issue,
    Adjust,
    Transfer,
    Return,
    Scrap,
}

impl TransactionType {
    pub const ALL: [TransactionType; 6] = [
        TransactionType::Receive,
        TransactionType::Issue,
        TransactionType::Adjust,
        TransactionType::Transfer,
        TransactionType::Return,
        TransactionType::Scrap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Receive => "receive",
            TransactionType::Issue => "issue",
            TransactionType::Adjust => "adjust",
            TransactionType::Transfer => "transfer",
            TransactionType::Return => "return",
            TransactionType::Scrap => "scrap",
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown transaction type '{s}'")))
    }
}

/// Immutable log row: one per applied ledger delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: i64,
    pub ipn: Ipn,
    pub txn_type: TransactionType,
    /// Magnitude of the movement (always positive).
    pub quantity: i64,
    pub on_hand_delta: i64,
    pub reserved_delta: i64,
    /// Triggering document, e.g. `SO:<order id>` or `PO:<po id>`.
    pub reference: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for t in TransactionType::ALL {
            assert_eq!(t.as_str().parse::<TransactionType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_type_is_a_validation_error() {
        assert!(matches!(
            "reserve".parse::<TransactionType>(),
            Err(DomainError::Validation(_))
        ));
    }
}
