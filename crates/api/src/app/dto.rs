use serde::{Deserialize, Serialize};

use solderp_core::NcrId;
use solderp_infra::DispositionOutcome;
use solderp_receiving::ReceivingInspection;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1_000;

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListInspectionsQuery {
    #[serde(default)]
    pub pending: Option<bool>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Clamp a caller-supplied page size.
pub fn limit(raw: Option<i64>) -> i64 {
    raw.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub qty_delta: i64,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub reorder_point: i64,
    pub reorder_qty: i64,
}

#[derive(Debug, Serialize)]
pub struct DispositionResponse {
    pub inspection: ReceivingInspection,
    pub ncr_id: Option<NcrId>,
}

impl From<DispositionOutcome> for DispositionResponse {
    fn from(outcome: DispositionOutcome) -> Self {
        Self {
            ncr_id: outcome.ncr_id(),
            inspection: outcome.inspection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(limit(None), DEFAULT_LIMIT);
        assert_eq!(limit(Some(0)), 1);
        assert_eq!(limit(Some(50_000)), MAX_LIMIT);
    }
}
