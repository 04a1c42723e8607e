//! Non-conformance records raised by failed receiving inspections.
//!
//! NCR authoring (root cause, corrective action) lives elsewhere; this module
//! only covers the record created automatically at disposition time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use solderp_core::{Entity, InspectionId, Ipn, NcrId};

use crate::inspection::{Disposition, ReceivingInspection};

/// What a disposition asks the NCR collaborator to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NcrRequest {
    pub ipn: Ipn,
    pub qty: i64,
    /// Originating document, `PO:<po id>`.
    pub reference: String,
    pub inspection_id: InspectionId,
    pub description: String,
}

impl NcrRequest {
    pub fn for_failed_receipt(inspection: &ReceivingInspection, disposition: &Disposition) -> Self {
        let mut description = format!(
            "{} of {} units of {} failed receiving inspection (PO {} line {})",
            disposition.qty_failed,
            inspection.qty_received,
            inspection.ipn,
            inspection.po_id,
            inspection.po_line_id
        );
        if !disposition.notes.trim().is_empty() {
            description.push_str(": ");
            description.push_str(disposition.notes.trim());
        }
        Self {
            ipn: inspection.ipn.clone(),
            qty: disposition.qty_failed,
            reference: format!("PO:{}", inspection.po_id),
            inspection_id: inspection.id,
            description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonConformanceRecord {
    pub id: NcrId,
    pub ipn: Ipn,
    pub qty: i64,
    pub reference: String,
    pub inspection_id: Option<InspectionId>,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl NonConformanceRecord {
    pub const OPEN: &'static str = "open";

    pub fn open(request: NcrRequest, id: NcrId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            ipn: request.ipn,
            qty: request.qty,
            reference: request.reference,
            inspection_id: Some(request.inspection_id),
            description: request.description,
            status: Self::OPEN.to_string(),
            created_at: at,
        }
    }
}

impl Entity for NonConformanceRecord {
    type Id = NcrId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
