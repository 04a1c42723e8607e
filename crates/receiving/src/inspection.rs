use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use solderp_core::{DomainError, DomainResult, Entity, InspectionId, Ipn};

use crate::ncr::NcrRequest;

/// Inspection of one received purchase-order line.
///
/// `inspected_at == None` means pending; once set, the inspection is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingInspection {
    pub id: InspectionId,
    pub po_id: String,
    pub po_line_id: i64,
    pub ipn: Ipn,
    pub qty_received: i64,
    pub qty_passed: i64,
    pub qty_failed: i64,
    pub qty_on_hold: i64,
    pub inspector: Option<String>,
    pub inspected_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl ReceivingInspection {
    pub fn is_pending(&self) -> bool {
        self.inspected_at.is_none()
    }

    /// Received units not yet classified by the disposition.
    pub fn unclassified(&self) -> i64 {
        self.qty_received - self.qty_passed - self.qty_failed - self.qty_on_hold
    }
}

impl Entity for ReceivingInspection {
    type Id = InspectionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Goods receipt for one purchase-order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReceipt {
    pub po_id: String,
    pub po_line_id: i64,
    pub ipn: Ipn,
    pub qty_received: i64,
}

impl NewReceipt {
    pub fn validate(&self) -> DomainResult<()> {
        if self.po_id.trim().is_empty() {
            return Err(DomainError::validation("po_id cannot be empty"));
        }
        if self.qty_received <= 0 {
            return Err(DomainError::validation(format!(
                "qty_received for {} must be positive, got {}",
                self.ipn, self.qty_received
            )));
        }
        Ok(())
    }

    pub fn into_inspection(
        self,
        id: InspectionId,
        at: DateTime<Utc>,
    ) -> DomainResult<ReceivingInspection> {
        self.validate()?;
        Ok(ReceivingInspection {
            id,
            po_id: self.po_id.trim().to_string(),
            po_line_id: self.po_line_id,
            ipn: self.ipn,
            qty_received: self.qty_received,
            qty_passed: 0,
            qty_failed: 0,
            qty_on_hold: 0,
            inspector: None,
            inspected_at: None,
            notes: String::new(),
            created_at: at,
        })
    }
}

/// An inspector's classification of a received quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disposition {
    pub qty_passed: i64,
    pub qty_failed: i64,
    pub qty_on_hold: i64,
    pub inspector: String,
    #[serde(default)]
    pub notes: String,
}

impl Disposition {
    /// Sum of the three components; `None` when it does not fit in an `i64`.
    pub fn total(&self) -> Option<i64> {
        self.qty_passed
            .checked_add(self.qty_failed)?
            .checked_add(self.qty_on_hold)
    }

    fn requested_total(&self) -> String {
        match self.total() {
            Some(total) => total.to_string(),
            None => format!(
                "{} + {} + {}",
                self.qty_passed, self.qty_failed, self.qty_on_hold
            ),
        }
    }

    /// Checks that need only the request itself.
    ///
    /// Each component must be non-negative on its own; a negative passed
    /// count offset by a larger failed count is still rejected.
    pub fn validate(&self) -> DomainResult<()> {
        for (field, value) in [
            ("qty_passed", self.qty_passed),
            ("qty_failed", self.qty_failed),
            ("qty_on_hold", self.qty_on_hold),
        ] {
            if value < 0 {
                return Err(DomainError::validation(format!(
                    "{field} must not be negative, got {value}"
                )));
            }
        }
        if self.total() == Some(0) {
            return Err(DomainError::validation(
                "disposition must classify at least one unit",
            ));
        }
        if self.inspector.trim().is_empty() {
            return Err(DomainError::validation("inspector cannot be empty"));
        }
        Ok(())
    }

    /// Full validation against the inspection being disposed.
    pub fn validate_against(&self, inspection: &ReceivingInspection) -> DomainResult<()> {
        self.validate()?;
        if !inspection.is_pending() {
            return Err(DomainError::not_found(format!(
                "receiving inspection {} not found or already disposed",
                inspection.id
            )));
        }
        let fits = self
            .total()
            .is_some_and(|total| total <= inspection.qty_received);
        if !fits {
            return Err(DomainError::validation(format!(
                "disposition total {} exceeds qty_received {} for inspection {}",
                self.requested_total(),
                inspection.qty_received,
                inspection.id
            )));
        }
        Ok(())
    }

    /// Record this disposition on a pending inspection.
    pub fn apply_to(
        &self,
        inspection: &mut ReceivingInspection,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.validate_against(inspection)?;
        inspection.qty_passed = self.qty_passed;
        inspection.qty_failed = self.qty_failed;
        inspection.qty_on_hold = self.qty_on_hold;
        inspection.inspector = Some(self.inspector.trim().to_string());
        inspection.inspected_at = Some(at);
        inspection.notes = self.notes.clone();
        Ok(())
    }

    /// The NCR this disposition must raise, if any units failed.
    pub fn ncr_request(&self, inspection: &ReceivingInspection) -> Option<NcrRequest> {
        (self.qty_failed > 0).then(|| NcrRequest::for_failed_receipt(inspection, self))
    }

    /// One-line audit summary of the classification.
    pub fn audit_summary(&self) -> String {
        format!(
            "passed={} failed={} on_hold={} inspector={}",
            self.qty_passed,
            self.qty_failed,
            self.qty_on_hold,
            self.inspector.trim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pending(qty_received: i64) -> ReceivingInspection {
        NewReceipt {
            po_id: "PO-0042".into(),
            po_line_id: 1,
            ipn: Ipn::parse("IC-TPS62130").unwrap(),
            qty_received,
        }
        .into_inspection(InspectionId::new(), Utc::now())
        .unwrap()
    }

    fn disposition(passed: i64, failed: i64, on_hold: i64) -> Disposition {
        Disposition {
            qty_passed: passed,
            qty_failed: failed,
            qty_on_hold: on_hold,
            inspector: "qa.lee".into(),
            notes: String::new(),
        }
    }

    #[test]
    fn receipt_starts_pending_with_zero_classification() {
        let insp = pending(100);
        assert!(insp.is_pending());
        assert_eq!(insp.unclassified(), 100);
    }

    #[test]
    fn receipt_requires_positive_quantity() {
        let receipt = NewReceipt {
            po_id: "PO-1".into(),
            po_line_id: 1,
            ipn: Ipn::parse("X-1").unwrap(),
            qty_received: 0,
        };
        assert!(matches!(receipt.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn partial_disposition_is_accepted() {
        let mut insp = pending(100);
        disposition(80, 15, 5).apply_to(&mut insp, Utc::now()).unwrap();
        assert!(!insp.is_pending());
        assert_eq!(insp.qty_passed, 80);
        assert_eq!(insp.inspector.as_deref(), Some("qa.lee"));
    }

    #[test]
    fn over_disposition_names_both_figures() {
        let insp = pending(100);
        let err = disposition(90, 20, 0).validate_against(&insp).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("110"), "{msg}");
        assert!(msg.contains("100"), "{msg}");
    }

    #[test]
    fn overflowing_disposition_is_a_validation_error() {
        let insp = pending(100);
        let d = disposition(i64::MAX, 1, 0);
        assert_eq!(d.total(), None);
        assert!(d.validate().is_ok());

        let err = d.validate_against(&insp).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)), "{err:?}");
        let msg = err.to_string();
        assert!(msg.contains(&i64::MAX.to_string()), "{msg}");
        assert!(msg.contains("qty_received 100"), "{msg}");
    }

    #[test]
    fn negative_component_is_rejected_even_if_sum_fits() {
        let insp = pending(100);
        let err = disposition(-10, 50, 0).validate_against(&insp).unwrap_err();
        assert!(err.to_string().contains("qty_passed"));
    }

    #[test]
    fn empty_disposition_is_rejected() {
        assert!(disposition(0, 0, 0).validate().is_err());
    }

    #[test]
    fn second_disposition_is_not_found() {
        let mut insp = pending(100);
        disposition(100, 0, 0).apply_to(&mut insp, Utc::now()).unwrap();
        let err = disposition(100, 0, 0).apply_to(&mut insp, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(insp.qty_passed, 100);
    }

    #[test]
    fn ncr_only_when_units_fail() {
        let insp = pending(100);
        assert!(disposition(100, 0, 0).ncr_request(&insp).is_none());
        let ncr = disposition(0, 100, 0).ncr_request(&insp).unwrap();
        assert_eq!(ncr.qty, 100);
        assert_eq!(ncr.reference, "PO:PO-0042");
    }

    proptest! {
        #[test]
        fn accepted_dispositions_never_exceed_receipt(
            received in 1i64..1_000,
            passed in -50i64..1_000,
            failed in -50i64..1_000,
            on_hold in -50i64..1_000,
        ) {
            let insp = pending(received);
            let d = disposition(passed, failed, on_hold);
            if d.validate_against(&insp).is_ok() {
                prop_assert!(passed >= 0 && failed >= 0 && on_hold >= 0);
                prop_assert!(d.total().unwrap() <= received);
                prop_assert!(d.total().unwrap() > 0);
            }
        }
    }
}
