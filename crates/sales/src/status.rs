//! Sales order lifecycle.
//!
//! The transition table is the single authority on which status changes are
//! legal. Storage executes each edge as a compare-and-swap on the current
//! status, so an edge is taken at most once.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use solderp_core::{DomainError, DomainResult};

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    Allocated,
    Picked,
    Shipped,
    Invoiced,
}

/// Every legal `(from, to)` edge. Anything not listed is rejected.
pub const TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Draft, OrderStatus::Confirmed),
    (OrderStatus::Confirmed, OrderStatus::Allocated),
    (OrderStatus::Allocated, OrderStatus::Picked),
    (OrderStatus::Picked, OrderStatus::Shipped),
    (OrderStatus::Shipped, OrderStatus::Invoiced),
];

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Draft,
        OrderStatus::Confirmed,
        OrderStatus::Allocated,
        OrderStatus::Picked,
        OrderStatus::Shipped,
        OrderStatus::Invoiced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Allocated => "allocated",
            OrderStatus::Picked => "picked",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Invoiced => "invoiced",
        }
    }

    pub fn is_terminal(self) -> bool {
        !TRANSITIONS.iter().any(|(from, _)| *from == self)
    }

    /// The only status from which `target` may be entered, if any.
    pub fn required_for(target: OrderStatus) -> Option<OrderStatus> {
        TRANSITIONS
            .iter()
            .find(|(_, to)| *to == target)
            .map(|(from, _)| *from)
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        TRANSITIONS.contains(&(self, target))
    }

    /// Validate `self -> target` against the table.
    pub fn check_transition(self, target: OrderStatus) -> DomainResult<()> {
        if self.can_transition_to(target) {
            return Ok(());
        }
        let required = OrderStatus::required_for(target)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "none".to_string());
        Err(DomainError::InvalidTransition {
            from: self.as_str().to_string(),
            to: target.as_str().to_string(),
            required,
        })
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown order status '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn happy_path_is_linear() {
        let mut current = OrderStatus::Draft;
        for next in &OrderStatus::ALL[1..] {
            current.check_transition(*next).unwrap();
            current = *next;
        }
        assert!(current.is_terminal());
    }

    #[test]
    fn skipping_a_stage_names_the_required_status() {
        let err = OrderStatus::Confirmed
            .check_transition(OrderStatus::Shipped)
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: "confirmed".into(),
                to: "shipped".into(),
                required: "picked".into(),
            }
        );
    }

    #[test]
    fn nothing_enters_draft() {
        assert_eq!(OrderStatus::required_for(OrderStatus::Draft), None);
        let err = OrderStatus::Invoiced.check_transition(OrderStatus::Draft).unwrap_err();
        assert!(err.to_string().contains("requires status=none"));
    }

    #[test]
    fn repeating_a_stage_is_rejected() {
        assert!(OrderStatus::Allocated.check_transition(OrderStatus::Allocated).is_err());
    }

    #[test]
    fn parses_wire_names() {
        for s in OrderStatus::ALL {
            assert_eq!(s.as_str().parse::<OrderStatus>().unwrap(), s);
        }
        assert!("cancelled".parse::<OrderStatus>().is_err());
    }

    proptest! {
        // Whatever sequence of stage requests arrives, the statuses actually
        // reached form a prefix of the canonical lifecycle.
        #[test]
        fn reached_statuses_follow_the_lifecycle(requests in proptest::collection::vec(0usize..6, 0..30)) {
            let mut current = OrderStatus::Draft;
            let mut observed = vec![current];
            for idx in requests {
                let target = OrderStatus::ALL[idx];
                if current.check_transition(target).is_ok() {
                    current = target;
                    observed.push(current);
                }
            }
            prop_assert_eq!(&observed[..], &OrderStatus::ALL[..observed.len()]);
        }
    }
}
