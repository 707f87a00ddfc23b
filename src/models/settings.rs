use serde::{Deserialize, Serialize};

/// User-defined checklist item, shared by every week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCheck {
    pub id: String,
    pub label: String,
}

impl CustomCheck {
    pub fn new(label: &str) -> Self {
        Self {
            id: format!("custom-{}", uuid::Uuid::new_v4()),
            label: label.trim().to_string(),
        }
    }
}

/// Built-in checklist item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCheck {
    pub id: &'static str,
    pub label: &'static str,
}

pub const FIXED_CHECKS: &[FixedCheck] = &[
    FixedCheck {
        id: "followedPlan",
        label: "Followed my trading plan",
    },
    FixedCheck {
        id: "stopLossPlaced",
        label: "Placed a stop loss on every trade",
    },
    FixedCheck {
        id: "respectedRiskLimit",
        label: "Stayed within my risk limit",
    },
];

pub fn fixed_check(id: &str) -> Option<&'static FixedCheck> {
    FIXED_CHECKS.iter().find(|c| c.id == id)
}
