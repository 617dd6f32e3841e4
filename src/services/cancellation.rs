use chrono::NaiveDateTime;

/// One refund tier. `max_hours: None` means no upper bound. Tiers are
/// data so operators can retune the policy without touching the engine.
#[derive(Debug, Clone, Copy)]
pub struct PolicyRule {
    pub min_hours: f64,
    pub max_hours: Option<f64>,
    pub refund_percentage: u8,
    pub description: &'static str,
}

/// Evaluated top to bottom; first matching rule wins. A rule matches when
/// `hours_until >= min_hours` and, if bounded, `hours_until < max_hours`.
pub const DEFAULT_POLICY: &[PolicyRule] = &[
    PolicyRule {
        min_hours: 48.0,
        max_hours: None,
        refund_percentage: 100,
        description: "Full refund - cancelled more than 48 hours in advance",
    },
    PolicyRule {
        min_hours: 24.0,
        max_hours: Some(48.0),
        refund_percentage: 50,
        description: "50% refund - cancelled between 24 and 48 hours in advance",
    },
    PolicyRule {
        min_hours: 12.0,
        max_hours: Some(24.0),
        refund_percentage: 25,
        description: "25% refund - cancelled between 12 and 24 hours in advance",
    },
    PolicyRule {
        min_hours: 0.0,
        max_hours: Some(12.0),
        refund_percentage: 0,
        description: "No refund - cancelled less than 12 hours before booking",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refund {
    pub percentage: u8,
    pub reason: &'static str,
}

pub fn calculate_refund(start_time: NaiveDateTime, now: NaiveDateTime) -> Refund {
    calculate_refund_with(DEFAULT_POLICY, start_time, now)
}

pub fn calculate_refund_with(
    policy: &[PolicyRule],
    start_time: NaiveDateTime,
    now: NaiveDateTime,
) -> Refund {
    let hours_until = (start_time - now).num_seconds() as f64 / 3600.0;

    if hours_until < 0.0 {
        return Refund {
            percentage: 0,
            reason: "No refund - booking time has already passed",
        };
    }

    for rule in policy {
        if hours_until >= rule.min_hours
            && rule.max_hours.map_or(true, |max| hours_until < max)
        {
            return Refund {
                percentage: rule.refund_percentage,
                reason: rule.description,
            };
        }
    }

    Refund {
        percentage: 0,
        reason: "No refund applicable",
    }
}
