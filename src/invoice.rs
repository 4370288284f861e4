//! Invoice approval plan builder: amount-threshold routing and step filtering
use std::fmt;

use crate::template::{Channel, FlowType, StepTemplate, TemplateRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Streamlined,
    Standard,
    Executive,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Route::Streamlined => "streamlined",
            Route::Standard => "standard",
            Route::Executive => "executive",
        })
    }
}

/// Routing inputs supplied by the invoice entity source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceSignals {
    pub amount: u64,
    pub risk_level: RiskLevel,
    pub urgency_days: Option<i64>,
}

/// A per-invoice bespoke template chain plus the reasoning behind it. The
/// notes are for audit trails only, never for control flow.
#[derive(Debug, Clone)]
pub struct InvoicePlan {
    pub route: Route,
    pub risk_level: RiskLevel,
    pub steps: Vec<StepTemplate>,
    pub notes: Vec<String>,
}

const ROUTE_THRESHOLDS: [(u64, Route); 2] =
    [(5_000, Route::Streamlined), (25_000, Route::Standard)];

// Canonical step order; routing only ever drops entries, never reorders.
const BASE_ORDER: [&str; 6] = [
    "intake-validation",
    "compliance-review",
    "budget-check",
    "controller-review",
    "management-approval",
    "executive-signoff",
];

fn select_route(amount: u64) -> Route {
    for (limit, route) in ROUTE_THRESHOLDS {
        if amount <= limit {
            return route;
        }
    }
    Route::Executive
}

fn step_applies(step_id: &str, route: Route, risk: RiskLevel) -> bool {
    match step_id {
        "compliance-review" => risk != RiskLevel::Low,
        "controller-review" => route != Route::Streamlined,
        "management-approval" => {
            route != Route::Streamlined && !(route == Route::Standard && risk == RiskLevel::Low)
        }
        "executive-signoff" => route == Route::Executive,
        _ => true,
    }
}

/// Build the concrete approval chain for one invoice. The result feeds the
/// flow reconstructor exactly as a fixed flow type's templates would.
pub fn build_invoice_plan(registry: &TemplateRegistry, signals: &InvoiceSignals) -> InvoicePlan {
    let route = select_route(signals.amount);
    let templates = registry.get(FlowType::Invoice);

    let mut steps: Vec<StepTemplate> = BASE_ORDER
        .iter()
        .filter(|step_id| step_applies(step_id, route, signals.risk_level))
        .filter_map(|step_id| templates.iter().find(|t| t.id == *step_id).cloned())
        .collect();

    let urgent = signals.urgency_days.is_some_and(|days| days <= 2);
    if urgent {
        for step in &mut steps {
            if step.sla_hours > 4 {
                step.sla_hours = (step.sla_hours / 2).max(4);
            }
            if !step.notifications.contains(&Channel::Push) {
                step.notifications.push(Channel::Push);
            }
        }
    }

    let mut notes = Vec::new();
    if route == Route::Streamlined {
        notes.push("Amount is low, so the streamlined route was selected.".to_string());
    }
    if route == Route::Executive {
        notes.push("Executive sign-off is mandatory for high amounts.".to_string());
    }
    if signals.risk_level == RiskLevel::High {
        notes.push("Compliance review included because the invoice is flagged high risk.".to_string());
    }
    if urgent {
        notes.push("Due date is close, so SLA windows were tightened.".to_string());
    }

    InvoicePlan {
        route,
        risk_level: signals.risk_level,
        steps,
        notes,
    }
}
