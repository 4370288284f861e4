//! Flow types, notification channels and step template configuration
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Category of approvable entity. Each flow type owns an ordered chain of
/// step templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum FlowType {
    #[n(0)]
    Signup,
    #[n(1)]
    Finance,
    #[n(2)]
    Task,
    #[n(3)]
    Invoice,
}

impl FlowType {
    pub const ALL: [FlowType; 4] = [
        FlowType::Signup,
        FlowType::Finance,
        FlowType::Task,
        FlowType::Invoice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Signup => "signup",
            FlowType::Finance => "finance",
            FlowType::Task => "task",
            FlowType::Invoice => "invoice",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowType {
    type Err = UnknownFlowType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "signup" => Ok(FlowType::Signup),
            "finance" => Ok(FlowType::Finance),
            "task" => Ok(FlowType::Task),
            "invoice" => Ok(FlowType::Invoice),
            other => Err(UnknownFlowType(other.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Unknown flow type: {0:?}")]
pub struct UnknownFlowType(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Push,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Push => "push",
        }
    }
}

/// Static configuration for one stage of an approval chain. Ordering inside
/// the registry encodes the sequential chain for the flow type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTemplate {
    pub id: String,
    pub label: String,
    pub required_role: String,
    pub sla_hours: u32,
    pub escalates_to: Option<String>,
    pub notifications: Vec<Channel>,
}

impl StepTemplate {
    pub fn new(
        id: &str,
        label: &str,
        required_role: &str,
        sla_hours: u32,
        escalates_to: Option<&str>,
        notifications: &[Channel],
    ) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            required_role: required_role.to_string(),
            sla_hours,
            escalates_to: escalates_to.map(|s| s.to_string()),
            notifications: notifications.to_vec(),
        }
    }
}

/// Read-only template configuration baked in at startup.
#[derive(Debug)]
pub struct TemplateRegistry {
    templates: HashMap<FlowType, Vec<StepTemplate>>,
}

impl TemplateRegistry {
    pub fn new(templates: HashMap<FlowType, Vec<StepTemplate>>) -> Self {
        Self { templates }
    }

    pub fn builtin() -> Self {
        use Channel::{Email, Push};

        let mut templates = HashMap::new();
        templates.insert(
            FlowType::Signup,
            vec![
                StepTemplate::new(
                    "pre-screen",
                    "Initial Screening",
                    "user",
                    12,
                    Some("approver"),
                    &[Email, Push],
                ),
                StepTemplate::new(
                    "risk-check",
                    "Risk & Compliance Check",
                    "approver",
                    24,
                    Some("manager"),
                    &[Email],
                ),
                StepTemplate::new(
                    "final-approval",
                    "Final Approval",
                    "admin",
                    24,
                    None,
                    &[Email, Push],
                ),
            ],
        );
        templates.insert(
            FlowType::Finance,
            vec![
                StepTemplate::new(
                    "budget-validation",
                    "Budget Validation",
                    "finance",
                    8,
                    Some("manager"),
                    &[Email],
                ),
                StepTemplate::new(
                    "controller-review",
                    "Controller Review",
                    "manager",
                    16,
                    Some("admin"),
                    &[Email, Push],
                ),
                StepTemplate::new(
                    "executive-signoff",
                    "Executive Sign-off",
                    "admin",
                    24,
                    None,
                    &[Email],
                ),
            ],
        );
        templates.insert(
            FlowType::Invoice,
            vec![
                StepTemplate::new(
                    "intake-validation",
                    "Invoice Intake Review",
                    "user",
                    4,
                    Some("approver"),
                    &[Email],
                ),
                StepTemplate::new(
                    "compliance-review",
                    "Compliance & Risk Review",
                    "approver",
                    8,
                    Some("finance"),
                    &[Email],
                ),
                StepTemplate::new(
                    "budget-check",
                    "Budget Check",
                    "finance",
                    8,
                    Some("manager"),
                    &[Email],
                ),
                StepTemplate::new(
                    "controller-review",
                    "Controller Review",
                    "finance",
                    12,
                    Some("manager"),
                    &[Email, Push],
                ),
                StepTemplate::new(
                    "management-approval",
                    "Management Approval",
                    "manager",
                    12,
                    Some("admin"),
                    &[Email],
                ),
                StepTemplate::new(
                    "executive-signoff",
                    "Executive Sign-off",
                    "admin",
                    24,
                    None,
                    &[Email],
                ),
            ],
        );
        templates.insert(
            FlowType::Task,
            vec![
                StepTemplate::new(
                    "owner-review",
                    "Owner Review",
                    "user",
                    12,
                    Some("manager"),
                    &[Push],
                ),
                StepTemplate::new(
                    "ops-lead-approval",
                    "Ops Lead Approval",
                    "manager",
                    24,
                    Some("admin"),
                    &[Email, Push],
                ),
            ],
        );

        Self::new(templates)
    }

    /// Ordered templates for a flow type. Always a fresh copy; an unconfigured
    /// flow type yields an empty list rather than an error.
    pub fn get(&self, flow_type: FlowType) -> Vec<StepTemplate> {
        self.templates.get(&flow_type).cloned().unwrap_or_default()
    }
}
