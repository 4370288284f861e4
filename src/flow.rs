//! Derived flow projections.
//!
//! Nothing here is ever persisted: a flow is a pure, deterministic function of
//! (step templates, entity-scoped decisions, submission time, user directory,
//! now). The only wall-clock dependent outputs are the SLA countdown and
//! breach flag on the pending step.
use chrono::{DateTime, Duration, Utc};

use crate::decision::{Decision, DecisionKind};
use crate::invoice::InvoiceSignals;
use crate::role::RoleGraph;
use crate::template::{Channel, FlowType, StepTemplate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Blocked behind an earlier still-pending step.
    Waiting,
    /// The single currently actionable step.
    Pending,
    Approved,
    Rejected,
    /// Unreachable because an earlier step was rejected.
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Waiting => "waiting",
            StepStatus::Pending => "pending",
            StepStatus::Approved => "approved",
            StepStatus::Rejected => "rejected",
            StepStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    Pending,
    Approved,
    Rejected,
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStatus::Pending => "pending",
            FlowStatus::Approved => "approved",
            FlowStatus::Rejected => "rejected",
        }
    }
}

/// A user as supplied by the directory collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Option<String>,
}

/// A directory user whose (normalised) role satisfies a step's required role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedBy {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// An entity eligible for approval, as supplied by its source collection.
/// An entity has a flow the moment it exists; there is no "flow created"
/// event anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittableEntity {
    pub id: String,
    pub title: String,
    pub reference: Option<String>,
    /// Missing or unparseable submission timestamps fall back to read time.
    pub submitted_at: Option<DateTime<Utc>>,
    pub submitted_by: Option<SubmittedBy>,
    /// Routing inputs, present only for invoice entities.
    pub invoice: Option<InvoiceSignals>,
}

impl SubmittableEntity {
    pub fn new(id: &str, title: &str, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            reference: None,
            submitted_at: Some(submitted_at),
            submitted_by: None,
            invoice: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: String,
    pub label: String,
    pub required_role: String,
    pub sla_hours: u32,
    pub escalates_to: Option<String>,
    pub notifications: Vec<Channel>,
    pub status: StepStatus,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub decided_by_role: Option<String>,
    pub comment: Option<String>,
    pub sla_deadline: DateTime<Utc>,
    /// Only set while the step is pending. Negative means the SLA is
    /// breached; the step stays pending and escalation is the caller's call.
    pub sla_seconds_remaining: Option<i64>,
    pub pending_users: Vec<EligibleUser>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub id: String, // "{flow_type}:{entity_id}"
    pub flow_type: FlowType,
    pub entity_id: String,
    pub reference: Option<String>,
    pub title: String,
    pub status: FlowStatus,
    pub submitted_at: DateTime<Utc>,
    pub submitted_by: Option<SubmittedBy>,
    pub steps: Vec<Step>,
    pub current_step_id: Option<String>,
}

impl Flow {
    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.current_step_id
            .as_deref()
            .and_then(|id| self.step(id))
    }
}

/// Directory users allowed to act on a step, with their roles normalised.
pub fn eligible_users(
    users: &[DirectoryUser],
    required_role: &str,
    roles: &RoleGraph,
) -> Vec<EligibleUser> {
    users
        .iter()
        .filter_map(|user| {
            let role = roles.normalise(user.role.as_deref());
            roles
                .is_at_least(&role, Some(required_role))
                .then(|| EligibleUser {
                    id: user.id.clone(),
                    name: user.name.clone(),
                    email: user.email.clone(),
                    role,
                })
        })
        .collect()
}

#[derive(Debug)]
struct StepProjection {
    steps: Vec<Step>,
    pending_step_id: Option<String>,
}

fn build_steps(
    templates: &[StepTemplate],
    decisions: &[&Decision],
    submitted_at: DateTime<Utc>,
    now: DateTime<Utc>,
    users: &[DirectoryUser],
    roles: &RoleGraph,
) -> StepProjection {
    let mut steps = Vec::with_capacity(templates.len());
    let mut blocked = false;
    let mut has_rejection = false;
    let mut next_start = submitted_at;
    let mut pending_step_id = None;

    for template in templates {
        // Latest decision wins; the sort is stable, so equal timestamps
        // resolve by log insertion order.
        let mut step_decisions: Vec<&&Decision> = decisions
            .iter()
            .filter(|d| d.step_id == template.id)
            .collect();
        step_decisions.sort_by_key(|d| d.decided_at.to_datetime_utc());
        let latest = step_decisions.last().copied();

        let deadline = next_start + Duration::hours(i64::from(template.sla_hours));

        let mut step = Step {
            id: template.id.clone(),
            label: template.label.clone(),
            required_role: template.required_role.clone(),
            sla_hours: template.sla_hours,
            escalates_to: template.escalates_to.clone(),
            notifications: template.notifications.clone(),
            status: StepStatus::Waiting,
            decided_at: None,
            decided_by: None,
            decided_by_role: None,
            comment: None,
            sla_deadline: deadline,
            sla_seconds_remaining: None,
            pending_users: Vec::new(),
        };

        if let Some(latest) = latest {
            let decided_at = latest.decided_at.to_datetime_utc();
            step.decided_at = Some(decided_at);
            step.decided_by = latest.decider_display();
            step.decided_by_role = Some(latest.decided_by_role.clone());
            step.comment = latest.comment.clone();
            match latest.decision {
                DecisionKind::Approved => {
                    step.status = StepStatus::Approved;
                    blocked = false;
                    // The next step's SLA clock starts when this one closed.
                    next_start = decided_at;
                }
                DecisionKind::Rejected => {
                    step.status = StepStatus::Rejected;
                    blocked = true;
                    has_rejection = true;
                }
            }
        } else if !blocked && !has_rejection {
            step.status = StepStatus::Pending;
            step.pending_users = eligible_users(users, &template.required_role, roles);
            step.sla_seconds_remaining = Some((deadline - now).num_seconds());
            pending_step_id = Some(step.id.clone());
            blocked = true;
        } else if has_rejection {
            step.status = StepStatus::Skipped;
        }

        steps.push(step);
    }

    StepProjection {
        steps,
        pending_step_id,
    }
}

pub fn flow_status(steps: &[Step]) -> FlowStatus {
    if steps.iter().any(|s| s.status == StepStatus::Rejected) {
        return FlowStatus::Rejected;
    }
    if !steps.is_empty() && steps.iter().all(|s| s.status == StepStatus::Approved) {
        return FlowStatus::Approved;
    }
    FlowStatus::Pending
}

/// Project the full approval state for one entity from the decision log.
///
/// `decisions` may be the whole log; records for other entities or flow types
/// are filtered out here.
pub fn reconstruct(
    entity: &SubmittableEntity,
    flow_type: FlowType,
    templates: &[StepTemplate],
    decisions: &[Decision],
    users: &[DirectoryUser],
    roles: &RoleGraph,
    now: DateTime<Utc>,
) -> Flow {
    let submitted_at = entity.submitted_at.unwrap_or(now);

    let mut entity_decisions: Vec<&Decision> = decisions
        .iter()
        .filter(|d| d.flow_type == flow_type && d.entity_id == entity.id)
        .collect();
    entity_decisions.sort_by_key(|d| d.decided_at.to_datetime_utc());

    let projection = build_steps(templates, &entity_decisions, submitted_at, now, users, roles);
    let status = flow_status(&projection.steps);

    Flow {
        id: format!("{}:{}", flow_type, entity.id),
        flow_type,
        entity_id: entity.id.clone(),
        reference: entity.reference.clone(),
        title: entity.title.clone(),
        status,
        submitted_at,
        submitted_by: entity.submitted_by.clone(),
        steps: projection.steps,
        current_step_id: projection.pending_step_id,
    }
}
