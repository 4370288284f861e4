//! Service layer: the decision write path and the flow listing read path.
//!
//! The engine is stateless per call. Every read replays the decision log
//! through the pure reconstructor; the only mutation anywhere is appending a
//! decision record. Writes serialize per entity so two decisions cannot both
//! pass the actionability check for the same step.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, warn};
use uuid7::uuid7;

use crate::decision::{Decision, DecisionKind, TimeStamp};
use crate::error::DecisionError;
use crate::flow::{self, DirectoryUser, Flow, Step, StepStatus, SubmittableEntity};
use crate::invoice::build_invoice_plan;
use crate::log::DecisionLog;
use crate::role::RoleGraph;
use crate::template::{FlowType, StepTemplate, TemplateRegistry};

/// The authenticated principal recording a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

/// Read-only source of approvable entities for one flow type.
pub trait EntitySource: Send + Sync {
    fn list_submittable(&self, flow_type: FlowType) -> anyhow::Result<Vec<SubmittableEntity>>;
}

pub trait UserDirectory: Send + Sync {
    fn list_users(&self) -> anyhow::Result<Vec<DirectoryUser>>;
}

/// Fire-and-forget delivery over the step's configured channels. A failure
/// here never fails or rolls back the decision write.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, flow: &Flow, step: &Step) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub user: String,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub details: String,
    pub criticality: Criticality,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> anyhow::Result<()>;
}

/// Seam between flow types with fixed template chains and flow types whose
/// chain depends on the entity. The reconstructor never learns the
/// difference.
pub trait TemplateProvider: Send + Sync {
    fn templates_for(&self, flow_type: FlowType, entity: &SubmittableEntity) -> Vec<StepTemplate>;
}

/// Default provider: fixed chains from the registry, except invoices carrying
/// routing signals, which get a bespoke plan.
pub struct RegistryTemplates {
    registry: TemplateRegistry,
}

impl RegistryTemplates {
    pub fn new(registry: TemplateRegistry) -> Self {
        Self { registry }
    }
}

impl TemplateProvider for RegistryTemplates {
    fn templates_for(&self, flow_type: FlowType, entity: &SubmittableEntity) -> Vec<StepTemplate> {
        if flow_type == FlowType::Invoice {
            if let Some(signals) = &entity.invoice {
                return build_invoice_plan(&self.registry, signals).steps;
            }
        }
        self.registry.get(flow_type)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub flow_type: Option<FlowType>,
    pub entity_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub flow_type: FlowType,
    pub entity_id: String,
    pub step_id: String,
    /// Wire value; must parse to `approved` or `rejected`.
    pub decision: String,
    pub comment: Option<String>,
    pub actor: Actor,
}

#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub flow: Flow,
}

pub struct ApprovalService {
    log: Arc<dyn DecisionLog>,
    entities: Arc<dyn EntitySource>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditSink>,
    templates: Arc<dyn TemplateProvider>,
    roles: RoleGraph,
    // One lock per entity around read-recompute-append. Reads stay lock-free.
    entity_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ApprovalService {
    pub fn new(
        log: Arc<dyn DecisionLog>,
        entities: Arc<dyn EntitySource>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            log,
            entities,
            directory,
            notifier,
            audit,
            templates: Arc::new(RegistryTemplates::new(TemplateRegistry::builtin())),
            roles: RoleGraph::builtin(),
            entity_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateProvider>) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_roles(mut self, roles: RoleGraph) -> Self {
        self.roles = roles;
        self
    }

    /// All flows matching the filter, newest submission first. Flow types
    /// with no configured templates simply produce no flows.
    pub fn list_flows(&self, filter: &ListFilter) -> anyhow::Result<Vec<Flow>> {
        let decisions = self.log.read_all()?;
        let users = self.directory.list_users()?;
        let now = Utc::now();

        let flow_types: Vec<FlowType> = match filter.flow_type {
            Some(flow_type) => vec![flow_type],
            None => FlowType::ALL.to_vec(),
        };

        let mut flows = Vec::new();
        for flow_type in flow_types {
            for entity in self.entities.list_submittable(flow_type)? {
                if let Some(wanted) = &filter.entity_id {
                    if *wanted != entity.id {
                        continue;
                    }
                }
                let templates = self.templates.templates_for(flow_type, &entity);
                if templates.is_empty() {
                    continue;
                }
                flows.push(flow::reconstruct(
                    &entity,
                    flow_type,
                    &templates,
                    &decisions,
                    &users,
                    &self.roles,
                    now,
                ));
            }
        }

        flows.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(flows)
    }

    pub fn get_flow(&self, flow_type: FlowType, entity_id: &str) -> anyhow::Result<Option<Flow>> {
        let filter = ListFilter {
            flow_type: Some(flow_type),
            entity_id: Some(entity_id.to_string()),
        };
        Ok(self
            .list_flows(&filter)?
            .into_iter()
            .find(|flow| flow.entity_id == entity_id))
    }

    /// Validate, append and project. Failure kinds surface as
    /// [`DecisionError`] and can be recovered via `downcast_ref`.
    ///
    /// Holds the entity's write lock across the whole
    /// check-then-append-then-recompute sequence.
    pub fn record_decision(&self, request: &DecisionRequest) -> anyhow::Result<DecisionOutcome> {
        let kind = DecisionKind::parse(&request.decision)?;

        let lock = self.entity_lock(&request.entity_id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let flow = self
            .get_flow(request.flow_type, &request.entity_id)?
            .ok_or(DecisionError::FlowNotFound)?;
        let step = flow
            .step(&request.step_id)
            .ok_or(DecisionError::StepNotFound)?;
        if step.status != StepStatus::Pending {
            return Err(DecisionError::StepNotActionable.into());
        }

        let actor_role = self.roles.normalise(request.actor.role.as_deref());
        if !self.roles.is_at_least(&actor_role, Some(&step.required_role)) {
            return Err(DecisionError::StepForbidden.into());
        }

        let comment = request
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string());
        let entry = Decision {
            id: uuid7().to_string(),
            flow_type: request.flow_type,
            entity_id: request.entity_id.clone(),
            step_id: request.step_id.clone(),
            decision: kind,
            comment,
            decided_by: request.actor.id.clone(),
            decided_by_email: request.actor.email.clone(),
            decided_by_name: request.actor.name.clone(),
            decided_by_role: actor_role,
            decided_at: TimeStamp::now(),
        };

        self.log.append(&entry)?;
        debug!(
            flow = %flow.id,
            step = %entry.step_id,
            decision = entry.decision.as_str(),
            "decision appended"
        );

        self.audit.record(audit_entry(request, &entry))?;

        let updated = self
            .get_flow(request.flow_type, &request.entity_id)?
            .ok_or(DecisionError::FlowNotFound)?;

        // Only the newly unblocked step is notified, never resolved ones.
        if let Some(next_step) = updated.current_step() {
            if !next_step.pending_users.is_empty() {
                if let Err(error) = self.notifier.notify(&updated, next_step) {
                    warn!(
                        flow = %updated.id,
                        step = %next_step.id,
                        %error,
                        "notification dispatch failed; decision is already recorded"
                    );
                }
            }
        }

        Ok(DecisionOutcome {
            decision: entry,
            flow: updated,
        })
    }

    fn entity_lock(&self, entity_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .entity_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(entity_id.to_string()).or_default().clone()
    }
}

fn audit_entry(request: &DecisionRequest, entry: &Decision) -> AuditEntry {
    let decision_tag = entry.decision.as_str().to_uppercase();
    AuditEntry {
        user: entry
            .decided_by_email
            .clone()
            .or_else(|| entry.decided_by_name.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        action: match entry.decision {
            DecisionKind::Approved => "Approved".to_string(),
            DecisionKind::Rejected => "Denied".to_string(),
        },
        target_type: format!("approval:{}", request.flow_type),
        target_id: format!("{}:{}", request.entity_id, request.step_id),
        details: match &entry.comment {
            Some(comment) => format!("{decision_tag} - {comment}"),
            None => decision_tag,
        },
        criticality: match entry.decision {
            DecisionKind::Approved => Criticality::Medium,
            DecisionKind::Rejected => Criticality::High,
        },
    }
}
