//! Smoke tests for the approval engine's public surface.
//!
//! These exercise the documented behaviors of each component in isolation
//! from the service layer: reconstruction timelines, invoice routing, and
//! role satisfaction. Generally happy-path; the property and scenario suites
//! carry the adversarial cases.
use chrono::{TimeZone, Utc};

use approval_flow::decision::{Decision, DecisionKind, TimeStamp};
use approval_flow::flow::{
    DirectoryUser, FlowStatus, StepStatus, SubmittableEntity, eligible_users, reconstruct,
};
use approval_flow::invoice::{InvoiceSignals, RiskLevel, Route, build_invoice_plan};
use approval_flow::role::RoleGraph;
use approval_flow::template::{Channel, FlowType, StepTemplate, TemplateRegistry};

mod reconstruction_tests {
    use super::*;

    fn templates() -> Vec<StepTemplate> {
        vec![
            StepTemplate::new("s1", "First", "user", 12, None, &[Channel::Email]),
            StepTemplate::new("s2", "Second", "manager", 24, None, &[Channel::Email]),
        ]
    }

    fn entity() -> SubmittableEntity {
        SubmittableEntity::new(
            "e1",
            "Entity",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn decision(step_id: &str, kind: DecisionKind, hour: u32) -> Decision {
        Decision {
            id: uuid7::uuid7().to_string(),
            flow_type: FlowType::Task,
            entity_id: "e1".to_string(),
            step_id: step_id.to_string(),
            decision: kind,
            comment: None,
            decided_by: Some("u1".to_string()),
            decided_by_email: Some("u1@example.com".to_string()),
            decided_by_name: None,
            decided_by_role: "manager".to_string(),
            decided_at: TimeStamp::new_with(2024, 1, 1, hour, 0, 0),
        }
    }

    /// Fresh submission: first step pending with its SLA anchored at the
    /// submission time, second step waiting.
    #[test]
    fn fresh_flow_timeline() {
        let flow = reconstruct(
            &entity(),
            FlowType::Task,
            &templates(),
            &[],
            &[],
            &RoleGraph::builtin(),
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
        );

        assert_eq!(flow.steps[0].status, StepStatus::Pending);
        assert_eq!(
            flow.steps[0].sla_deadline,
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(flow.steps[1].status, StepStatus::Waiting);
        assert_eq!(flow.current_step_id.as_deref(), Some("s1"));
    }

    /// An approval at 10:00 starts the next step's 24h window at 10:00.
    #[test]
    fn approval_rebases_the_next_sla_window() {
        let decisions = vec![decision("s1", DecisionKind::Approved, 10)];
        let flow = reconstruct(
            &entity(),
            FlowType::Task,
            &templates(),
            &decisions,
            &[],
            &RoleGraph::builtin(),
            Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap(),
        );

        assert_eq!(flow.steps[0].status, StepStatus::Approved);
        assert_eq!(flow.steps[1].status, StepStatus::Pending);
        assert_eq!(
            flow.steps[1].sla_deadline,
            Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn rejection_is_terminal() {
        let decisions = vec![decision("s1", DecisionKind::Rejected, 10)];
        let flow = reconstruct(
            &entity(),
            FlowType::Task,
            &templates(),
            &decisions,
            &[],
            &RoleGraph::builtin(),
            Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap(),
        );

        assert_eq!(flow.status, FlowStatus::Rejected);
        assert_eq!(flow.steps[1].status, StepStatus::Skipped);
    }

    /// The decider's display value prefers name, then email, then id.
    #[test]
    fn decider_display_falls_back_through_identity_fields() {
        let decisions = vec![decision("s1", DecisionKind::Approved, 10)];
        let flow = reconstruct(
            &entity(),
            FlowType::Task,
            &templates(),
            &decisions,
            &[],
            &RoleGraph::builtin(),
            Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap(),
        );

        assert_eq!(flow.steps[0].decided_by.as_deref(), Some("u1@example.com"));
        assert_eq!(flow.steps[0].decided_by_role.as_deref(), Some("manager"));
    }

    /// An entity without a usable submission timestamp anchors to read time
    /// instead of failing the projection.
    #[test]
    fn missing_submission_time_falls_back_to_now() {
        let mut entity = entity();
        entity.submitted_at = None;
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let flow = reconstruct(
            &entity,
            FlowType::Task,
            &templates(),
            &[],
            &[],
            &RoleGraph::builtin(),
            now,
        );

        assert_eq!(flow.submitted_at, now);
        assert_eq!(flow.steps[0].sla_seconds_remaining, Some(12 * 3600));
    }
}

mod invoice_plan_tests {
    use super::*;

    #[test]
    fn streamlined_low_risk_plan_is_two_steps() {
        let plan = build_invoice_plan(
            &TemplateRegistry::builtin(),
            &InvoiceSignals {
                amount: 3_000,
                risk_level: RiskLevel::Low,
                urgency_days: None,
            },
        );

        assert_eq!(plan.route, Route::Streamlined);
        let ids: Vec<_> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["intake-validation", "budget-check"]);
        assert!(!ids.contains(&"compliance-review"));
        assert!(!ids.contains(&"controller-review"));
        assert!(!ids.contains(&"management-approval"));
    }

    /// The plan's steps are plain templates: the reconstructor drives them
    /// with no knowledge that they were routed.
    #[test]
    fn plan_feeds_the_reconstructor_like_any_template_chain() {
        let plan = build_invoice_plan(
            &TemplateRegistry::builtin(),
            &InvoiceSignals {
                amount: 60_000,
                risk_level: RiskLevel::High,
                urgency_days: Some(1),
            },
        );
        let entity = SubmittableEntity::new(
            "inv-9",
            "INV-9",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );
        let flow = reconstruct(
            &entity,
            FlowType::Invoice,
            &plan.steps,
            &[],
            &[],
            &RoleGraph::builtin(),
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
        );

        assert_eq!(flow.steps.len(), 6);
        assert_eq!(flow.current_step_id.as_deref(), Some("intake-validation"));
        // urgency tightened the intake SLA to its floor
        assert_eq!(flow.steps[0].sla_hours, 4);
        assert!(flow.steps[0].notifications.contains(&Channel::Push));
    }
}

mod role_model_tests {
    use super::*;

    fn user(id: &str, role: &str) -> DirectoryUser {
        DirectoryUser {
            id: id.to_string(),
            name: id.to_string(),
            email: format!("{id}@example.com"),
            role: Some(role.to_string()),
        }
    }

    #[test]
    fn eligibility_follows_inheritance() {
        let roles = RoleGraph::builtin();
        let users = vec![user("a", "viewer"), user("b", "approver"), user("c", "admin")];

        let eligible = eligible_users(&users, "approver", &roles);
        let ids: Vec<_> = eligible.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    /// Rank fallback quirk: finance does not inherit manager, yet its equal
    /// rank makes finance users eligible for manager-gated steps. Intentional
    /// compatibility behavior, pinned here so nobody "fixes" it silently.
    #[test]
    fn rank_fallback_widens_eligibility_across_branches() {
        let roles = RoleGraph::builtin();
        let users = vec![user("fin", "finance"), user("mgr", "manager")];

        let eligible = eligible_users(&users, "manager", &roles);
        assert_eq!(eligible.len(), 2);
    }
}
