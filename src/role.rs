//! Role model: inheritance DAG, capability sets and rank-based fallback
use std::collections::{BTreeSet, HashMap};

pub const DEFAULT_ROLE: &str = "viewer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    pub id: String,
    pub label: String,
    pub inherits: Vec<String>,
    pub capabilities: Vec<String>,
    pub rank: i32,
}

impl RoleDefinition {
    pub fn new(id: &str, label: &str, inherits: &[&str], capabilities: &[&str], rank: i32) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            inherits: inherits.iter().map(|s| s.to_string()).collect(),
            capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
            rank,
        }
    }
}

/// Static role configuration resolved into a queryable graph.
///
/// Ancestry closures are computed once at construction; the role set never
/// changes at runtime, so lookups afterwards are plain map reads.
#[derive(Debug)]
pub struct RoleGraph {
    roles: HashMap<String, RoleDefinition>,
    ancestry: HashMap<String, BTreeSet<String>>,
    default_role: String,
}

impl RoleGraph {
    pub fn new(definitions: Vec<RoleDefinition>, default_role: &str) -> Self {
        let roles: HashMap<String, RoleDefinition> = definitions
            .into_iter()
            .map(|def| (def.id.clone(), def))
            .collect();

        let mut ancestry = HashMap::new();
        for id in roles.keys() {
            let mut visited = BTreeSet::new();
            let mut resolved = BTreeSet::new();
            collect_ancestors(&roles, id, &mut visited, &mut resolved);
            ancestry.insert(id.clone(), resolved);
        }

        Self {
            roles,
            ancestry,
            default_role: default_role.to_string(),
        }
    }

    /// The role set shipped with the engine. Finance and manager share a rank
    /// on purpose: they are parallel branches under admin.
    pub fn builtin() -> Self {
        Self::new(
            vec![
                RoleDefinition::new("viewer", "Observer", &[], &["read"], 0),
                RoleDefinition::new(
                    "user",
                    "Operations Specialist",
                    &["viewer"],
                    &["read", "create", "update"],
                    1,
                ),
                RoleDefinition::new(
                    "approver",
                    "Approval Officer",
                    &["user"],
                    &["read", "create", "update", "approve"],
                    2,
                ),
                RoleDefinition::new(
                    "finance",
                    "Finance Controller",
                    &["approver"],
                    &["read", "create", "update", "approve", "finance-approve"],
                    3,
                ),
                RoleDefinition::new(
                    "manager",
                    "Unit Manager",
                    &["approver"],
                    &["read", "create", "update", "approve", "delegate"],
                    3,
                ),
                RoleDefinition::new(
                    "admin",
                    "System Administrator",
                    &["manager", "finance"],
                    &["read", "create", "update", "approve", "delegate", "admin"],
                    4,
                ),
            ],
            DEFAULT_ROLE,
        )
    }

    pub fn definition(&self, role: &str) -> Option<&RoleDefinition> {
        self.roles.get(role)
    }

    /// All ancestor role ids reachable via `inherits`. Unknown roles resolve
    /// to an empty set rather than an error.
    pub fn inherited(&self, role: &str) -> BTreeSet<String> {
        self.ancestry.get(role).cloned().unwrap_or_default()
    }

    /// Whether `subject` satisfies `required`, first through the inheritance
    /// closure, then by comparing numeric ranks.
    ///
    /// The rank fallback means two unrelated roles of equal rank satisfy each
    /// other in both directions. Callers depend on that, so it stays.
    pub fn is_at_least(&self, subject: &str, required: Option<&str>) -> bool {
        let Some(required) = required else {
            return true;
        };
        if subject.is_empty() {
            return false;
        }
        if subject == required {
            return true;
        }
        let Some(subject_def) = self.roles.get(subject) else {
            return false;
        };
        if let Some(ancestors) = self.ancestry.get(subject) {
            if ancestors.contains(required) {
                return true;
            }
        }
        match self.roles.get(required) {
            Some(required_def) => subject_def.rank >= required_def.rank,
            None => false,
        }
    }

    /// Map arbitrary input onto a known role id, falling back to the default.
    pub fn normalise(&self, role: Option<&str>) -> String {
        let key = role.unwrap_or_default().trim().to_lowercase();
        if self.roles.contains_key(&key) {
            key
        } else {
            self.default_role.clone()
        }
    }

    /// Every configured role with its fully resolved ancestry.
    pub fn list(&self) -> Vec<(RoleDefinition, BTreeSet<String>)> {
        let mut out: Vec<_> = self
            .roles
            .values()
            .map(|def| (def.clone(), self.inherited(&def.id)))
            .collect();
        out.sort_by(|a, b| a.0.rank.cmp(&b.0.rank).then_with(|| a.0.id.cmp(&b.0.id)));
        out
    }
}

// Depth-first walk over `inherits`, never revisiting a role, so a cycle in
// the configuration degrades to a truncated closure instead of a hang.
fn collect_ancestors(
    roles: &HashMap<String, RoleDefinition>,
    role: &str,
    visited: &mut BTreeSet<String>,
    resolved: &mut BTreeSet<String>,
) {
    let Some(definition) = roles.get(role) else {
        return;
    };
    if !visited.insert(role.to_string()) {
        return;
    }
    for parent in &definition.inherits {
        resolved.insert(parent.clone());
        collect_ancestors(roles, parent, visited, resolved);
    }
}
