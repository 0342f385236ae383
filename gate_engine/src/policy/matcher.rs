use std::collections::HashSet;

use crate::db_types::{HttpMethod, PolicyRule, RoleId};

/// Evaluates `(role, permission name, method)` requests against a set of policy rules.
///
/// Matching is exact on all three fields: `r.sub == p.sub && r.obj == p.obj && r.act == p.act`. There are no
/// wildcards and no role inheritance, so the matcher can only ever agree with the join table.
#[derive(Debug, Clone, Default)]
pub struct PolicyMatcher {
    rules: HashSet<(RoleId, String, HttpMethod)>,
}

impl PolicyMatcher {
    pub fn new(rules: &[PolicyRule]) -> Self {
        let rules = rules.iter().map(|r| (r.role_id, r.permission_name.clone(), r.method)).collect();
        Self { rules }
    }

    pub fn enforce(&self, role: &RoleId, permission_name: &str, method: HttpMethod) -> bool {
        self.rules.contains(&(*role, permission_name.to_string(), method))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
