//! Role-to-permission resolution.
//!
//! # Purpose and responsibility
//! Computes the effective permission set for an authenticated caller from its
//! roles, optional direct token permissions, and the configuration-supplied
//! custom role mapping.
//!
//! # Key invariants and assumptions
//! - Resolution is deterministic and side-effect free for a given input.
//! - Direct permissions are the complete grant when present; roles are ignored.
//! - A custom role entry fully shadows the built-in role of the same name.
//!
//! # Security considerations
//! - Built-in grants are predicates over the requested scope, so `write` can
//!   never be widened to cover `:admin` actions by accident.
use std::collections::{BTreeSet, HashMap};

/// Built-in role names recognized without configuration.
pub const ROLE_READ: &str = "read";
pub const ROLE_WRITE: &str = "write";
pub const ROLE_ADMIN: &str = "admin";

/// Matches a permission pattern against a concrete `domain:action` scope.
///
/// Patterns use `*` segments the way broker permissions do: `*` alone grants
/// everything, `*:read` grants the read action in every domain, and a literal
/// pattern grants exactly itself.
pub fn scope_match(pattern: &str, scope: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match (pattern.split_once(':'), scope.split_once(':')) {
        (Some((p_domain, p_action)), Some((s_domain, s_action))) => {
            (p_domain == "*" || p_domain == s_domain) && (p_action == "*" || p_action == s_action)
        }
        _ => pattern == scope,
    }
}

/// Immutable role mapping built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct RoleMapping {
    custom: HashMap<String, Vec<String>>,
}

impl RoleMapping {
    pub fn new(custom: HashMap<String, Vec<String>>) -> Self {
        Self { custom }
    }

    /// Resolve the effective permission patterns for a caller.
    ///
    /// Non-empty `direct` permissions are the complete grant and role-derived
    /// permissions are ignored entirely; direct permissions narrow, never
    /// widen. Otherwise the result is the union over `roles` of the custom
    /// mapping (when the role name is overridden) else the built-in expansion.
    /// Unknown roles contribute nothing.
    pub fn resolve(&self, roles: &[String], direct: &[String]) -> BTreeSet<String> {
        if !direct.is_empty() {
            return direct.iter().cloned().collect();
        }
        let mut effective = BTreeSet::new();
        for role in roles {
            if let Some(patterns) = self.custom.get(role) {
                effective.extend(patterns.iter().cloned());
                continue;
            }
            match role.as_str() {
                ROLE_ADMIN => {
                    effective.insert("*".to_string());
                }
                ROLE_WRITE => {
                    effective.insert("*:read".to_string());
                    effective.insert("*:write".to_string());
                }
                ROLE_READ => {
                    effective.insert("*:read".to_string());
                }
                _ => {}
            }
        }
        effective
    }

    /// True when the effective set grants at least one of the required scopes.
    ///
    /// An empty required list means the route is public within authentication
    /// and always passes. An empty effective set denies everything else.
    pub fn allows(effective: &BTreeSet<String>, required: &[&str]) -> bool {
        if required.is_empty() {
            return true;
        }
        required
            .iter()
            .any(|scope| effective.iter().any(|pattern| scope_match(pattern, scope)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn admin_resolves_every_scope() {
        let mapping = RoleMapping::default();
        let effective = mapping.resolve(&roles(&["admin"]), &[]);
        for scope in ["system:read", "network:write", "jobs:admin", "health:read"] {
            assert!(RoleMapping::allows(&effective, &[scope]), "{scope}");
        }
    }

    #[test]
    fn write_resolves_read_and_write_but_not_admin_actions() {
        let mapping = RoleMapping::default();
        let effective = mapping.resolve(&roles(&["write"]), &[]);
        assert!(RoleMapping::allows(&effective, &["system:read"]));
        assert!(RoleMapping::allows(&effective, &["network:write"]));
        assert!(!RoleMapping::allows(&effective, &["jobs:admin"]));
    }

    #[test]
    fn read_resolves_only_read_scopes() {
        let mapping = RoleMapping::default();
        let effective = mapping.resolve(&roles(&["read"]), &[]);
        assert!(RoleMapping::allows(&effective, &["system:read"]));
        assert!(!RoleMapping::allows(&effective, &["system:write"]));
        assert!(!RoleMapping::allows(&effective, &["network:write"]));
    }

    #[test]
    fn unknown_roles_resolve_nothing() {
        let mapping = RoleMapping::default();
        let effective = mapping.resolve(&roles(&["viewer", "ops"]), &[]);
        assert!(effective.is_empty());
        assert!(!RoleMapping::allows(&effective, &["system:read"]));
    }

    #[test]
    fn empty_roles_and_empty_required_scope() {
        let mapping = RoleMapping::default();
        let effective = mapping.resolve(&[], &[]);
        assert!(effective.is_empty());
        // Public-within-auth routes pass with no grants at all.
        assert!(RoleMapping::allows(&effective, &[]));
        assert!(!RoleMapping::allows(&effective, &["system:read"]));
    }

    #[test]
    fn direct_permissions_narrow_role_grants() {
        let mapping = RoleMapping::default();
        let direct = vec!["health:read".to_string()];
        let effective = mapping.resolve(&roles(&["admin"]), &direct);
        assert!(RoleMapping::allows(&effective, &["health:read"]));
        // The admin role must be ignored once direct permissions are present.
        assert!(!RoleMapping::allows(&effective, &["system:read"]));
    }

    #[test]
    fn custom_role_shadows_builtin() {
        let mut custom = HashMap::new();
        custom.insert("read".to_string(), vec!["health:read".to_string()]);
        let mapping = RoleMapping::new(custom);
        let effective = mapping.resolve(&roles(&["read"]), &[]);
        assert!(RoleMapping::allows(&effective, &["health:read"]));
        assert!(!RoleMapping::allows(&effective, &["system:read"]));
    }

    #[test]
    fn custom_role_adds_new_name() {
        let mut custom = HashMap::new();
        custom.insert(
            "network-operator".to_string(),
            vec!["network:read".to_string(), "network:write".to_string()],
        );
        let mapping = RoleMapping::new(custom);
        let effective = mapping.resolve(&roles(&["network-operator"]), &[]);
        assert!(RoleMapping::allows(&effective, &["network:write"]));
        assert!(!RoleMapping::allows(&effective, &["system:read"]));
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut custom = HashMap::new();
        custom.insert("ops".to_string(), vec!["jobs:read".to_string()]);
        let mapping = RoleMapping::new(custom);
        let input = roles(&["ops", "read"]);
        let first = mapping.resolve(&input, &[]);
        let second = mapping.resolve(&input, &[]);
        assert_eq!(first, second);
    }

    #[test]
    fn scope_match_patterns() {
        assert!(scope_match("*", "anything:at-all"));
        assert!(scope_match("*:read", "system:read"));
        assert!(!scope_match("*:read", "system:write"));
        assert!(scope_match("network:*", "network:write"));
        assert!(scope_match("system:read", "system:read"));
        assert!(!scope_match("system:read", "system:reader"));
    }
}
