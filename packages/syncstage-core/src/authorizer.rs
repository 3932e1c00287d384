//! Authorizer (C4): role definitions, role→subject bindings, and
//! permission checks.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::protocol::ConnectionId;

/// A named permission set.
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub permissions: HashSet<String>,
}

impl Role {
    pub fn new(name: impl Into<String>, permissions: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Ties a `Role` to the set of subjects (connection ids) holding it.
#[derive(Debug, Clone)]
pub struct Binding {
    pub role: Role,
    pub subjects: HashSet<ConnectionId>,
}

/// Role definitions and role→subject bindings.
///
/// An authorizer with no bindings at all is permissive by default — every
/// `check` succeeds — matching the expectation that rooms run fine with no
/// role setup, since there is no authentication in scope. Once any binding
/// exists, checks become deny-by-default: a subject must hold a binding
/// whose role grants the requested permission.
#[derive(Default)]
pub struct Authorizer {
    bindings: Mutex<Vec<Binding>>,
}

impl Authorizer {
    pub fn new() -> Self {
        Self {
            bindings: Mutex::new(Vec::new()),
        }
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.bindings.lock().clone()
    }

    pub fn add_binding(&self, role: Role, subject: ConnectionId) {
        let mut bindings = self.bindings.lock();
        if let Some(existing) = bindings.iter_mut().find(|b| b.role.name == role.name) {
            existing.subjects.insert(subject);
        } else {
            let mut subjects = HashSet::new();
            subjects.insert(subject);
            bindings.push(Binding { role, subjects });
        }
    }

    /// Removes `subject` from every binding. Required on client disconnect.
    pub fn remove_subject(&self, subject: ConnectionId) {
        let mut bindings = self.bindings.lock();
        for binding in bindings.iter_mut() {
            binding.subjects.remove(&subject);
        }
    }

    pub fn check(&self, subject: ConnectionId, permission: &str) -> bool {
        let bindings = self.bindings.lock();
        if bindings.is_empty() {
            return true;
        }
        bindings
            .iter()
            .any(|b| b.subjects.contains(&subject) && b.role.grants(permission))
    }

    /// Names of every role bound to `subject`, for `userlist` responses.
    pub fn roles_for(&self, subject: ConnectionId) -> Vec<String> {
        self.bindings
            .lock()
            .iter()
            .filter(|b| b.subjects.contains(&subject))
            .map(|b| b.role.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_by_default_with_no_bindings() {
        let auth = Authorizer::new();
        assert!(auth.check(ConnectionId(1), "anything"));
    }

    #[test]
    fn strict_once_any_binding_exists() {
        let auth = Authorizer::new();
        auth.add_binding(Role::new("mod", ["queue.skip"]), ConnectionId(1));
        assert!(auth.check(ConnectionId(1), "queue.skip"));
        assert!(!auth.check(ConnectionId(1), "other.permission"));
        assert!(!auth.check(ConnectionId(2), "queue.skip"));
    }

    #[test]
    fn disconnect_removes_subject_from_every_binding() {
        let auth = Authorizer::new();
        auth.add_binding(Role::new("mod", ["a"]), ConnectionId(1));
        auth.add_binding(Role::new("admin", ["b"]), ConnectionId(1));
        auth.remove_subject(ConnectionId(1));
        for binding in auth.bindings() {
            assert!(!binding.subjects.contains(&ConnectionId(1)));
        }
    }

    #[test]
    fn roles_for_lists_every_bound_role_name() {
        let auth = Authorizer::new();
        auth.add_binding(Role::new("mod", ["a"]), ConnectionId(1));
        auth.add_binding(Role::new("admin", ["b"]), ConnectionId(1));
        let mut roles = auth.roles_for(ConnectionId(1));
        roles.sort();
        assert_eq!(roles, vec!["admin".to_string(), "mod".to_string()]);
        assert!(auth.roles_for(ConnectionId(2)).is_empty());
    }

    #[test]
    fn adding_binding_twice_for_same_role_merges_subjects() {
        let auth = Authorizer::new();
        auth.add_binding(Role::new("mod", ["a"]), ConnectionId(1));
        auth.add_binding(Role::new("mod", ["a"]), ConnectionId(2));
        assert_eq!(auth.bindings().len(), 1);
        assert_eq!(auth.bindings()[0].subjects.len(), 2);
    }
}
