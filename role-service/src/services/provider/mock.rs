use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::IdentityProvider;
use crate::models::{compose, NewUser, ProviderRole, ProviderUser};
use crate::services::catalog::Division;
use crate::services::ProviderError;

/// Provider calls, for failure injection and call assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOperation {
    CreateUser,
    DeleteUser,
    ListUsers,
    ListRoles,
    ReadRole,
    AssignRoles,
    UserRoles,
    RemoveRoles,
    HealthCheck,
}

#[derive(Debug)]
struct MockUser {
    email: String,
    role_ids: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct MockState {
    users: BTreeMap<String, MockUser>,
    roles: Vec<ProviderRole>,
    failing: HashSet<ProviderOperation>,
    failing_role_ids: HashSet<String>,
    failing_reads: HashSet<String>,
    calls: Vec<ProviderOperation>,
    next_id: u64,
}

impl MockState {
    fn enter(&mut self, op: ProviderOperation) -> Result<(), ProviderError> {
        self.calls.push(op);
        if self.failing.contains(&op) {
            return Err(ProviderError::Unavailable(format!(
                "injected failure for {:?}",
                op
            )));
        }
        Ok(())
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn role_names(&self, role_ids: &BTreeSet<String>) -> Vec<ProviderRole> {
        // `roles` is kept sorted, so filtering preserves name order.
        self.roles
            .iter()
            .filter(|role| role_ids.contains(&role.id))
            .cloned()
            .collect()
    }
}

/// In-memory identity provider for tests and local development.
#[derive(Debug, Default)]
pub struct MockIdentityProvider {
    state: Mutex<MockState>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider seeded with every catalog function under each prefix.
    pub fn with_catalog_roles(prefixes: &[&str]) -> Self {
        let provider = Self::new();
        for prefix in prefixes {
            for division in Division::ALL {
                for function in division.functions() {
                    provider.add_role(&compose(prefix, function));
                }
            }
        }
        provider
    }

    fn guard(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a role and return its id. Existing names keep their id.
    pub fn add_role(&self, name: &str) -> String {
        let mut state = self.guard();
        if let Some(existing) = state.roles.iter().find(|r| r.name == name) {
            return existing.id.clone();
        }
        let id = format!("rol_{:016x}", state.next_id());
        let position = state.roles.partition_point(|r| r.name.as_str() < name);
        state.roles.insert(
            position,
            ProviderRole {
                id: id.clone(),
                name: name.to_string(),
                description: Some("Placeholder Description".to_string()),
            },
        );
        id
    }

    pub fn role_id(&self, name: &str) -> Option<String> {
        self.guard()
            .roles
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.id.clone())
    }

    /// Create a user directly, bypassing failure injection.
    pub fn insert_user(&self, email: &str) -> String {
        let mut state = self.guard();
        let id = format!("auth0|{:024x}", state.next_id());
        state.users.insert(
            id.clone(),
            MockUser {
                email: email.to_string(),
                role_ids: BTreeSet::new(),
            },
        );
        id
    }

    /// Names of the roles a user holds, sorted.
    pub fn user_role_names(&self, user_id: &str) -> Vec<String> {
        let state = self.guard();
        state
            .users
            .get(user_id)
            .map(|user| {
                state
                    .role_names(&user.role_ids)
                    .into_iter()
                    .map(|r| r.name)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_user(&self, user_id: &str) -> bool {
        self.guard().users.contains_key(user_id)
    }

    /// Make every subsequent call of `op` fail.
    pub fn fail_on(&self, op: ProviderOperation) {
        self.guard().failing.insert(op);
    }

    pub fn clear_failures(&self) {
        let mut state = self.guard();
        state.failing.clear();
        state.failing_role_ids.clear();
        state.failing_reads.clear();
    }

    /// Make reads of the named role fail.
    pub fn fail_read_of(&self, role_name: &str) {
        if let Some(id) = self.role_id(role_name) {
            self.guard().failing_reads.insert(id);
        }
    }

    /// Make any assignment that includes the named role fail.
    pub fn fail_assignment_of(&self, role_name: &str) {
        if let Some(id) = self.role_id(role_name) {
            self.guard().failing_role_ids.insert(id);
        }
    }

    pub fn calls(&self) -> Vec<ProviderOperation> {
        self.guard().calls.clone()
    }

    pub fn call_count(&self, op: ProviderOperation) -> usize {
        self.guard().calls.iter().filter(|c| **c == op).count()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn create_user(&self, user: &NewUser) -> Result<ProviderUser, ProviderError> {
        let mut state = self.guard();
        state.enter(ProviderOperation::CreateUser)?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(ProviderError::Conflict("The user already exists.".to_string()));
        }
        let id = format!("auth0|{:024x}", state.next_id());
        state.users.insert(
            id.clone(),
            MockUser {
                email: user.email.clone(),
                role_ids: BTreeSet::new(),
            },
        );
        Ok(ProviderUser {
            id,
            email: user.email.clone(),
        })
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ProviderError> {
        let mut state = self.guard();
        state.enter(ProviderOperation::DeleteUser)?;
        // Deleting an unknown user succeeds, as it does upstream.
        state.users.remove(user_id);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<ProviderUser>, ProviderError> {
        let mut state = self.guard();
        state.enter(ProviderOperation::ListUsers)?;
        Ok(state
            .users
            .iter()
            .map(|(id, user)| ProviderUser {
                id: id.clone(),
                email: user.email.clone(),
            })
            .collect())
    }

    async fn list_roles(&self) -> Result<Vec<ProviderRole>, ProviderError> {
        let mut state = self.guard();
        state.enter(ProviderOperation::ListRoles)?;
        Ok(state.roles.clone())
    }

    async fn read_role(&self, role_id: &str) -> Result<ProviderRole, ProviderError> {
        let mut state = self.guard();
        state.enter(ProviderOperation::ReadRole)?;
        if state.failing_reads.contains(role_id) {
            return Err(ProviderError::Api {
                status: 500,
                message: format!("injected read failure for {}", role_id),
            });
        }
        state
            .roles
            .iter()
            .find(|r| r.id == role_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("Role {} not found", role_id)))
    }

    async fn assign_roles(&self, user_id: &str, role_ids: &[String]) -> Result<(), ProviderError> {
        let mut state = self.guard();
        state.enter(ProviderOperation::AssignRoles)?;
        if let Some(id) = role_ids.iter().find(|id| state.failing_role_ids.contains(*id)) {
            return Err(ProviderError::Api {
                status: 500,
                message: format!("injected assignment failure for {}", id),
            });
        }
        if let Some(id) = role_ids
            .iter()
            .find(|id| !state.roles.iter().any(|r| &r.id == *id))
        {
            return Err(ProviderError::NotFound(format!("Role {} not found", id)));
        }
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| ProviderError::NotFound(format!("User {} not found", user_id)))?;
        user.role_ids.extend(role_ids.iter().cloned());
        Ok(())
    }

    async fn user_roles(&self, user_id: &str) -> Result<Vec<ProviderRole>, ProviderError> {
        let mut state = self.guard();
        state.enter(ProviderOperation::UserRoles)?;
        let user = state
            .users
            .get(user_id)
            .ok_or_else(|| ProviderError::NotFound(format!("User {} not found", user_id)))?;
        Ok(state.role_names(&user.role_ids))
    }

    async fn remove_roles(&self, user_id: &str, role_ids: &[String]) -> Result<(), ProviderError> {
        let mut state = self.guard();
        state.enter(ProviderOperation::RemoveRoles)?;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| ProviderError::NotFound(format!("User {} not found", user_id)))?;
        for id in role_ids {
            user.role_ids.remove(id);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.guard().enter(ProviderOperation::HealthCheck)
    }
}
