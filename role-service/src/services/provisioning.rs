//! User provisioning policies built on [`RoleAssigner`]: creation with an
//! initial role set, full role rewrite, incremental role addition and the
//! delegation query.

use std::sync::Arc;

use crate::models::{compose, CompositeRole, NewUser, ProviderRole, ProviderUser, ROLE_SEPARATOR};
use crate::services::assignment::{into_error_list, partition_roles, RoleAssigner};
use crate::services::catalog::{division_of, DELEGATION_RULES};
use crate::services::directory::prefix_range;
use crate::services::metrics::record_role_error;
use crate::services::provider::IdentityProvider;
use crate::services::{ProviderError, RoleError};

/// Merge requested roles with the held roles that share a prefix with any of
/// them, so the combined set is validated as a whole.
///
/// `held` must be sorted by name. Requested roles are sorted first so both
/// lists can be walked once, each lookup starting where the previous one
/// ended. Malformed requested roles are carried through untouched.
pub fn merge_with_held(requested: &[String], held: &[ProviderRole]) -> Vec<String> {
    let mut sorted = requested.to_vec();
    sorted.sort();

    let mut merged = sorted.clone();
    let mut start = 0;
    let mut previous: Option<&str> = None;

    for role in &sorted {
        let Some((prefix, _)) = role.split_once(ROLE_SEPARATOR) else {
            continue;
        };
        if previous == Some(prefix) {
            continue;
        }
        previous = Some(prefix);

        let range = prefix_range(held, start, prefix);
        start = range.end;
        merged.extend(held[range].iter().map(|r| r.name.clone()));
    }

    merged
}

/// Outcome of a delegation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub allowed: bool,
    /// Function that granted or limited the decision, if the requester holds one.
    pub grantor: Option<&'static str>,
}

/// Whether a requester holding `held` (sorted by name) may create `target`.
///
/// Only roles under the target's prefix count. A requester with no grantor
/// role there, including one with no roles at all under the prefix, is
/// denied, as is any target function outside the catalog.
pub fn delegation_for(held: &[ProviderRole], target: &CompositeRole) -> Delegation {
    let in_unit = &held[prefix_range(held, 0, target.prefix())];
    let holds = |function: &str| {
        let name = compose(target.prefix(), function);
        in_unit.iter().any(|role| role.name == name)
    };

    let Some(rule) = DELEGATION_RULES.iter().find(|rule| holds(rule.grantor)) else {
        return Delegation {
            allowed: false,
            grantor: None,
        };
    };

    let known = division_of(target.function()).is_some();
    Delegation {
        allowed: known && !rule.denied.iter().any(|f| *f == target.function()),
        grantor: Some(rule.grantor),
    }
}

#[derive(Clone)]
pub struct ProvisioningService {
    provider: Arc<dyn IdentityProvider>,
    assigner: RoleAssigner,
}

impl ProvisioningService {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            assigner: RoleAssigner::new(provider.clone()),
            provider,
        }
    }

    /// Create a user and, when roles are given, assign them.
    ///
    /// Role failures do not undo the creation; they are returned alongside.
    #[tracing::instrument(skip(self, user, roles), fields(email = %user.email))]
    pub async fn create_user(
        &self,
        user: NewUser,
        roles: &[String],
    ) -> Result<(ProviderUser, Vec<RoleError>), ProviderError> {
        let created = self.provider.create_user(&user).await?;
        tracing::info!(user_id = %created.id, "User created");

        let errors = if roles.is_empty() {
            Vec::new()
        } else {
            into_error_list(self.assigner.assign_all(&created.id, roles).await)
        };

        Ok((created, errors))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, user_id: &str) -> Result<(), ProviderError> {
        self.provider.delete_user(user_id).await?;
        tracing::info!("User deleted");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<ProviderUser>, ProviderError> {
        self.provider.list_users().await
    }

    /// Replace every role the user holds with `roles`.
    ///
    /// A malformed entry is reported before anything is removed, so the user
    /// keeps their current roles.
    #[tracing::instrument(skip(self, roles), fields(role_count = roles.len()))]
    pub async fn rewrite_roles(
        &self,
        user_id: &str,
        roles: &[String],
    ) -> Result<Vec<RoleError>, ProviderError> {
        if let Err(e) = partition_roles(roles) {
            record_role_error(e.kind());
            tracing::warn!(error = %e, "Rejected role list, current roles kept");
            return Ok(vec![e]);
        }

        let current = self.provider.user_roles(user_id).await?;
        if !current.is_empty() {
            let ids: Vec<String> = current.into_iter().map(|r| r.id).collect();
            self.provider.remove_roles(user_id, &ids).await?;
            tracing::info!(removed = ids.len(), "Removed current roles");
        }

        Ok(into_error_list(self.assigner.assign_all(user_id, roles).await))
    }

    /// Add `roles` on top of what the user already holds.
    ///
    /// Held roles under the requested prefixes are re-validated together with
    /// the new ones, so additions can never break the division rules.
    #[tracing::instrument(skip(self, roles), fields(role_count = roles.len()))]
    pub async fn add_roles(
        &self,
        user_id: &str,
        roles: &[String],
    ) -> Result<Vec<RoleError>, ProviderError> {
        let held = self.provider.user_roles(user_id).await?;
        let merged = merge_with_held(roles, &held);
        tracing::debug!(merged = merged.len(), "Merged with held roles");

        Ok(into_error_list(self.assigner.assign_all(user_id, &merged).await))
    }

    /// Delegation check: may `assigner_uid` create `create_role`?
    #[tracing::instrument(skip(self))]
    pub async fn can_create_role(
        &self,
        assigner_uid: &str,
        create_role: &str,
    ) -> Result<Delegation, RoleError> {
        let target = CompositeRole::parse(create_role)?;
        let held = self.provider.user_roles(assigner_uid).await?;
        let decision = delegation_for(&held, &target);
        tracing::info!(
            allowed = decision.allowed,
            grantor = decision.grantor.unwrap_or("-"),
            "Delegation evaluated"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Password;
    use crate::services::provider::{MockIdentityProvider, ProviderOperation};

    fn roles(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn held(names: &[&str]) -> Vec<ProviderRole> {
        let mut held: Vec<ProviderRole> = names
            .iter()
            .enumerate()
            .map(|(i, name)| ProviderRole {
                id: format!("r{}", i),
                name: name.to_string(),
                description: None,
            })
            .collect();
        held.sort_by(|a, b| a.name.cmp(&b.name));
        held
    }

    fn setup() -> (Arc<MockIdentityProvider>, ProvisioningService, String) {
        let provider = Arc::new(MockIdentityProvider::with_catalog_roles(&["A1", "A2", "A3"]));
        let user_id = provider.insert_user("user@example.com");
        let service = ProvisioningService::new(provider.clone());
        (provider, service, user_id)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password: Password::new("Test123!".to_string()),
        }
    }

    #[test]
    fn test_merge_pulls_held_roles_for_requested_prefixes() {
        let held = held(&["A1:Admin PPE", "A1:Helpdesk", "A2:PP", "A3:Auditor"]);
        let mut merged = merge_with_held(&roles(&["A2:KUPBJ", "A1:Verifikator"]), &held);
        merged.sort();
        assert_eq!(
            merged,
            vec![
                "A1:Admin PPE",
                "A1:Helpdesk",
                "A1:Verifikator",
                "A2:KUPBJ",
                "A2:PP"
            ]
        );
    }

    #[test]
    fn test_merge_handles_prefixes_sharing_leading_chars() {
        let held = held(&["A1:PP", "A10:Auditor", "A100:PPK"]);
        let mut merged = merge_with_held(&roles(&["A1:KUPBJ", "A10:Auditor"]), &held);
        merged.sort();
        assert_eq!(
            merged,
            vec!["A10:Auditor", "A10:Auditor", "A1:KUPBJ", "A1:PP"]
        );
    }

    #[test]
    fn test_merge_skips_malformed_requests() {
        let held = held(&["A1:PP"]);
        let merged = merge_with_held(&roles(&["PPK", "A1:KUPBJ"]), &held);
        assert!(merged.contains(&"PPK".to_string()));
        assert!(merged.contains(&"A1:PP".to_string()));
    }

    #[test]
    fn test_delegation_table() {
        let target = |raw: &str| CompositeRole::parse(raw).unwrap();
        let ppe = held(&["A1:Admin PPE"]);
        assert!(delegation_for(&ppe, &target("A1:Admin Agency")).allowed);
        assert!(delegation_for(&ppe, &target("A1:PPK")).allowed);
        assert!(!delegation_for(&ppe, &target("A1:Admin PPE")).allowed);
        assert!(!delegation_for(&ppe, &target("A1:Auditor")).allowed);

        let agency = held(&["A1:Admin Agency", "A1:Helpdesk"]);
        assert!(delegation_for(&agency, &target("A1:Verifikator")).allowed);
        assert!(!delegation_for(&agency, &target("A1:Admin Agency")).allowed);
        assert!(!delegation_for(&agency, &target("A1:Admin PPE")).allowed);
        assert!(!delegation_for(&agency, &target("A1:Auditor")).allowed);

        let both = held(&["A1:Admin Agency", "A1:Admin PPE"]);
        let decision = delegation_for(&both, &target("A1:Admin Agency"));
        assert!(decision.allowed);
        assert_eq!(decision.grantor, Some("Admin PPE"));
    }

    #[test]
    fn test_delegation_is_scoped_to_prefix() {
        let target = |raw: &str| CompositeRole::parse(raw).unwrap();
        let ppe = held(&["A1:Admin PPE", "A2:PP"]);
        assert!(!delegation_for(&ppe, &target("A2:KUPBJ")).allowed);
        assert!(!delegation_for(&ppe, &target("A10:KUPBJ")).allowed);
        assert_eq!(delegation_for(&[], &target("A1:PP")).grantor, None);
        assert!(!delegation_for(&ppe, &target("A1:Admin PP")).allowed);
    }

    #[tokio::test]
    async fn test_create_user_with_roles_reports_partition_errors() {
        let (provider, service, _) = setup();
        let (user, errors) = service
            .create_user(
                new_user("new@example.com"),
                &roles(&["A2:PPK", "A2:KUPBJ", "A2:Admin PPE", "A1:Admin PPE"]),
            )
            .await
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert!(provider.has_user(&user.id));
        assert_eq!(provider.user_role_names(&user.id), vec!["A1:Admin PPE"]);
    }

    #[tokio::test]
    async fn test_create_user_without_roles_skips_assignment() {
        let (provider, service, _) = setup();
        let (user, errors) = service
            .create_user(new_user("new@example.com"), &[])
            .await
            .unwrap();

        assert!(errors.is_empty());
        assert!(provider.user_role_names(&user.id).is_empty());
        assert_eq!(provider.call_count(ProviderOperation::ListRoles), 0);
    }

    #[tokio::test]
    async fn test_rewrite_replaces_roles() {
        let (provider, service, user) = setup();
        service
            .add_roles(&user, &roles(&["A1:Admin PPE", "A2:PP"]))
            .await
            .unwrap();

        let errors = service
            .rewrite_roles(&user, &roles(&["A2:PPK", "A3:Auditor"]))
            .await
            .unwrap();

        assert!(errors.is_empty());
        assert_eq!(
            provider.user_role_names(&user),
            vec!["A2:PPK", "A3:Auditor"]
        );
    }

    #[tokio::test]
    async fn test_rewrite_with_empty_holdings_skips_removal() {
        let (provider, service, user) = setup();
        service
            .rewrite_roles(&user, &roles(&["A1:PP"]))
            .await
            .unwrap();
        assert_eq!(provider.call_count(ProviderOperation::RemoveRoles), 0);
    }

    #[tokio::test]
    async fn test_rewrite_with_malformed_role_keeps_current_roles() {
        let (provider, service, user) = setup();
        service
            .add_roles(&user, &roles(&["A1:Admin PPE", "A2:PP"]))
            .await
            .unwrap();

        let errors = service
            .rewrite_roles(&user, &roles(&["A1:Helpdesk", "A2PPK"]))
            .await
            .unwrap();

        assert!(matches!(errors[..], [RoleError::MalformedRole(_)]));
        assert_eq!(provider.user_role_names(&user), vec!["A1:Admin PPE", "A2:PP"]);
        assert_eq!(provider.call_count(ProviderOperation::UserRoles), 1);
        assert_eq!(provider.call_count(ProviderOperation::RemoveRoles), 0);
    }

    #[tokio::test]
    async fn test_rewrite_fails_when_current_roles_unavailable() {
        let (provider, service, user) = setup();
        provider.fail_on(ProviderOperation::UserRoles);
        assert!(service.rewrite_roles(&user, &roles(&["A1:PP"])).await.is_err());
        assert_eq!(provider.call_count(ProviderOperation::AssignRoles), 0);
    }

    #[tokio::test]
    async fn test_incremental_add_sequence() {
        let (provider, service, user) = setup();
        let pengelola = ["A1:Admin Agency", "A1:Admin PPE", "A1:Helpdesk", "A1:Verifikator"];

        let errors = service.add_roles(&user, &roles(&pengelola)).await.unwrap();
        assert!(errors.is_empty());
        assert_eq!(provider.user_role_names(&user), pengelola.to_vec());

        let errors = service.add_roles(&user, &roles(&["A1:Admin PP"])).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(provider.user_role_names(&user), pengelola.to_vec());

        service.add_roles(&user, &roles(&["A2:PP"])).await.unwrap();
        service.add_roles(&user, &roles(&["A2:KUPBJ"])).await.unwrap();
        let mut expected: Vec<&str> = pengelola.to_vec();
        expected.extend(["A2:KUPBJ", "A2:PP"]);
        assert_eq!(provider.user_role_names(&user), expected);

        let errors = service.add_roles(&user, &roles(&["A2:PPK"])).await.unwrap();
        assert!(matches!(errors[..], [RoleError::Exclusivity { .. }]));
        let errors = service.add_roles(&user, &roles(&["A2:Auditor"])).await.unwrap();
        assert!(matches!(errors[..], [RoleError::CrossDivision { .. }]));
        assert_eq!(provider.user_role_names(&user), expected);

        let errors = service.add_roles(&user, &roles(&["A3:Auditor"])).await.unwrap();
        assert!(errors.is_empty());
        expected.push("A3:Auditor");
        assert_eq!(provider.user_role_names(&user), expected);
    }

    #[tokio::test]
    async fn test_can_create_role() {
        let (provider, service, user) = setup();
        service
            .add_roles(&user, &roles(&["A1:Admin Agency"]))
            .await
            .unwrap();

        assert!(service.can_create_role(&user, "A1:PPK").await.unwrap().allowed);
        assert!(!service.can_create_role(&user, "A1:Admin Agency").await.unwrap().allowed);
        assert!(!service.can_create_role(&user, "A2:PPK").await.unwrap().allowed);
        assert!(matches!(
            service.can_create_role(&user, "PPK").await,
            Err(RoleError::MalformedRole(_))
        ));

        provider.fail_on(ProviderOperation::UserRoles);
        assert!(matches!(
            service.can_create_role(&user, "A1:PPK").await,
            Err(RoleError::Provider(_))
        ));
    }
}
