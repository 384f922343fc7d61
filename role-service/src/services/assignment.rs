//! Role assignment across organizational units.
//!
//! A requested role list is split by prefix and every prefix is validated,
//! resolved and assigned on its own: a bad partition is reported and skipped
//! while the others still go through. A malformed role string is the
//! exception and aborts the whole call before anything reaches the provider.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::models::{compose, CompositeRole};
use crate::services::catalog::FunctionIndex;
use crate::services::directory::RoleDirectory;
use crate::services::metrics::{record_partition, record_role_error};
use crate::services::provider::IdentityProvider;
use crate::services::validator::validate;
use crate::services::RoleError;

/// Requested function names grouped by prefix, both in ascending order.
pub type Partitions = BTreeMap<String, BTreeSet<String>>;

/// Group composite roles by prefix. The first malformed entry fails the lot.
pub fn partition_roles(roles: &[String]) -> Result<Partitions, RoleError> {
    let mut partitions = Partitions::new();
    for raw in roles {
        let role = CompositeRole::parse(raw)?;
        partitions
            .entry(role.prefix().to_string())
            .or_default()
            .insert(role.function().to_string());
    }
    Ok(partitions)
}

/// Collapse the two failure tiers into the list reported to callers.
pub fn into_error_list(result: Result<Vec<RoleError>, RoleError>) -> Vec<RoleError> {
    match result {
        Ok(errors) => errors,
        Err(fatal) => vec![fatal],
    }
}

#[derive(Clone)]
pub struct RoleAssigner {
    provider: Arc<dyn IdentityProvider>,
    directory: RoleDirectory,
}

impl RoleAssigner {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            directory: RoleDirectory::new(provider.clone()),
            provider,
        }
    }

    /// Assign every requested role to the user.
    ///
    /// `Err` means nothing was attempted because an entry was malformed.
    /// `Ok` carries one error per failed partition; empty means full success.
    #[tracing::instrument(skip(self, roles), fields(role_count = roles.len()))]
    pub async fn assign_all(
        &self,
        user_id: &str,
        roles: &[String],
    ) -> Result<Vec<RoleError>, RoleError> {
        let partitions = partition_roles(roles).map_err(|e| {
            record_role_error(e.kind());
            tracing::warn!(error = %e, "Rejected role list");
            e
        })?;

        let mut errors = Vec::new();
        for (prefix, functions) in &partitions {
            match self.assign_partition(user_id, prefix, functions).await {
                Ok(assigned) => {
                    record_partition("assigned");
                    tracing::info!(prefix = %prefix, assigned, "Roles assigned");
                }
                Err(e) => {
                    record_partition("failed");
                    record_role_error(e.kind());
                    tracing::warn!(prefix = %prefix, error = %e, "Partition skipped");
                    errors.push(e);
                }
            }
        }

        Ok(errors)
    }

    async fn assign_partition(
        &self,
        user_id: &str,
        prefix: &str,
        functions: &BTreeSet<String>,
    ) -> Result<usize, RoleError> {
        let index = FunctionIndex::build();
        let functions: Vec<&str> = functions.iter().map(String::as_str).collect();
        validate(prefix, &functions, &index)?;

        let directory = self.directory.resolve(prefix).await?;

        let mut role_ids = Vec::with_capacity(functions.len());
        for function in &functions {
            let name = compose(prefix, function);
            let role_id = directory
                .get(&name)
                .ok_or_else(|| RoleError::UnresolvedRole(name.clone()))?;
            let role = self.provider.read_role(role_id).await?;
            role_ids.push(role.id);
        }

        if role_ids.is_empty() {
            return Ok(0);
        }

        self.provider.assign_roles(user_id, &role_ids).await?;
        Ok(role_ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::{MockIdentityProvider, ProviderOperation};

    fn roles(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn setup() -> (Arc<MockIdentityProvider>, RoleAssigner, String) {
        let provider = Arc::new(MockIdentityProvider::with_catalog_roles(&["A1", "A2", "A3"]));
        let user_id = provider.insert_user("user@example.com");
        let assigner = RoleAssigner::new(provider.clone());
        (provider, assigner, user_id)
    }

    #[test]
    fn test_partition_groups_by_prefix() {
        let partitions =
            partition_roles(&roles(&["A2:PP", "A1:Admin PPE", "A2:KUPBJ", "A2:PP"])).unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions["A1"].len(), 1);
        assert_eq!(
            partitions["A2"].iter().collect::<Vec<_>>(),
            vec!["KUPBJ", "PP"]
        );
    }

    #[test]
    fn test_partition_rejects_malformed_entry() {
        let err = partition_roles(&roles(&["A1:PP", "PPK"])).unwrap_err();
        assert_eq!(err.to_string(), "Role PPK is not in correct format");
    }

    #[tokio::test]
    async fn test_same_division_assigned() {
        let (provider, assigner, user) = setup();
        let errors = assigner
            .assign_all(&user, &roles(&["A1:Admin PPE", "A1:Admin Agency"]))
            .await
            .unwrap();

        assert!(errors.is_empty());
        assert_eq!(
            provider.user_role_names(&user),
            vec!["A1:Admin Agency", "A1:Admin PPE"]
        );
    }

    #[tokio::test]
    async fn test_exclusive_pair_blocks_partition() {
        let (provider, assigner, user) = setup();
        let errors = assigner
            .assign_all(&user, &roles(&["A1:PPK", "A1:PP"]))
            .await
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], RoleError::Exclusivity { .. }));
        assert!(provider.user_role_names(&user).is_empty());
        assert_eq!(provider.call_count(ProviderOperation::AssignRoles), 0);
    }

    #[tokio::test]
    async fn test_cross_division_blocks_partition() {
        let (provider, assigner, user) = setup();
        let errors = assigner
            .assign_all(&user, &roles(&["A2:PPK", "A2:Admin PPE"]))
            .await
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], RoleError::CrossDivision { .. }));
        assert!(provider.user_role_names(&user).is_empty());
    }

    #[tokio::test]
    async fn test_independent_prefixes_succeed() {
        let (provider, assigner, user) = setup();
        let errors = assigner
            .assign_all(&user, &roles(&["A1:Admin PPE", "A3:Auditor"]))
            .await
            .unwrap();

        assert!(errors.is_empty());
        assert_eq!(
            provider.user_role_names(&user),
            vec!["A1:Admin PPE", "A3:Auditor"]
        );
    }

    #[tokio::test]
    async fn test_failed_partition_does_not_block_others() {
        let (provider, assigner, user) = setup();
        let errors = assigner
            .assign_all(&user, &roles(&["A1:Admin PPE", "A3:Helpdesk", "A3:Auditor"]))
            .await
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("A3"));
        assert_eq!(provider.user_role_names(&user), vec!["A1:Admin PPE"]);
    }

    #[tokio::test]
    async fn test_malformed_entry_aborts_before_provider_calls() {
        let (provider, assigner, user) = setup();
        let result = assigner
            .assign_all(&user, &roles(&["A1:Admin PPE", "Auditor", "A3:Auditor"]))
            .await;

        assert!(matches!(result, Err(RoleError::MalformedRole(_))));
        assert!(provider.calls().is_empty());
        assert!(provider.user_role_names(&user).is_empty());
    }

    #[tokio::test]
    async fn test_input_order_does_not_change_failures() {
        let input = ["A2:PPK", "A1:Admin PPE", "A2:Admin PPE", "A3:Auditor", "A1:Helpdesk"];
        let mut reversed = input;
        reversed.reverse();

        let (_, assigner, user) = setup();
        let first: Vec<String> = assigner
            .assign_all(&user, &roles(&input))
            .await
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();

        let (_, assigner, user) = setup();
        let second: Vec<String> = assigner
            .assign_all(&user, &roles(&reversed))
            .await
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_prefix_is_unresolved() {
        let (provider, assigner, user) = setup();
        let errors = assigner
            .assign_all(&user, &roles(&["A9:PP", "A1:PP"]))
            .await
            .unwrap();

        assert_eq!(errors.len(), 1);
        match &errors[0] {
            RoleError::UnresolvedRole(name) => assert_eq!(name, "A9:PP"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(provider.user_role_names(&user), vec!["A1:PP"]);
    }

    #[tokio::test]
    async fn test_provider_failure_is_collected_per_partition() {
        let (provider, assigner, user) = setup();
        provider.fail_assignment_of("A2:PP");

        let errors = assigner
            .assign_all(&user, &roles(&["A1:Verifikator", "A2:PP", "A3:Auditor"]))
            .await
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], RoleError::Provider(_)));
        assert_eq!(
            provider.user_role_names(&user),
            vec!["A1:Verifikator", "A3:Auditor"]
        );
    }

    #[tokio::test]
    async fn test_listing_failure_fails_every_partition() {
        let (provider, assigner, user) = setup();
        provider.fail_on(ProviderOperation::ListRoles);

        let errors = assigner
            .assign_all(&user, &roles(&["A1:PP", "A2:PP"]))
            .await
            .unwrap();

        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, RoleError::Provider(_))));
    }

    #[tokio::test]
    async fn test_role_read_failure_fails_every_partition() {
        let (provider, assigner, user) = setup();
        provider.fail_on(ProviderOperation::ReadRole);

        let errors = assigner
            .assign_all(&user, &roles(&["A1:Helpdesk", "A2:PP"]))
            .await
            .unwrap();

        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, RoleError::Provider(_))));
        assert_eq!(provider.call_count(ProviderOperation::AssignRoles), 0);
        assert!(provider.user_role_names(&user).is_empty());

        provider.clear_failures();
        let errors = assigner
            .assign_all(&user, &roles(&["A1:Helpdesk", "A2:PP"]))
            .await
            .unwrap();
        assert!(errors.is_empty());
        assert_eq!(provider.user_role_names(&user), vec!["A1:Helpdesk", "A2:PP"]);
    }

    #[tokio::test]
    async fn test_role_read_failure_is_isolated_to_its_partition() {
        let (provider, assigner, user) = setup();
        provider.fail_read_of("A2:PP");

        let errors = assigner
            .assign_all(&user, &roles(&["A1:Helpdesk", "A2:KUPBJ", "A2:PP"]))
            .await
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], RoleError::Provider(_)));
        assert_eq!(provider.call_count(ProviderOperation::AssignRoles), 1);
        assert_eq!(provider.user_role_names(&user), vec!["A1:Helpdesk"]);
    }

    #[tokio::test]
    async fn test_empty_request_is_success() {
        let (provider, assigner, user) = setup();
        let errors = assigner.assign_all(&user, &[]).await.unwrap();
        assert!(errors.is_empty());
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn test_into_error_list() {
        let fatal = into_error_list(Err(RoleError::MalformedRole("x".to_string())));
        assert_eq!(fatal.len(), 1);
        assert!(into_error_list(Ok(Vec::new())).is_empty());
    }
}
