//! Prefix-scoped role lookups over a name-sorted role listing.
//!
//! Role counts grow with the number of organizational units, so a prefix is
//! located with a binary search for its lower bound followed by a linear scan
//! while names still carry the prefix.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use crate::models::{prefix_bound, ProviderRole};
use crate::services::provider::IdentityProvider;
use crate::services::ProviderError;

/// Composite role name to provider role id, for one prefix.
pub type PrefixRoleIndex = BTreeMap<String, String>;

/// Position of the first role at or after `start` whose name is `>= bound`.
///
/// `roles` must be sorted ascending by name.
pub fn lower_bound(roles: &[ProviderRole], start: usize, bound: &str) -> usize {
    let start = start.min(roles.len());
    start + roles[start..].partition_point(|role| role.name.as_str() < bound)
}

/// Range of roles at or after `start` whose names start with `prefix:`.
pub fn prefix_range(roles: &[ProviderRole], start: usize, prefix: &str) -> Range<usize> {
    let bound = prefix_bound(prefix);
    let begin = lower_bound(roles, start, &bound);
    let len = roles[begin..]
        .iter()
        .take_while(|role| role.name.starts_with(&bound))
        .count();
    begin..begin + len
}

/// Build the name-to-id index for one prefix from a sorted listing.
pub fn index_prefix(roles: &[ProviderRole], prefix: &str) -> PrefixRoleIndex {
    debug_assert!(
        roles.windows(2).all(|pair| pair[0].name <= pair[1].name),
        "provider role listing must be sorted by name"
    );

    roles[prefix_range(roles, 0, prefix)]
        .iter()
        .map(|role| (role.name.clone(), role.id.clone()))
        .collect()
}

/// Resolves an organizational-unit prefix to the provider's role ids.
#[derive(Clone)]
pub struct RoleDirectory {
    provider: Arc<dyn IdentityProvider>,
}

impl RoleDirectory {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Fetch every role under `prefix`. An empty index is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, prefix: &str) -> Result<PrefixRoleIndex, ProviderError> {
        let roles = self.provider.list_roles().await?;
        let index = index_prefix(&roles, prefix);
        tracing::debug!(
            total_roles = roles.len(),
            matched = index.len(),
            "Resolved role directory"
        );
        Ok(index)
    }
}
