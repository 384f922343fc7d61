use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::RoleError;

/// Separator between the organizational-unit prefix and the function name.
pub const ROLE_SEPARATOR: char = ':';

/// A role identifier of the form `"<prefix>:<function>"`, e.g. `"A1:Admin PPE"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeRole {
    prefix: String,
    function: String,
}

impl CompositeRole {
    /// Split on the first separator. Both halves must be non-empty.
    pub fn parse(raw: &str) -> Result<Self, RoleError> {
        match raw.split_once(ROLE_SEPARATOR) {
            Some((prefix, function)) if !prefix.is_empty() && !function.is_empty() => Ok(Self {
                prefix: prefix.to_string(),
                function: function.to_string(),
            }),
            _ => Err(RoleError::MalformedRole(raw.to_string())),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn function(&self) -> &str {
        &self.function
    }
}

impl std::fmt::Display for CompositeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.prefix, ROLE_SEPARATOR, self.function)
    }
}

pub fn compose(prefix: &str, function: &str) -> String {
    format!("{}{}{}", prefix, ROLE_SEPARATOR, function)
}

/// Lower bound used for range lookups over a name-sorted role listing.
pub fn prefix_bound(prefix: &str) -> String {
    format!("{}{}", prefix, ROLE_SEPARATOR)
}

/// A role record as stored by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderRole {
    #[schema(example = "rol_0ab1c2d3e4f5g6h7")]
    pub id: String,
    #[schema(example = "A1:Admin PPE")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
