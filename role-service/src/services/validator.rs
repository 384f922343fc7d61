//! Role set validation for a single organizational unit.

use crate::models::compose;
use crate::services::catalog::{Division, FunctionIndex, EXCLUSIVITY_RULES};
use crate::services::RoleError;

/// Validate the functions requested for one prefix.
///
/// Rules, in order: an empty set is valid; every function must be known; all
/// functions must share one division; no exclusivity rule of that division may
/// be violated.
pub fn validate<S: AsRef<str>>(
    prefix: &str,
    functions: &[S],
    index: &FunctionIndex,
) -> Result<(), RoleError> {
    let mut division: Option<Division> = None;

    for function in functions {
        let function = function.as_ref();
        let function_division = index
            .division_of(function)
            .ok_or_else(|| RoleError::UnknownRole(compose(prefix, function)))?;

        match division {
            None => division = Some(function_division),
            Some(current) if current != function_division => {
                return Err(RoleError::CrossDivision {
                    prefix: prefix.to_string(),
                    first: current,
                    second: function_division,
                });
            }
            Some(_) => {}
        }
    }

    let Some(division) = division else {
        return Ok(());
    };

    let holds = |name: &str| functions.iter().any(|f| f.as_ref() == name);
    for rule in EXCLUSIVITY_RULES.iter().filter(|r| r.division == division) {
        if holds(rule.first) && holds(rule.second) {
            return Err(RoleError::Exclusivity {
                prefix: prefix.to_string(),
                first: rule.first,
                second: rule.second,
            });
        }
    }

    Ok(())
}
