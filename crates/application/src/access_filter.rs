use std::collections::BTreeSet;
use std::str::FromStr;

use rosterguard_core::{AppError, AppResult, PrincipalId};
use rosterguard_domain::Role;

/// Validated inputs for a forward resolution.
///
/// The single entry gate for principal-scoped lookups: every public
/// resolver operation that takes a principal and a role set goes through
/// [`AccessFilter::parse`] before any query is issued, so a malformed
/// filter can never produce partial results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessFilter {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl AccessFilter {
    /// Parses and validates transport inputs.
    ///
    /// Fails with a validation error when the principal id is empty or
    /// whitespace, when the role set is empty, or when any role value is
    /// outside the closed role enumeration. Roles are normalized to the
    /// canonical enum and deduplicated, first occurrence wins.
    pub fn parse(principal_id: &str, allowed_roles: &[String]) -> AppResult<Self> {
        let principal_id = PrincipalId::new(principal_id)?;

        if allowed_roles.is_empty() {
            return Err(AppError::Validation(
                "allowed role set must not be empty".to_owned(),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut roles = Vec::with_capacity(allowed_roles.len());
        for value in allowed_roles {
            let role = Role::from_str(value.as_str())?;
            if seen.insert(role) {
                roles.push(role);
            }
        }

        Ok(Self {
            principal_id,
            roles,
        })
    }

    /// Creates a filter from already-typed values, deduplicating roles.
    ///
    /// Fails with a validation error when the role set is empty.
    pub fn new(principal_id: PrincipalId, allowed_roles: Vec<Role>) -> AppResult<Self> {
        if allowed_roles.is_empty() {
            return Err(AppError::Validation(
                "allowed role set must not be empty".to_owned(),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut roles = Vec::with_capacity(allowed_roles.len());
        for role in allowed_roles {
            if seen.insert(role) {
                roles.push(role);
            }
        }

        Ok(Self {
            principal_id,
            roles,
        })
    }

    /// Returns the validated principal id.
    #[must_use]
    pub fn principal_id(&self) -> &PrincipalId {
        &self.principal_id
    }

    /// Returns the deduplicated allowed roles.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        self.roles.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use rosterguard_domain::Role;

    use super::AccessFilter;

    #[test]
    fn parse_rejects_empty_principal() {
        let result = AccessFilter::parse("  ", &["student".to_owned()]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_rejects_empty_role_set() {
        let result = AccessFilter::parse("principal-1", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_rejects_unknown_role() {
        let result = AccessFilter::parse("principal-1", &["janitor".to_owned()]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_deduplicates_roles() {
        let filter = AccessFilter::parse(
            "principal-1",
            &[
                "teacher".to_owned(),
                "student".to_owned(),
                "teacher".to_owned(),
            ],
        );
        assert!(filter.is_ok());
        assert_eq!(
            filter.map(|filter| filter.roles().to_vec()).unwrap_or_default(),
            vec![Role::Teacher, Role::Student]
        );
    }
}
