use std::str::FromStr;

use rosterguard_core::AppError;
use serde::{Deserialize, Serialize};

/// Roles a principal can hold on a hierarchy target.
///
/// The supervisory partition is static configuration: supervisory roles may
/// traverse downward to descendant resources in addition to the default
/// upward visibility, non-supervisory roles never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Enrolled learner.
    Student,
    /// Guardian of an enrolled learner.
    Guardian,
    /// Teaching staff. Supervisory.
    Teacher,
    /// Administrative staff. Supervisory.
    Administrator,
}

impl Role {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Guardian => "guardian",
            Self::Teacher => "teacher",
            Self::Administrator => "administrator",
        }
    }

    /// Returns all known roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Role] = &[
            Role::Student,
            Role::Guardian,
            Role::Teacher,
            Role::Administrator,
        ];

        ALL
    }

    /// Returns whether this role may traverse downward to descendant
    /// resources.
    #[must_use]
    pub fn is_supervisory(&self) -> bool {
        matches!(self, Self::Teacher | Self::Administrator)
    }

    /// Returns the supervisory subset of the given roles, order preserved.
    #[must_use]
    pub fn filter_supervisory(roles: &[Role]) -> Vec<Role> {
        roles
            .iter()
            .copied()
            .filter(Role::is_supervisory)
            .collect()
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "student" => Ok(Self::Student),
            "guardian" => Ok(Self::Guardian),
            "teacher" => Ok(Self::Teacher),
            "administrator" => Ok(Self::Administrator),
            _ => Err(AppError::Validation(format!("unknown role value '{value}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::Role;

    #[test]
    fn role_roundtrip_storage_value() {
        for role in Role::all() {
            let restored = Role::from_str(role.as_str());
            assert!(restored.is_ok());
            assert_eq!(restored.unwrap_or(Role::Student), *role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let parsed = Role::from_str("principal");
        assert!(parsed.is_err());
    }

    #[test]
    fn supervisory_partition_is_fixed() {
        assert!(Role::Teacher.is_supervisory());
        assert!(Role::Administrator.is_supervisory());
        assert!(!Role::Student.is_supervisory());
        assert!(!Role::Guardian.is_supervisory());

        let filtered =
            Role::filter_supervisory(&[Role::Student, Role::Teacher, Role::Administrator]);
        assert_eq!(filtered, vec![Role::Teacher, Role::Administrator]);
    }
}
