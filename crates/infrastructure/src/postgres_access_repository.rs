use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rosterguard_application::{AccessRepository, ResourceAssignee};
use rosterguard_core::{AppError, AppResult, PrincipalId, ResourceId};
use rosterguard_domain::Role;
use sqlx::{FromRow, PgPool};

mod forward;
mod inverse;
mod roles;

/// PostgreSQL-backed access repository.
///
/// Each access path is one SQL statement. Ancestor/descendant reachability
/// compiles to segment-boundary-safe prefix comparisons over the
/// materialized path columns (`a = b OR a LIKE b || '.%'`), the SQL twin of
/// the domain path predicates.
#[derive(Clone)]
pub struct PostgresAccessRepository {
    pool: PgPool,
}

impl PostgresAccessRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ResourceIdRow {
    resource_id: String,
}

#[derive(Debug, FromRow)]
struct AssigneeRow {
    resource_id: String,
    principal_id: String,
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role: String,
}

fn role_values(roles: &[Role]) -> Vec<String> {
    roles.iter().map(|role| role.as_str().to_owned()).collect()
}

fn resource_id_values(resource_ids: &[ResourceId]) -> Vec<String> {
    resource_ids
        .iter()
        .map(|resource_id| resource_id.as_str().to_owned())
        .collect()
}

fn decode_resource_rows(rows: Vec<ResourceIdRow>) -> AppResult<Vec<ResourceId>> {
    rows.into_iter()
        .map(|row| {
            ResourceId::new(row.resource_id.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode stored resource id '{}': {error}",
                    row.resource_id
                ))
            })
        })
        .collect()
}

fn decode_assignee_rows(rows: Vec<AssigneeRow>) -> AppResult<Vec<ResourceAssignee>> {
    rows.into_iter()
        .map(|row| {
            let resource_id = ResourceId::new(row.resource_id.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode stored resource id '{}': {error}",
                    row.resource_id
                ))
            })?;
            let principal_id = PrincipalId::new(row.principal_id.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode stored principal id '{}': {error}",
                    row.principal_id
                ))
            })?;

            Ok(ResourceAssignee {
                resource_id,
                principal_id,
            })
        })
        .collect()
}

fn decode_role_rows(rows: Vec<RoleRow>) -> AppResult<Vec<Role>> {
    rows.into_iter()
        .map(|row| {
            Role::from_str(row.role.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode stored role '{}': {error}",
                    row.role
                ))
            })
        })
        .collect()
}

#[async_trait]
impl AccessRepository for PostgresAccessRepository {
    async fn org_ancestor_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        self.org_ancestor_resource_ids_impl(principal_id, roles, at)
            .await
    }

    async fn class_ancestor_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        self.class_ancestor_resource_ids_impl(principal_id, roles, at)
            .await
    }

    async fn class_direct_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        self.class_direct_resource_ids_impl(principal_id, roles, at)
            .await
    }

    async fn group_direct_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        self.group_direct_resource_ids_impl(principal_id, roles, at)
            .await
    }

    async fn org_descendant_org_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        self.org_descendant_org_resource_ids_impl(principal_id, roles, at)
            .await
    }

    async fn org_descendant_class_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        self.org_descendant_class_resource_ids_impl(principal_id, roles, at)
            .await
    }

    async fn org_assignment_org_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        self.org_assignment_org_assignees_impl(resource_ids, at)
            .await
    }

    async fn org_assignment_class_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        self.org_assignment_class_assignees_impl(resource_ids, at)
            .await
    }

    async fn class_assignment_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        self.class_assignment_assignees_impl(resource_ids, at).await
    }

    async fn group_assignment_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        self.group_assignment_assignees_impl(resource_ids, at).await
    }

    async fn roles_linking_principal_to_resource(
        &self,
        principal_id: &PrincipalId,
        resource_id: &ResourceId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Role>> {
        self.roles_linking_principal_to_resource_impl(principal_id, resource_id, at)
            .await
    }
}

#[cfg(test)]
mod tests;
