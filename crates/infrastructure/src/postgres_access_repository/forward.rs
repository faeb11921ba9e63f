use rosterguard_core::AppError;

use super::*;

impl PostgresAccessRepository {
    pub(super) async fn org_ancestor_resource_ids_impl(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let rows = sqlx::query_as::<_, ResourceIdRow>(
            r#"
            SELECT DISTINCT assignments.resource_id
            FROM memberships
            INNER JOIN org_nodes AS member_orgs
                ON member_orgs.id = memberships.target_id
            INNER JOIN org_nodes AS assigned_orgs
                ON member_orgs.ancestry_path = assigned_orgs.ancestry_path
                OR member_orgs.ancestry_path LIKE assigned_orgs.ancestry_path || '.%'
            INNER JOIN resource_assignments AS assignments
                ON assignments.target_kind = 'org'
                AND assignments.target_id = assigned_orgs.id
            WHERE memberships.target_kind = 'org'
                AND memberships.principal_id = $1
                AND memberships.role = ANY($2)
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            "#,
        )
        .bind(principal_id.as_str())
        .bind(role_values(roles))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load org ancestor resources: {error}"))
        })?;

        decode_resource_rows(rows)
    }

    pub(super) async fn class_ancestor_resource_ids_impl(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let rows = sqlx::query_as::<_, ResourceIdRow>(
            r#"
            SELECT DISTINCT assignments.resource_id
            FROM memberships
            INNER JOIN class_nodes AS member_classes
                ON member_classes.id = memberships.target_id
            INNER JOIN org_nodes AS assigned_orgs
                ON member_classes.org_ancestry_path = assigned_orgs.ancestry_path
                OR member_classes.org_ancestry_path LIKE assigned_orgs.ancestry_path || '.%'
            INNER JOIN resource_assignments AS assignments
                ON assignments.target_kind = 'org'
                AND assignments.target_id = assigned_orgs.id
            WHERE memberships.target_kind = 'class'
                AND memberships.principal_id = $1
                AND memberships.role = ANY($2)
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            "#,
        )
        .bind(principal_id.as_str())
        .bind(role_values(roles))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load class ancestor resources: {error}"))
        })?;

        decode_resource_rows(rows)
    }

    pub(super) async fn class_direct_resource_ids_impl(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let rows = sqlx::query_as::<_, ResourceIdRow>(
            r#"
            SELECT DISTINCT assignments.resource_id
            FROM memberships
            INNER JOIN resource_assignments AS assignments
                ON assignments.target_kind = 'class'
                AND assignments.target_id = memberships.target_id
            WHERE memberships.target_kind = 'class'
                AND memberships.principal_id = $1
                AND memberships.role = ANY($2)
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            "#,
        )
        .bind(principal_id.as_str())
        .bind(role_values(roles))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load direct class resources: {error}"))
        })?;

        decode_resource_rows(rows)
    }

    pub(super) async fn group_direct_resource_ids_impl(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let rows = sqlx::query_as::<_, ResourceIdRow>(
            r#"
            SELECT DISTINCT assignments.resource_id
            FROM memberships
            INNER JOIN resource_assignments AS assignments
                ON assignments.target_kind = 'group'
                AND assignments.target_id = memberships.target_id
            WHERE memberships.target_kind = 'group'
                AND memberships.principal_id = $1
                AND memberships.role = ANY($2)
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            "#,
        )
        .bind(principal_id.as_str())
        .bind(role_values(roles))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load direct group resources: {error}"))
        })?;

        decode_resource_rows(rows)
    }

    pub(super) async fn org_descendant_org_resource_ids_impl(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let rows = sqlx::query_as::<_, ResourceIdRow>(
            r#"
            SELECT DISTINCT assignments.resource_id
            FROM memberships
            INNER JOIN org_nodes AS member_orgs
                ON member_orgs.id = memberships.target_id
            INNER JOIN org_nodes AS assigned_orgs
                ON assigned_orgs.ancestry_path = member_orgs.ancestry_path
                OR assigned_orgs.ancestry_path LIKE member_orgs.ancestry_path || '.%'
            INNER JOIN resource_assignments AS assignments
                ON assignments.target_kind = 'org'
                AND assignments.target_id = assigned_orgs.id
            WHERE memberships.target_kind = 'org'
                AND memberships.principal_id = $1
                AND memberships.role = ANY($2)
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            "#,
        )
        .bind(principal_id.as_str())
        .bind(role_values(roles))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load descendant org resources: {error}"
            ))
        })?;

        decode_resource_rows(rows)
    }

    pub(super) async fn org_descendant_class_resource_ids_impl(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let rows = sqlx::query_as::<_, ResourceIdRow>(
            r#"
            SELECT DISTINCT assignments.resource_id
            FROM memberships
            INNER JOIN org_nodes AS member_orgs
                ON member_orgs.id = memberships.target_id
            INNER JOIN class_nodes AS assigned_classes
                ON assigned_classes.org_ancestry_path = member_orgs.ancestry_path
                OR assigned_classes.org_ancestry_path LIKE member_orgs.ancestry_path || '.%'
            INNER JOIN resource_assignments AS assignments
                ON assignments.target_kind = 'class'
                AND assignments.target_id = assigned_classes.id
            WHERE memberships.target_kind = 'org'
                AND memberships.principal_id = $1
                AND memberships.role = ANY($2)
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            "#,
        )
        .bind(principal_id.as_str())
        .bind(role_values(roles))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load descendant class resources: {error}"
            ))
        })?;

        decode_resource_rows(rows)
    }
}
