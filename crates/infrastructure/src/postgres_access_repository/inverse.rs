use rosterguard_core::AppError;

use super::*;

impl PostgresAccessRepository {
    pub(super) async fn org_assignment_org_assignees_impl(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        // No DISTINCT: the caller owns deduplication, one row per
        // reachability path is the contract.
        let rows = sqlx::query_as::<_, AssigneeRow>(
            r#"
            SELECT assignments.resource_id, memberships.principal_id
            FROM resource_assignments AS assignments
            INNER JOIN org_nodes AS assigned_orgs
                ON assigned_orgs.id = assignments.target_id
            INNER JOIN org_nodes AS member_orgs
                ON member_orgs.ancestry_path = assigned_orgs.ancestry_path
                OR member_orgs.ancestry_path LIKE assigned_orgs.ancestry_path || '.%'
            INNER JOIN memberships
                ON memberships.target_kind = 'org'
                AND memberships.target_id = member_orgs.id
            WHERE assignments.target_kind = 'org'
                AND assignments.resource_id = ANY($1)
                AND memberships.enrollment_start <= $2
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $2)
            "#,
        )
        .bind(resource_id_values(resource_ids))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load org assignment assignees: {error}"))
        })?;

        decode_assignee_rows(rows)
    }

    pub(super) async fn org_assignment_class_assignees_impl(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        let rows = sqlx::query_as::<_, AssigneeRow>(
            r#"
            SELECT assignments.resource_id, memberships.principal_id
            FROM resource_assignments AS assignments
            INNER JOIN org_nodes AS assigned_orgs
                ON assigned_orgs.id = assignments.target_id
            INNER JOIN class_nodes AS member_classes
                ON member_classes.org_ancestry_path = assigned_orgs.ancestry_path
                OR member_classes.org_ancestry_path LIKE assigned_orgs.ancestry_path || '.%'
            INNER JOIN memberships
                ON memberships.target_kind = 'class'
                AND memberships.target_id = member_classes.id
            WHERE assignments.target_kind = 'org'
                AND assignments.resource_id = ANY($1)
                AND memberships.enrollment_start <= $2
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $2)
            "#,
        )
        .bind(resource_id_values(resource_ids))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load class members for org assignments: {error}"
            ))
        })?;

        decode_assignee_rows(rows)
    }

    pub(super) async fn class_assignment_assignees_impl(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        let rows = sqlx::query_as::<_, AssigneeRow>(
            r#"
            SELECT assignments.resource_id, memberships.principal_id
            FROM resource_assignments AS assignments
            INNER JOIN memberships
                ON memberships.target_kind = 'class'
                AND memberships.target_id = assignments.target_id
            WHERE assignments.target_kind = 'class'
                AND assignments.resource_id = ANY($1)
                AND memberships.enrollment_start <= $2
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $2)
            "#,
        )
        .bind(resource_id_values(resource_ids))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load class assignment assignees: {error}"
            ))
        })?;

        decode_assignee_rows(rows)
    }

    pub(super) async fn group_assignment_assignees_impl(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        let rows = sqlx::query_as::<_, AssigneeRow>(
            r#"
            SELECT assignments.resource_id, memberships.principal_id
            FROM resource_assignments AS assignments
            INNER JOIN memberships
                ON memberships.target_kind = 'group'
                AND memberships.target_id = assignments.target_id
            WHERE assignments.target_kind = 'group'
                AND assignments.resource_id = ANY($1)
                AND memberships.enrollment_start <= $2
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $2)
            "#,
        )
        .bind(resource_id_values(resource_ids))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load group assignment assignees: {error}"
            ))
        })?;

        decode_assignee_rows(rows)
    }
}
