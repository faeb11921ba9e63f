use rosterguard_core::AppError;

use super::*;

impl PostgresAccessRepository {
    /// The six access paths as one UNION query. UNION (not UNION ALL)
    /// because the projection is a distinct role set; descendant branches
    /// only match supervisory roles.
    pub(super) async fn roles_linking_principal_to_resource_impl(
        &self,
        principal_id: &PrincipalId,
        resource_id: &ResourceId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Role>> {
        let supervisory_roles = role_values(Role::filter_supervisory(Role::all()).as_slice());

        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT memberships.role
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
                AND assignments.resource_id = $2
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            UNION
            SELECT memberships.role
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
                AND assignments.resource_id = $2
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            UNION
            SELECT memberships.role
            FROM memberships
            INNER JOIN resource_assignments AS assignments
                ON assignments.target_kind = 'class'
                AND assignments.target_id = memberships.target_id
            WHERE memberships.target_kind = 'class'
                AND memberships.principal_id = $1
                AND assignments.resource_id = $2
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            UNION
            SELECT memberships.role
            FROM memberships
            INNER JOIN resource_assignments AS assignments
                ON assignments.target_kind = 'group'
                AND assignments.target_id = memberships.target_id
            WHERE memberships.target_kind = 'group'
                AND memberships.principal_id = $1
                AND assignments.resource_id = $2
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            UNION
            SELECT memberships.role
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
                AND assignments.resource_id = $2
                AND memberships.role = ANY($4)
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            UNION
            SELECT memberships.role
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
                AND assignments.resource_id = $2
                AND memberships.role = ANY($4)
                AND memberships.enrollment_start <= $3
                AND (memberships.enrollment_end IS NULL OR memberships.enrollment_end >= $3)
            "#,
        )
        .bind(principal_id.as_str())
        .bind(resource_id.as_str())
        .bind(at)
        .bind(supervisory_roles)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load roles linking principal to resource: {error}"
            ))
        })?;

        decode_role_rows(rows)
    }
}
