use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rosterguard_application::AccessResolutionService;
use rosterguard_domain::{
    ClassId, ClassNode, GroupId, GroupNode, HierarchyTarget, OrgId, OrgNode, OrgType, Role,
};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresAccessRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres access repository tests: {error}");
    }

    Some(pool)
}

async fn insert_org(pool: &PgPool, org: &OrgNode) {
    let insert = sqlx::query(
        r#"
            INSERT INTO org_nodes (id, org_type, parent_id, ancestry_path)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
    )
    .bind(org.id().as_uuid())
    .bind(org.org_type().as_str())
    .bind(org.parent_id().map(|parent_id| parent_id.as_uuid()))
    .bind(org.ancestry_path().as_str())
    .execute(pool)
    .await;

    assert!(insert.is_ok());
}

async fn insert_class(pool: &PgPool, class: &ClassNode) {
    let insert = sqlx::query(
        r#"
            INSERT INTO class_nodes (id, org_id, org_ancestry_path)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
    )
    .bind(class.id().as_uuid())
    .bind(class.org_id().as_uuid())
    .bind(class.org_ancestry_path().as_str())
    .execute(pool)
    .await;

    assert!(insert.is_ok());
}

async fn insert_group(pool: &PgPool, group: &GroupNode) {
    let insert = sqlx::query(
        r#"
            INSERT INTO group_nodes (id)
            VALUES ($1)
            ON CONFLICT (id) DO NOTHING
            "#,
    )
    .bind(group.id().as_uuid())
    .execute(pool)
    .await;

    assert!(insert.is_ok());
}

async fn insert_membership(
    pool: &PgPool,
    principal_id: &str,
    target: HierarchyTarget,
    role: Role,
    enrollment_start: DateTime<Utc>,
    enrollment_end: Option<DateTime<Utc>>,
) {
    let insert = sqlx::query(
        r#"
            INSERT INTO memberships
                (principal_id, target_kind, target_id, role, enrollment_start, enrollment_end)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
    )
    .bind(principal_id)
    .bind(target.kind_str())
    .bind(target.target_uuid())
    .bind(role.as_str())
    .bind(enrollment_start)
    .bind(enrollment_end)
    .execute(pool)
    .await;

    assert!(insert.is_ok());
}

async fn insert_assignment(pool: &PgPool, resource_id: &str, target: HierarchyTarget) {
    let insert = sqlx::query(
        r#"
            INSERT INTO resource_assignments (resource_id, target_kind, target_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (resource_id, target_kind, target_id) DO NOTHING
            "#,
    )
    .bind(resource_id)
    .bind(target.kind_str())
    .bind(target.target_uuid())
    .execute(pool)
    .await;

    assert!(insert.is_ok());
}

struct SeededTree {
    district: OrgNode,
    school_a: OrgNode,
    school_b: OrgNode,
    class_a: ClassNode,
    group: GroupNode,
}

async fn seed_tree(pool: &PgPool) -> SeededTree {
    let district = OrgNode::root(OrgId::new(), OrgType::District);
    let school_a = OrgNode::child_of(&district, OrgId::new(), OrgType::School)
        .unwrap_or_else(|_| unreachable!());
    let school_b = OrgNode::child_of(&district, OrgId::new(), OrgType::School)
        .unwrap_or_else(|_| unreachable!());
    let class_a = ClassNode::new(ClassId::new(), &school_a);
    let group = GroupNode::new(GroupId::new());

    insert_org(pool, &district).await;
    insert_org(pool, &school_a).await;
    insert_org(pool, &school_b).await;
    insert_class(pool, &class_a).await;
    insert_group(pool, &group).await;

    SeededTree {
        district,
        school_a,
        school_b,
        class_a,
        group,
    }
}

fn unique(label: &str) -> String {
    format!("{label}-{}", Uuid::new_v4())
}

#[tokio::test]
async fn forward_resolution_walks_ancestors_and_supervised_descendants() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let tree = seed_tree(&pool).await;
    let now = Utc::now();

    let district_doc = unique("district-doc");
    let class_doc = unique("class-doc");
    let branch_b_doc = unique("branch-b-doc");
    insert_assignment(&pool, &district_doc, HierarchyTarget::Org(tree.district.id())).await;
    insert_assignment(&pool, &class_doc, HierarchyTarget::Class(tree.class_a.id())).await;
    insert_assignment(&pool, &branch_b_doc, HierarchyTarget::Org(tree.school_b.id())).await;

    let student = unique("student");
    let teacher = unique("teacher");
    insert_membership(
        &pool,
        &student,
        HierarchyTarget::Class(tree.class_a.id()),
        Role::Student,
        now - Duration::days(30),
        None,
    )
    .await;
    insert_membership(
        &pool,
        &teacher,
        HierarchyTarget::Org(tree.school_a.id()),
        Role::Teacher,
        now - Duration::days(30),
        None,
    )
    .await;

    let repository = PostgresAccessRepository::new(pool.clone());
    let service = AccessResolutionService::new(Arc::new(repository));

    let student_view = service
        .accessible_resource_ids(&student, &["student".to_owned()])
        .await;
    assert!(student_view.is_ok());
    let student_view = student_view.unwrap_or_default();
    assert!(student_view.iter().any(|id| id.as_str() == district_doc));
    assert!(student_view.iter().any(|id| id.as_str() == class_doc));
    assert!(!student_view.iter().any(|id| id.as_str() == branch_b_doc));

    let teacher_view = service
        .accessible_resource_ids(&teacher, &["teacher".to_owned()])
        .await;
    assert!(teacher_view.is_ok());
    let teacher_view = teacher_view.unwrap_or_default();
    assert!(teacher_view.iter().any(|id| id.as_str() == district_doc));
    assert!(teacher_view.iter().any(|id| id.as_str() == class_doc));
    assert!(!teacher_view.iter().any(|id| id.as_str() == branch_b_doc));
}

#[tokio::test]
async fn closed_enrollment_window_stops_contributing() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let tree = seed_tree(&pool).await;
    let now = Utc::now();

    let report = unique("report");
    insert_assignment(&pool, &report, HierarchyTarget::Org(tree.district.id())).await;

    let former_student = unique("former-student");
    insert_membership(
        &pool,
        &former_student,
        HierarchyTarget::Class(tree.class_a.id()),
        Role::Student,
        now - Duration::days(30),
        Some(now - Duration::days(1)),
    )
    .await;

    let repository = PostgresAccessRepository::new(pool.clone());
    let service = AccessResolutionService::new(Arc::new(repository));

    let view = service
        .accessible_resource_ids(&former_student, &["student".to_owned()])
        .await;
    assert!(view.is_ok());
    assert!(view.unwrap_or_default().is_empty());

    let counts = service.assignee_counts(&[report.clone()]).await;
    assert!(counts.is_ok());
    assert!(
        !counts
            .unwrap_or_default()
            .keys()
            .any(|id| id.as_str() == report)
    );
}

#[tokio::test]
async fn inverse_resolution_counts_distinct_principals() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let tree = seed_tree(&pool).await;
    let now = Utc::now();

    let handbook = unique("handbook");
    insert_assignment(&pool, &handbook, HierarchyTarget::Org(tree.district.id())).await;

    // Two simultaneous paths for the same principal: org membership on one
    // branch, class membership on the other.
    let dual = unique("dual");
    insert_membership(
        &pool,
        &dual,
        HierarchyTarget::Org(tree.school_b.id()),
        Role::Teacher,
        now - Duration::days(30),
        None,
    )
    .await;
    insert_membership(
        &pool,
        &dual,
        HierarchyTarget::Class(tree.class_a.id()),
        Role::Student,
        now - Duration::days(30),
        None,
    )
    .await;

    let repository = PostgresAccessRepository::new(pool.clone());
    let service = AccessResolutionService::new(Arc::new(repository));

    let pairs = service.resource_assignees(&[handbook.clone()]).await;
    assert!(pairs.is_ok());
    let dual_entries = pairs
        .unwrap_or_default()
        .into_iter()
        .filter(|pair| pair.principal_id.as_str() == dual)
        .count();
    assert_eq!(dual_entries, 2);

    let counts = service.assignee_counts(&[handbook.clone()]).await;
    assert!(counts.is_ok());
    let count = counts
        .unwrap_or_default()
        .into_iter()
        .find(|(id, _)| id.as_str() == handbook)
        .map(|(_, count)| count);
    assert_eq!(count, Some(1));
}

#[tokio::test]
async fn roles_projection_spans_all_paths() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let tree = seed_tree(&pool).await;
    let now = Utc::now();

    let syllabus = unique("syllabus");
    let notes = unique("notes");
    insert_assignment(&pool, &syllabus, HierarchyTarget::Org(tree.school_a.id())).await;
    insert_assignment(&pool, &notes, HierarchyTarget::Group(tree.group.id())).await;

    let rita = unique("rita");
    insert_membership(
        &pool,
        &rita,
        HierarchyTarget::Class(tree.class_a.id()),
        Role::Student,
        now - Duration::days(30),
        None,
    )
    .await;
    insert_membership(
        &pool,
        &rita,
        HierarchyTarget::Org(tree.school_a.id()),
        Role::Teacher,
        now - Duration::days(30),
        None,
    )
    .await;
    insert_membership(
        &pool,
        &rita,
        HierarchyTarget::Group(tree.group.id()),
        Role::Guardian,
        now - Duration::days(30),
        None,
    )
    .await;

    let repository = PostgresAccessRepository::new(pool.clone());
    let service = AccessResolutionService::new(Arc::new(repository));

    let linked = service.roles_for_resource(&rita, &syllabus).await;
    assert!(linked.is_ok());
    assert_eq!(
        linked.unwrap_or_default(),
        [Role::Student, Role::Teacher].into_iter().collect()
    );

    let group_linked = service.roles_for_resource(&rita, &notes).await;
    assert!(group_linked.is_ok());
    assert_eq!(
        group_linked.unwrap_or_default(),
        [Role::Guardian].into_iter().collect()
    );

    let supervisory = service
        .has_supervisory_role_for_resource(&rita, &notes)
        .await;
    assert!(supervisory.is_ok());
    assert!(!supervisory.unwrap_or(true));
}
