use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rosterguard_core::{AppResult, PrincipalId, ResourceId};
use rosterguard_domain::Role;

/// One (resource, principal) reachability pair produced by an inverse
/// access path.
///
/// The port deliberately does not deduplicate: a principal reachable via
/// two paths yields two pairs, and the service decides whether the caller
/// gets the raw multiset or a distinct count.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceAssignee {
    /// Resource reached by the path.
    pub resource_id: ResourceId,
    /// Principal reached by the path.
    pub principal_id: PrincipalId,
}

/// Repository port for hierarchy access lookups.
///
/// One read method per access path. Every method receives the snapshot
/// instant `at` so that all sub-queries of one logical resolution evaluate
/// the enrollment-window predicate against the same boundary. Membership
/// rows outside their enrollment window never contribute.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    /// Org→Org: resources assigned to orgs that are ancestor-or-equal of an
    /// org the principal is an active member of, via any of `roles`.
    async fn org_ancestor_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>>;

    /// Class→Org: resources assigned to orgs that are ancestor-or-equal of
    /// the owning org of a class the principal is an active member of.
    async fn class_ancestor_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>>;

    /// Class→Class: resources assigned directly to a class the principal is
    /// an active member of.
    async fn class_direct_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>>;

    /// Group→Group: resources assigned directly to a group the principal is
    /// an active member of.
    async fn group_direct_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>>;

    /// Org→Descendant-Org: resources assigned to orgs descendant-or-equal
    /// of an org membership of the principal. Callers pass the supervisory
    /// subset of the allowed roles.
    async fn org_descendant_org_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>>;

    /// Org→Descendant-Class: resources assigned to classes whose owning-org
    /// path is descendant-or-equal of an org membership of the principal.
    /// Callers pass the supervisory subset of the allowed roles.
    async fn org_descendant_class_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>>;

    /// Org assignment → org members: principals with an active org
    /// membership descendant-or-equal of an assignment org's path, one pair
    /// per membership row reached.
    async fn org_assignment_org_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>>;

    /// Org assignment → class members: principals with an active class
    /// membership whose owning-org path is descendant-or-equal of an
    /// assignment org's path.
    async fn org_assignment_class_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>>;

    /// Class assignment → class members: principals with an active
    /// membership directly on the assigned class.
    async fn class_assignment_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>>;

    /// Group assignment → group members: principals with an active
    /// membership directly on the assigned group.
    async fn group_assignment_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>>;

    /// Distinct roles through which the principal reaches the resource,
    /// across all six access paths; descendant paths count only for
    /// supervisory roles.
    async fn roles_linking_principal_to_resource(
        &self,
        principal_id: &PrincipalId,
        resource_id: &ResourceId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Role>>;
}
