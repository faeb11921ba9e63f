use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rosterguard_application::{AccessRepository, ResourceAssignee};
use rosterguard_core::{AppError, AppResult, PrincipalId, ResourceId};
use rosterguard_domain::{
    AncestryPath, ClassId, ClassNode, GroupId, GroupNode, HierarchyTarget, Membership, OrgId,
    OrgNode, ResourceAssignment, Role,
};
use tokio::sync::RwLock;

/// In-memory access repository implementation.
///
/// Holds a snapshot of the hierarchy, memberships and assignments behind
/// `RwLock`s and answers every access path by evaluating the domain
/// predicates directly. Used by tests and by embedders that load their
/// hierarchy into memory.
#[derive(Debug, Default)]
pub struct InMemoryAccessRepository {
    orgs: RwLock<HashMap<OrgId, OrgNode>>,
    classes: RwLock<HashMap<ClassId, ClassNode>>,
    groups: RwLock<HashMap<GroupId, GroupNode>>,
    memberships: RwLock<Vec<Membership>>,
    assignments: RwLock<Vec<ResourceAssignment>>,
}

impl InMemoryAccessRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an org node.
    pub async fn upsert_org(&self, org: OrgNode) {
        self.orgs.write().await.insert(org.id(), org);
    }

    /// Inserts or replaces a class node.
    ///
    /// The denormalized owning-org path is re-derived from the stored org so
    /// it can never drift from the tree.
    pub async fn upsert_class(&self, mut class: ClassNode) -> AppResult<()> {
        let orgs = self.orgs.read().await;
        let owner = orgs.get(&class.org_id()).ok_or_else(|| {
            AppError::NotFound(format!("org '{}' does not exist", class.org_id()))
        })?;
        class.refresh_owning_path(owner)?;
        drop(orgs);

        self.classes.write().await.insert(class.id(), class);
        Ok(())
    }

    /// Inserts or replaces a group node.
    pub async fn upsert_group(&self, group: GroupNode) {
        self.groups.write().await.insert(group.id(), group);
    }

    /// Records a membership after checking its target exists.
    pub async fn add_membership(&self, membership: Membership) -> AppResult<()> {
        self.ensure_target_exists(membership.target).await?;
        self.memberships.write().await.push(membership);
        Ok(())
    }

    /// Records a resource assignment after checking its target exists.
    pub async fn add_assignment(&self, assignment: ResourceAssignment) -> AppResult<()> {
        self.ensure_target_exists(assignment.target).await?;
        self.assignments.write().await.push(assignment);
        Ok(())
    }

    /// Logically closes every membership of the principal on the target
    /// whose window covers `end`. Returns how many rows were closed.
    pub async fn close_memberships(
        &self,
        principal_id: &PrincipalId,
        target: HierarchyTarget,
        end: DateTime<Utc>,
    ) -> AppResult<usize> {
        let mut memberships = self.memberships.write().await;
        let mut closed = 0;
        for membership in memberships.iter_mut() {
            if membership.principal_id == *principal_id
                && membership.target == target
                && membership.enrollment.start() <= end
            {
                membership.enrollment.close(end)?;
                closed += 1;
            }
        }

        Ok(closed)
    }

    /// Moves an org under a new parent, rewriting the materialized paths of
    /// the whole subtree and the denormalized paths of affected classes.
    pub async fn reparent_org(&self, org_id: OrgId, new_parent_id: OrgId) -> AppResult<()> {
        let mut orgs = self.orgs.write().await;

        let new_parent = orgs
            .get(&new_parent_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("org '{new_parent_id}' does not exist")))?;
        let mut moved = orgs
            .get(&org_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("org '{org_id}' does not exist")))?;

        moved.reparent(&new_parent)?;
        orgs.insert(org_id, moved);

        // Rewrite descendants top-down so every parent path is final before
        // its children are recomputed.
        let mut frontier = vec![org_id];
        while let Some(parent_id) = frontier.pop() {
            let Some(parent) = orgs.get(&parent_id).cloned() else {
                continue;
            };
            let child_ids: Vec<OrgId> = orgs
                .values()
                .filter(|org| org.parent_id() == Some(parent_id) && org.id() != parent_id)
                .map(OrgNode::id)
                .collect();
            for child_id in child_ids {
                if let Some(child) = orgs.get(&child_id) {
                    let mut child = child.clone();
                    child.reparent(&parent)?;
                    orgs.insert(child_id, child);
                }
                frontier.push(child_id);
            }
        }

        let mut classes = self.classes.write().await;
        for class in classes.values_mut() {
            if let Some(owner) = orgs.get(&class.org_id())
                && class.org_ancestry_path() != owner.ancestry_path()
            {
                class.refresh_owning_path(owner)?;
            }
        }

        Ok(())
    }

    async fn ensure_target_exists(&self, target: HierarchyTarget) -> AppResult<()> {
        let exists = match target {
            HierarchyTarget::Org(id) => self.orgs.read().await.contains_key(&id),
            HierarchyTarget::Class(id) => self.classes.read().await.contains_key(&id),
            HierarchyTarget::Group(id) => self.groups.read().await.contains_key(&id),
        };

        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "{} '{}' does not exist",
                target.kind_str(),
                target.target_uuid()
            )))
        }
    }

    /// Ancestry paths of orgs the principal is actively a member of via any
    /// of the given roles.
    async fn active_member_org_paths(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> Vec<AncestryPath> {
        let orgs = self.orgs.read().await;
        self.memberships
            .read()
            .await
            .iter()
            .filter(|membership| {
                membership.principal_id == *principal_id
                    && roles.contains(&membership.role)
                    && membership.is_active_at(at)
            })
            .filter_map(|membership| match membership.target {
                HierarchyTarget::Org(org_id) => {
                    orgs.get(&org_id).map(|org| org.ancestry_path().clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Owning-org paths of classes the principal is actively a member of.
    async fn active_member_class_paths(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> Vec<AncestryPath> {
        let classes = self.classes.read().await;
        self.memberships
            .read()
            .await
            .iter()
            .filter(|membership| {
                membership.principal_id == *principal_id
                    && roles.contains(&membership.role)
                    && membership.is_active_at(at)
            })
            .filter_map(|membership| match membership.target {
                HierarchyTarget::Class(class_id) => classes
                    .get(&class_id)
                    .map(|class| class.org_ancestry_path().clone()),
                _ => None,
            })
            .collect()
    }

    /// Resources assigned to orgs matching `predicate` against any of the
    /// member paths.
    async fn org_assigned_resources_matching(
        &self,
        member_paths: &[AncestryPath],
        predicate: impl Fn(&AncestryPath, &AncestryPath) -> bool,
    ) -> Vec<ResourceId> {
        let orgs = self.orgs.read().await;
        self.assignments
            .read()
            .await
            .iter()
            .filter_map(|assignment| {
                let HierarchyTarget::Org(org_id) = assignment.target else {
                    return None;
                };
                let assigned_org = orgs.get(&org_id)?;
                member_paths
                    .iter()
                    .any(|member_path| predicate(assigned_org.ancestry_path(), member_path))
                    .then(|| assignment.resource_id.clone())
            })
            .collect()
    }
}

#[async_trait]
impl AccessRepository for InMemoryAccessRepository {
    async fn org_ancestor_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let member_paths = self.active_member_org_paths(principal_id, roles, at).await;
        Ok(self
            .org_assigned_resources_matching(member_paths.as_slice(), |assigned, member| {
                assigned.is_ancestor_or_equal(member)
            })
            .await)
    }

    async fn class_ancestor_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let member_paths = self
            .active_member_class_paths(principal_id, roles, at)
            .await;
        Ok(self
            .org_assigned_resources_matching(member_paths.as_slice(), |assigned, member| {
                assigned.is_ancestor_or_equal(member)
            })
            .await)
    }

    async fn class_direct_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let memberships = self.memberships.read().await;
        let member_classes: Vec<ClassId> = memberships
            .iter()
            .filter(|membership| {
                membership.principal_id == *principal_id
                    && roles.contains(&membership.role)
                    && membership.is_active_at(at)
            })
            .filter_map(|membership| match membership.target {
                HierarchyTarget::Class(class_id) => Some(class_id),
                _ => None,
            })
            .collect();

        Ok(self
            .assignments
            .read()
            .await
            .iter()
            .filter_map(|assignment| {
                let HierarchyTarget::Class(class_id) = assignment.target else {
                    return None;
                };
                member_classes
                    .contains(&class_id)
                    .then(|| assignment.resource_id.clone())
            })
            .collect())
    }

    async fn group_direct_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let memberships = self.memberships.read().await;
        let member_groups: Vec<GroupId> = memberships
            .iter()
            .filter(|membership| {
                membership.principal_id == *principal_id
                    && roles.contains(&membership.role)
                    && membership.is_active_at(at)
            })
            .filter_map(|membership| match membership.target {
                HierarchyTarget::Group(group_id) => Some(group_id),
                _ => None,
            })
            .collect();

        Ok(self
            .assignments
            .read()
            .await
            .iter()
            .filter_map(|assignment| {
                let HierarchyTarget::Group(group_id) = assignment.target else {
                    return None;
                };
                member_groups
                    .contains(&group_id)
                    .then(|| assignment.resource_id.clone())
            })
            .collect())
    }

    async fn org_descendant_org_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let member_paths = self.active_member_org_paths(principal_id, roles, at).await;
        Ok(self
            .org_assigned_resources_matching(member_paths.as_slice(), |assigned, member| {
                assigned.is_descendant_or_equal(member)
            })
            .await)
    }

    async fn org_descendant_class_resource_ids(
        &self,
        principal_id: &PrincipalId,
        roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceId>> {
        let member_paths = self.active_member_org_paths(principal_id, roles, at).await;
        let classes = self.classes.read().await;

        Ok(self
            .assignments
            .read()
            .await
            .iter()
            .filter_map(|assignment| {
                let HierarchyTarget::Class(class_id) = assignment.target else {
                    return None;
                };
                let class = classes.get(&class_id)?;
                member_paths
                    .iter()
                    .any(|member_path| class.org_ancestry_path().is_descendant_or_equal(member_path))
                    .then(|| assignment.resource_id.clone())
            })
            .collect())
    }

    async fn org_assignment_org_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        let orgs = self.orgs.read().await;
        let memberships = self.memberships.read().await;
        let assignments = self.assignments.read().await;

        let mut pairs = Vec::new();
        for assignment in assignments.iter() {
            let HierarchyTarget::Org(org_id) = assignment.target else {
                continue;
            };
            if !resource_ids.contains(&assignment.resource_id) {
                continue;
            }
            let Some(assigned_org) = orgs.get(&org_id) else {
                continue;
            };

            for membership in memberships.iter() {
                let HierarchyTarget::Org(member_org_id) = membership.target else {
                    continue;
                };
                if !membership.is_active_at(at) {
                    continue;
                }
                let Some(member_org) = orgs.get(&member_org_id) else {
                    continue;
                };
                if member_org
                    .ancestry_path()
                    .is_descendant_or_equal(assigned_org.ancestry_path())
                {
                    pairs.push(ResourceAssignee {
                        resource_id: assignment.resource_id.clone(),
                        principal_id: membership.principal_id.clone(),
                    });
                }
            }
        }

        Ok(pairs)
    }

    async fn org_assignment_class_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        let orgs = self.orgs.read().await;
        let classes = self.classes.read().await;
        let memberships = self.memberships.read().await;
        let assignments = self.assignments.read().await;

        let mut pairs = Vec::new();
        for assignment in assignments.iter() {
            let HierarchyTarget::Org(org_id) = assignment.target else {
                continue;
            };
            if !resource_ids.contains(&assignment.resource_id) {
                continue;
            }
            let Some(assigned_org) = orgs.get(&org_id) else {
                continue;
            };

            for membership in memberships.iter() {
                let HierarchyTarget::Class(class_id) = membership.target else {
                    continue;
                };
                if !membership.is_active_at(at) {
                    continue;
                }
                let Some(class) = classes.get(&class_id) else {
                    continue;
                };
                if class
                    .org_ancestry_path()
                    .is_descendant_or_equal(assigned_org.ancestry_path())
                {
                    pairs.push(ResourceAssignee {
                        resource_id: assignment.resource_id.clone(),
                        principal_id: membership.principal_id.clone(),
                    });
                }
            }
        }

        Ok(pairs)
    }

    async fn class_assignment_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        let memberships = self.memberships.read().await;
        let assignments = self.assignments.read().await;

        let mut pairs = Vec::new();
        for assignment in assignments.iter() {
            let HierarchyTarget::Class(class_id) = assignment.target else {
                continue;
            };
            if !resource_ids.contains(&assignment.resource_id) {
                continue;
            }

            for membership in memberships.iter() {
                if membership.target == HierarchyTarget::Class(class_id)
                    && membership.is_active_at(at)
                {
                    pairs.push(ResourceAssignee {
                        resource_id: assignment.resource_id.clone(),
                        principal_id: membership.principal_id.clone(),
                    });
                }
            }
        }

        Ok(pairs)
    }

    async fn group_assignment_assignees(
        &self,
        resource_ids: &[ResourceId],
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResourceAssignee>> {
        let memberships = self.memberships.read().await;
        let assignments = self.assignments.read().await;

        let mut pairs = Vec::new();
        for assignment in assignments.iter() {
            let HierarchyTarget::Group(group_id) = assignment.target else {
                continue;
            };
            if !resource_ids.contains(&assignment.resource_id) {
                continue;
            }

            for membership in memberships.iter() {
                if membership.target == HierarchyTarget::Group(group_id)
                    && membership.is_active_at(at)
                {
                    pairs.push(ResourceAssignee {
                        resource_id: assignment.resource_id.clone(),
                        principal_id: membership.principal_id.clone(),
                    });
                }
            }
        }

        Ok(pairs)
    }

    async fn roles_linking_principal_to_resource(
        &self,
        principal_id: &PrincipalId,
        resource_id: &ResourceId,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Role>> {
        let orgs = self.orgs.read().await;
        let classes = self.classes.read().await;
        let memberships = self.memberships.read().await;
        let assignments = self.assignments.read().await;

        let resource_targets: Vec<HierarchyTarget> = assignments
            .iter()
            .filter(|assignment| assignment.resource_id == *resource_id)
            .map(|assignment| assignment.target)
            .collect();

        let mut roles = std::collections::BTreeSet::new();
        for membership in memberships.iter() {
            if membership.principal_id != *principal_id || !membership.is_active_at(at) {
                continue;
            }

            for target in resource_targets.iter() {
                let grants = match (membership.target, *target) {
                    (HierarchyTarget::Org(member_org_id), HierarchyTarget::Org(assigned_org_id)) => {
                        match (orgs.get(&member_org_id), orgs.get(&assigned_org_id)) {
                            (Some(member_org), Some(assigned_org)) => {
                                assigned_org
                                    .ancestry_path()
                                    .is_ancestor_or_equal(member_org.ancestry_path())
                                    || (membership.role.is_supervisory()
                                        && assigned_org
                                            .ancestry_path()
                                            .is_descendant_or_equal(member_org.ancestry_path()))
                            }
                            _ => false,
                        }
                    }
                    (
                        HierarchyTarget::Org(member_org_id),
                        HierarchyTarget::Class(assigned_class_id),
                    ) => {
                        membership.role.is_supervisory()
                            && match (orgs.get(&member_org_id), classes.get(&assigned_class_id)) {
                                (Some(member_org), Some(class)) => class
                                    .org_ancestry_path()
                                    .is_descendant_or_equal(member_org.ancestry_path()),
                                _ => false,
                            }
                    }
                    (
                        HierarchyTarget::Class(member_class_id),
                        HierarchyTarget::Org(assigned_org_id),
                    ) => match (classes.get(&member_class_id), orgs.get(&assigned_org_id)) {
                        (Some(class), Some(assigned_org)) => assigned_org
                            .ancestry_path()
                            .is_ancestor_or_equal(class.org_ancestry_path()),
                        _ => false,
                    },
                    (
                        HierarchyTarget::Class(member_class_id),
                        HierarchyTarget::Class(assigned_class_id),
                    ) => member_class_id == assigned_class_id,
                    (
                        HierarchyTarget::Group(member_group_id),
                        HierarchyTarget::Group(assigned_group_id),
                    ) => member_group_id == assigned_group_id,
                    _ => false,
                };

                if grants {
                    roles.insert(membership.role);
                }
            }
        }

        Ok(roles.into_iter().collect())
    }
}
