use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rosterguard_core::{AppResult, PrincipalId, ResourceId};
use rosterguard_domain::Role;

use crate::{AccessFilter, AccessRepository, ResourceAssignee};

/// Application service answering hierarchy reachability questions.
///
/// Stateless and read-only: every operation re-reads current membership and
/// assignment state through the repository port, captures one snapshot
/// instant per logical call, and merges the per-path sub-results with
/// order-insensitive unions.
#[derive(Clone)]
pub struct AccessResolutionService {
    repository: Arc<dyn AccessRepository>,
}

impl AccessResolutionService {
    /// Creates a new resolution service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AccessRepository>) -> Self {
        Self { repository }
    }

    /// Returns every resource id the principal can reach via any of the
    /// allowed roles.
    ///
    /// Validates the inputs before issuing any query; fails with a
    /// validation error on an empty principal id, an empty role set, or an
    /// unknown role value.
    pub async fn accessible_resource_ids(
        &self,
        principal_id: &str,
        allowed_roles: &[String],
    ) -> AppResult<BTreeSet<ResourceId>> {
        let filter = AccessFilter::parse(principal_id, allowed_roles)?;
        self.accessible_resource_ids_for(&filter).await
    }

    /// Typed variant of [`Self::accessible_resource_ids`] for callers that
    /// already hold a validated filter.
    pub async fn accessible_resource_ids_for(
        &self,
        filter: &AccessFilter,
    ) -> AppResult<BTreeSet<ResourceId>> {
        let at = Utc::now();

        let mut reachable = self.ancestor_access_union(filter, at).await?;

        // Descendant predicates intersected with a role filter containing
        // no supervisory role yield the empty set, so the skip below never
        // changes the result, it only avoids two provably empty queries.
        let supervisory = Role::filter_supervisory(filter.roles());
        if !supervisory.is_empty() {
            reachable.extend(
                self.descendant_access_union(filter.principal_id(), supervisory.as_slice(), at)
                    .await?,
            );
        }

        Ok(reachable)
    }

    /// Returns the raw (resource, principal) reachability multiset for the
    /// given resources: one entry per access path, duplicates preserved.
    ///
    /// An empty input set returns an empty result immediately, without
    /// touching the repository.
    pub async fn resource_assignees(
        &self,
        resource_ids: &[String],
    ) -> AppResult<Vec<ResourceAssignee>> {
        let resource_ids = parse_resource_ids(resource_ids)?;
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.collect_assignees(resource_ids.as_slice()).await
    }

    /// Returns the number of distinct principals that can reach each
    /// resource.
    ///
    /// A resource with zero assignees is omitted from the map; callers
    /// treat a missing key as zero. An empty input set short-circuits to an
    /// empty map without touching the repository.
    pub async fn assignee_counts(
        &self,
        resource_ids: &[String],
    ) -> AppResult<BTreeMap<ResourceId, u64>> {
        let resource_ids = parse_resource_ids(resource_ids)?;
        if resource_ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let pairs = self.collect_assignees(resource_ids.as_slice()).await?;

        let distinct: BTreeSet<(ResourceId, PrincipalId)> = pairs
            .into_iter()
            .map(|pair| (pair.resource_id, pair.principal_id))
            .collect();

        let mut counts = BTreeMap::new();
        for (resource_id, _) in distinct {
            *counts.entry(resource_id).or_insert(0) += 1;
        }

        Ok(counts)
    }

    /// Returns the distinct roles that grant the principal access to the
    /// resource, or the empty set when no active path exists.
    pub async fn roles_for_resource(
        &self,
        principal_id: &str,
        resource_id: &str,
    ) -> AppResult<BTreeSet<Role>> {
        let principal_id = PrincipalId::new(principal_id)?;
        let resource_id = ResourceId::new(resource_id)?;

        let roles = self
            .repository
            .roles_linking_principal_to_resource(&principal_id, &resource_id, Utc::now())
            .await?;

        Ok(roles.into_iter().collect())
    }

    /// Returns whether the principal holds any supervisory role granting
    /// access to the resource.
    pub async fn has_supervisory_role_for_resource(
        &self,
        principal_id: &str,
        resource_id: &str,
    ) -> AppResult<bool> {
        let roles = self.roles_for_resource(principal_id, resource_id).await?;
        Ok(roles.iter().any(Role::is_supervisory))
    }

    /// Ancestor-access union: the four paths every role gets, regardless of
    /// the supervisory partition.
    async fn ancestor_access_union(
        &self,
        filter: &AccessFilter,
        at: DateTime<Utc>,
    ) -> AppResult<BTreeSet<ResourceId>> {
        let principal_id = filter.principal_id();
        let roles = filter.roles();

        let mut union = BTreeSet::new();
        union.extend(
            self.repository
                .org_ancestor_resource_ids(principal_id, roles, at)
                .await?,
        );
        union.extend(
            self.repository
                .class_ancestor_resource_ids(principal_id, roles, at)
                .await?,
        );
        union.extend(
            self.repository
                .class_direct_resource_ids(principal_id, roles, at)
                .await?,
        );
        union.extend(
            self.repository
                .group_direct_resource_ids(principal_id, roles, at)
                .await?,
        );

        Ok(union)
    }

    /// Descendant-access union, restricted to the supervisory role subset.
    async fn descendant_access_union(
        &self,
        principal_id: &PrincipalId,
        supervisory_roles: &[Role],
        at: DateTime<Utc>,
    ) -> AppResult<BTreeSet<ResourceId>> {
        let mut union = BTreeSet::new();
        union.extend(
            self.repository
                .org_descendant_org_resource_ids(principal_id, supervisory_roles, at)
                .await?,
        );
        union.extend(
            self.repository
                .org_descendant_class_resource_ids(principal_id, supervisory_roles, at)
                .await?,
        );

        Ok(union)
    }

    /// Concatenates the four inverse path results for one snapshot instant.
    async fn collect_assignees(
        &self,
        resource_ids: &[ResourceId],
    ) -> AppResult<Vec<ResourceAssignee>> {
        let at = Utc::now();

        let mut pairs = self
            .repository
            .org_assignment_org_assignees(resource_ids, at)
            .await?;
        pairs.extend(
            self.repository
                .org_assignment_class_assignees(resource_ids, at)
                .await?,
        );
        pairs.extend(
            self.repository
                .class_assignment_assignees(resource_ids, at)
                .await?,
        );
        pairs.extend(
            self.repository
                .group_assignment_assignees(resource_ids, at)
                .await?,
        );

        Ok(pairs)
    }
}

/// Validates each id and deduplicates the set, preserving nothing of the
/// input order (the merge downstream is order-insensitive anyway).
fn parse_resource_ids(resource_ids: &[String]) -> AppResult<Vec<ResourceId>> {
    let mut ids = BTreeSet::new();
    for value in resource_ids {
        ids.insert(ResourceId::new(value.as_str())?);
    }

    Ok(ids.into_iter().collect())
}
