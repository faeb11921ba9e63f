//! Organizational hierarchy nodes and materialized ancestry paths.
//!
//! Ancestor/descendant reachability is answered by prefix comparison over a
//! derived path attribute instead of recursive parent-pointer traversal. The
//! path is recomputed whenever a node is re-parented; subtree rewrites are
//! the owning repository's concern.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rosterguard_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PATH_SEPARATOR: char = '.';

/// Unique identifier for an organizational unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrgId(Uuid);

impl OrgId {
    /// Creates a new random org identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an org identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrgId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for OrgId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier for a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(Uuid);

impl ClassId {
    /// Creates a new random class identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a class identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ClassId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ClassId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier for a standalone group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(Uuid);

impl GroupId {
    /// Creates a new random group identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a group identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for GroupId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Dot-joined sequence of org ids from the root down to the owning org.
///
/// A node's path is a literal segment prefix of all of its descendants'
/// paths, which makes both reachability predicates a single comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AncestryPath(String);

impl AncestryPath {
    /// Creates the path of a root org.
    #[must_use]
    pub fn root(org_id: OrgId) -> Self {
        Self(org_id.to_string())
    }

    /// Creates the path of a direct child of this path's org.
    #[must_use]
    pub fn child(&self, org_id: OrgId) -> Self {
        Self(format!("{}{PATH_SEPARATOR}{org_id}", self.0))
    }

    /// Returns true iff `self` equals `ancestor` or extends it by one or
    /// more whole segments.
    #[must_use]
    pub fn is_descendant_or_equal(&self, ancestor: &AncestryPath) -> bool {
        extends_by_segments(self.0.as_str(), ancestor.0.as_str())
    }

    /// Returns true iff `self` is a segment prefix of (or equal to)
    /// `candidate`.
    #[must_use]
    pub fn is_ancestor_or_equal(&self, candidate: &AncestryPath) -> bool {
        extends_by_segments(candidate.0.as_str(), self.0.as_str())
    }

    /// Returns true iff the path already carries the given org id as a
    /// segment. Used to reject re-parenting cycles.
    #[must_use]
    pub fn contains(&self, org_id: OrgId) -> bool {
        let segment = org_id.to_string();
        self.segments().any(|candidate| candidate == segment)
    }

    /// Iterates the org id segments from root to leaf.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(PATH_SEPARATOR)
    }

    /// Returns the underlying string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for AncestryPath {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Segment-boundary-safe prefix test. A raw string prefix is not enough:
/// the extension must be empty or start at a separator.
fn extends_by_segments(candidate: &str, ancestor: &str) -> bool {
    match candidate.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with(PATH_SEPARATOR),
        None => false,
    }
}

/// Kind of an organizational unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgType {
    /// Top-level administrative unit.
    District,
    /// School owned by a district.
    School,
}

impl OrgType {
    /// Returns a stable storage value for this org type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::District => "district",
            Self::School => "school",
        }
    }
}

impl FromStr for OrgType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "district" => Ok(Self::District),
            "school" => Ok(Self::School),
            _ => Err(AppError::Validation(format!(
                "unknown org type value '{value}'"
            ))),
        }
    }
}

/// One organizational unit with its position in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgNode {
    id: OrgId,
    org_type: OrgType,
    parent_id: Option<OrgId>,
    ancestry_path: AncestryPath,
}

impl OrgNode {
    /// Creates a root org with a single-segment ancestry path.
    #[must_use]
    pub fn root(id: OrgId, org_type: OrgType) -> Self {
        Self {
            id,
            org_type,
            parent_id: None,
            ancestry_path: AncestryPath::root(id),
        }
    }

    /// Creates an org attached under `parent`.
    ///
    /// Fails with a validation error when `id` already appears in the
    /// parent's lineage, which would make the node its own ancestor.
    pub fn child_of(parent: &OrgNode, id: OrgId, org_type: OrgType) -> AppResult<Self> {
        if parent.ancestry_path.contains(id) {
            return Err(AppError::Validation(format!(
                "org '{id}' cannot become its own ancestor"
            )));
        }

        Ok(Self {
            id,
            org_type,
            parent_id: Some(parent.id),
            ancestry_path: parent.ancestry_path.child(id),
        })
    }

    /// Moves this org under a new parent, recomputing the ancestry path.
    ///
    /// Descendant paths are derived attributes owned by the repository and
    /// must be rewritten alongside this call.
    pub fn reparent(&mut self, new_parent: &OrgNode) -> AppResult<()> {
        if new_parent.ancestry_path.contains(self.id) {
            return Err(AppError::Validation(format!(
                "org '{}' cannot become its own ancestor",
                self.id
            )));
        }

        self.parent_id = Some(new_parent.id);
        self.ancestry_path = new_parent.ancestry_path.child(self.id);
        Ok(())
    }

    /// Returns the org identifier.
    #[must_use]
    pub fn id(&self) -> OrgId {
        self.id
    }

    /// Returns the org kind.
    #[must_use]
    pub fn org_type(&self) -> OrgType {
        self.org_type
    }

    /// Returns the parent org, if this org is not a root.
    #[must_use]
    pub fn parent_id(&self) -> Option<OrgId> {
        self.parent_id
    }

    /// Returns the materialized ancestry path.
    #[must_use]
    pub fn ancestry_path(&self) -> &AncestryPath {
        &self.ancestry_path
    }
}

/// One class, always owned by exactly one org.
///
/// The owning org's ancestry path is denormalized onto the class so class
/// reachability queries need no extra join; it must be rewritten whenever
/// the owning org moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNode {
    id: ClassId,
    org_id: OrgId,
    org_ancestry_path: AncestryPath,
}

impl ClassNode {
    /// Creates a class owned by the given org.
    #[must_use]
    pub fn new(id: ClassId, owning_org: &OrgNode) -> Self {
        Self {
            id,
            org_id: owning_org.id(),
            org_ancestry_path: owning_org.ancestry_path().clone(),
        }
    }

    /// Re-derives the denormalized path after the owning org moved.
    pub fn refresh_owning_path(&mut self, owning_org: &OrgNode) -> AppResult<()> {
        if owning_org.id() != self.org_id {
            return Err(AppError::Validation(format!(
                "class '{}' is owned by org '{}', not '{}'",
                self.id,
                self.org_id,
                owning_org.id()
            )));
        }

        self.org_ancestry_path = owning_org.ancestry_path().clone();
        Ok(())
    }

    /// Returns the class identifier.
    #[must_use]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Returns the owning org identifier.
    #[must_use]
    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Returns the owning org's ancestry path.
    #[must_use]
    pub fn org_ancestry_path(&self) -> &AncestryPath {
        &self.org_ancestry_path
    }
}

/// One standalone group. Groups sit outside the org tree and confer access
/// to their own resources only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupNode {
    id: GroupId,
}

impl GroupNode {
    /// Creates a group node.
    #[must_use]
    pub fn new(id: GroupId) -> Self {
        Self { id }
    }

    /// Returns the group identifier.
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.id
    }
}

/// Hierarchy attachment point shared by memberships and assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyTarget {
    /// Attachment to an organizational unit.
    Org(OrgId),
    /// Attachment to a class.
    Class(ClassId),
    /// Attachment to a standalone group.
    Group(GroupId),
}

impl HierarchyTarget {
    /// Returns a stable storage value for the target kind.
    #[must_use]
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Org(_) => "org",
            Self::Class(_) => "class",
            Self::Group(_) => "group",
        }
    }

    /// Returns the raw target identifier.
    #[must_use]
    pub fn target_uuid(&self) -> Uuid {
        match self {
            Self::Org(id) => id.as_uuid(),
            Self::Class(id) => id.as_uuid(),
            Self::Group(id) => id.as_uuid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::{AncestryPath, OrgId, OrgNode, OrgType, extends_by_segments};

    fn district() -> OrgNode {
        OrgNode::root(OrgId::new(), OrgType::District)
    }

    #[test]
    fn path_is_descendant_of_itself() {
        let path = AncestryPath::root(OrgId::new());
        assert!(path.is_descendant_or_equal(&path));
        assert!(path.is_ancestor_or_equal(&path));
    }

    #[test]
    fn child_path_is_descendant_of_parent() {
        let parent = AncestryPath::root(OrgId::new());
        let child = parent.child(OrgId::new());
        assert!(child.is_descendant_or_equal(&parent));
        assert!(parent.is_ancestor_or_equal(&child));
        assert!(!parent.is_descendant_or_equal(&child));
    }

    #[test]
    fn sibling_paths_are_unrelated() {
        let parent = AncestryPath::root(OrgId::new());
        let left = parent.child(OrgId::new());
        let right = parent.child(OrgId::new());
        assert!(!left.is_descendant_or_equal(&right));
        assert!(!right.is_ancestor_or_equal(&left));
    }

    #[test]
    fn raw_string_prefix_does_not_imply_ancestry() {
        // Segment ids sharing a string prefix must not alias.
        assert!(extends_by_segments("a.b", "a"));
        assert!(!extends_by_segments("a.bc", "a.b"));
        assert!(!extends_by_segments("ab", "a"));
    }

    #[test]
    fn child_of_rejects_cycle() {
        let root = district();
        let result = OrgNode::child_of(&root, root.id(), OrgType::School);
        assert!(result.is_err());
    }

    #[test]
    fn reparent_recomputes_path_and_rejects_cycles() {
        let root = district();
        let other_root = district();
        let school_id = OrgId::new();
        let school = OrgNode::child_of(&root, school_id, OrgType::School);
        assert!(school.is_ok());
        let Ok(mut school) = school else {
            unreachable!();
        };

        assert!(school.reparent(&other_root).is_ok());
        assert_eq!(school.parent_id(), Some(other_root.id()));
        assert!(
            school
                .ancestry_path()
                .is_descendant_or_equal(other_root.ancestry_path())
        );

        let mut moved_root = other_root.clone();
        assert!(moved_root.reparent(&school).is_err());
    }

    proptest! {
        #[test]
        fn extending_a_path_yields_a_descendant(depth in 1usize..6, extra in 1usize..4) {
            let mut path = AncestryPath::root(OrgId::new());
            for _ in 1..depth {
                path = path.child(OrgId::new());
            }

            let mut extended = path.clone();
            for _ in 0..extra {
                extended = extended.child(OrgId::new());
            }

            prop_assert!(extended.is_descendant_or_equal(&path));
            prop_assert!(path.is_ancestor_or_equal(&extended));
            prop_assert!(!path.is_descendant_or_equal(&extended));
        }

        #[test]
        fn predicates_are_dual(left_depth in 1usize..5, right_depth in 1usize..5) {
            let mut left = AncestryPath::root(OrgId::new());
            for _ in 1..left_depth {
                left = left.child(OrgId::new());
            }
            let mut right = AncestryPath::root(OrgId::new());
            for _ in 1..right_depth {
                right = right.child(OrgId::new());
            }

            prop_assert_eq!(
                left.is_descendant_or_equal(&right),
                right.is_ancestor_or_equal(&left)
            );
        }

        #[test]
        fn distinct_roots_never_relate(seed_a in any::<u128>(), seed_b in any::<u128>()) {
            prop_assume!(seed_a != seed_b);
            let left = AncestryPath::root(OrgId::from_uuid(Uuid::from_u128(seed_a)));
            let right = AncestryPath::root(OrgId::from_uuid(Uuid::from_u128(seed_b)));
            prop_assert!(!left.is_descendant_or_equal(&right));
            prop_assert!(!left.is_ancestor_or_equal(&right));
        }
    }
}
