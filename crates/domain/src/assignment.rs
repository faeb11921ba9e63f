use rosterguard_core::ResourceId;
use serde::{Deserialize, Serialize};

use crate::HierarchyTarget;

/// Attachment of a protected resource to one hierarchy target.
///
/// A resource may carry many assignments (one row per target). Assignments
/// are not time-bounded; visibility windows live on memberships only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAssignment {
    /// Resource being attached.
    pub resource_id: ResourceId,
    /// Org, class or group the resource is attached to.
    pub target: HierarchyTarget,
}

impl ResourceAssignment {
    /// Creates an assignment linking `resource_id` to `target`.
    #[must_use]
    pub fn new(resource_id: ResourceId, target: HierarchyTarget) -> Self {
        Self {
            resource_id,
            target,
        }
    }
}
