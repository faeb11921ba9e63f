use chrono::{DateTime, Utc};
use rosterguard_core::{AppError, AppResult, PrincipalId};
use serde::{Deserialize, Serialize};

use crate::{HierarchyTarget, Role};

/// Validity interval of a membership.
///
/// A membership is active at `now` iff `start <= now` and the end bound,
/// when present, has not passed. Revocation is logical: the end bound is
/// set, the row is never deleted by this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentWindow {
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
}

impl EnrollmentWindow {
    /// Creates a bounded or open-ended window.
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> AppResult<Self> {
        if let Some(end) = end
            && end < start
        {
            return Err(AppError::Validation(format!(
                "enrollment window may not end ('{end}') before it starts ('{start}')"
            )));
        }

        Ok(Self { start, end })
    }

    /// Creates an open-ended window starting at `start`.
    #[must_use]
    pub fn open_from(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    /// Returns whether the window covers the given instant.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && self.end.is_none_or(|end| end >= now)
    }

    /// Logically closes the window at the given instant.
    pub fn close(&mut self, end: DateTime<Utc>) -> AppResult<()> {
        if end < self.start {
            return Err(AppError::Validation(format!(
                "enrollment window may not end ('{end}') before it starts ('{}')",
                self.start
            )));
        }

        self.end = Some(end);
        Ok(())
    }

    /// Returns the start of the window.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the end of the window, if bounded.
    #[must_use]
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }
}

/// Time-bounded, role-tagged attachment of a principal to a hierarchy
/// target. A principal may hold many memberships simultaneously, including
/// several roles on the same target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Principal holding the membership.
    pub principal_id: PrincipalId,
    /// Org, class or group the membership attaches to.
    pub target: HierarchyTarget,
    /// Role held on the target.
    pub role: Role,
    /// Validity interval.
    pub enrollment: EnrollmentWindow,
}

impl Membership {
    /// Returns whether the membership is active at the given instant.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.enrollment.is_active_at(now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::EnrollmentWindow;

    #[test]
    fn window_rejects_end_before_start() {
        let now = Utc::now();
        let result = EnrollmentWindow::new(now, Some(now - Duration::days(1)));
        assert!(result.is_err());
    }

    #[test]
    fn open_window_is_active_after_start() {
        let now = Utc::now();
        let window = EnrollmentWindow::open_from(now - Duration::days(30));
        assert!(window.is_active_at(now));
    }

    #[test]
    fn future_start_is_inactive() {
        let now = Utc::now();
        let window = EnrollmentWindow::open_from(now + Duration::days(1));
        assert!(!window.is_active_at(now));
    }

    #[test]
    fn closing_a_window_ends_activity() {
        let now = Utc::now();
        let mut window = EnrollmentWindow::open_from(now - Duration::days(30));
        assert!(window.close(now - Duration::days(1)).is_ok());
        assert!(!window.is_active_at(now));
        // The boundary instant itself is still covered.
        assert!(window.is_active_at(now - Duration::days(1)));
    }
}
