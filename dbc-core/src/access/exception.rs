//! Policy exception lifecycle.
//!
//! ```text
//! PENDING ──approve──▶ APPROVED ──revoke──▶ REVOKED
//!    │                                        ▲
//!    ├──reject───▶ REJECTED                    │
//!    └──────────────────revoke────────────────┘
//! ```
//!
//! Expiry is derived from the time window and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ExceptionAction, ExceptionStatus, NewPolicyException, PolicyException};

/// Status as seen at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectiveStatus {
    Pending,
    /// Approved but the window has not opened yet.
    Scheduled,
    Active,
    Expired,
    Rejected,
    Revoked,
}

impl EffectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveStatus::Pending => "PENDING",
            EffectiveStatus::Scheduled => "SCHEDULED",
            EffectiveStatus::Active => "ACTIVE",
            EffectiveStatus::Expired => "EXPIRED",
            EffectiveStatus::Rejected => "REJECTED",
            EffectiveStatus::Revoked => "REVOKED",
        }
    }
}

impl std::fmt::Display for EffectiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PolicyException {
    /// Approved and `start_time <= now <= end_time`.
    pub fn is_active_at(&self, now: &DateTime<Utc>) -> bool {
        self.status == ExceptionStatus::Approved && self.start_time <= *now && *now <= self.end_time
    }

    pub fn effective_status(&self, now: &DateTime<Utc>) -> EffectiveStatus {
        match self.status {
            ExceptionStatus::Pending if *now > self.end_time => EffectiveStatus::Expired,
            ExceptionStatus::Pending => EffectiveStatus::Pending,
            ExceptionStatus::Rejected => EffectiveStatus::Rejected,
            ExceptionStatus::Revoked => EffectiveStatus::Revoked,
            ExceptionStatus::Approved if *now > self.end_time => EffectiveStatus::Expired,
            ExceptionStatus::Approved if *now < self.start_time => EffectiveStatus::Scheduled,
            ExceptionStatus::Approved => EffectiveStatus::Active,
        }
    }
}

/// Status reached by applying `action` to an exception in `from`.
pub fn next_status(from: ExceptionStatus, action: ExceptionAction) -> Result<ExceptionStatus> {
    use ExceptionAction as A;
    use ExceptionStatus as S;

    match (from, action) {
        (S::Pending, A::Approve) => Ok(S::Approved),
        (S::Pending, A::Reject) => Ok(S::Rejected),
        (S::Pending | S::Approved, A::Revoke) => Ok(S::Revoked),
        (from, action) => Err(Error::InvalidTransition(format!(
            "cannot {} an exception that is {}",
            action.as_str().to_ascii_lowercase(),
            from
        ))),
    }
}

/// Validate a new exception request.
pub fn validate_request(request: &NewPolicyException) -> Result<()> {
    if request.subject_id.trim().is_empty() {
        return Err(Error::validation("Exception subjectId is required"));
    }
    if request.override_privilege.trim().is_empty() {
        return Err(Error::validation("Exception overridePrivilege is required"));
    }
    if request.purpose.trim().is_empty() {
        return Err(Error::validation("Exception purpose is required"));
    }
    if request.end_time < request.start_time {
        return Err(Error::validation("Exception endTime must not be before startTime"));
    }
    Ok(())
}
