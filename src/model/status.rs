//! Generic lifecycle status enumeration.
//!
//! Most cloud resources report some spelling of the same handful of
//! lifecycle statuses. [`LifecycleStatus`] is the closed enumeration used by
//! the data-driven resource kind and the simulated remote.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle status of a remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    /// The resource is being created.
    Creating,
    /// The resource is ready for use.
    Available,
    /// The resource is applying an update.
    Updating,
    /// The resource is being deleted.
    Deleting,
    /// The resource was deleted; the record persists for audit purposes.
    Deleted,
    /// The resource entered a terminal failure state.
    Failed,
}

/// Error returned when a status string is not part of [`LifecycleStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown lifecycle status: {0}")]
pub struct UnknownStatus(pub String);

impl LifecycleStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Creating,
        Self::Available,
        Self::Updating,
        Self::Deleting,
        Self::Deleted,
        Self::Failed,
    ];

    /// Canonical wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Available => "AVAILABLE",
            Self::Updating => "UPDATING",
            Self::Deleting => "DELETING",
            Self::Deleted => "DELETED",
            Self::Failed => "FAILED",
        }
    }
}

impl FromStr for LifecycleStatus {
    type Err = UnknownStatus;

    /// Parses a status, accepting the common spellings used by cloud APIs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "CREATING" | "CREATE_IN_PROGRESS" | "PENDING" | "PROVISIONING" => Ok(Self::Creating),
            "AVAILABLE" | "ACTIVE" | "READY" | "RUNNING" | "CREATE_COMPLETE" | "UPDATE_COMPLETE" => {
                Ok(Self::Available)
            }
            "UPDATING" | "UPDATE_IN_PROGRESS" | "MODIFYING" => Ok(Self::Updating),
            "DELETING" | "DELETE_IN_PROGRESS" | "SHUTTING_DOWN" => Ok(Self::Deleting),
            "DELETED" | "DELETE_COMPLETE" | "TERMINATED" | "CANCELLED" => Ok(Self::Deleted),
            "FAILED" | "CREATE_FAILED" | "UPDATE_FAILED" | "DELETE_FAILED" | "ERROR" => Ok(Self::Failed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_spellings() {
        assert_eq!("available".parse::<LifecycleStatus>(), Ok(LifecycleStatus::Available));
        assert_eq!("create-in-progress".parse::<LifecycleStatus>(), Ok(LifecycleStatus::Creating));
        assert_eq!("terminated".parse::<LifecycleStatus>(), Ok(LifecycleStatus::Deleted));
        assert_eq!("DELETE_IN_PROGRESS".parse::<LifecycleStatus>(), Ok(LifecycleStatus::Deleting));
    }

    #[test]
    fn test_parse_round_trips_canonical_names() {
        for status in LifecycleStatus::ALL {
            assert_eq!(status.as_str().parse::<LifecycleStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("hibernating".parse::<LifecycleStatus>().is_err());
    }
}
