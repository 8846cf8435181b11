//! Per-service client handles and the factory that builds them.
//!
//! A [`ServiceClient`] is an authenticated handle to one Google service for one
//! identity. Instances are created by a [`ClientFactory`] and owned by the
//! session cache (`crate::session`).

pub mod api;
pub mod factory;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::WorkspaceError;

pub use api::{CalendarApi, DriveApi, GmailApi, MeetApi, TasksApi, ToolOutput};
pub use factory::{ClientFactory, GoogleClientFactory, ResolvedDependencies};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Calendar,
    Gmail,
    Drive,
    Tasks,
    Meet,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 5] = [
        ServiceKind::Calendar,
        ServiceKind::Gmail,
        ServiceKind::Drive,
        ServiceKind::Tasks,
        ServiceKind::Meet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Calendar => "calendar",
            ServiceKind::Gmail => "gmail",
            ServiceKind::Drive => "drive",
            ServiceKind::Tasks => "tasks",
            ServiceKind::Meet => "meet",
        }
    }

    /// Services that must be resolved for the same identity before this one
    /// can be built. Meet looks up meeting titles through Calendar.
    pub fn dependencies(self) -> &'static [ServiceKind] {
        match self {
            ServiceKind::Meet => &[ServiceKind::Calendar],
            _ => &[],
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calendar" => Ok(ServiceKind::Calendar),
            "gmail" => Ok(ServiceKind::Gmail),
            "drive" => Ok(ServiceKind::Drive),
            "tasks" => Ok(ServiceKind::Tasks),
            "meet" => Ok(ServiceKind::Meet),
            other => Err(WorkspaceError::Config(format!(
                "unknown service '{}' (expected calendar, gmail, drive, tasks or meet)",
                other
            ))),
        }
    }
}

/// Authenticated handle to one Google service.
#[derive(Clone)]
pub enum ServiceClient {
    Calendar(Arc<dyn CalendarApi>),
    Gmail(Arc<dyn GmailApi>),
    Drive(Arc<dyn DriveApi>),
    Tasks(Arc<dyn TasksApi>),
    Meet(Arc<dyn MeetApi>),
}

impl ServiceClient {
    pub fn kind(&self) -> ServiceKind {
        match self {
            ServiceClient::Calendar(_) => ServiceKind::Calendar,
            ServiceClient::Gmail(_) => ServiceKind::Gmail,
            ServiceClient::Drive(_) => ServiceKind::Drive,
            ServiceClient::Tasks(_) => ServiceKind::Tasks,
            ServiceClient::Meet(_) => ServiceKind::Meet,
        }
    }

    /// True when both handles point at the same underlying client instance.
    pub fn same_instance(&self, other: &ServiceClient) -> bool {
        fn addr<T: ?Sized>(arc: &Arc<T>) -> *const () {
            Arc::as_ptr(arc) as *const ()
        }
        match (self, other) {
            (ServiceClient::Calendar(a), ServiceClient::Calendar(b)) => addr(a) == addr(b),
            (ServiceClient::Gmail(a), ServiceClient::Gmail(b)) => addr(a) == addr(b),
            (ServiceClient::Drive(a), ServiceClient::Drive(b)) => addr(a) == addr(b),
            (ServiceClient::Tasks(a), ServiceClient::Tasks(b)) => addr(a) == addr(b),
            (ServiceClient::Meet(a), ServiceClient::Meet(b)) => addr(a) == addr(b),
            _ => false,
        }
    }

    pub fn calendar(&self) -> Result<&Arc<dyn CalendarApi>, WorkspaceError> {
        match self {
            ServiceClient::Calendar(c) => Ok(c),
            other => Err(mismatch(ServiceKind::Calendar, other.kind())),
        }
    }

    pub fn gmail(&self) -> Result<&Arc<dyn GmailApi>, WorkspaceError> {
        match self {
            ServiceClient::Gmail(c) => Ok(c),
            other => Err(mismatch(ServiceKind::Gmail, other.kind())),
        }
    }

    pub fn drive(&self) -> Result<&Arc<dyn DriveApi>, WorkspaceError> {
        match self {
            ServiceClient::Drive(c) => Ok(c),
            other => Err(mismatch(ServiceKind::Drive, other.kind())),
        }
    }

    pub fn tasks(&self) -> Result<&Arc<dyn TasksApi>, WorkspaceError> {
        match self {
            ServiceClient::Tasks(c) => Ok(c),
            other => Err(mismatch(ServiceKind::Tasks, other.kind())),
        }
    }

    pub fn meet(&self) -> Result<&Arc<dyn MeetApi>, WorkspaceError> {
        match self {
            ServiceClient::Meet(c) => Ok(c),
            other => Err(mismatch(ServiceKind::Meet, other.kind())),
        }
    }
}

impl fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceClient::{}", self.kind())
    }
}

fn mismatch(expected: ServiceKind, got: ServiceKind) -> WorkspaceError {
    WorkspaceError::Internal(format!(
        "expected a {} client, resolved a {} client",
        expected, got
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meet_depends_on_calendar_only() {
        assert_eq!(ServiceKind::Meet.dependencies(), &[ServiceKind::Calendar]);
        for kind in ServiceKind::ALL {
            if kind != ServiceKind::Meet {
                assert!(kind.dependencies().is_empty(), "{kind} has deps");
            }
        }
    }

    #[test]
    fn parses_service_names() {
        assert_eq!("Gmail".parse::<ServiceKind>().unwrap(), ServiceKind::Gmail);
        assert_eq!(" meet ".parse::<ServiceKind>().unwrap(), ServiceKind::Meet);
        assert!("sheets".parse::<ServiceKind>().is_err());
    }
}
