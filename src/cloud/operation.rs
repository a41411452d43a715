//! # Cloud Operations
//!
//! Handles to asynchronous provider operations and the parsing of their
//! self links into a fetchable scope.
//!
//! Compute operations live under a zone, a region or the global scope of a
//! project; managed-cluster operations live under a project location on the
//! container API host. The scope decides which status endpoint is asked.

use crate::constants::polling;
use crate::error::{ConvergeError, ConvergeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

const CONTAINER_API_HOST: &str = "container.googleapis.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str(polling::STATUS_PENDING),
            Self::Running => f.write_str(polling::STATUS_RUNNING),
            Self::Done => f.write_str(polling::STATUS_DONE),
        }
    }
}

impl FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            polling::STATUS_PENDING => Ok(Self::Pending),
            polling::STATUS_RUNNING => Ok(Self::Running),
            polling::STATUS_DONE => Ok(Self::Done),
            _ => Err(format!("Unknown operation status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationErrorDetail {
    pub code: String,
    pub message: String,
}

/// Provider-side handle for a long-running mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    pub self_link: String,
    pub status: OperationStatus,
    #[serde(default)]
    pub http_error_status_code: Option<i64>,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub errors: Vec<OperationErrorDetail>,
}

impl Operation {
    pub fn pending(name: impl Into<String>, self_link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            self_link: self_link.into(),
            status: OperationStatus::Pending,
            http_error_status_code: None,
            status_message: None,
            errors: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }

    /// The failure a terminal operation carries, if any.
    ///
    /// Error details win; otherwise an HTTP error status with its status
    /// message is reported.
    pub fn failure(&self) -> Option<ConvergeError> {
        if let Some(first) = self.errors.first() {
            return Some(ConvergeError::OperationFailed {
                operation: self.name.clone(),
                code: self.http_error_status_code.unwrap_or(0),
                message: first.message.clone(),
            });
        }
        match self.http_error_status_code {
            Some(code) if code >= 400 => Some(ConvergeError::OperationFailed {
                operation: self.name.clone(),
                code,
                message: self.status_message.clone().unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

/// Where an operation's status can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationScope {
    Zonal { project: String, zone: String },
    Regional { project: String, region: String },
    Global { project: String },
    /// Managed-cluster API operation.
    Cluster { project: String, location: String },
}

impl OperationScope {
    pub fn project(&self) -> &str {
        match self {
            Self::Zonal { project, .. }
            | Self::Regional { project, .. }
            | Self::Global { project }
            | Self::Cluster { project, .. } => project,
        }
    }
}

/// Scope plus operation name, parsed from a self link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationRef {
    pub scope: OperationScope,
    pub name: String,
}

impl OperationRef {
    pub fn parse(self_link: &str) -> ConvergeResult<Self> {
        let invalid = |reason: &str| ConvergeError::InvalidSelfLink {
            link: self_link.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(self_link).map_err(|e| invalid(&e.to_string()))?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let projects_at = segments
            .iter()
            .position(|segment| *segment == "projects")
            .ok_or_else(|| invalid("no projects segment"))?;
        let rest = &segments[projects_at + 1..];
        let is_container = url.host_str() == Some(CONTAINER_API_HOST);

        let (scope, name) = match rest {
            [project, "global", "operations", name] if !is_container => (
                OperationScope::Global {
                    project: project.to_string(),
                },
                name,
            ),
            [project, "zones" | "locations", location, "operations", name] if is_container => (
                OperationScope::Cluster {
                    project: project.to_string(),
                    location: location.to_string(),
                },
                name,
            ),
            [project, "zones", zone, "operations", name] => (
                OperationScope::Zonal {
                    project: project.to_string(),
                    zone: zone.to_string(),
                },
                name,
            ),
            [project, "regions", region, "operations", name] => (
                OperationScope::Regional {
                    project: project.to_string(),
                    region: region.to_string(),
                },
                name,
            ),
            _ => return Err(invalid("unrecognised operation path")),
        };

        Ok(Self {
            scope,
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_operation_scope() {
        let parsed = OperationRef::parse(
            "https://container.googleapis.com/v1/projects/510657513523/zones/us-central1-a/operations/operation-1520960668616-b3fcea02",
        )
        .unwrap();

        assert_eq!(
            parsed.scope,
            OperationScope::Cluster {
                project: "510657513523".to_string(),
                location: "us-central1-a".to_string(),
            }
        );
        assert_eq!(parsed.scope.project(), "510657513523");
        assert_eq!(parsed.name, "operation-1520960668616-b3fcea02");
    }

    #[test]
    fn test_compute_operation_scopes() {
        let zonal = OperationRef::parse(
            "https://www.googleapis.com/compute/v1/projects/demo/zones/europe-west1-b/operations/op-1",
        )
        .unwrap();
        assert!(matches!(zonal.scope, OperationScope::Zonal { ref zone, .. } if zone == "europe-west1-b"));

        let regional = OperationRef::parse(
            "https://www.googleapis.com/compute/v1/projects/demo/regions/europe-west1/operations/op-2",
        )
        .unwrap();
        assert!(matches!(regional.scope, OperationScope::Regional { ref region, .. } if region == "europe-west1"));

        let global = OperationRef::parse(
            "https://www.googleapis.com/compute/v1/projects/demo/global/operations/op-3",
        )
        .unwrap();
        assert_eq!(
            global.scope,
            OperationScope::Global {
                project: "demo".to_string()
            }
        );
        assert_eq!(global.name, "op-3");
    }

    #[test]
    fn test_unparseable_links() {
        for link in [
            "not a url",
            "https://www.googleapis.com/compute/v1/zones/a/operations/b",
            "https://www.googleapis.com/compute/v1/projects/demo/instances/x",
        ] {
            assert!(matches!(
                OperationRef::parse(link),
                Err(ConvergeError::InvalidSelfLink { .. })
            ));
        }
    }

    #[test]
    fn test_failure_prefers_error_details() {
        let mut op = Operation::pending("op", "link");
        op.status = OperationStatus::Done;
        assert!(op.failure().is_none());

        op.http_error_status_code = Some(400);
        op.status_message = Some("bad request".to_string());
        op.errors.push(OperationErrorDetail {
            code: "QUOTA_EXCEEDED".to_string(),
            message: "quota exceeded".to_string(),
        });

        match op.failure() {
            Some(ConvergeError::OperationFailed { code, message, .. }) => {
                assert_eq!(code, 400);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("unexpected failure: {other:?}"),
        }

        op.errors.clear();
        match op.failure() {
            Some(ConvergeError::OperationFailed { message, .. }) => {
                assert_eq!(message, "bad request");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_status_strings() {
        assert_eq!("DONE".parse::<OperationStatus>().unwrap(), OperationStatus::Done);
        assert_eq!(OperationStatus::Running.to_string(), "RUNNING");
        assert!("ABORTING".parse::<OperationStatus>().is_err());
    }
}
