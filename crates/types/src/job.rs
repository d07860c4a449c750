//! Server-side asynchronous jobs.
//!
//! Some control-plane calls (copying application bits, for example) answer
//! `201 Created` with a job resource instead of doing the work inline. The job
//! is then polled at its `metadata.url` until it reaches a terminal status.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Guid, Resource};

/// Last known status of a server-side job.
///
/// The exact vocabulary depends on the backend; anything other than
/// `finished` and `failed` means "keep polling".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Finished,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Other(raw) => raw,
        }
    }
}

impl From<&str> for JobStatus {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "finished" => Self::Finished,
            "failed" => Self::Failed,
            _ => Self::Other(raw.to_string()),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// Job entity as returned by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub guid: Guid,
    #[serde(default)]
    pub status: JobStatus,
}

/// Handle to a server-side job: where to poll it and what it last reported.
///
/// Only the job poller mutates the status; once terminal the descriptor is
/// discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub guid: Guid,
    pub url: String,
    pub status: JobStatus,
}

impl JobDescriptor {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl From<Resource<Job>> for JobDescriptor {
    fn from(resource: Resource<Job>) -> Self {
        let guid = if resource.entity.guid.is_empty() {
            resource.metadata.guid
        } else {
            resource.entity.guid
        };
        Self {
            guid,
            url: resource.metadata.url,
            status: resource.entity.status,
        }
    }
}
