use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Screening,
    Shortlisted,
    Interview,
    Offered,
    Hired,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 8] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Screening,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::Interview,
        ApplicationStatus::Offered,
        ApplicationStatus::Hired,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Screening => "screening",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Offered => "offered",
            ApplicationStatus::Hired => "hired",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Hired | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// The single forward stage reachable from this one, if any.
    pub fn next_stage(&self) -> Option<ApplicationStatus> {
        match self {
            ApplicationStatus::Applied => Some(ApplicationStatus::Screening),
            ApplicationStatus::Screening => Some(ApplicationStatus::Shortlisted),
            ApplicationStatus::Shortlisted => Some(ApplicationStatus::Interview),
            ApplicationStatus::Interview => Some(ApplicationStatus::Offered),
            ApplicationStatus::Offered => Some(ApplicationStatus::Hired),
            ApplicationStatus::Hired | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn => {
                None
            }
        }
    }

    /// Stages in which an interview may be put on the calendar.
    pub fn accepts_interviews(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Shortlisted | ApplicationStatus::Interview
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::Internal(format!("Unknown application status: {}", s)))
    }
}

/// One append-only entry of an application's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: ApplicationStatus,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub company_id: Uuid,
    pub candidate_id: Uuid,
    pub status: ApplicationStatus,
    pub version: i64,
    pub cover_letter: Option<String>,
    pub resume_ref: Option<String>,
    pub source: Option<String>,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn is_owned_by(&self, actor_id: Uuid) -> bool {
        self.candidate_id == actor_id
    }

    /// Whether the recorded history agrees with the current status.
    pub fn history_is_consistent(&self) -> bool {
        self.status_history
            .last()
            .map(|entry| entry.status == self.status)
            .unwrap_or(false)
    }
}

/// Input for a fresh submission, before the store assigns identity.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub job_id: Uuid,
    pub company_id: Uuid,
    pub candidate_id: Uuid,
    pub cover_letter: Option<String>,
    pub resume_ref: Option<String>,
    pub source: Option<String>,
}

impl NewApplication {
    pub fn into_application(self, now: DateTime<Utc>) -> Application {
        Application {
            id: Uuid::new_v4(),
            job_id: self.job_id,
            company_id: self.company_id,
            candidate_id: self.candidate_id,
            status: ApplicationStatus::Applied,
            version: 1,
            cover_letter: self.cover_letter,
            resume_ref: self.resume_ref,
            source: self.source,
            status_history: vec![StatusChange {
                status: ApplicationStatus::Applied,
                actor_id: self.candidate_id,
                note: None,
                changed_at: now,
            }],
            created_at: now,
            updated_at: now,
        }
    }
}
