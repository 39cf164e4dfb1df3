use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::application::{Application, ApplicationStatus, StatusChange};
use crate::services::pipeline_service::SubmitApplication;
use crate::services::state_machine::BulkTransitionReport;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitApplicationPayload {
    pub job_id: Uuid,
    #[validate(length(max = 20000))]
    pub cover_letter: Option<String>,
    #[validate(length(min = 1, max = 512))]
    pub resume_ref: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub source: Option<String>,
}

impl From<SubmitApplicationPayload> for SubmitApplication {
    fn from(payload: SubmitApplicationPayload) -> Self {
        Self {
            job_id: payload.job_id,
            cover_letter: payload.cover_letter,
            resume_ref: payload.resume_ref,
            source: payload.source,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransitionPayload {
    #[validate(range(min = 1))]
    pub expected_version: i64,
    pub status: ApplicationStatus,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BulkTransitionPayload {
    pub application_ids: Vec<Uuid>,
    pub status: ApplicationStatus,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WithdrawPayload {
    #[validate(range(min = 1))]
    pub expected_version: i64,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResponse {
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

impl From<Application> for ApplicationResponse {
    fn from(app: Application) -> Self {
        Self {
            id: app.id,
            job_id: app.job_id,
            company_id: app.company_id,
            candidate_id: app.candidate_id,
            status: app.status,
            version: app.version,
            cover_letter: app.cover_letter,
            resume_ref: app.resume_ref,
            source: app.source,
            status_history: app.status_history,
            created_at: app.created_at,
            updated_at: app.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationListResponse {
    pub items: Vec<ApplicationResponse>,
    pub total: usize,
}

impl From<Vec<Application>> for ApplicationListResponse {
    fn from(apps: Vec<Application>) -> Self {
        let items: Vec<ApplicationResponse> = apps.into_iter().map(Into::into).collect();
        Self {
            total: items.len(),
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransitionResponse {
    pub succeeded: Vec<Uuid>,
    pub failed: BTreeMap<Uuid, ItemFailure>,
}

impl From<BulkTransitionReport> for BulkTransitionResponse {
    fn from(report: BulkTransitionReport) -> Self {
        Self {
            succeeded: report.succeeded_ids(),
            failed: report
                .failed
                .into_iter()
                .map(|(id, err)| {
                    (
                        id,
                        ItemFailure {
                            code: err.code().to_string(),
                            message: err.to_string(),
                        },
                    )
                })
                .collect(),
        }
    }
}
