use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::interview::{InterviewDecision, InterviewType, TimeWindow};
use crate::services::interview_scheduler::{CompleteRequest, ScheduleRequest};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScheduleInterviewPayload {
    pub interviewer_id: Uuid,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub participants: Vec<Uuid>,
    pub interview_type: InterviewType,
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub duration_minutes: i32,
    #[validate(length(min = 1, max = 500))]
    pub location: Option<String>,
}

impl ScheduleInterviewPayload {
    pub fn into_request(self, application_id: Uuid) -> ScheduleRequest {
        ScheduleRequest {
            application_id,
            interviewer_id: self.interviewer_id,
            participants: self.participants,
            window: TimeWindow::new(self.scheduled_at, self.duration_minutes),
            interview_type: self.interview_type,
            location: self.location,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RescheduleInterviewPayload {
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub duration_minutes: i32,
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

impl RescheduleInterviewPayload {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.scheduled_at, self.duration_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CompleteInterviewPayload {
    #[validate(length(max = 10000))]
    pub feedback: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i16>,
    pub decision: InterviewDecision,
}

impl From<CompleteInterviewPayload> for CompleteRequest {
    fn from(payload: CompleteInterviewPayload) -> Self {
        Self {
            feedback: payload.feedback,
            rating: payload.rating,
            decision: payload.decision,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CancelInterviewPayload {
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}
