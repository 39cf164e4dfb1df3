use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewType {
    Phone,
    Video,
    Onsite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Scheduled,
    Rescheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewDecision {
    Pass,
    Fail,
    Hold,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(Error::Internal(format!(
                        concat!("Unknown ", stringify!($ty), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(InterviewType {
    Phone => "phone",
    Video => "video",
    Onsite => "onsite",
});

text_enum!(InterviewStatus {
    Scheduled => "scheduled",
    Rescheduled => "rescheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

text_enum!(InterviewDecision {
    Pass => "pass",
    Fail => "fail",
    Hold => "hold",
});

impl InterviewStatus {
    /// Active interviews occupy the interviewer's calendar.
    pub fn is_active(&self) -> bool {
        matches!(self, InterviewStatus::Scheduled | InterviewStatus::Rescheduled)
    }
}

/// Half-open calendar window `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub duration_minutes: i32,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, duration_minutes: i32) -> Self {
        Self {
            start,
            duration_minutes,
        }
    }

    /// `None` when the window runs past the last representable instant.
    pub fn checked_end(&self) -> Option<DateTime<Utc>> {
        self.start
            .checked_add_signed(Duration::minutes(i64::from(self.duration_minutes)))
    }

    /// Only for windows that passed `check_window`.
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Touching boundaries do not count as overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interview {
    pub id: Uuid,
    pub application_id: Uuid,
    pub interviewer_id: Uuid,
    pub participants: Vec<Uuid>,
    pub interview_type: InterviewType,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub location: Option<String>,
    pub status: InterviewStatus,
    pub feedback: Option<String>,
    pub rating: Option<i16>,
    pub decision: Option<InterviewDecision>,
    pub completed_by: Option<Uuid>,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub reschedule_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Interview {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.scheduled_at, self.duration_minutes)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Terminal outcome recorded when an interview is closed.
#[derive(Debug, Clone)]
pub enum InterviewOutcome {
    Completed {
        feedback: Option<String>,
        rating: Option<i16>,
        decision: InterviewDecision,
        completed_by: Uuid,
    },
    Cancelled {
        reason: Option<String>,
        cancelled_by: Uuid,
    },
}

impl InterviewOutcome {
    pub fn status(&self) -> InterviewStatus {
        match self {
            InterviewOutcome::Completed { .. } => InterviewStatus::Completed,
            InterviewOutcome::Cancelled { .. } => InterviewStatus::Cancelled,
        }
    }

    pub fn apply_to(&self, interview: &mut Interview, now: DateTime<Utc>) {
        match self {
            InterviewOutcome::Completed {
                feedback,
                rating,
                decision,
                completed_by,
            } => {
                interview.feedback = feedback.clone();
                interview.rating = *rating;
                interview.decision = Some(*decision);
                interview.completed_by = Some(*completed_by);
            }
            InterviewOutcome::Cancelled {
                reason,
                cancelled_by,
            } => {
                interview.cancel_reason = reason.clone();
                interview.cancelled_by = Some(*cancelled_by);
            }
        }
        interview.status = self.status();
        interview.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 4, hour, minute, 0).unwrap()
    }

    #[test]
    fn overlapping_windows_are_detected() {
        let a = TimeWindow::new(at(10, 0), 30);
        let b = TimeWindow::new(at(10, 15), 30);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        let a = TimeWindow::new(at(10, 0), 30);
        let b = TimeWindow::new(at(10, 30), 30);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn contained_window_overlaps() {
        let outer = TimeWindow::new(at(9, 0), 180);
        let inner = TimeWindow::new(at(10, 0), 15);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn only_scheduled_and_rescheduled_are_active() {
        assert!(InterviewStatus::Scheduled.is_active());
        assert!(InterviewStatus::Rescheduled.is_active());
        assert!(!InterviewStatus::Completed.is_active());
        assert!(!InterviewStatus::Cancelled.is_active());
        assert_eq!("rescheduled".parse::<InterviewStatus>().unwrap(), InterviewStatus::Rescheduled);
    }
}
