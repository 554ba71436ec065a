//! A person's link to a course round, from either side.

use chrono::{DateTime, Utc};

use crate::canvas::Enrollment;
use crate::ladok::{Participant, ParticipantStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Student,
    Teacher,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseParticipation {
    /// Canvas user id or Ladok UID, depending on the source.
    pub person: String,
    /// Canvas course id or Ladok course round UID.
    pub course: String,
    pub role: Role,
    pub status: ParticipantStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl From<&Enrollment> for CourseParticipation {
    fn from(e: &Enrollment) -> Self {
        let role = match e.enrollment_type.as_str() {
            "StudentEnrollment" => Role::Student,
            "TeacherEnrollment" => Role::Teacher,
            other => Role::Other(other.to_string()),
        };
        let status = match e.enrollment_state.as_str() {
            "invited" | "creation_pending" => ParticipantStatus::NotStarted,
            "completed" => ParticipantStatus::Finished,
            "inactive" | "deleted" | "rejected" => ParticipantStatus::Cancelled,
            _ => ParticipantStatus::Ongoing,
        };
        CourseParticipation {
            person: e.user_id.to_string(),
            course: e.course_id.to_string(),
            role,
            status,
            created_at: e.created_at,
            updated_at: e.updated_at,
            last_activity_at: e.last_activity_at,
        }
    }
}

impl CourseParticipation {
    pub fn from_ladok(round_uid: &str, participant: &Participant) -> Self {
        CourseParticipation {
            person: participant.student.uid.clone(),
            course: round_uid.to_string(),
            role: Role::Student,
            status: participant.status,
            created_at: None,
            updated_at: None,
            last_activity_at: None,
        }
    }
}
