//! Ladok student-records client: sign-in handshake, lookups and grade drafts.

pub mod auth;
pub mod grades;
pub mod identifiers;
pub mod model;
mod session;

pub use grades::{Grade, GradeScale, GradeScaleSet};
pub use model::{
    ComponentResult, CourseComponent, CourseInstance, CourseResults, EducationType, GradeDraft,
    Participant, ParticipantStatus, ResultStatus, SaveOutcome, StudentCourse, StudentRecord,
};
pub use session::{GradeSubmission, LadokSession, PARTICIPANT_PAGE_SIZE};
