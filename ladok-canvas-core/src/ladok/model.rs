//! Ladok wire types and the records built from them.
//!
//! Wire structs mirror the Swedish field names of the REST API and are kept
//! private to the session where they are only an intermediate step.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ladok::grades::int_or_string;

/// A student as returned by `studentinformation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRecord {
    /// Ladok UID; the Canvas integration id.
    pub uid: String,
    pub person_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub alive: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStudent {
    #[serde(rename = "Uid")]
    pub uid: String,
    #[serde(rename = "Fornamn", default)]
    pub first_name: String,
    #[serde(rename = "Efternamn", default)]
    pub last_name: String,
    #[serde(rename = "Personnummer", default)]
    pub person_number: Option<String>,
    #[serde(rename = "Avliden", default)]
    pub deceased: bool,
}

impl From<RawStudent> for StudentRecord {
    fn from(raw: RawStudent) -> Self {
        StudentRecord {
            uid: raw.uid,
            person_number: raw.person_number,
            first_name: raw.first_name,
            last_name: raw.last_name,
            alive: !raw.deceased,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStudentPage {
    #[serde(rename = "Resultat", default)]
    pub results: Vec<RawStudent>,
}

/// A current course round the student takes part in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentCourse {
    pub participation_uid: String,
    /// Course round (`UtbildningstillfalleUID`).
    pub round_uid: String,
    /// Course (`UtbildningUID`).
    pub education_uid: String,
    /// Where final course grades are reported (`UtbildningsinstansUID`).
    pub instance_uid: String,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCourseParticipations {
    #[serde(rename = "Tillfallesdeltaganden", default)]
    pub participations: Vec<RawCourseParticipation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCourseParticipation {
    #[serde(rename = "Uid")]
    pub uid: String,
    #[serde(rename = "Nuvarande", default)]
    pub current: bool,
    #[serde(rename = "Utbildningsinformation")]
    pub info: RawCourseInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCourseInfo {
    #[serde(rename = "UtbildningstillfalleUID", default)]
    pub round_uid: String,
    #[serde(rename = "UtbildningUID", default)]
    pub education_uid: String,
    #[serde(rename = "UtbildningsinstansUID", default)]
    pub instance_uid: String,
    #[serde(rename = "Utbildningskod", default)]
    pub code: Option<String>,
    #[serde(rename = "Benamning", default)]
    pub name: HashMap<String, String>,
}

impl RawCourseParticipation {
    pub(crate) fn into_current_course(self) -> Option<StudentCourse> {
        if !self.current {
            return None;
        }
        let code = self.info.code?;
        Some(StudentCourse {
            participation_uid: self.uid,
            round_uid: self.info.round_uid,
            education_uid: self.info.education_uid,
            instance_uid: self.info.instance_uid,
            code,
            name: self.info.name.get("sv").cloned().unwrap_or_default(),
        })
    }
}

/// A gradable component (moment) of a course round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseComponent {
    pub instance_uid: String,
    pub code: String,
    pub education_uid: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawComponents {
    #[serde(rename = "IngaendeMoment", default)]
    pub components: Vec<RawComponent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawComponent {
    #[serde(rename = "UtbildningsinstansUID")]
    pub instance_uid: String,
    #[serde(rename = "Utbildningskod")]
    pub code: String,
    #[serde(rename = "UtbildningUID", default)]
    pub education_uid: String,
    #[serde(rename = "Benamning", default)]
    pub name: HashMap<String, String>,
}

impl From<RawComponent> for CourseComponent {
    fn from(raw: RawComponent) -> Self {
        CourseComponent {
            instance_uid: raw.instance_uid,
            code: raw.code,
            education_uid: raw.education_uid,
            name: raw.name.get("sv").cloned().unwrap_or_default(),
        }
    }
}

/// The student's result record for one course round, with drafts per component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseResults {
    /// `StudieresultatUID`, needed to create a new draft.
    pub uid: String,
    pub drafts: Vec<GradeDraft>,
}

impl CourseResults {
    pub fn draft_for(&self, component_uid: &str) -> Option<&GradeDraft> {
        self.drafts.iter().find(|d| d.component_uid == component_uid)
    }
}

/// An unattested result (`Arbetsunderlag`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeDraft {
    pub uid: String,
    pub component_uid: String,
    pub grade_id: Option<i64>,
    pub grade_scale_id: Option<i64>,
    pub date: Option<String>,
    /// Optimistic-concurrency marker the update call must echo back.
    pub last_modified: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCourseResults {
    #[serde(rename = "Uid")]
    pub uid: String,
    #[serde(rename = "ResultatPaUtbildningar", default)]
    pub results: Vec<RawResultOnEducation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawResultOnEducation {
    #[serde(rename = "Arbetsunderlag", default)]
    pub draft: Option<RawDraft>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDraft {
    #[serde(rename = "Uid")]
    pub uid: String,
    #[serde(rename = "UtbildningsinstansUID")]
    pub component_uid: String,
    #[serde(rename = "Betygsgrad", default, deserialize_with = "opt_int_or_string")]
    pub grade_id: Option<i64>,
    #[serde(rename = "BetygsskalaID", default, deserialize_with = "opt_int_or_string")]
    pub grade_scale_id: Option<i64>,
    #[serde(rename = "Examinationsdatum", default)]
    pub date: Option<String>,
    #[serde(rename = "SenasteResultatandring")]
    pub last_modified: String,
}

impl From<RawCourseResults> for CourseResults {
    fn from(raw: RawCourseResults) -> Self {
        CourseResults {
            uid: raw.uid,
            drafts: raw
                .results
                .into_iter()
                .filter_map(|r| r.draft)
                .map(|d| GradeDraft {
                    uid: d.uid,
                    component_uid: d.component_uid,
                    grade_id: d.grade_id,
                    grade_scale_id: d.grade_scale_id,
                    date: d.date,
                    last_modified: d.last_modified,
                })
                .collect(),
        }
    }
}

fn opt_int_or_string<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "int_or_string")] i64);
    Option::<Wrap>::deserialize(deserializer).map(|w| w.map(|Wrap(v)| v))
}

/// Status of a component result as reported by [`results`](crate::ladok::LadokSession::results).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResultStatus {
    Attested,
    /// Draft or ready-marked result with its Ladok process status.
    Pending(i64),
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultStatus::Attested => f.write_str("attested"),
            ResultStatus::Pending(n) => write!(f, "pending({n})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentResult {
    pub grade: String,
    pub status: ResultStatus,
    /// Drafts do not always carry a date; `"0"` then.
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAttested {
    #[serde(rename = "StudentresultatPerKurs", default)]
    pub per_course: Vec<RawAttestedCourse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAttestedCourse {
    #[serde(rename = "KursUID")]
    pub course_uid: String,
    #[serde(rename = "Studentresultat", default)]
    pub results: Vec<RawAttestedResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAttestedResult {
    #[serde(rename = "Betygsgradskod", default)]
    pub grade: Option<String>,
    #[serde(rename = "Examinationsdatum", default)]
    pub date: Option<String>,
    /// Absent for credit transfers, which carry no grade.
    #[serde(rename = "Utbildningskod", default)]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPending {
    #[serde(rename = "Resultat", default)]
    pub results: Vec<RawPendingResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPendingResult {
    #[serde(rename = "UtbildningsinstansUID")]
    pub component_uid: String,
    #[serde(rename = "Betygsgradsobjekt")]
    pub grade: RawGradeObject,
    #[serde(rename = "ProcessStatus", deserialize_with = "int_or_string")]
    pub process_status: i64,
    #[serde(rename = "Examinationsdatum", default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawGradeObject {
    #[serde(rename = "Kod")]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEducationInstance {
    #[serde(rename = "Utbildningskod")]
    pub code: String,
}

/// Entry of the `utbildningstyp` reference data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EducationType {
    pub code: String,
    pub name_en: Option<String>,
    pub name_sv: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEducationTypes {
    #[serde(rename = "Utbildningstyp", default)]
    pub types: Vec<RawEducationType>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEducationType {
    #[serde(rename = "Kod")]
    pub code: String,
    #[serde(rename = "Benamning", default)]
    pub name: HashMap<String, String>,
}

impl From<RawEducationType> for EducationType {
    fn from(mut raw: RawEducationType) -> Self {
        EducationType {
            code: raw.code,
            name_en: raw.name.remove("en"),
            name_sv: raw.name.remove("sv"),
        }
    }
}

/// A Ladok course round (`kurstillfalle`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CourseInstance {
    #[serde(rename = "Uid")]
    pub uid: String,
    /// Instance code (`TillfallesKod`), the KOPPS round code.
    #[serde(rename = "TillfallesKod", default)]
    pub instance_code: String,
    #[serde(rename = "Utbildningskod", default)]
    pub course_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCourseInstances {
    #[serde(rename = "Resultat", default)]
    pub results: Vec<CourseInstance>,
}

/// Participant states accepted by the participant search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParticipantStatus {
    NotStarted,
    Ongoing,
    Registered,
    Finished,
    Cancelled,
}

impl ParticipantStatus {
    pub const ALL: [ParticipantStatus; 5] = [
        ParticipantStatus::NotStarted,
        ParticipantStatus::Ongoing,
        ParticipantStatus::Registered,
        ParticipantStatus::Finished,
        ParticipantStatus::Cancelled,
    ];

    pub fn ladok_code(self) -> &'static str {
        match self {
            ParticipantStatus::NotStarted => "EJ_PABORJAD",
            ParticipantStatus::Ongoing => "PAGAENDE",
            ParticipantStatus::Registered => "REGISTRERAD",
            ParticipantStatus::Finished => "AVKLARAD",
            ParticipantStatus::Cancelled => "ATERBUD",
        }
    }

    /// Parse the CLI spelling (`not_started`, `ongoing`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "not_started" => Some(ParticipantStatus::NotStarted),
            "ongoing" => Some(ParticipantStatus::Ongoing),
            "registered" => Some(ParticipantStatus::Registered),
            "finished" | "completed" => Some(ParticipantStatus::Finished),
            "cancelled" => Some(ParticipantStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ParticipantStatus::NotStarted => "not_started",
            ParticipantStatus::Ongoing => "ongoing",
            ParticipantStatus::Registered => "registered",
            ParticipantStatus::Finished => "finished",
            ParticipantStatus::Cancelled => "cancelled",
        })
    }
}

/// One student on a course round's participant list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub student: StudentRecord,
    pub status: ParticipantStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawParticipants {
    #[serde(rename = "Resultat", default)]
    pub results: Vec<RawParticipant>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawParticipant {
    #[serde(rename = "Student")]
    pub student: RawStudent,
}

/// Outcome of a successful grade submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// An existing draft was updated.
    Updated,
    /// A new draft was created.
    Created,
}
