//! # report: one driver per spreadsheet
//!
//! Each driver pulls what it needs from Canvas and Ladok, one request at a
//! time, and returns a [`Report`]: a file name, a sheet name and flat rows.
//! Writing the file is left to the caller.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::canvas::{CanvasClient, EnrollmentType, User, UserRef};
use crate::contract::HttpTransport;
use crate::error::{Error, Result};
use crate::ladok::{CourseInstance, EducationType, LadokSession, ParticipantStatus, StudentRecord};
use crate::normalize::{retain_current, ProgramEntry, StudentPrograms, NO_PROGRAM};
use crate::participation::{CourseParticipation, Role};

pub const MISSING_INTEGRATION_ID: &str = "Missing integration ID";
pub const NOT_IN_CANVAS: &str = "not in Canvas";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<u64> for Cell {
    fn from(i: u64) -> Self {
        i64::try_from(i).map_or_else(|_| Cell::Text(i.to_string()), Cell::Int)
    }
}

/// Ordered column name to value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportRow {
    cells: Vec<(String, Cell)>,
}

impl ReportRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column`, replacing an earlier value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Cell>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some((_, v)) => *v = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn cells(&self) -> &[(String, Cell)] {
        &self.cells
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// File name without extension.
    pub name: String,
    pub sheet: String,
    pub rows: Vec<ReportRow>,
}

/// Append program columns: the first entry unsuffixed, later ones `_1`, `_2`, ...
pub fn add_program_columns(
    row: &mut ReportRow,
    programs: &[ProgramEntry],
    education_types: &BTreeMap<String, EducationType>,
) {
    for (i, entry) in programs.iter().enumerate() {
        let suffix = if i == 0 { String::new() } else { format!("_{i}") };
        row.set(format!("program_code{suffix}"), entry.program_code.as_str());
        row.set(format!("program_name{suffix}"), entry.program_name.as_str());
        row.set(
            format!("session_code{suffix}"),
            entry.session_code.clone().unwrap_or_default(),
        );
        let education = entry
            .session_type_code
            .as_deref()
            .map(|code| {
                education_types
                    .get(code)
                    .and_then(|t| t.name_en.clone().or_else(|| t.name_sv.clone()))
                    .unwrap_or_else(|| code.to_string())
            })
            .unwrap_or_default();
        row.set(format!("type_of_education{suffix}"), education);
        row.set(
            format!("program_study_period_start{suffix}"),
            entry
                .study_period_start
                .map(|d| d.to_string())
                .unwrap_or_default(),
        );
    }
}

/// Program entries after the filtering policy; `None` when nothing is left.
fn current_programs(programs: StudentPrograms, today: NaiveDate, all: bool) -> Option<Vec<ProgramEntry>> {
    match programs {
        StudentPrograms::NoProgram => Some(Vec::new()),
        StudentPrograms::Enrolled(entries) if all => Some(entries),
        StudentPrograms::Enrolled(entries) => {
            let kept = retain_current(entries, today);
            (!kept.is_empty()).then_some(kept)
        }
    }
}

fn add_programs(
    row: &mut ReportRow,
    programs: &[ProgramEntry],
    education_types: &BTreeMap<String, EducationType>,
) {
    if programs.is_empty() {
        row.set("program_code", NO_PROGRAM);
    } else {
        add_program_columns(row, programs, education_types);
    }
}

/// Students of a Canvas course with their current Ladok programs.
pub async fn course_programs<C, L>(
    canvas: &CanvasClient<C>,
    ladok: &LadokSession<L>,
    course_id: u64,
    today: NaiveDate,
) -> Result<Report>
where
    C: HttpTransport,
    L: HttpTransport,
{
    let education_types = ladok.education_types().await?;
    let enrollments = canvas.enrollments(course_id, &[EnrollmentType::Student]).await?;
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for enrollment in &enrollments {
        let participation = CourseParticipation::from(enrollment);
        if participation.role != Role::Student || !seen.insert(enrollment.user_id) {
            continue;
        }
        let mut row = ReportRow::new();
        row.set("canvas_user_id", enrollment.user_id);
        row.set("user", enrollment.user.sortable_name.as_str());
        let Some(ladok_id) = enrollment.user.integration_id.as_deref() else {
            row.set("ladok_id", MISSING_INTEGRATION_ID);
            rows.push(row);
            continue;
        };
        row.set("ladok_id", ladok_id);
        let programs = ladok.study_structure(ladok_id).await?;
        let Some(programs) = current_programs(programs, today, false) else {
            debug!(user_id = enrollment.user_id, ladok_id, "No current program, skipping");
            continue;
        };
        add_programs(&mut row, &programs, &education_types);
        rows.push(row);
    }
    info!(course_id, students = seen.len(), rows = rows.len(), "Built course program report");
    Ok(Report {
        name: format!("users_programs-{course_id}"),
        sheet: "users_programs".to_string(),
        rows,
    })
}

/// Which course round to report on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantSource {
    /// A Ladok course code and round code.
    Ladok {
        course_code: String,
        instance_code: String,
    },
    /// A Canvas course whose `sis_course_id` is the Ladok round UID.
    Canvas { course_id: u64 },
}

#[derive(Debug, Clone, Copy)]
pub struct InstanceOptions<'a> {
    pub statuses: &'a [ParticipantStatus],
    pub include_person_numbers: bool,
    pub today: NaiveDate,
}

struct Member {
    canvas: Option<(u64, String)>,
    student: StudentRecord,
    status: ParticipantStatus,
}

async fn course_round<C, L>(
    canvas: &CanvasClient<C>,
    ladok: &LadokSession<L>,
    source: &ParticipantSource,
) -> Result<CourseInstance>
where
    C: HttpTransport,
    L: HttpTransport,
{
    match source {
        ParticipantSource::Ladok {
            course_code,
            instance_code,
        } => ladok
            .instance_info(course_code, instance_code)
            .await?
            .ok_or_else(|| Error::CourseNotFound(format!("{course_code} {instance_code}"))),
        ParticipantSource::Canvas { course_id } => {
            let course = canvas.course(*course_id).await?;
            let Some(round_uid) = course.sis_course_id.as_deref() else {
                warn!(course_id, "Canvas course has no sis_course_id");
                return Err(Error::CourseNotFound(course_id.to_string()));
            };
            let instance = ladok
                .instance_by_uid(round_uid)
                .await?
                .ok_or_else(|| Error::CourseNotFound(format!("{course_id} ({round_uid})")))?;
            debug!(course_id, round_uid, instance_code = %instance.instance_code, "Canvas course maps to Ladok round");
            Ok(instance)
        }
    }
}

/// Participants of a course round with Canvas ids and Ladok programs.
///
/// The participant list always comes from Ladok; a Canvas course only
/// names the round.
pub async fn instance_programs<C, L>(
    canvas: &CanvasClient<C>,
    ladok: &LadokSession<L>,
    source: &ParticipantSource,
    options: InstanceOptions<'_>,
) -> Result<Report>
where
    C: HttpTransport,
    L: HttpTransport,
{
    let education_types = ladok.education_types().await?;
    let instance = course_round(canvas, ladok, source).await?;
    let participants = ladok.participants(&instance.uid, options.statuses).await?;
    let mut seen = HashSet::new();
    let mut members = Vec::new();
    for participant in participants {
        if !seen.insert(participant.student.uid.clone()) {
            continue;
        }
        let status = CourseParticipation::from_ladok(&instance.uid, &participant).status;
        let user = canvas
            .user(&UserRef::SisIntegrationId(participant.student.uid.clone()))
            .await?;
        members.push(Member {
            canvas: user.map(|u| (u.id, u.sortable_name)),
            student: participant.student,
            status,
        });
    }
    let code = instance.instance_code;

    let mut rows = Vec::with_capacity(members.len());
    for member in members {
        let mut row = ReportRow::new();
        match member.canvas {
            Some((id, name)) => {
                row.set("canvas_user_id", id);
                row.set("user", name);
            }
            None => {
                row.set("canvas_user_id", NOT_IN_CANVAS);
                row.set(
                    "user",
                    format!("{},{}", member.student.last_name, member.student.first_name),
                );
            }
        }
        row.set("ladok_id", member.student.uid.as_str());
        if options.include_person_numbers {
            row.set(
                "pnr",
                member.student.person_number.clone().unwrap_or_default(),
            );
        }
        row.set("status", member.status.to_string());
        let programs = ladok.study_structure(&member.student.uid).await?;
        if let Some(programs) = current_programs(programs, options.today, false) {
            add_programs(&mut row, &programs, &education_types);
        }
        rows.push(row);
    }
    info!(code = %code, rows = rows.len(), "Built course instance program report");
    Ok(Report {
        name: format!("users_programs-instance-{code}"),
        sheet: "users_programs".to_string(),
        rows,
    })
}

/// Students of a Canvas course without an integration id.
pub async fn missing_integration_ids<C>(canvas: &CanvasClient<C>, course_id: u64) -> Result<Report>
where
    C: HttpTransport,
{
    let enrollments = canvas.enrollments(course_id, &[EnrollmentType::Student]).await?;
    let mut seen = HashSet::new();
    let rows: Vec<ReportRow> = enrollments
        .iter()
        .filter(|e| e.user.integration_id.is_none() && seen.insert(e.user_id))
        .map(|e| {
            let mut row = ReportRow::new();
            row.set("canvas_user_id", e.user_id);
            row.set("user", e.user.sortable_name.as_str());
            row.set("ladok_id", MISSING_INTEGRATION_ID);
            row.set("pnr", "fill-in person number");
            row
        })
        .collect();
    info!(course_id, missing = rows.len(), "Built missing integration id report");
    Ok(Report {
        name: format!("users_without_integration_ids-{course_id}"),
        sheet: "users_programs".to_string(),
        rows,
    })
}

static PERSON_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{8}-[0-9tT]{4}").unwrap());

/// The ways a person can be named on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonRef {
    CanvasId(u64),
    LadokUid(String),
    Email(String),
    PersonNumber(String),
    SisUserId(String),
}

impl PersonRef {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = raw.parse() {
                return PersonRef::CanvasId(id);
            }
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            let last = raw.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
            if let Ok(id) = last.parse() {
                return PersonRef::CanvasId(id);
            }
        }
        if raw.len() == 36 && uuid::Uuid::parse_str(raw).is_ok() {
            return PersonRef::LadokUid(raw.to_lowercase());
        }
        if raw.contains('@') {
            return PersonRef::Email(raw.to_string());
        }
        if PERSON_NUMBER.is_match(raw) {
            return PersonRef::PersonNumber(raw.to_string());
        }
        PersonRef::SisUserId(raw.to_string())
    }
}

/// Canvas and Ladok details of one person, as labelled fields.
pub async fn user_info<C, L>(
    canvas: &CanvasClient<C>,
    ladok: &LadokSession<L>,
    person: &PersonRef,
    course: Option<&str>,
    all_programs: bool,
    today: NaiveDate,
) -> Result<ReportRow>
where
    C: HttpTransport,
    L: HttpTransport,
{
    let mut row = ReportRow::new();
    let mut integration_id: Option<String> = None;
    let mut student: Option<StudentRecord> = None;

    let canvas_ref = match person {
        PersonRef::CanvasId(id) => UserRef::CanvasId(*id),
        PersonRef::Email(email) => UserRef::SisLoginId(email.clone()),
        PersonRef::SisUserId(id) => UserRef::SisUserId(id.clone()),
        PersonRef::LadokUid(uid) => {
            integration_id = Some(uid.clone());
            UserRef::SisIntegrationId(uid.clone())
        }
        PersonRef::PersonNumber(pnr) => {
            let found = ladok.student_by_person_number(pnr).await?;
            integration_id = Some(found.uid.clone());
            let uid = found.uid.clone();
            student = Some(found);
            UserRef::SisIntegrationId(uid)
        }
    };

    let user: Option<User> = canvas.user(&canvas_ref).await?;
    match &user {
        Some(user) => {
            // The profile carries login and integration ids the plain user
            // record leaves out for non-admin tokens.
            let profile = canvas.user_profile(user.id).await?;
            row.set("canvas_user_id", user.id);
            row.set("sortable_name", user.sortable_name.as_str());
            if let Some(login) = profile.login_id.as_ref().or(user.login_id.as_ref()) {
                row.set("login_id", login.as_str());
            }
            if let Some(email) = &profile.primary_email {
                row.set("primary_email", email.as_str());
            }
            if let Some(sis) = &user.sis_user_id {
                row.set("sis_user_id", sis.as_str());
            }
            if integration_id.is_none() {
                integration_id = profile
                    .integration_id
                    .clone()
                    .or_else(|| user.integration_id.clone());
            }
        }
        None => row.set("canvas_user_id", NOT_IN_CANVAS),
    }

    if integration_id.is_none() {
        if let (Some(user), Some(course)) = (&user, course) {
            let course_id = canvas.resolve_course_id(course).await?;
            row.set("course_id", course_id);
            let enrollments = canvas.enrollments(course_id, &[]).await?;
            match enrollments.iter().find(|e| e.user.id == user.id) {
                Some(e) => integration_id = e.user.integration_id.clone(),
                None => row.set("note", "user is not enrolled in the course"),
            }
        }
    }

    let Some(uid) = integration_id else {
        if course.is_none() {
            row.set(
                "note",
                "specify a course the user is enrolled in to find the integration id",
            );
        } else if row.get("note").is_none() {
            row.set("note", "user without integration_id");
        }
        return Ok(row);
    };
    row.set("integration_id", uid.as_str());

    let student = match student {
        Some(s) => s,
        None => ladok.student_by_uid(&uid).await?,
    };
    row.set("first_name", student.first_name.as_str());
    row.set("last_name", student.last_name.as_str());
    if let Some(pnr) = &student.person_number {
        row.set("pnr", pnr.as_str());
    }

    let education_types = ladok.education_types().await?;
    match current_programs(ladok.study_structure(&uid).await?, today, all_programs) {
        Some(programs) => add_programs(&mut row, &programs, &education_types),
        None => row.set("program_code", "no current program"),
    }
    Ok(row)
}
