use std::collections::BTreeMap;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::LadokEndpoints;
use crate::contract::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::error::{Error, Result};
use crate::ladok::auth::{self, ACCEPT};
use crate::ladok::grades::GradeScaleSet;
use crate::ladok::identifiers::{normalize_date, normalize_person_number};
use crate::ladok::model::*;
use crate::normalize::{flatten, StudentPrograms, StudyStructure};

/// Page size of participant searches.
pub const PARTICIPANT_PAGE_SIZE: usize = 400;

/// A grade to write as a draft.
#[derive(Debug, Clone, Copy)]
pub struct GradeSubmission<'a> {
    pub person_number: &'a str,
    pub course_code: &'a str,
    /// Component code; the course code itself means the final course grade.
    pub component: &'a str,
    pub grade: &'a str,
    pub date: &'a str,
    pub grade_scale: &'a str,
}

/// An authenticated connection to Ladok.
///
/// Valid from a successful [`sign_in`](LadokSession::sign_in) until
/// [`logout`](LadokSession::logout); every API call outside that window
/// fails with [`Error::NotSignedIn`] without touching the network.
pub struct LadokSession<T: HttpTransport> {
    transport: T,
    endpoints: LadokEndpoints,
    grade_scales: Option<GradeScaleSet>,
}

impl<T: HttpTransport> LadokSession<T> {
    /// A session that has not signed in yet.
    pub fn new(transport: T, endpoints: LadokEndpoints) -> Self {
        Self {
            transport,
            endpoints,
            grade_scales: None,
        }
    }

    pub async fn sign_in(&mut self, username: &str, password: &str) -> Result<()> {
        let scales = auth::handshake(&self.transport, &self.endpoints, username, password).await?;
        self.grade_scales = Some(scales);
        Ok(())
    }

    pub fn is_signed_in(&self) -> bool {
        self.grade_scales.is_some()
    }

    pub fn grade_scales(&self) -> Result<&GradeScaleSet> {
        self.grade_scales.as_ref().ok_or(Error::NotSignedIn)
    }

    pub fn endpoints(&self) -> &LadokEndpoints {
        &self.endpoints
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.proxy(), path)
    }

    async fn get(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.grade_scales()?;
        self.transport.send(request.header("Accept", ACCEPT)).await
    }

    /// Request with a body; carries the XSRF token from the session cookie.
    async fn write(&self, request: HttpRequest, content_type: &str) -> Result<HttpResponse> {
        self.grade_scales()?;
        let token = self
            .transport
            .cookie(&self.endpoints.gui, "XSRF-TOKEN")
            .ok_or_else(|| Error::remote(&request.url, "session has no XSRF-TOKEN cookie"))?;
        let request = request
            .header("Accept", ACCEPT)
            .header("Content-Type", content_type)
            .header("X-XSRF-TOKEN", token)
            .header("Origin", self.endpoints.origin())
            .header("Referer", format!("{}/", self.endpoints.gui.trim_end_matches('/')));
        self.transport.send(request).await
    }

    /// Look a student up by person number (any accepted format).
    pub async fn student_by_person_number(&self, raw: &str) -> Result<StudentRecord> {
        self.grade_scales()?;
        let person_number = normalize_person_number(raw)?;
        let request = HttpRequest::get(self.url("/studentinformation/student/filtrera"))
            .query("limit", "2")
            .query("orderby", "EFTERNAMN_ASC")
            .query("orderby", "FORNAMN_ASC")
            .query("orderby", "PERSONNUMMER_ASC")
            .query("page", "1")
            .query("personnummer", person_number.as_str())
            .query("skipCount", "false")
            .query("sprakkod", "sv");
        let page: RawStudentPage = self.get(request).await?.success_json()?;
        let mut results = page.results;
        if results.len() != 1 {
            debug!(person_number = %person_number, hits = results.len(), "Student search not unique");
            return Err(Error::StudentNotFound(person_number));
        }
        Ok(results.remove(0).into())
    }

    /// Look a student up by Ladok UID (the Canvas integration id).
    pub async fn student_by_uid(&self, uid: &str) -> Result<StudentRecord> {
        let response = self
            .get(HttpRequest::get(self.url(&format!("/studentinformation/student/{uid}"))))
            .await?;
        if response.status == 404 {
            return Err(Error::StudentNotFound(uid.to_string()));
        }
        let raw: RawStudent = response.success_json()?;
        Ok(raw.into())
    }

    /// Current course rounds of a student.
    pub async fn student_courses(&self, student_uid: &str) -> Result<Vec<StudentCourse>> {
        let url = self.url(&format!(
            "/studiedeltagande/tillfallesdeltagande/kurstillfallesdeltagande/student/{student_uid}"
        ));
        let raw: RawCourseParticipations = self.get(HttpRequest::get(url)).await?.success_json()?;
        Ok(raw
            .participations
            .into_iter()
            .filter_map(RawCourseParticipation::into_current_course)
            .collect())
    }

    pub async fn course_components(
        &self,
        round_uid: &str,
        student_uid: &str,
    ) -> Result<Vec<CourseComponent>> {
        let url = self.url(&format!(
            "/resultat/kurstillfalle/{round_uid}/student/{student_uid}/moment"
        ));
        let raw: RawComponents = self.get(HttpRequest::get(url)).await?.success_json()?;
        Ok(raw.components.into_iter().map(CourseComponent::from).collect())
    }

    pub async fn course_results(&self, round_uid: &str, student_uid: &str) -> Result<CourseResults> {
        let url = self.url(&format!(
            "/resultat/studieresultat/student/{student_uid}/utbildningstillfalle/{round_uid}"
        ));
        let raw: RawCourseResults = self.get(HttpRequest::get(url)).await?.success_json()?;
        Ok(raw.into())
    }

    /// The student's program participation, flattened.
    pub async fn study_structure(&self, student_uid: &str) -> Result<StudentPrograms> {
        let url = self.url(&format!("/studiedeltagande/studiestruktur/student/{student_uid}"));
        let structure: StudyStructure = self.get(HttpRequest::get(url)).await?.success_json()?;
        Ok(flatten(&structure))
    }

    /// Education-type reference data, keyed by code.
    pub async fn education_types(&self) -> Result<BTreeMap<String, EducationType>> {
        let url = self.url("/kataloginformation/grunddata/utbildningstyp");
        let raw: RawEducationTypes = self.get(HttpRequest::get(url)).await?.success_json()?;
        Ok(raw
            .types
            .into_iter()
            .map(EducationType::from)
            .map(|t| (t.code.clone(), t))
            .collect())
    }

    /// Course rounds of a course code.
    pub async fn course_instances(&self, course_code: &str) -> Result<Vec<CourseInstance>> {
        let request = HttpRequest::get(self.url("/resultat/kurstillfalle/filtrera"))
            .query("kurskod", course_code)
            .query("page", "1")
            .query("limit", "100")
            .query("skipCount", "false")
            .query("sprakkod", "en");
        let raw: RawCourseInstances = self.get(request).await?.success_json()?;
        Ok(raw.results)
    }

    /// The round of `course_code` with the given instance code, if any.
    pub async fn instance_info(
        &self,
        course_code: &str,
        instance_code: &str,
    ) -> Result<Option<CourseInstance>> {
        Ok(self
            .course_instances(course_code)
            .await?
            .into_iter()
            .find(|i| i.instance_code == instance_code))
    }

    /// A course round by UID, as Canvas keeps it in `sis_course_id`.
    pub async fn instance_by_uid(&self, round_uid: &str) -> Result<Option<CourseInstance>> {
        let response = self
            .get(HttpRequest::get(self.url(&format!("/resultat/kurstillfalle/{round_uid}"))))
            .await?;
        if response.status == 404 {
            debug!(round_uid, "No such course round");
            return Ok(None);
        }
        response.success_json().map(Some)
    }

    /// Participants of a course round in any of `statuses`.
    ///
    /// One search per status so every participant carries its state; each
    /// search pages until a short page comes back.
    pub async fn participants(
        &self,
        round_uid: &str,
        statuses: &[ParticipantStatus],
    ) -> Result<Vec<Participant>> {
        let url = self.url("/studiedeltagande/deltagare/kurstillfalle");
        let mut participants = Vec::new();
        for &status in statuses {
            let mut page = 1;
            loop {
                let body = json!({
                    "page": page,
                    "limit": PARTICIPANT_PAGE_SIZE,
                    "orderby": ["EFTERNAMN_ASC", "FORNAMN_ASC", "PERSONNUMMER_ASC", "KONTROLLERAD_KURS_ASC"],
                    "deltagaretillstand": [status.ladok_code()],
                    "utbildningstillfalleUID": [round_uid],
                });
                let request = HttpRequest::get(&url).with_json(Method::Put, body);
                let raw: RawParticipants = self
                    .write(request, "application/vnd.ladok-studiedeltagande+json")
                    .await?
                    .success_json()?;
                let received = raw.results.len();
                participants.extend(raw.results.into_iter().map(|p| Participant {
                    student: p.student.into(),
                    status,
                }));
                debug!(round_uid, %status, page, received, "Fetched participant page");
                if received < PARTICIPANT_PAGE_SIZE {
                    break;
                }
                page += 1;
            }
        }
        Ok(participants)
    }

    async fn find_course(&self, student_uid: &str, course_code: &str) -> Result<StudentCourse> {
        self.student_courses(student_uid)
            .await?
            .into_iter()
            .find(|c| c.code == course_code)
            .ok_or_else(|| Error::CourseNotFound(course_code.to_string()))
    }

    /// Attested and pending results of a student's course, by component code.
    pub async fn results(
        &self,
        person_number: &str,
        course_code: &str,
    ) -> Result<BTreeMap<String, ComponentResult>> {
        let student = self.student_by_person_number(person_number).await?;
        let course = self.find_course(&student.uid, course_code).await?;
        let mut results = BTreeMap::new();

        let url = self.url(&format!("/resultat/studentresultat/attesterade/student/{}", student.uid));
        let attested: RawAttested = self.get(HttpRequest::get(url)).await?.success_json()?;
        let attested = attested
            .per_course
            .into_iter()
            .find(|c| c.course_uid == course.education_uid)
            .map(|c| c.results)
            .unwrap_or_default();
        for result in attested {
            // Credit transfers have neither code nor grade.
            let (Some(code), Some(grade)) = (result.code, result.grade) else {
                continue;
            };
            results.insert(
                code,
                ComponentResult {
                    grade,
                    status: ResultStatus::Attested,
                    date: result.date.unwrap_or_default(),
                },
            );
        }

        let url = self.url(&format!(
            "/resultat/resultat/resultat/student/{}/kurs/{}",
            student.uid, course.education_uid
        ));
        let request = HttpRequest::get(url)
            .query("resultatstatus", "UTKAST")
            .query("resultatstatus", "KLARMARKERAT");
        let pending: RawPending = self.get(request).await?.success_json()?;
        for result in pending.results {
            let url = self.url(&format!("/resultat/utbildningsinstans/{}", result.component_uid));
            let instance: RawEducationInstance =
                self.get(HttpRequest::get(url)).await?.success_json()?;
            results.insert(
                instance.code,
                ComponentResult {
                    grade: result.grade.code,
                    status: ResultStatus::Pending(result.process_status),
                    date: result.date.unwrap_or_else(|| "0".to_string()),
                },
            );
        }
        Ok(results)
    }

    /// Write a grade draft, updating the component's existing draft if there is one.
    ///
    /// The grade, scale, person number and date are all checked before the
    /// first request.
    pub async fn save_result(&self, submission: GradeSubmission<'_>) -> Result<SaveOutcome> {
        let (scale, grade) = self
            .grade_scales()?
            .check(submission.grade, submission.grade_scale)?;
        let (scale_id, grade_id) = (scale.id, grade.id);
        normalize_person_number(submission.person_number)?;
        let date = normalize_date(submission.date)?;

        let student = self.student_by_person_number(submission.person_number).await?;
        let course = self.find_course(&student.uid, submission.course_code).await?;
        let component_uid = if submission.component == course.code {
            course.instance_uid.clone()
        } else {
            self.course_components(&course.round_uid, &student.uid)
                .await?
                .into_iter()
                .find(|c| c.code == submission.component)
                .map(|c| c.instance_uid)
                .ok_or_else(|| Error::ComponentNotFound {
                    course_code: course.code.clone(),
                    component: submission.component.to_string(),
                })?
        };
        let results = self.course_results(&course.round_uid, &student.uid).await?;

        let (request, outcome) = match results.draft_for(&component_uid) {
            Some(draft) => {
                let body = json!({
                    "Resultat": [{
                        "ResultatUID": draft.uid,
                        "Betygsgrad": grade_id,
                        "Noteringar": [],
                        "BetygsskalaID": scale_id,
                        "Examinationsdatum": date,
                        "SenasteResultatandring": draft.last_modified,
                    }]
                });
                let url = self.url("/resultat/studieresultat/uppdatera");
                (HttpRequest::get(url).with_json(Method::Put, body), SaveOutcome::Updated)
            }
            None => {
                let body = json!({
                    "Resultat": [{
                        "StudieresultatUID": results.uid,
                        "UtbildningsinstansUID": component_uid,
                        "Betygsgrad": grade_id,
                        "Noteringar": [],
                        "BetygsskalaID": scale_id,
                        "Examinationsdatum": date,
                    }]
                });
                let url = self.url("/resultat/studieresultat/skapa");
                (HttpRequest::get(url).with_json(Method::Post, body), SaveOutcome::Created)
            }
        };

        let response = self
            .write(request, "application/vnd.ladok-resultat+json")
            .await?;
        let accepted = serde_json::from_str::<serde_json::Value>(&response.body)
            .ok()
            .is_some_and(|v| v.get("Resultat").is_some());
        if !accepted {
            return Err(Error::remote(
                &response.url,
                format!(
                    "could not save {} {} {}: {}",
                    submission.component, submission.grade, date, response.body
                ),
            ));
        }
        info!(
            course_code = submission.course_code,
            component = submission.component,
            ?outcome,
            "Saved grade draft"
        );
        Ok(outcome)
    }

    /// End the server-side session. The session is unusable afterwards either way.
    pub async fn logout(&mut self) -> Result<()> {
        self.grade_scales()?;
        let response = self
            .transport
            .send(HttpRequest::get(self.url("/logout")).header("Accept", ACCEPT))
            .await;
        self.grade_scales = None;
        let response = response?;
        if !response.is_success() {
            warn!(status = response.status, "Ladok logout returned non-success");
            return Err(Error::remote(
                &response.url,
                format!("HTTP status {} on logout", response.status),
            ));
        }
        info!("Signed out of Ladok");
        Ok(())
    }
}
