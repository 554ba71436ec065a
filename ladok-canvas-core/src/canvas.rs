//! # canvas: Canvas LMS REST client
//!
//! Bearer-token client over [`HttpTransport`]. List endpoints go through
//! [`fetch_all`](crate::paginate::fetch_all) with `per_page=100`; single
//! resources are fetched directly.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::contract::{HttpRequest, HttpTransport};
use crate::error::{Error, Result};
use crate::paginate::fetch_all;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentType {
    Student,
    Teacher,
    Ta,
    Designer,
    Observer,
}

impl EnrollmentType {
    pub fn as_canvas(self) -> &'static str {
        match self {
            EnrollmentType::Student => "StudentEnrollment",
            EnrollmentType::Teacher => "TeacherEnrollment",
            EnrollmentType::Ta => "TaEnrollment",
            EnrollmentType::Designer => "DesignerEnrollment",
            EnrollmentType::Observer => "ObserverEnrollment",
        }
    }
}

/// How to address a user in `/users/{ref}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    CanvasId(u64),
    SisUserId(String),
    SisLoginId(String),
    SisIntegrationId(String),
}

impl UserRef {
    pub fn path_segment(&self) -> String {
        match self {
            UserRef::CanvasId(id) => id.to_string(),
            UserRef::SisUserId(v) => format!("sis_user_id:{v}"),
            UserRef::SisLoginId(v) => format!("sis_login_id:{v}"),
            UserRef::SisIntegrationId(v) => format!("sis_integration_id:{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Enrollment {
    #[serde(default)]
    pub id: u64,
    pub user_id: u64,
    #[serde(default)]
    pub course_id: u64,
    #[serde(rename = "type", default)]
    pub enrollment_type: String,
    #[serde(default)]
    pub enrollment_state: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
    pub user: EnrollmentUser,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnrollmentUser {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sortable_name: String,
    #[serde(default)]
    pub integration_id: Option<String>,
    #[serde(default)]
    pub sis_user_id: Option<String>,
    #[serde(default)]
    pub login_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sortable_name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub sis_user_id: Option<String>,
    #[serde(default)]
    pub integration_id: Option<String>,
    #[serde(default)]
    pub login_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sortable_name: Option<String>,
    #[serde(default)]
    pub primary_email: Option<String>,
    #[serde(default)]
    pub login_id: Option<String>,
    #[serde(default)]
    pub integration_id: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Course {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub sis_course_id: Option<String>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCard {
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub original_name: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub asset_string: String,
}

impl DashboardCard {
    /// Course id encoded as `course_<id>` in the card's asset string.
    pub fn course_id(&self) -> Option<u64> {
        self.asset_string.strip_prefix("course_")?.parse().ok()
    }
}

pub struct CanvasClient<T: HttpTransport> {
    transport: T,
    base_url: String,
    access_token: String,
}

impl<T: HttpTransport> CanvasClient<T> {
    /// `base_url` is the API root, e.g. `https://canvas.kth.se/api/v1`.
    pub fn new(transport: T, base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn request(&self, path: &str) -> HttpRequest {
        HttpRequest::get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.access_token))
    }

    /// Every enrollment of `course_id` of the given types, in server order.
    ///
    /// A user enrolled in several sections appears once per section.
    pub async fn enrollments(
        &self,
        course_id: u64,
        types: &[EnrollmentType],
    ) -> Result<Vec<Enrollment>> {
        let mut request = self
            .request(&format!("/courses/{course_id}/enrollments"))
            .query("per_page", "100");
        for t in types {
            request = request.query("type[]", t.as_canvas());
        }
        let enrollments: Vec<Enrollment> = fetch_all(&self.transport, request).await?;
        debug!(course_id, count = enrollments.len(), "Fetched enrollments");
        Ok(enrollments)
    }

    /// A user, or `None` if Canvas answers 404. Any other failure is an error.
    pub async fn user(&self, user: &UserRef) -> Result<Option<User>> {
        let response = self
            .transport
            .send(self.request(&format!("/users/{}", user.path_segment())))
            .await?;
        if response.status == 404 {
            debug!(user = %user.path_segment(), "No such Canvas user");
            return Ok(None);
        }
        response.success_json().map(Some)
    }

    pub async fn user_profile(&self, user_id: u64) -> Result<UserProfile> {
        self.transport
            .send(self.request(&format!("/users/{user_id}/profile")))
            .await?
            .success_json()
    }

    pub async fn course(&self, course_id: u64) -> Result<Course> {
        self.transport
            .send(self.request(&format!("/courses/{course_id}")))
            .await?
            .success_json()
    }

    pub async fn dashboard_cards(&self) -> Result<Vec<DashboardCard>> {
        fetch_all(&self.transport, self.request("/dashboard/dashboard_cards")).await
    }

    /// Course id from a free-text argument: digits are taken as the id,
    /// anything else is matched against the caller's dashboard cards.
    pub async fn resolve_course_id(&self, argument: &str) -> Result<u64> {
        let argument = argument.trim();
        if !argument.is_empty() && argument.chars().all(|c| c.is_ascii_digit()) {
            return argument
                .parse()
                .map_err(|_| Error::CourseNotFound(argument.to_string()));
        }
        let cards = self.dashboard_cards().await?;
        let card = match_dashboard_card(&cards, argument)
            .ok_or_else(|| Error::CourseNotFound(argument.to_string()))?;
        let id = card
            .course_id()
            .ok_or_else(|| Error::CourseNotFound(argument.to_string()))?;
        info!(argument, course = %card.original_name, course_id = id, "Resolved course");
        Ok(id)
    }
}

/// Best dashboard card for `needle`. Earlier rules win over later ones,
/// and within a rule the first card in dashboard order wins:
/// course code, short name (equal, prefix, substring), then original name
/// (equal, prefix, substring).
pub fn match_dashboard_card<'a>(cards: &'a [DashboardCard], needle: &str) -> Option<&'a DashboardCard> {
    type Rule = fn(&DashboardCard, &str) -> bool;
    let rules: [Rule; 7] = [
        |c, n| c.course_code == n,
        |c, n| c.short_name == n,
        |c, n| c.short_name.starts_with(n),
        |c, n| c.short_name.contains(n),
        |c, n| c.original_name == n,
        |c, n| c.original_name.starts_with(n),
        |c, n| c.original_name.contains(n),
    ];
    rules
        .iter()
        .find_map(|rule| cards.iter().find(|card| rule(card, needle)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(code: &str, short: &str, original: &str, id: u64) -> DashboardCard {
        DashboardCard {
            short_name: short.into(),
            original_name: original.into(),
            course_code: code.into(),
            asset_string: format!("course_{id}"),
        }
    }

    #[test]
    fn dashboard_matching_follows_rule_priority() {
        let cards = vec![
            card("II2202 HT25", "II2202 HT25 (50287)", "Research Methodology", 1),
            card("IK1552 VT26", "IK1552 VT26", "Internetworking II2202", 2),
            card("DA231X", "Degree project", "Degree Project in Computer Science", 3),
        ];
        assert_eq!(match_dashboard_card(&cards, "IK1552 VT26").unwrap().course_id(), Some(2));
        assert_eq!(match_dashboard_card(&cards, "II2202").unwrap().course_id(), Some(1));
        assert_eq!(match_dashboard_card(&cards, "50287").unwrap().course_id(), Some(1));
        assert_eq!(match_dashboard_card(&cards, "Computer Science").unwrap().course_id(), Some(3));
        assert!(match_dashboard_card(&cards, "nothing like it").is_none());
    }

    #[test]
    fn asset_string_yields_course_id() {
        assert_eq!(card("a", "b", "c", 17636).course_id(), Some(17636));
        let bad = DashboardCard {
            asset_string: "group_5".into(),
            ..card("a", "b", "c", 0)
        };
        assert_eq!(bad.course_id(), None);
    }

    #[test]
    fn user_ref_segments() {
        assert_eq!(UserRef::CanvasId(29).path_segment(), "29");
        assert_eq!(
            UserRef::SisIntegrationId("f9da68d5-e0f1-11e7-8131-683643294f39".into()).path_segment(),
            "sis_integration_id:f9da68d5-e0f1-11e7-8131-683643294f39"
        );
        assert_eq!(UserRef::SisLoginId("a@kth.se".into()).path_segment(), "sis_login_id:a@kth.se");
        assert_eq!(UserRef::SisUserId("u1abcdef".into()).path_segment(), "sis_user_id:u1abcdef");
    }
}
