use std::fmt;

/// Every failure a Canvas or Ladok operation can surface.
///
/// All variants are fatal to the operation that produced them; there is no
/// retry layer above this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not signed in to Ladok")]
    NotSignedIn,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("signed in successfully, but the account has no access to Ladok")]
    NotAuthorized,

    #[error("invalid {kind}: {value}")]
    InvalidIdentifier { kind: IdentifierKind, value: String },

    #[error("grade {grade} does not match grade scale {scale}")]
    GradeScaleMismatch { grade: String, scale: String },

    #[error("request to {url} failed: {reason}")]
    RemoteRequestFailed { url: String, reason: String },

    #[error("no student found for {0}")]
    StudentNotFound(String),

    #[error("student is not participating in course {0}")]
    CourseNotFound(String),

    #[error("course {course_code} has no component {component}")]
    ComponentNotFound {
        course_code: String,
        component: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl Error {
    pub fn remote(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::RemoteRequestFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Which locally validated identifier was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    PersonNumber,
    Date,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::PersonNumber => f.write_str("person number"),
            IdentifierKind::Date => f.write_str("date"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
