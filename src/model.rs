//! Course and user entities.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator for the user's course reference list as persisted.
pub const COURSE_LIST_SEPARATOR: char = ',';

/// A course section, keyed by its term-scoped CRN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub term_crn: String,
    pub title: String,
    pub subject_code: String,
    pub course_number: String,
    pub section_number: String,
    pub description: String,
    /// Owned by the course; created and destroyed with it.
    pub instructors: Vec<Instructor>,
    /// Owned by the course; created and destroyed with it.
    pub meetings: Vec<Meeting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub last_name: String,
    pub first_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub days: String,
    pub building: String,
    pub room: String,
    pub time: String,
}

/// A registered user.
///
/// `courses` holds weak references by CRN. Entries may name courses that
/// have since been deleted upstream; those are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub privilege: i64,
    pub courses: Vec<String>,
}

/// Input for creating a user. The password is hashed before it is stored.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub privilege: i64,
}

/// Parse the persisted course reference list, skipping empty entries.
pub fn parse_course_list(raw: &str) -> Vec<String> {
    raw.split(COURSE_LIST_SEPARATOR)
        .map(str::trim)
        .filter(|crn| !crn.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join a course reference list into its persisted form.
pub fn join_course_list(courses: &[String]) -> String {
    courses.join(&COURSE_LIST_SEPARATOR.to_string())
}

/// A validated course search.
///
/// Built from a raw key and its values with [`CourseQuery::parse`] so that
/// unknown keys are rejected before the store is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseQuery {
    /// Exact CRN match (`term_crn`).
    Crn(String),
    /// Case-insensitive substring of the title (`title`).
    Title(String),
    /// Exact subject code (`subject_code`).
    Subject(String),
    /// Exact course number (`course_number`).
    Number(String),
    /// Exact subject code plus course number substring (`subject-number`).
    SubjectNumber { subject: String, number: String },
}

impl CourseQuery {
    /// Keys accepted by [`CourseQuery::parse`], with display labels.
    pub const KEYS: [(&'static str, &'static str); 5] = [
        ("term_crn", "CRN"),
        ("title", "Title"),
        ("subject_code", "Subject"),
        ("course_number", "Number"),
        ("subject-number", "Subject & Number"),
    ];

    pub fn parse(key: &str, values: &[&str]) -> Result<Self> {
        let value = |index: usize| {
            values
                .get(index)
                .map(|v| (*v).to_string())
                .ok_or_else(|| {
                    Error::InvalidArgument(format!("query key {key} needs {} value(s)", index + 1))
                })
        };

        match key {
            "term_crn" => Ok(Self::Crn(value(0)?)),
            "title" => Ok(Self::Title(value(0)?)),
            "subject_code" => Ok(Self::Subject(value(0)?)),
            "course_number" => Ok(Self::Number(value(0)?)),
            "subject-number" => Ok(Self::SubjectNumber {
                subject: value(0)?,
                number: value(1)?,
            }),
            other => Err(Error::InvalidKey(other.to_string())),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Crn(_) => "term_crn",
            Self::Title(_) => "title",
            Self::Subject(_) => "subject_code",
            Self::Number(_) => "course_number",
            Self::SubjectNumber { .. } => "subject-number",
        }
    }
}
