//! Course repository operations.
//!
//! A course and its instructor and meeting rows are always written and
//! removed together inside one queued transaction, so no caller can observe
//! a course without its children or children without their course.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::Store;
use crate::error::{Error, Result};
use crate::model::{Course, CourseQuery, Instructor, Meeting};

const INSERT_COURSE: &str = r#"
INSERT OR REPLACE INTO courses
    (term_crn, title, subject_code, course_number, section_number, description)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;

const INSERT_INSTRUCTOR: &str = r#"
INSERT INTO instructors (term_crn, last_name, first_name, email)
VALUES (?1, ?2, ?3, ?4)
"#;

const INSERT_MEETING: &str = r#"
INSERT INTO meetings (term_crn, days, building, room, time)
VALUES (?1, ?2, ?3, ?4, ?5)
"#;

const SELECT_COURSE: &str = r#"
SELECT term_crn, title, subject_code, course_number, section_number, description
FROM courses WHERE term_crn = ?1
"#;

const SELECT_INSTRUCTORS: &str =
    "SELECT last_name, first_name, email FROM instructors WHERE term_crn = ?1 ORDER BY id";

const SELECT_MEETINGS: &str =
    "SELECT days, building, room, time FROM meetings WHERE term_crn = ?1 ORDER BY id";

impl Store {
    /// Insert a course, replacing any existing course with the same CRN.
    ///
    /// The course row, its old children and its new children are written in
    /// one transaction; a failure leaves the store as it was.
    #[tracing::instrument(skip(self, course), fields(term_crn = %course.term_crn))]
    pub async fn insert_course(&self, course: &Course) -> Result<()> {
        let course = course.clone();
        self.queue
            .transaction(move |tx| write_course(tx, &course))
            .await
    }

    /// Delete a course with all its instructors and meetings.
    ///
    /// Deleting an unknown CRN is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn delete_course(&self, term_crn: &str) -> Result<()> {
        let term_crn = term_crn.to_string();
        self.queue
            .transaction(move |tx| {
                tx.execute("DELETE FROM courses WHERE term_crn = ?1", [&term_crn])?;
                delete_children(tx, &term_crn)?;
                Ok(())
            })
            .await
    }

    /// Load one course with its children.
    #[tracing::instrument(skip(self))]
    pub async fn get_course(&self, term_crn: &str) -> Result<Course> {
        let term_crn = term_crn.to_string();
        self.queue
            .submit(move |conn| {
                load_course(conn, &term_crn)?.ok_or_else(|| Error::NotFound(term_crn.clone()))
            })
            .await
    }

    /// All persisted CRNs, in ascending order.
    pub async fn course_crns(&self) -> Result<Vec<String>> {
        self.queue
            .submit(|conn| {
                let mut stmt = conn.prepare("SELECT term_crn FROM courses ORDER BY term_crn")?;
                let crns = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(crns)
            })
            .await
    }

    /// Number of persisted courses.
    pub async fn course_count(&self) -> Result<u64> {
        self.queue
            .submit(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
                Ok(count.max(0) as u64)
            })
            .await
    }

    /// Search courses by a raw key and its values.
    ///
    /// Unknown keys fail with [`Error::InvalidKey`] without touching the
    /// store. See [`CourseQuery::KEYS`].
    pub async fn query_courses(&self, key: &str, values: &[&str]) -> Result<Vec<Course>> {
        let query = CourseQuery::parse(key, values)?;
        self.find_courses(query).await
    }

    /// Run a validated search, expanding every match into a full course.
    ///
    /// Matching and expansion happen in one queued operation.
    #[tracing::instrument(skip(self), fields(key = query.key()))]
    pub async fn find_courses(&self, query: CourseQuery) -> Result<Vec<Course>> {
        self.queue
            .submit(move |conn| {
                let conn: &Connection = conn;
                matching_crns(conn, &query)?
                    .iter()
                    .filter_map(|crn| load_course(conn, crn).transpose())
                    .collect()
            })
            .await
    }
}

fn write_course(conn: &Connection, course: &Course) -> Result<()> {
    delete_children(conn, &course.term_crn)?;

    conn.execute(
        INSERT_COURSE,
        params![
            course.term_crn,
            course.title,
            course.subject_code,
            course.course_number,
            course.section_number,
            course.description,
        ],
    )?;

    let mut insert_instructor = conn.prepare_cached(INSERT_INSTRUCTOR)?;
    for instructor in &course.instructors {
        insert_instructor.execute(params![
            course.term_crn,
            instructor.last_name,
            instructor.first_name,
            instructor.email,
        ])?;
    }

    let mut insert_meeting = conn.prepare_cached(INSERT_MEETING)?;
    for meeting in &course.meetings {
        insert_meeting.execute(params![
            course.term_crn,
            meeting.days,
            meeting.building,
            meeting.room,
            meeting.time,
        ])?;
    }

    Ok(())
}

fn delete_children(conn: &Connection, term_crn: &str) -> Result<()> {
    conn.execute("DELETE FROM instructors WHERE term_crn = ?1", [term_crn])?;
    conn.execute("DELETE FROM meetings WHERE term_crn = ?1", [term_crn])?;
    Ok(())
}

fn load_course(conn: &Connection, term_crn: &str) -> Result<Option<Course>> {
    let course = conn
        .query_row(SELECT_COURSE, [term_crn], |row| {
            Ok(Course {
                term_crn: row.get(0)?,
                title: row.get(1)?,
                subject_code: row.get(2)?,
                course_number: row.get(3)?,
                section_number: row.get(4)?,
                description: row.get(5)?,
                instructors: Vec::new(),
                meetings: Vec::new(),
            })
        })
        .optional()?;

    let Some(mut course) = course else {
        return Ok(None);
    };

    let mut stmt = conn.prepare_cached(SELECT_INSTRUCTORS)?;
    course.instructors = stmt
        .query_map([term_crn], |row| {
            Ok(Instructor {
                last_name: row.get(0)?,
                first_name: row.get(1)?,
                email: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare_cached(SELECT_MEETINGS)?;
    course.meetings = stmt
        .query_map([term_crn], |row| {
            Ok(Meeting {
                days: row.get(0)?,
                building: row.get(1)?,
                room: row.get(2)?,
                time: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Some(course))
}

fn matching_crns(conn: &Connection, query: &CourseQuery) -> Result<Vec<String>> {
    let (sql, args): (&str, Vec<String>) = match query {
        CourseQuery::Crn(crn) => (
            "SELECT term_crn FROM courses WHERE term_crn = ?1 ORDER BY term_crn",
            vec![crn.clone()],
        ),
        CourseQuery::Title(title) => (
            r"SELECT term_crn FROM courses WHERE title LIKE ?1 ESCAPE '\' ORDER BY term_crn",
            vec![contains_pattern(title)],
        ),
        CourseQuery::Subject(subject) => (
            "SELECT term_crn FROM courses WHERE subject_code = ?1 ORDER BY term_crn",
            vec![subject.clone()],
        ),
        CourseQuery::Number(number) => (
            "SELECT term_crn FROM courses WHERE course_number = ?1 ORDER BY term_crn",
            vec![number.clone()],
        ),
        CourseQuery::SubjectNumber { subject, number } => (
            r"SELECT term_crn FROM courses WHERE subject_code = ?1 AND course_number LIKE ?2 ESCAPE '\' ORDER BY term_crn",
            vec![subject.clone(), contains_pattern(number)],
        ),
    };

    let mut stmt = conn.prepare(sql)?;
    let crns = stmt
        .query_map(params_from_iter(args.iter()), |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(crns)
}

/// `LIKE` pattern matching `needle` anywhere, with wildcards escaped.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
