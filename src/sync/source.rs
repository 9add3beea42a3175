//! Upstream course dataset fetcher.
//!
//! The upstream API is paginated: one request reports the total count,
//! then pages are fetched concurrently and merged into an unordered batch
//! deduplicated by CRN. Upstream field names stay on the private DTOs in
//! this module and never reach the persisted schema.

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::{Course, Instructor, Meeting};

/// Default number of courses requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 64;

/// Default number of pages fetched at once.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Per-request timeout for upstream calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A paginated source of course records.
#[async_trait]
pub trait CourseSource: Send + Sync {
    /// Total number of courses available upstream.
    async fn fetch_total_count(&self) -> Result<usize>;

    /// Up to `limit` courses starting at `offset`.
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Course>>;
}

/// Paging parameters for [`fetch_all`].
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub page_size: usize,
    pub concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

/// Split `total` records into `(offset, limit)` pages.
pub fn page_ranges(total: usize, page_size: usize) -> Vec<(usize, usize)> {
    let page_size = page_size.max(1);
    (0..total)
        .step_by(page_size)
        .map(|offset| (offset, page_size.min(total - offset)))
        .collect()
}

/// Fetch the complete upstream dataset.
///
/// A failed page or a page shorter than requested fails the whole fetch.
/// Reconciling against a partial dataset would delete every course on the
/// missing pages.
pub async fn fetch_all<S>(source: &S, options: FetchOptions) -> Result<Vec<Course>>
where
    S: CourseSource + ?Sized,
{
    let total = source.fetch_total_count().await?;
    let ranges = page_ranges(total, options.page_size);
    tracing::debug!(total, pages = ranges.len(), "Fetching upstream courses");

    let pages: Vec<Vec<Course>> = stream::iter(ranges)
        .map(|(offset, limit)| fetch_full_page(source, offset, limit))
        .buffer_unordered(options.concurrency.max(1))
        .try_collect()
        .await?;

    let received: usize = pages.iter().map(Vec::len).sum();
    let mut seen = HashSet::new();
    let courses: Vec<Course> = pages
        .into_iter()
        .flatten()
        .filter(|course| seen.insert(course.term_crn.clone()))
        .collect();

    if courses.len() != received {
        tracing::debug!(
            received,
            unique = courses.len(),
            "Upstream returned duplicate CRNs"
        );
    }

    Ok(courses)
}

async fn fetch_full_page<S>(source: &S, offset: usize, limit: usize) -> Result<Vec<Course>>
where
    S: CourseSource + ?Sized,
{
    let page = source.fetch_page(offset, limit).await?;
    if page.len() < limit {
        return Err(Error::UpstreamFetch(format!(
            "page at offset {offset} returned {} of {limit} courses",
            page.len()
        )));
    }
    Ok(page)
}

/// [`CourseSource`] backed by the university course API.
#[derive(Debug, Clone)]
pub struct HttpCourseSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCourseSource {
    /// Create a source for one academic term, e.g. `202410`.
    pub fn new(base_url: &str, term: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("courseload/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let endpoint = format!("{}/{}", base_url.trim_end_matches('/'), term);
        reqwest::Url::parse(&endpoint)
            .map_err(|e| Error::UpstreamFetch(format!("invalid upstream url {endpoint}: {e}")))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_page(&self, offset: usize, limit: usize) -> Result<PageResponse> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("page[offset]", offset), ("page[limit]", limit)])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<PageResponse>().await?)
    }
}

#[async_trait]
impl CourseSource for HttpCourseSource {
    async fn fetch_total_count(&self) -> Result<usize> {
        self.get_page(0, 1)
            .await?
            .total_count
            .ok_or_else(|| Error::UpstreamFetch("response is missing total-count".into()))
    }

    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Course>> {
        let page = self.get_page(offset, limit).await?;
        Ok(page.data.into_iter().map(Course::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    data: Vec<UpstreamCourse>,
    #[serde(rename = "total-count", default)]
    total_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct UpstreamCourse {
    #[serde(rename = "TERM_CRN")]
    term_crn: String,
    #[serde(rename = "COURSE_DATA")]
    data: UpstreamCourseData,
}

#[derive(Debug, Deserialize)]
struct UpstreamCourseData {
    #[serde(rename = "SYVSCHD_CRSE_LONG_TITLE", default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(rename = "SYVSCHD_SUBJ_CODE", default, deserialize_with = "null_as_default")]
    subject: String,
    #[serde(rename = "SYVSCHD_CRSE_NUMB", default, deserialize_with = "null_as_default")]
    number: String,
    #[serde(rename = "SYVSCHD_CRSE_DESC", default, deserialize_with = "null_as_default")]
    description: String,
    #[serde(rename = "SYVSCHD_SEQ_NUMB", default, deserialize_with = "null_as_default")]
    section: String,
    #[serde(rename = "INSTRUCTORS", default, deserialize_with = "null_as_default")]
    instructors: Vec<UpstreamInstructor>,
    #[serde(rename = "MEETINGS", default, deserialize_with = "null_as_default")]
    meetings: Vec<UpstreamMeeting>,
}

#[derive(Debug, Deserialize)]
struct UpstreamInstructor {
    #[serde(rename = "LAST_NAME", default, deserialize_with = "null_as_default")]
    last_name: String,
    #[serde(rename = "FIRST_NAME", default, deserialize_with = "null_as_default")]
    first_name: String,
    #[serde(rename = "EMAIL", default, deserialize_with = "null_as_default")]
    email: String,
}

#[derive(Debug, Deserialize)]
struct UpstreamMeeting {
    #[serde(rename = "DAYS", default, deserialize_with = "null_as_default")]
    days: String,
    #[serde(rename = "BUILDING", default, deserialize_with = "null_as_default")]
    building: String,
    #[serde(rename = "ROOM", default, deserialize_with = "null_as_default")]
    room: String,
    #[serde(rename = "TIME", default, deserialize_with = "null_as_default")]
    time: String,
}

/// Upstream sends `null` for blank fields.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<UpstreamCourse> for Course {
    fn from(raw: UpstreamCourse) -> Self {
        let data = raw.data;
        Self {
            term_crn: raw.term_crn,
            title: data.title,
            subject_code: data.subject,
            course_number: data.number,
            section_number: data.section,
            description: data.description,
            instructors: data
                .instructors
                .into_iter()
                .map(|i| Instructor {
                    last_name: i.last_name,
                    first_name: i.first_name,
                    email: i.email,
                })
                .collect(),
            meetings: data
                .meetings
                .into_iter()
                .map(|m| Meeting {
                    days: m.days,
                    building: m.building,
                    room: m.room,
                    time: m.time,
                })
                .collect(),
        }
    }
}
