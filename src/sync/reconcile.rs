//! Reconciliation of stored courses against the upstream dataset.
//!
//! One pass is a full two-way diff keyed by CRN:
//! - stored CRNs missing upstream are deleted
//! - upstream courses not yet stored are inserted
//! - courses present on both sides are left untouched
//!
//! Passes keep no state between runs. If the stored CRNs cannot be read,
//! the pass degrades to inserting every fetched course and deleting
//! nothing (insert-only mode), trading exactness for availability on a
//! cold or damaged store.

use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::Instrument;

use super::source::{fetch_all, CourseSource, FetchOptions};
use crate::error::{Error, Result};
use crate::model::Course;
use crate::observability::metrics::record_reconcile;
use crate::storage::CourseRepository;

/// How a reconciliation pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Full diff against the stored CRNs.
    Full,
    /// Stored CRNs were unreadable; every fetched course was inserted.
    InsertOnly,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub fetched: usize,
    pub inserted: usize,
    pub deleted: usize,
    pub mode: ReconcileMode,
}

/// Membership of a fetched CRN during the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    /// Fetched, not (yet) known to be stored.
    New,
    /// Fetched and already stored, or inserted during this pass.
    Stored,
}

/// Fetch the upstream dataset and reconcile the store against it.
pub async fn run_reconciliation<R, S>(
    repo: &R,
    source: &S,
    options: FetchOptions,
) -> Result<ReconcileReport>
where
    R: CourseRepository + ?Sized,
    S: CourseSource + ?Sized,
{
    let pass_id = uuid::Uuid::now_v7();

    async {
        let start = Instant::now();
        let courses = fetch_all(source, options).await?;
        tracing::info!(
            count = courses.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded upstream courses"
        );

        reconcile_courses(repo, &courses).await
    }
    .instrument(tracing::info_span!("reconcile", %pass_id))
    .await
}

/// Converge the store to exactly `courses`.
///
/// A store error while reading the stored CRNs switches to insert-only
/// mode. Any other failure aborts the pass; the next pass starts over.
pub async fn reconcile_courses<R>(repo: &R, courses: &[Course]) -> Result<ReconcileReport>
where
    R: CourseRepository + ?Sized,
{
    let stored = match repo.course_crns().await {
        Ok(crns) => crns,
        Err(Error::Store(e)) => {
            tracing::warn!(
                error = %e,
                count = courses.len(),
                "Failed to read stored course CRNs, inserting every fetched course without deleting"
            );
            return insert_all(repo, courses).await;
        }
        Err(e) => return Err(e),
    };

    let mut presence: HashMap<&str, Presence> = courses
        .iter()
        .map(|course| (course.term_crn.as_str(), Presence::New))
        .collect();

    let mut deleted = 0;
    for crn in &stored {
        match presence.get_mut(crn.as_str()) {
            Some(state) => *state = Presence::Stored,
            None => {
                repo.delete_course(crn).await?;
                deleted += 1;
            }
        }
    }

    let mut inserted = 0;
    for course in courses {
        if let Some(state) = presence.get_mut(course.term_crn.as_str()) {
            if *state == Presence::New {
                repo.insert_course(course).await?;
                *state = Presence::Stored;
                inserted += 1;
            }
        }
    }

    let report = ReconcileReport {
        fetched: courses.len(),
        inserted,
        deleted,
        mode: ReconcileMode::Full,
    };
    record_reconcile(&report);
    tracing::info!(inserted, deleted, "Reconciliation complete");
    Ok(report)
}

async fn insert_all<R>(repo: &R, courses: &[Course]) -> Result<ReconcileReport>
where
    R: CourseRepository + ?Sized,
{
    let mut seen = HashSet::new();
    let mut inserted = 0;
    for course in courses {
        if seen.insert(course.term_crn.as_str()) {
            repo.insert_course(course).await?;
            inserted += 1;
        }
    }

    let report = ReconcileReport {
        fetched: courses.len(),
        inserted,
        deleted: 0,
        mode: ReconcileMode::InsertOnly,
    };
    record_reconcile(&report);
    tracing::info!(inserted = report.inserted, "Insert-only reconciliation complete");
    Ok(report)
}
