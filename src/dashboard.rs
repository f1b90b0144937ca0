use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::adapter::{
    Adapter, AdapterState, CourseProgressQuery, PerformanceSeriesQuery, StudentStatsQuery,
};
use crate::error::{DashboardError, ErrorKind, Result};
use crate::models::{
    AssessmentEntry, CourseProgress, EnrolledCourse, PerformancePoint, StudentStats,
};
use crate::source::{DataSource, RankingService};
use crate::stats;

/// What a single page section shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum Section<T> {
    Ready(T),
    /// The query succeeded but there is nothing to show.
    Empty,
    /// The query failed; the page offers a retry.
    Failed { kind: ErrorKind, message: String },
}

impl<T> Section<T> {
    fn failed(err: &DashboardError) -> Self {
        Section::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// A missing row is data-absent, not a failure.
    fn from_result(result: Result<T>, is_empty: impl FnOnce(&T) -> bool) -> Self {
        match result {
            Ok(value) if is_empty(&value) => Section::Empty,
            Ok(value) => Section::Ready(value),
            Err(err) if err.kind() == ErrorKind::NotFound => Section::Empty,
            Err(err) => Section::failed(&err),
        }
    }

    fn from_state(state: AdapterState<T>, is_empty: impl FnOnce(&T) -> bool) -> Self {
        match (state.value, state.error) {
            (_, Some(err)) if err.kind() != ErrorKind::NotFound => Section::failed(&err),
            (Some(value), _) if !is_empty(&value) => Section::Ready(value),
            _ => Section::Empty,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Section::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub student_id: Uuid,
    pub stats: Section<StudentStats>,
    pub progress: Section<CourseProgress>,
    pub performance: Section<Vec<PerformancePoint>>,
    pub enrolled_courses: Section<Vec<EnrolledCourse>>,
    pub assessments: Section<Vec<AssessmentEntry>>,
}

impl Page {
    pub fn failed_sections(&self) -> usize {
        [
            self.stats.is_failed(),
            self.progress.is_failed(),
            self.performance.is_failed(),
            self.enrolled_courses.is_failed(),
            self.assessments.is_failed(),
        ]
        .into_iter()
        .filter(|failed| *failed)
        .count()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DashboardView {
    /// At least one adapter has not resolved yet.
    Loading,
    Ready(Page),
}

pub struct Dashboard {
    source: Arc<dyn DataSource>,
    stats: Adapter<StudentStatsQuery>,
    progress: Adapter<CourseProgressQuery>,
    performance: Adapter<PerformanceSeriesQuery>,
}

impl Dashboard {
    pub fn new(source: Arc<dyn DataSource>, ranking: Arc<dyn RankingService>) -> Self {
        Self {
            stats: Adapter::new(StudentStatsQuery::new(ranking), Arc::clone(&source)),
            progress: Adapter::new(CourseProgressQuery, Arc::clone(&source)),
            performance: Adapter::new(PerformanceSeriesQuery, Arc::clone(&source)),
            source,
        }
    }

    pub fn stats(&self) -> &Adapter<StudentStatsQuery> {
        &self.stats
    }

    pub fn progress(&self) -> &Adapter<CourseProgressQuery> {
        &self.progress
    }

    pub fn performance(&self) -> &Adapter<PerformanceSeriesQuery> {
        &self.performance
    }

    /// Id of the student whose data the adapters currently hold.
    pub fn student_id(&self) -> Option<Uuid> {
        self.stats.state().student_id
    }

    /// Load every section for `student_id`; the adapters run concurrently.
    pub async fn load(&self, student_id: Uuid) {
        info!(%student_id, source = self.source.name(), "loading dashboard");
        tokio::join!(
            self.stats.load(student_id),
            self.progress.load(student_id),
            self.performance.load(student_id),
        );
    }

    /// Resolve the first student row and load it.
    pub async fn load_first(&self) -> Result<Uuid> {
        let student = self.source.first_student().await?;
        self.load(student.id).await;
        Ok(student.id)
    }

    /// Re-issue only the queries shown as failed. Returns how many were retried.
    pub async fn retry_failed(&self) -> usize {
        let (stats, progress, performance) = tokio::join!(
            async { self.stats.has_retryable_error() && self.stats.retry().await },
            async { self.progress.has_retryable_error() && self.progress.retry().await },
            async { self.performance.has_retryable_error() && self.performance.retry().await },
        );
        let retried = [stats, progress, performance]
            .into_iter()
            .filter(|r| *r)
            .count();
        debug!(retried, "retried failed sections");
        retried
    }

    pub fn is_loading(&self) -> bool {
        self.stats.is_loading() || self.progress.is_loading() || self.performance.is_loading()
    }

    /// Page model, or `Loading` until all adapters have resolved for the same
    /// student. The two list sections are read straight from the source.
    pub async fn view(&self) -> DashboardView {
        if self.is_loading() {
            return DashboardView::Loading;
        }

        let stats = self.stats.state();
        let progress = self.progress.state();
        let performance = self.performance.state();

        let Some(student_id) = stats.student_id else {
            return DashboardView::Loading;
        };
        if progress.student_id != Some(student_id) || performance.student_id != Some(student_id) {
            return DashboardView::Loading;
        }

        let (enrolled_courses, assessments) = self.list_views(student_id).await;

        DashboardView::Ready(Page {
            student_id,
            stats: Section::from_state(stats, |_| false),
            progress: Section::from_state(progress.flatten(), |_| false),
            performance: Section::from_state(performance, Vec::is_empty),
            enrolled_courses,
            assessments,
        })
    }

    async fn list_views(
        &self,
        student_id: Uuid,
    ) -> (Section<Vec<EnrolledCourse>>, Section<Vec<AssessmentEntry>>) {
        let (courses, enrollments, records) = tokio::join!(
            self.source.courses(),
            self.source.enrollments(student_id),
            self.source.performance_records(student_id),
        );

        let enrolled = match (&courses, &enrollments) {
            (Ok(courses), Ok(enrollments)) => {
                Ok(stats::enrolled_courses(enrollments, courses, student_id))
            }
            (Err(err), _) | (_, Err(err)) => Err(err.clone()),
        };
        // Without the catalog the history still renders, under unknown course names.
        let catalog = courses.as_deref().unwrap_or(&[]);
        let history = records.map(|records| stats::assessment_history(&records, catalog, student_id));

        (
            Section::from_result(enrolled, Vec::is_empty),
            Section::from_result(history, Vec::is_empty),
        )
    }
}
