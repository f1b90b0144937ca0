use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DashboardError, ErrorKind, Result};
use crate::models::{CourseProgress, PerformancePoint, StudentStats};
use crate::source::{DataSource, RankingService};
use crate::stats;

/// One fetch-and-derive step for a single display concern.
#[async_trait]
pub trait Query: Send + Sync {
    type Output: Clone + Send + Sync;

    /// Section name used in logs and error messages.
    fn name(&self) -> &'static str;

    async fn fetch(&self, source: &dyn DataSource, student_id: Uuid) -> Result<Self::Output>;
}

/// Snapshot of an adapter as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterState<T> {
    /// Student the state belongs to; `None` until the first `load`.
    pub student_id: Option<Uuid>,
    /// Last successful result for `student_id`.
    pub value: Option<T>,
    pub loading: bool,
    /// Set exactly when the most recent resolved request failed.
    pub error: Option<DashboardError>,
}

impl<T> Default for AdapterState<T> {
    fn default() -> Self {
        Self {
            student_id: None,
            value: None,
            loading: true,
            error: None,
        }
    }
}

impl<T> AdapterState<Option<T>> {
    /// Treat a resolved `None` the same as having no value.
    pub fn flatten(self) -> AdapterState<T> {
        AdapterState {
            student_id: self.student_id,
            value: self.value.flatten(),
            loading: self.loading,
            error: self.error,
        }
    }
}

struct Slot<T> {
    generation: u64,
    state: AdapterState<T>,
}

pub struct Adapter<Q: Query> {
    query: Q,
    source: Arc<dyn DataSource>,
    slot: Mutex<Slot<Q::Output>>,
}

impl<Q: Query> Adapter<Q> {
    pub fn new(query: Q, source: Arc<dyn DataSource>) -> Self {
        Self {
            query,
            source,
            slot: Mutex::new(Slot {
                generation: 0,
                state: AdapterState::default(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.query.name()
    }

    fn lock(&self) -> MutexGuard<'_, Slot<Q::Output>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> AdapterState<Q::Output> {
        self.lock().state.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.loading
    }

    /// Errors other than a missing row, which the page shows as empty.
    pub fn has_retryable_error(&self) -> bool {
        self.lock()
            .state
            .error
            .as_ref()
            .is_some_and(|err| err.kind() != ErrorKind::NotFound)
    }

    /// Fetch data for `student_id`. Calling again with the same student is a
    /// no-op; use [`Adapter::retry`] to re-issue the query.
    pub async fn load(&self, student_id: Uuid) {
        let generation = {
            let mut slot = self.lock();
            if slot.state.student_id == Some(student_id) {
                debug!(section = self.name(), %student_id, "already loaded, skipping");
                return;
            }
            slot.generation += 1;
            slot.state = AdapterState {
                student_id: Some(student_id),
                value: None,
                loading: true,
                error: None,
            };
            slot.generation
        };

        self.run(generation, student_id).await;
    }

    /// Re-issue the query for the current student. Returns `false` when there
    /// is nothing to retry (no student yet, or a request is still in flight).
    pub async fn retry(&self) -> bool {
        let (generation, student_id) = {
            let mut slot = self.lock();
            let Some(student_id) = slot.state.student_id else {
                return false;
            };
            if slot.state.loading {
                return false;
            }
            slot.generation += 1;
            slot.state.loading = true;
            (slot.generation, student_id)
        };

        debug!(section = self.name(), %student_id, "retrying");
        self.run(generation, student_id).await;
        true
    }

    async fn run(&self, generation: u64, student_id: Uuid) {
        let result = self.query.fetch(self.source.as_ref(), student_id).await;

        let mut slot = self.lock();
        if slot.generation != generation {
            debug!(
                section = self.name(),
                %student_id,
                generation,
                current = slot.generation,
                "discarding stale result"
            );
            return;
        }

        slot.state.loading = false;
        match result {
            Ok(value) => {
                debug!(section = self.name(), %student_id, source = self.source.name(), "loaded");
                slot.state.value = Some(value);
                slot.state.error = None;
            }
            // Previous value for the same student stays on screen.
            Err(err) => {
                warn!(section = self.name(), %student_id, kind = %err.kind(), "fetch failed: {err}");
                slot.state.error = Some(err);
            }
        }
    }
}

/// Summary figures for the stat cards.
pub struct StudentStatsQuery {
    ranking: Arc<dyn RankingService>,
}

impl StudentStatsQuery {
    pub fn new(ranking: Arc<dyn RankingService>) -> Self {
        Self { ranking }
    }
}

#[async_trait]
impl Query for StudentStatsQuery {
    type Output = StudentStats;

    fn name(&self) -> &'static str {
        "student stats"
    }

    async fn fetch(&self, source: &dyn DataSource, student_id: Uuid) -> Result<StudentStats> {
        let (student, enrollments, records) = tokio::try_join!(
            source.student(student_id),
            source.enrollments(student_id),
            source.performance_records(student_id),
        )?;

        // Catalog and rank only feed one figure each; losing them should not hide the rest.
        let courses = match source.courses().await {
            Ok(courses) => Some(courses),
            Err(err) => {
                warn!(%student_id, kind = %err.kind(), "course catalog unavailable: {err}");
                None
            }
        };
        let class_rank = match self.ranking.class_rank(student_id).await {
            Ok(rank) => rank,
            Err(err) => {
                warn!(%student_id, kind = %err.kind(), "class rank unavailable: {err}");
                None
            }
        };

        let percentages: Vec<f64> = stats::performance_series(&records, &[], student_id)
            .into_iter()
            .map(|point| point.percentage)
            .collect();
        let total_credits = courses.map(|courses| {
            let enrolled = stats::enrolled_courses(&enrollments, &courses, student_id);
            stats::total_credits(enrolled.iter().map(|e| &e.course))
        });

        Ok(StudentStats {
            active_courses: stats::active_course_count(&enrollments, student_id),
            average_grade: stats::average_grade(&records, student_id),
            completed_courses: stats::completed_course_count(&enrollments, student_id),
            total_credits,
            class_rank,
            performance_trend: stats::average_shift(&percentages),
            grade_trend: stats::trend(&percentages),
            student,
        })
    }
}

/// Progress through the most recently started in-progress course.
pub struct CourseProgressQuery;

#[async_trait]
impl Query for CourseProgressQuery {
    type Output = Option<CourseProgress>;

    fn name(&self) -> &'static str {
        "course progress"
    }

    async fn fetch(
        &self,
        source: &dyn DataSource,
        student_id: Uuid,
    ) -> Result<Option<CourseProgress>> {
        let (enrollments, courses) =
            tokio::try_join!(source.enrollments(student_id), source.courses())?;

        let progress = stats::most_recent_active_enrollment(&enrollments, student_id).and_then(
            |enrollment| {
                courses
                    .iter()
                    .find(|c| c.id == enrollment.course_id)
                    .map(|course| stats::course_progress(enrollment, course))
            },
        );
        Ok(progress)
    }
}

/// Percentage per assessment, oldest first.
pub struct PerformanceSeriesQuery;

#[async_trait]
impl Query for PerformanceSeriesQuery {
    type Output = Vec<PerformancePoint>;

    fn name(&self) -> &'static str {
        "performance"
    }

    async fn fetch(
        &self,
        source: &dyn DataSource,
        student_id: Uuid,
    ) -> Result<Vec<PerformancePoint>> {
        source.performance_series(student_id).await
    }
}
