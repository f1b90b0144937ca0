use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ClassRank, Course, Enrollment, PerformancePoint, PerformanceRecord, Student};
use crate::stats;

/// Read-only access to dashboard rows.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short label used in logs (e.g. "fixture").
    fn name(&self) -> &str;

    /// All students, ordered by last name then first name.
    async fn students(&self) -> Result<Vec<Student>>;

    /// The student with the given id, `NotFound` if absent.
    async fn student(&self, student_id: Uuid) -> Result<Student>;

    /// The first student row, `NotFound` if there are no students.
    async fn first_student(&self) -> Result<Student>;

    /// Full course catalog ordered by course code.
    async fn courses(&self) -> Result<Vec<Course>>;

    async fn enrollments(&self, student_id: Uuid) -> Result<Vec<Enrollment>>;

    async fn performance_records(&self, student_id: Uuid) -> Result<Vec<PerformanceRecord>>;

    /// Performance records joined to course names, oldest first.
    ///
    /// The default composes two fetches client-side; stores that can join
    /// server-side override it with a single query.
    async fn performance_series(&self, student_id: Uuid) -> Result<Vec<PerformancePoint>> {
        composed_performance_series(self, student_id).await
    }
}

/// Client-side join of records to course titles. An unreadable catalog only
/// costs the course names.
pub async fn composed_performance_series<S>(
    source: &S,
    student_id: Uuid,
) -> Result<Vec<PerformancePoint>>
where
    S: DataSource + ?Sized,
{
    let records = source.performance_records(student_id).await?;
    let courses = match source.courses().await {
        Ok(courses) => courses,
        Err(err) => {
            warn!(%student_id, kind = %err.kind(), "course catalog unavailable: {err}");
            Vec::new()
        }
    };
    Ok(stats::performance_series(&records, &courses, student_id))
}

/// Position of a student within their class.
#[async_trait]
pub trait RankingService: Send + Sync {
    /// `Ok(None)` when the student cannot be ranked (no graded work yet).
    async fn class_rank(&self, student_id: Uuid) -> Result<Option<ClassRank>>;
}

/// Ranking service for deployments without one; every rank is unknown.
pub struct NoRanking;

#[async_trait]
impl RankingService for NoRanking {
    async fn class_rank(&self, _student_id: Uuid) -> Result<Option<ClassRank>> {
        Ok(None)
    }
}
