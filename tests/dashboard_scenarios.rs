use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Notify;
use uuid::Uuid;

use student_dashboard::adapter::{Adapter, PerformanceSeriesQuery};
use student_dashboard::error::Result;
use student_dashboard::fixture::{Dataset, InMemorySource, JANE_SMITH, JOHN_DOE};
use student_dashboard::models::{
    Course, Enrollment, EnrollmentStatus, PerformancePoint, PerformanceRecord, Student,
};
use student_dashboard::report::{self, OutputFormat};
use student_dashboard::stats;
use student_dashboard::{
    Dashboard, DashboardError, DashboardView, DataSource, ErrorKind, NoRanking, Page, Section,
};

/// Wraps the demo data; the joined performance query or the course catalog
/// can be made to fail, and every call is counted.
struct FlakySource {
    inner: InMemorySource,
    fail_series: AtomicBool,
    fail_courses: AtomicBool,
    series_calls: AtomicU32,
    student_calls: AtomicU32,
    course_calls: AtomicU32,
}

impl FlakySource {
    fn new() -> Self {
        Self {
            inner: InMemorySource::demo().unwrap(),
            fail_series: AtomicBool::new(false),
            fail_courses: AtomicBool::new(false),
            series_calls: AtomicU32::new(0),
            student_calls: AtomicU32::new(0),
            course_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DataSource for FlakySource {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn students(&self) -> Result<Vec<Student>> {
        self.inner.students().await
    }

    async fn student(&self, student_id: Uuid) -> Result<Student> {
        self.student_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.student(student_id).await
    }

    async fn first_student(&self) -> Result<Student> {
        self.inner.first_student().await
    }

    async fn courses(&self) -> Result<Vec<Course>> {
        self.course_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_courses.load(Ordering::SeqCst) {
            return Err(DashboardError::Network("catalog query timed out".to_string()));
        }
        self.inner.courses().await
    }

    async fn enrollments(&self, student_id: Uuid) -> Result<Vec<Enrollment>> {
        self.inner.enrollments(student_id).await
    }

    async fn performance_records(&self, student_id: Uuid) -> Result<Vec<PerformanceRecord>> {
        self.inner.performance_records(student_id).await
    }

    async fn performance_series(&self, student_id: Uuid) -> Result<Vec<PerformancePoint>> {
        self.series_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_series.load(Ordering::SeqCst) {
            return Err(DashboardError::Network("connection reset by peer".to_string()));
        }
        student_dashboard::source::composed_performance_series(self, student_id).await
    }
}

/// The joined performance query for John Doe blocks until released.
struct GatedSource {
    inner: InMemorySource,
    gate: Notify,
}

impl GatedSource {
    fn new() -> Self {
        Self {
            inner: InMemorySource::demo().unwrap(),
            gate: Notify::new(),
        }
    }
}

#[async_trait]
impl DataSource for GatedSource {
    fn name(&self) -> &str {
        "gated"
    }

    async fn students(&self) -> Result<Vec<Student>> {
        self.inner.students().await
    }

    async fn student(&self, student_id: Uuid) -> Result<Student> {
        self.inner.student(student_id).await
    }

    async fn first_student(&self) -> Result<Student> {
        self.inner.first_student().await
    }

    async fn courses(&self) -> Result<Vec<Course>> {
        self.inner.courses().await
    }

    async fn enrollments(&self, student_id: Uuid) -> Result<Vec<Enrollment>> {
        self.inner.enrollments(student_id).await
    }

    async fn performance_records(&self, student_id: Uuid) -> Result<Vec<PerformanceRecord>> {
        self.inner.performance_records(student_id).await
    }

    async fn performance_series(&self, student_id: Uuid) -> Result<Vec<PerformancePoint>> {
        if student_id == JOHN_DOE {
            self.gate.notified().await;
        }
        self.inner.performance_series(student_id).await
    }
}

fn ready(view: DashboardView) -> Page {
    match view {
        DashboardView::Ready(page) => page,
        DashboardView::Loading => panic!("dashboard still loading"),
    }
}

#[tokio::test]
async fn two_active_courses_average_to_85_percent() {
    let source = Arc::new(InMemorySource::demo().unwrap());
    let dashboard = Dashboard::new(source.clone(), source);
    dashboard.load(JOHN_DOE).await;

    let page = ready(dashboard.view().await);
    let Section::Ready(stats) = page.stats else {
        panic!("stats section should be ready");
    };
    assert_eq!(stats.active_courses, 2);
    assert_eq!(stats.completed_courses, 0);
    assert_eq!(stats::display_percentage(stats.average_grade), "85%");
    assert!((stats.average_grade.unwrap() - 85.0).abs() < 1e-9);
}

#[tokio::test]
async fn student_without_records_has_no_average() {
    let source = Arc::new(InMemorySource::demo().unwrap());
    let dashboard = Dashboard::new(source, Arc::new(NoRanking));
    dashboard.load(JANE_SMITH).await;

    let view = dashboard.view().await;
    let rendered = report::render(&view, OutputFormat::Text).unwrap();
    assert!(rendered.contains("Average Grade: N/A"));
    assert!(rendered.contains("No performance data available."));
    assert!(!rendered.contains("NaN"));

    let page = ready(view);
    let Section::Ready(stats) = page.stats else {
        panic!("stats section should be ready");
    };
    assert_eq!(stats.average_grade, None);
    assert_eq!(stats.grade_trend, None);
}

#[tokio::test]
async fn failed_query_is_isolated_and_retried_alone() {
    let source = Arc::new(FlakySource::new());
    source.fail_series.store(true, Ordering::SeqCst);
    let dashboard = Dashboard::new(source.clone(), Arc::new(NoRanking));
    dashboard.load(JOHN_DOE).await;

    let page = ready(dashboard.view().await);
    assert!(matches!(
        page.performance,
        Section::Failed {
            kind: ErrorKind::Network,
            ..
        }
    ));
    assert!(matches!(page.stats, Section::Ready(_)));
    assert!(matches!(page.progress, Section::Ready(_)));
    assert!(matches!(page.assessments, Section::Ready(_)));
    assert_eq!(page.failed_sections(), 1);
    assert_eq!(
        dashboard.performance().state().error.map(|e| e.kind()),
        Some(ErrorKind::Network)
    );

    source.fail_series.store(false, Ordering::SeqCst);
    let student_calls = source.student_calls.load(Ordering::SeqCst);
    assert_eq!(dashboard.retry_failed().await, 1);
    assert_eq!(source.series_calls.load(Ordering::SeqCst), 2);
    assert_eq!(source.student_calls.load(Ordering::SeqCst), student_calls);

    let page = ready(dashboard.view().await);
    assert_eq!(page.failed_sections(), 0);
    let Section::Ready(points) = page.performance else {
        panic!("performance should recover after retry");
    };
    assert_eq!(points.len(), 3);
}

#[tokio::test]
async fn catalog_failure_only_fails_catalog_sections() {
    let source = Arc::new(FlakySource::new());
    source.fail_courses.store(true, Ordering::SeqCst);
    let dashboard = Dashboard::new(source.clone(), Arc::new(NoRanking));
    dashboard.load(JOHN_DOE).await;

    let view = dashboard.view().await;
    let rendered = report::render(&view, OutputFormat::Text).unwrap();
    assert!(rendered.contains("- Credits Enrolled: N/A"));
    assert!(rendered.contains("Course progress unavailable (network); retry"));

    let page = ready(view);
    let Section::Ready(stats) = &page.stats else {
        panic!("stats should render without the catalog");
    };
    assert_eq!(stats.total_credits, None);
    assert_eq!(stats.active_courses, 2);
    assert_eq!(stats::display_percentage(stats.average_grade), "85%");

    let Section::Ready(points) = &page.performance else {
        panic!("performance should render without the catalog");
    };
    assert_eq!(points.len(), 3);
    assert!(points.iter().all(|p| p.course_name == stats::UNKNOWN_COURSE));

    let Section::Ready(entries) = &page.assessments else {
        panic!("assessments should render without the catalog");
    };
    assert!(entries.iter().all(|e| e.course_name == stats::UNKNOWN_COURSE));

    assert!(matches!(
        page.progress,
        Section::Failed {
            kind: ErrorKind::Network,
            ..
        }
    ));
    assert!(page.enrolled_courses.is_failed());
    assert_eq!(page.failed_sections(), 2);

    source.fail_courses.store(false, Ordering::SeqCst);
    let student_calls = source.student_calls.load(Ordering::SeqCst);
    let series_calls = source.series_calls.load(Ordering::SeqCst);
    let course_calls = source.course_calls.load(Ordering::SeqCst);
    assert_eq!(dashboard.retry_failed().await, 1);
    assert_eq!(source.student_calls.load(Ordering::SeqCst), student_calls);
    assert_eq!(source.series_calls.load(Ordering::SeqCst), series_calls);
    assert_eq!(source.course_calls.load(Ordering::SeqCst), course_calls + 1);

    let page = ready(dashboard.view().await);
    assert_eq!(page.failed_sections(), 0);
    let Section::Ready(progress) = page.progress else {
        panic!("progress should recover after retry");
    };
    assert_eq!(progress.course_name, "Advanced Mathematics");
}

#[tokio::test]
async fn failed_retry_keeps_error_state() {
    let source = Arc::new(FlakySource::new());
    source.fail_series.store(true, Ordering::SeqCst);
    let adapter = Adapter::new(PerformanceSeriesQuery, source.clone());
    adapter.load(JOHN_DOE).await;
    assert!(adapter.retry().await);

    let state = adapter.state();
    assert!(!state.loading);
    assert!(state.value.is_none());
    assert_eq!(state.error.map(|e| e.kind()), Some(ErrorKind::Network));
    assert_eq!(source.series_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stale_result_does_not_overwrite_new_student() {
    let source = Arc::new(GatedSource::new());
    let dashboard = Dashboard::new(source.clone(), Arc::new(NoRanking));

    let switch = async {
        tokio::task::yield_now().await;
        dashboard.load(JANE_SMITH).await;
        source.gate.notify_one();
    };
    tokio::join!(dashboard.load(JOHN_DOE), switch);

    assert_eq!(dashboard.student_id(), Some(JANE_SMITH));
    let state = dashboard.performance().state();
    assert_eq!(state.student_id, Some(JANE_SMITH));
    assert_eq!(state.value, Some(Vec::new()));

    let page = ready(dashboard.view().await);
    assert_eq!(page.student_id, JANE_SMITH);
    assert_eq!(page.performance, Section::Empty);
}

#[tokio::test]
async fn page_waits_for_every_adapter() {
    let source = Arc::new(GatedSource::new());
    let dashboard = Dashboard::new(source.clone(), Arc::new(NoRanking));

    let observe = async {
        tokio::task::yield_now().await;
        assert!(dashboard.stats().state().value.is_some());
        assert!(dashboard.performance().is_loading());
        assert!(matches!(dashboard.view().await, DashboardView::Loading));
        source.gate.notify_one();
    };
    tokio::join!(dashboard.load(JOHN_DOE), observe);

    let page = ready(dashboard.view().await);
    assert_eq!(page.failed_sections(), 0);
    assert!(matches!(page.performance, Section::Ready(_)));
}

#[tokio::test]
async fn sections_follow_date_order() {
    let mut data = Dataset::demo().unwrap();
    let course = data.courses[0].id;
    for (day, score) in [(3, 60.0), (1, 70.0), (2, 90.0)] {
        data.performance_records.push(PerformanceRecord {
            id: Uuid::new_v4(),
            student_id: JANE_SMITH,
            course_id: course,
            assessment_type: "Quiz".to_string(),
            score,
            max_score: 100.0,
            completed_at: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
        });
    }
    data.enrollments.push(Enrollment {
        id: Uuid::new_v4(),
        student_id: JANE_SMITH,
        course_id: course,
        progress: 100,
        status: EnrollmentStatus::Completed,
        enrollment_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
    });

    let source = Arc::new(InMemorySource::new(data));
    let dashboard = Dashboard::new(source.clone(), source);
    dashboard.load(JANE_SMITH).await;
    let page = ready(dashboard.view().await);

    let Section::Ready(points) = page.performance else {
        panic!("performance should be ready");
    };
    assert!(points.windows(2).all(|w| w[0].date <= w[1].date));

    let Section::Ready(entries) = page.assessments else {
        panic!("assessments should be ready");
    };
    assert!(entries.windows(2).all(|w| w[0].completed_at >= w[1].completed_at));

    let Section::Ready(stats) = page.stats else {
        panic!("stats should be ready");
    };
    assert_eq!(stats.completed_courses, 1);
    assert_eq!(stats.active_courses, 0);
    assert_eq!(page.progress, Section::Empty);
    // Jane averages 73.3 against John's 85.
    assert_eq!(stats.class_rank.map(|r| r.to_string()), Some("2/2".to_string()));
}
