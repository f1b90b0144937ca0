use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{
    AssessmentEntry, ClassRank, Course, CourseProgress, EnrolledCourse, Enrollment,
    EnrollmentStatus, PerformancePoint, PerformanceRecord, Trend,
};

pub const UNKNOWN_COURSE: &str = "Unknown Course";
pub const MODULES_PER_COURSE: u32 = 10;

/// Arithmetic mean, 0 for an empty slice.
pub fn average(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// `score / max_score * 100`, or 0 when `max_score` is not a positive finite number.
/// Scores outside `[0, max_score]` are not clamped.
pub fn percentage_score(score: f64, max_score: f64) -> f64 {
    if !max_score.is_finite() || max_score <= 0.0 || !score.is_finite() {
        return 0.0;
    }
    score / max_score * 100.0
}

pub fn total_credits<'a, I>(courses: I) -> i32
where
    I: IntoIterator<Item = &'a Course>,
{
    courses.into_iter().map(|course| course.credits).sum()
}

pub fn active_course_count(enrollments: &[Enrollment], student_id: Uuid) -> usize {
    enrollments
        .iter()
        .filter(|e| e.student_id == student_id && e.status == EnrollmentStatus::InProgress)
        .count()
}

pub fn completed_course_count(enrollments: &[Enrollment], student_id: Uuid) -> usize {
    enrollments
        .iter()
        .filter(|e| e.student_id == student_id && e.progress == 100)
        .count()
}

/// In-progress enrollment with the latest enrollment date. Ties keep the first one listed.
pub fn most_recent_active_enrollment(
    enrollments: &[Enrollment],
    student_id: Uuid,
) -> Option<&Enrollment> {
    enrollments
        .iter()
        .filter(|e| e.student_id == student_id && e.status == EnrollmentStatus::InProgress)
        .fold(None, |best: Option<&Enrollment>, e| match best {
            Some(current) if current.enrollment_date >= e.enrollment_date => Some(current),
            _ => Some(e),
        })
}

fn course_title(courses: &[Course], course_id: Uuid) -> String {
    courses
        .iter()
        .find(|c| c.id == course_id)
        .map(|c| c.title.clone())
        .unwrap_or_else(|| UNKNOWN_COURSE.to_string())
}

/// Oldest first.
pub fn performance_series(
    records: &[PerformanceRecord],
    courses: &[Course],
    student_id: Uuid,
) -> Vec<PerformancePoint> {
    let mut points: Vec<PerformancePoint> = records
        .iter()
        .filter(|r| r.student_id == student_id)
        .map(|r| PerformancePoint {
            course_name: course_title(courses, r.course_id),
            percentage: percentage_score(r.score, r.max_score),
            date: r.completed_at,
        })
        .collect();

    points.sort_by(|a, b| a.date.cmp(&b.date));
    points
}

/// Most recent first.
pub fn assessment_history(
    records: &[PerformanceRecord],
    courses: &[Course],
    student_id: Uuid,
) -> Vec<AssessmentEntry> {
    let mut entries: Vec<AssessmentEntry> = records
        .iter()
        .filter(|r| r.student_id == student_id)
        .map(|r| AssessmentEntry {
            course_name: course_title(courses, r.course_id),
            assessment_type: r.assessment_type.clone(),
            score: r.score,
            max_score: r.max_score,
            percentage: percentage_score(r.score, r.max_score),
            completed_at: r.completed_at,
        })
        .collect();

    entries.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    entries
}

/// Enrollments joined to their catalog entry; enrollments pointing at an
/// unknown course are dropped.
pub fn enrolled_courses(
    enrollments: &[Enrollment],
    courses: &[Course],
    student_id: Uuid,
) -> Vec<EnrolledCourse> {
    enrollments
        .iter()
        .filter(|e| e.student_id == student_id)
        .filter_map(|e| {
            courses
                .iter()
                .find(|c| c.id == e.course_id)
                .map(|course| EnrolledCourse {
                    course: course.clone(),
                    progress: e.progress,
                    status: e.status.clone(),
                })
        })
        .collect()
}

/// Mean percentage across the student's records, `None` when there are none.
pub fn average_grade(records: &[PerformanceRecord], student_id: Uuid) -> Option<f64> {
    let percentages: Vec<f64> = records
        .iter()
        .filter(|r| r.student_id == student_id)
        .map(|r| percentage_score(r.score, r.max_score))
        .collect();

    if percentages.is_empty() {
        None
    } else {
        Some(average(&percentages))
    }
}

pub fn course_progress(enrollment: &Enrollment, course: &Course) -> CourseProgress {
    let clamped = enrollment.progress.clamp(0, 100) as u32;
    CourseProgress {
        course_name: course.title.clone(),
        progress: enrollment.progress,
        total_modules: MODULES_PER_COURSE,
        completed_modules: clamped * MODULES_PER_COURSE / 100,
    }
}

fn as_trend(delta: f64) -> Option<Trend> {
    if !delta.is_finite() {
        return None;
    }
    Some(Trend {
        value: delta.abs(),
        is_positive: delta >= 0.0,
    })
}

/// Latest value against the mean of all earlier values, in percentage points.
pub fn trend(values: &[f64]) -> Option<Trend> {
    match values.split_last() {
        Some((latest, earlier)) if !earlier.is_empty() => as_trend(latest - average(earlier)),
        _ => None,
    }
}

/// How far the latest value moved the running average.
pub fn average_shift(values: &[f64]) -> Option<Trend> {
    match values.split_last() {
        Some((_, earlier)) if !earlier.is_empty() => {
            as_trend(average(values) - average(earlier))
        }
        _ => None,
    }
}

/// Competition ranking by average percentage, highest first. Students sharing
/// an average share a position.
pub fn class_rank(records: &[PerformanceRecord], student_id: Uuid) -> Option<ClassRank> {
    let mut per_student: HashMap<Uuid, Vec<f64>> = HashMap::new();
    for record in records {
        per_student
            .entry(record.student_id)
            .or_default()
            .push(percentage_score(record.score, record.max_score));
    }

    let own = average(per_student.get(&student_id)?);
    let ahead = per_student
        .values()
        .filter(|scores| average(scores) > own)
        .count();

    Some(ClassRank {
        position: ahead as u32 + 1,
        out_of: per_student.len() as u32,
    })
}

/// Rounded whole percentage, or `N/A` for absent or non-finite values.
pub fn display_percentage(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{}%", v.round() as i64),
        _ => "N/A".to_string(),
    }
}
