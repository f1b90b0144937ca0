use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub grade_level: i32,
    pub enrollment_date: NaiveDate,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Other(String),
}

impl Difficulty {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "beginner" => Difficulty::Beginner,
            "intermediate" => Difficulty::Intermediate,
            "advanced" => Difficulty::Advanced,
            _ => Difficulty::Other(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
            Difficulty::Other(value) => value,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Difficulty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub credits: i32,
}

/// Enrollment status as stored: `in-progress`, `completed`, or any other label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentStatus {
    InProgress,
    Completed,
    Other(String),
}

impl EnrollmentStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "in-progress" => EnrollmentStatus::InProgress,
            "completed" => EnrollmentStatus::Completed,
            other => EnrollmentStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EnrollmentStatus::InProgress => "in-progress",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Other(value) => value,
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EnrollmentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub progress: i32,
    pub status: EnrollmentStatus,
    pub enrollment_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub assessment_type: String,
    pub score: f64,
    pub max_score: f64,
    pub completed_at: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformancePoint {
    pub course_name: String,
    pub percentage: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentEntry {
    pub course_name: String,
    pub assessment_type: String,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub completed_at: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledCourse {
    pub course: Course,
    pub progress: i32,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgress {
    pub course_name: String,
    pub progress: i32,
    pub total_modules: u32,
    pub completed_modules: u32,
}

/// Change in percentage points; `value` is always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub value: f64,
    pub is_positive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassRank {
    pub position: u32,
    pub out_of: u32,
}

impl fmt::Display for ClassRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.position, self.out_of)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentStats {
    pub student: Student,
    pub active_courses: usize,
    pub average_grade: Option<f64>,
    pub completed_courses: usize,
    /// `None` when the course catalog could not be read.
    pub total_credits: Option<i32>,
    pub class_rank: Option<ClassRank>,
    pub performance_trend: Option<Trend>,
    pub grade_trend: Option<Trend>,
}
