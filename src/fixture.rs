use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DashboardError, Result};
use crate::models::{
    ClassRank, Course, Difficulty, Enrollment, EnrollmentStatus, PerformanceRecord, Student,
};
use crate::source::{DataSource, RankingService};
use crate::stats;

pub const JOHN_DOE: Uuid = Uuid::from_u128(0x6f1c_2a4e_0001_4c1a_9d3e_1b2c3d4e5f60);
pub const JANE_SMITH: Uuid = Uuid::from_u128(0x6f1c_2a4e_0002_4c1a_9d3e_1b2c3d4e5f60);

const ADVANCED_MATHEMATICS: Uuid = Uuid::from_u128(0x9a7b_11c0_0001_4f2e_8a61_5e0d4c3b2a10);
const PHYSICS_FUNDAMENTALS: Uuid = Uuid::from_u128(0x9a7b_11c0_0002_4f2e_8a61_5e0d4c3b2a10);
const WORLD_LITERATURE: Uuid = Uuid::from_u128(0x9a7b_11c0_0003_4f2e_8a61_5e0d4c3b2a10);
const COMPUTER_SCIENCE_101: Uuid = Uuid::from_u128(0x9a7b_11c0_0004_4f2e_8a61_5e0d4c3b2a10);

/// Raw rows for every table the dashboard reads.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    pub enrollments: Vec<Enrollment>,
    pub performance_records: Vec<PerformanceRecord>,
}

fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        DashboardError::malformed("fixture", format!("invalid date {year}-{month}-{day}"))
    })
}

impl Dataset {
    /// Two students, a four-course catalog, and one student's coursework.
    pub fn demo() -> Result<Self> {
        let students = vec![
            Student {
                id: JOHN_DOE,
                first_name: "John".to_string(),
                last_name: "Doe".to_string(),
                email: "john.doe@example.com".to_string(),
                grade_level: 11,
                enrollment_date: date(2023, 9, 1)?,
            },
            Student {
                id: JANE_SMITH,
                first_name: "Jane".to_string(),
                last_name: "Smith".to_string(),
                email: "jane.smith@example.com".to_string(),
                grade_level: 12,
                enrollment_date: date(2023, 9, 1)?,
            },
        ];

        let courses = vec![
            Course {
                id: ADVANCED_MATHEMATICS,
                code: "MATH301".to_string(),
                title: "Advanced Mathematics".to_string(),
                description: "Complex mathematical concepts and problem-solving techniques"
                    .to_string(),
                category: "Mathematics".to_string(),
                difficulty: Difficulty::Advanced,
                credits: 3,
            },
            Course {
                id: PHYSICS_FUNDAMENTALS,
                code: "PHYS101".to_string(),
                title: "Physics Fundamentals".to_string(),
                description: "Introduction to basic physics principles".to_string(),
                category: "Science".to_string(),
                difficulty: Difficulty::Intermediate,
                credits: 4,
            },
            Course {
                id: WORLD_LITERATURE,
                code: "ENGL210".to_string(),
                title: "World Literature".to_string(),
                description: "Study of classic literature from around the world".to_string(),
                category: "English".to_string(),
                difficulty: Difficulty::Intermediate,
                credits: 3,
            },
            Course {
                id: COMPUTER_SCIENCE_101,
                code: "CS101".to_string(),
                title: "Computer Science 101".to_string(),
                description: "Introduction to programming and computer science concepts"
                    .to_string(),
                category: "Technology".to_string(),
                difficulty: Difficulty::Beginner,
                credits: 4,
            },
        ];

        let enrollments = vec![
            Enrollment {
                id: Uuid::from_u128(0xe001),
                student_id: JOHN_DOE,
                course_id: ADVANCED_MATHEMATICS,
                progress: 65,
                status: EnrollmentStatus::InProgress,
                enrollment_date: date(2023, 9, 5)?,
            },
            Enrollment {
                id: Uuid::from_u128(0xe002),
                student_id: JOHN_DOE,
                course_id: PHYSICS_FUNDAMENTALS,
                progress: 80,
                status: EnrollmentStatus::InProgress,
                enrollment_date: date(2023, 9, 5)?,
            },
        ];

        let performance_records = vec![
            PerformanceRecord {
                id: Uuid::from_u128(0xa001),
                student_id: JOHN_DOE,
                course_id: ADVANCED_MATHEMATICS,
                assessment_type: "Quiz".to_string(),
                score: 85.0,
                max_score: 100.0,
                completed_at: date(2023, 10, 1)?,
            },
            PerformanceRecord {
                id: Uuid::from_u128(0xa002),
                student_id: JOHN_DOE,
                course_id: ADVANCED_MATHEMATICS,
                assessment_type: "Midterm".to_string(),
                score: 78.0,
                max_score: 100.0,
                completed_at: date(2023, 11, 15)?,
            },
            PerformanceRecord {
                id: Uuid::from_u128(0xa003),
                student_id: JOHN_DOE,
                course_id: PHYSICS_FUNDAMENTALS,
                assessment_type: "Quiz".to_string(),
                score: 92.0,
                max_score: 100.0,
                completed_at: date(2023, 10, 10)?,
            },
        ];

        Ok(Self {
            students,
            courses,
            enrollments,
            performance_records,
        })
    }
}

/// Serves a [`Dataset`] from memory. Also ranks students from its own records.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    data: Dataset,
}

impl InMemorySource {
    pub fn new(data: Dataset) -> Self {
        Self { data }
    }

    pub fn demo() -> Result<Self> {
        Ok(Self::new(Dataset::demo()?))
    }
}

#[async_trait]
impl DataSource for InMemorySource {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn students(&self) -> Result<Vec<Student>> {
        let mut students = self.data.students.clone();
        students.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
        });
        Ok(students)
    }

    async fn student(&self, student_id: Uuid) -> Result<Student> {
        debug!(%student_id, "fixture student lookup");
        self.data
            .students
            .iter()
            .find(|s| s.id == student_id)
            .cloned()
            .ok_or_else(|| DashboardError::not_found("student", student_id))
    }

    async fn first_student(&self) -> Result<Student> {
        self.data
            .students
            .first()
            .cloned()
            .ok_or_else(|| DashboardError::not_found("student", "first row"))
    }

    async fn courses(&self) -> Result<Vec<Course>> {
        let mut courses = self.data.courses.clone();
        courses.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(courses)
    }

    async fn enrollments(&self, student_id: Uuid) -> Result<Vec<Enrollment>> {
        Ok(self
            .data
            .enrollments
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn performance_records(&self, student_id: Uuid) -> Result<Vec<PerformanceRecord>> {
        Ok(self
            .data
            .performance_records
            .iter()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RankingService for InMemorySource {
    async fn class_rank(&self, student_id: Uuid) -> Result<Option<ClassRank>> {
        Ok(stats::class_rank(&self.data.performance_records, student_id))
    }
}
