use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DashboardError, Result};
use crate::fixture::Dataset;
use crate::models::{
    ClassRank, Course, Difficulty, Enrollment, EnrollmentStatus, PerformancePoint,
    PerformanceRecord, Student,
};
use crate::source::{DataSource, RankingService};
use crate::stats;

const STUDENT_COLUMNS: &str =
    "id, first_name, last_name, email, grade_level, enrollment_date";

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Insert the demonstration dataset. Safe to run repeatedly.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let data = Dataset::demo()?;

    for student in &data.students {
        sqlx::query(
            r#"
            INSERT INTO student_dashboard.students
            (id, first_name, last_name, email, grade_level, enrollment_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO UPDATE
            SET first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                grade_level = EXCLUDED.grade_level
            "#,
        )
        .bind(student.id)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(student.grade_level)
        .bind(student.enrollment_date)
        .execute(pool)
        .await?;
    }

    for course in &data.courses {
        sqlx::query(
            r#"
            INSERT INTO student_dashboard.courses
            (id, code, title, description, category, difficulty, credits)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (code) DO UPDATE
            SET title = EXCLUDED.title,
                description = EXCLUDED.description,
                category = EXCLUDED.category,
                difficulty = EXCLUDED.difficulty,
                credits = EXCLUDED.credits
            "#,
        )
        .bind(course.id)
        .bind(&course.code)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.category)
        .bind(course.difficulty.as_str())
        .bind(course.credits)
        .execute(pool)
        .await?;
    }

    for enrollment in &data.enrollments {
        sqlx::query(
            r#"
            INSERT INTO student_dashboard.enrollments
            (id, student_id, course_id, progress, status, enrollment_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id, course_id) DO NOTHING
            "#,
        )
        .bind(enrollment.id)
        .bind(enrollment.student_id)
        .bind(enrollment.course_id)
        .bind(enrollment.progress)
        .bind(enrollment.status.as_str())
        .bind(enrollment.enrollment_date)
        .execute(pool)
        .await?;
    }

    for record in &data.performance_records {
        let Some(enrollment) = data
            .enrollments
            .iter()
            .find(|e| e.student_id == record.student_id && e.course_id == record.course_id)
        else {
            warn!(record = %record.id, "seed record has no enrollment, skipping");
            continue;
        };

        sqlx::query(
            r#"
            INSERT INTO student_dashboard.performance_records
            (id, enrollment_id, assessment_type, score, max_score, completed_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(enrollment.id)
        .bind(&record.assessment_type)
        .bind(record.score)
        .bind(record.max_score)
        .bind(record.completed_at)
        .bind(format!("seed-{}", record.id))
        .execute(pool)
        .await?;
    }

    info!(
        students = data.students.len(),
        courses = data.courses.len(),
        records = data.performance_records.len(),
        "seed complete"
    );
    Ok(())
}

/// One assessment result as it appears in an import file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CsvRecord {
    pub student_email: String,
    pub course_code: String,
    pub assessment_type: String,
    pub score: f64,
    pub max_score: f64,
    pub completed_at: NaiveDate,
    pub source_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub unmatched: usize,
}

pub fn read_csv(csv_path: &Path) -> anyhow::Result<Vec<CsvRecord>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut rows = Vec::new();

    for (line, result) in reader.deserialize::<CsvRecord>().enumerate() {
        let row = result.with_context(|| format!("invalid row {} in {}", line + 1, csv_path.display()))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Load performance records from CSV. Rows whose student/course pair has no
/// enrollment are skipped; rows with a known `source_key` are not re-inserted.
pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<ImportSummary> {
    let rows = read_csv(csv_path)?;
    let mut summary = ImportSummary::default();

    for row in rows {
        let enrollment_id: Option<Uuid> = sqlx::query(
            r#"
            SELECT e.id
            FROM student_dashboard.enrollments e
            JOIN student_dashboard.students s ON s.id = e.student_id
            JOIN student_dashboard.courses c ON c.id = e.course_id
            WHERE s.email = $1 AND c.code = $2
            "#,
        )
        .bind(&row.student_email)
        .bind(&row.course_code)
        .fetch_optional(pool)
        .await?
        .map(|r| r.get("id"));

        let Some(enrollment_id) = enrollment_id else {
            warn!(
                email = %row.student_email,
                course = %row.course_code,
                "no enrollment for import row, skipping"
            );
            summary.unmatched += 1;
            continue;
        };

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO student_dashboard.performance_records
            (id, enrollment_id, assessment_type, score, max_score, completed_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(enrollment_id)
        .bind(&row.assessment_type)
        .bind(row.score)
        .bind(row.max_score)
        .bind(row.completed_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    Ok(summary)
}

fn column<'r, T>(row: &'r PgRow, entity: &'static str, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|err| DashboardError::malformed(entity, format!("column {name}: {err}")))
}

fn student_from_row(row: &PgRow) -> Result<Student> {
    Ok(Student {
        id: column(row, "student", "id")?,
        first_name: column(row, "student", "first_name")?,
        last_name: column(row, "student", "last_name")?,
        email: column(row, "student", "email")?,
        grade_level: column(row, "student", "grade_level")?,
        enrollment_date: column(row, "student", "enrollment_date")?,
    })
}

fn course_from_row(row: &PgRow) -> Result<Course> {
    let difficulty: String = column(row, "course", "difficulty")?;
    Ok(Course {
        id: column(row, "course", "id")?,
        code: column(row, "course", "code")?,
        title: column(row, "course", "title")?,
        description: column(row, "course", "description")?,
        category: column(row, "course", "category")?,
        difficulty: Difficulty::parse(&difficulty),
        credits: column(row, "course", "credits")?,
    })
}

fn enrollment_from_row(row: &PgRow) -> Result<Enrollment> {
    let status: String = column(row, "enrollment", "status")?;
    Ok(Enrollment {
        id: column(row, "enrollment", "id")?,
        student_id: column(row, "enrollment", "student_id")?,
        course_id: column(row, "enrollment", "course_id")?,
        progress: column(row, "enrollment", "progress")?,
        status: EnrollmentStatus::parse(&status),
        enrollment_date: column(row, "enrollment", "enrollment_date")?,
    })
}

fn record_from_row(row: &PgRow) -> Result<PerformanceRecord> {
    Ok(PerformanceRecord {
        id: column(row, "performance record", "id")?,
        student_id: column(row, "performance record", "student_id")?,
        course_id: column(row, "performance record", "course_id")?,
        assessment_type: column(row, "performance record", "assessment_type")?,
        score: column(row, "performance record", "score")?,
        max_score: column(row, "performance record", "max_score")?,
        completed_at: column(row, "performance record", "completed_at")?,
    })
}

fn point_from_row(row: &PgRow) -> Result<PerformancePoint> {
    let score: f64 = column(row, "performance point", "score")?;
    let max_score: f64 = column(row, "performance point", "max_score")?;
    let course_name: Option<String> = column(row, "performance point", "course_name")?;
    Ok(PerformancePoint {
        course_name: course_name.unwrap_or_else(|| stats::UNKNOWN_COURSE.to_string()),
        percentage: stats::percentage_score(score, max_score),
        date: column(row, "performance point", "completed_at")?,
    })
}

/// Reads dashboard rows from the `student_dashboard` schema.
#[derive(Debug, Clone)]
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataSource for PgSource {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn students(&self) -> Result<Vec<Student>> {
        let query = format!(
            "SELECT {STUDENT_COLUMNS} FROM student_dashboard.students \
             ORDER BY last_name, first_name"
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| DashboardError::from_sqlx("student", err))?;
        rows.iter().map(student_from_row).collect()
    }

    async fn student(&self, student_id: Uuid) -> Result<Student> {
        let query = format!("SELECT {STUDENT_COLUMNS} FROM student_dashboard.students WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| DashboardError::from_sqlx("student", err))?
            .ok_or_else(|| DashboardError::not_found("student", student_id))?;
        student_from_row(&row)
    }

    async fn first_student(&self) -> Result<Student> {
        let query = format!(
            "SELECT {STUDENT_COLUMNS} FROM student_dashboard.students \
             ORDER BY enrollment_date, last_name, first_name LIMIT 1"
        );
        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| DashboardError::from_sqlx("student", err))?
            .ok_or_else(|| DashboardError::not_found("student", "first row"))?;
        student_from_row(&row)
    }

    async fn courses(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query(
            "SELECT id, code, title, description, category, difficulty, credits \
             FROM student_dashboard.courses ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| DashboardError::from_sqlx("course", err))?;
        debug!(count = rows.len(), "fetched courses");
        rows.iter().map(course_from_row).collect()
    }

    async fn enrollments(&self, student_id: Uuid) -> Result<Vec<Enrollment>> {
        let rows = sqlx::query(
            "SELECT id, student_id, course_id, progress, status, enrollment_date \
             FROM student_dashboard.enrollments WHERE student_id = $1 \
             ORDER BY enrollment_date, id",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| DashboardError::from_sqlx("enrollment", err))?;
        rows.iter().map(enrollment_from_row).collect()
    }

    async fn performance_records(&self, student_id: Uuid) -> Result<Vec<PerformanceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, e.student_id, e.course_id, p.assessment_type,
                   p.score, p.max_score, p.completed_at
            FROM student_dashboard.performance_records p
            JOIN student_dashboard.enrollments e ON e.id = p.enrollment_id
            WHERE e.student_id = $1
            ORDER BY p.completed_at, p.id
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| DashboardError::from_sqlx("performance record", err))?;
        rows.iter().map(record_from_row).collect()
    }

    async fn performance_series(&self, student_id: Uuid) -> Result<Vec<PerformancePoint>> {
        let rows = sqlx::query(
            r#"
            SELECT c.title AS course_name, p.score, p.max_score, p.completed_at
            FROM student_dashboard.performance_records p
            JOIN student_dashboard.enrollments e ON e.id = p.enrollment_id
            LEFT JOIN student_dashboard.courses c ON c.id = e.course_id
            WHERE e.student_id = $1
            ORDER BY p.completed_at, p.id
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| DashboardError::from_sqlx("performance point", err))?;
        rows.iter().map(point_from_row).collect()
    }
}

#[async_trait]
impl RankingService for PgSource {
    async fn class_rank(&self, student_id: Uuid) -> Result<Option<ClassRank>> {
        let row = sqlx::query(
            r#"
            WITH averages AS (
                SELECT e.student_id,
                       AVG(CASE WHEN p.max_score > 0 THEN p.score / p.max_score * 100 ELSE 0 END)
                           AS average
                FROM student_dashboard.performance_records p
                JOIN student_dashboard.enrollments e ON e.id = p.enrollment_id
                GROUP BY e.student_id
            ),
            ranked AS (
                SELECT student_id,
                       RANK() OVER (ORDER BY average DESC) AS position,
                       COUNT(*) OVER () AS out_of
                FROM averages
            )
            SELECT position, out_of FROM ranked WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| DashboardError::from_sqlx("class rank", err))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let position: i64 = column(&row, "class rank", "position")?;
        let out_of: i64 = column(&row, "class rank", "out_of")?;
        let convert = |value: i64| {
            u32::try_from(value)
                .map_err(|_| DashboardError::malformed("class rank", format!("{value} out of range")))
        };

        Ok(Some(ClassRank {
            position: convert(position)?,
            out_of: convert(out_of)?,
        }))
    }
}
