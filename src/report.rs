use std::fmt::Write;

use clap::ValueEnum;

use crate::dashboard::{DashboardView, Page, Section};
use crate::models::{StudentStats, Trend};
use crate::stats;

pub const ASSESSMENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Markdown,
    Json,
}

pub fn render(view: &DashboardView, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(view)?),
        OutputFormat::Text => Ok(render_page(view, Style::Text)),
        OutputFormat::Markdown => Ok(render_page(view, Style::Markdown)),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Style {
    Text,
    Markdown,
}

impl Style {
    fn heading(self, out: &mut String, level: usize, title: &str) {
        match self {
            Style::Markdown => {
                let _ = writeln!(out, "{} {}", "#".repeat(level), title);
            }
            Style::Text => {
                let _ = writeln!(out, "{title}");
                let underline = if level == 1 { '=' } else { '-' };
                let _ = writeln!(out, "{}", underline.to_string().repeat(title.len()));
            }
        }
    }
}

fn trend_label(trend: Option<Trend>) -> String {
    match trend {
        Some(t) if t.value.is_finite() => {
            let arrow = if t.is_positive { '+' } else { '-' };
            format!(" ({arrow}{:.1} pts)", t.value)
        }
        _ => String::new(),
    }
}

fn failed_line<T>(out: &mut String, name: &str, section: &Section<T>) -> bool {
    if let Section::Failed { kind, .. } = section {
        let _ = writeln!(out, "{name} unavailable ({kind}); retry");
        true
    } else {
        false
    }
}

fn render_stats(out: &mut String, stats: &StudentStats) {
    let rank = stats
        .class_rank
        .map(|rank| rank.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let _ = writeln!(
        out,
        "- Active Courses: {}{}",
        stats.active_courses,
        trend_label(stats.performance_trend)
    );
    let _ = writeln!(
        out,
        "- Average Grade: {}{}",
        stats::display_percentage(stats.average_grade),
        trend_label(stats.grade_trend)
    );
    let _ = writeln!(out, "- Completed Courses: {}", stats.completed_courses);
    let credits = stats
        .total_credits
        .map(|credits| credits.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let _ = writeln!(out, "- Credits Enrolled: {credits}");
    let _ = writeln!(out, "- Class Rank: {rank}");
}

fn render_page(view: &DashboardView, style: Style) -> String {
    let mut output = String::new();

    let page: &Page = match view {
        DashboardView::Loading => {
            let _ = writeln!(output, "Loading...");
            return output;
        }
        DashboardView::Ready(page) => page,
    };

    style.heading(&mut output, 1, "Dashboard");
    match &page.stats {
        Section::Ready(stats) => {
            let _ = writeln!(
                output,
                "{} (grade {}, {})",
                stats.student.display_name(),
                stats.student.grade_level,
                stats.student.email
            );
            let _ = writeln!(output);
            render_stats(&mut output, stats);
        }
        Section::Empty => {
            let _ = writeln!(output, "No student data available.");
        }
        failed => {
            failed_line(&mut output, "Student summary", failed);
        }
    }

    let _ = writeln!(output);
    style.heading(&mut output, 2, "Performance Trends");
    match &page.performance {
        Section::Ready(points) => {
            for point in points {
                let _ = writeln!(
                    output,
                    "- {} {}: {}",
                    point.date,
                    point.course_name,
                    stats::display_percentage(Some(point.percentage))
                );
            }
        }
        Section::Empty => {
            let _ = writeln!(output, "No performance data available.");
        }
        failed => {
            failed_line(&mut output, "Performance data", failed);
        }
    }

    let _ = writeln!(output);
    style.heading(&mut output, 2, "Current Course");
    match &page.progress {
        Section::Ready(progress) => {
            let _ = writeln!(output, "{}: {}%", progress.course_name, progress.progress);
            let _ = writeln!(
                output,
                "{} of {} modules completed",
                progress.completed_modules, progress.total_modules
            );
        }
        Section::Empty => {
            let _ = writeln!(output, "No active courses.");
        }
        failed => {
            failed_line(&mut output, "Course progress", failed);
        }
    }

    let _ = writeln!(output);
    style.heading(&mut output, 2, "Enrolled Courses");
    match &page.enrolled_courses {
        Section::Ready(courses) => {
            for enrolled in courses {
                let _ = writeln!(
                    output,
                    "- {} [{}] {}%: {}",
                    enrolled.course.title,
                    enrolled.course.code,
                    enrolled.progress,
                    enrolled.course.description
                );
            }
        }
        Section::Empty => {
            let _ = writeln!(output, "No enrolled courses.");
        }
        failed => {
            failed_line(&mut output, "Enrolled courses", failed);
        }
    }

    let _ = writeln!(output);
    style.heading(&mut output, 2, "Recent Assessments");
    match &page.assessments {
        Section::Ready(entries) => {
            for entry in entries.iter().take(ASSESSMENT_LIMIT) {
                let _ = writeln!(
                    output,
                    "- {} {} ({}): {}/{} on {}",
                    entry.course_name,
                    entry.assessment_type,
                    stats::display_percentage(Some(entry.percentage)),
                    entry.score,
                    entry.max_score,
                    entry.completed_at
                );
            }
        }
        Section::Empty => {
            let _ = writeln!(output, "No assessments recorded.");
        }
        failed => {
            failed_line(&mut output, "Assessments", failed);
        }
    }

    output
}
