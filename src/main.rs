use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use student_dashboard::config::{self, Config, SourceKind};
use student_dashboard::db;
use student_dashboard::report::{self, OutputFormat};
use student_dashboard::{Dashboard, DashboardView};

#[derive(Parser)]
#[command(name = "student-dashboard")]
#[command(about = "Student performance dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the demonstration dataset
    Seed,
    /// Import performance records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List students
    Students {
        #[arg(long, value_enum, env = "DASHBOARD_SOURCE", default_value = "fixture")]
        source: SourceKind,
    },
    /// Render the dashboard for one student
    Show {
        /// Student id; defaults to the first student row
        #[arg(long)]
        student: Option<Uuid>,
        #[arg(long, value_enum, env = "DASHBOARD_SOURCE", default_value = "fixture")]
        source: SourceKind,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Times to retry failed sections before rendering
        #[arg(long, default_value_t = 1)]
        retries: u32,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("student_dashboard=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = postgres_pool().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = postgres_pool().await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = postgres_pool().await?;
            let summary = db::import_csv(&pool, &csv).await?;
            println!(
                "Inserted {} records from {} ({} duplicates, {} without enrollment).",
                summary.inserted,
                csv.display(),
                summary.duplicates,
                summary.unmatched
            );
        }
        Commands::Students { source } => {
            let backend = config::open_backend(&Config::from_env(source)?).await?;
            let students = backend.source.students().await?;

            if students.is_empty() {
                println!("No students found.");
                return Ok(());
            }

            for student in students {
                println!(
                    "- {} {} (grade {}, {})",
                    student.id,
                    student.display_name(),
                    student.grade_level,
                    student.email
                );
            }
        }
        Commands::Show {
            student,
            source,
            format,
            retries,
            out,
        } => {
            let backend = config::open_backend(&Config::from_env(source)?).await?;
            let dashboard = Dashboard::new(backend.source, backend.ranking);

            match student {
                Some(id) => dashboard.load(id).await,
                None => {
                    let id = dashboard
                        .load_first()
                        .await
                        .context("no student to show")?;
                    info!(student_id = %id, "showing first student");
                }
            }

            let mut view = dashboard.view().await;
            for attempt in 1..=retries {
                let DashboardView::Ready(page) = &view else {
                    break;
                };
                if page.failed_sections() == 0 {
                    break;
                }
                warn!(attempt, failed = page.failed_sections(), "retrying failed sections");
                dashboard.retry_failed().await;
                view = dashboard.view().await;
            }

            let rendered = report::render(&view, format)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Dashboard written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}

async fn postgres_pool() -> anyhow::Result<sqlx::PgPool> {
    let config = Config::from_env(SourceKind::Postgres)?;
    db::connect(config.database_url()?, config.max_connections).await
}
